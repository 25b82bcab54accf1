pub mod fetcher;
pub mod inspector;
pub mod item_processor;
pub mod keys;
pub mod locator;
pub mod orchestrator;
pub mod storage;
