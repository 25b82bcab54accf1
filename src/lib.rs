pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::IngestConfig;
pub use crate::models::{BatchRequest, BatchResult, CriticalError, ItemOutcome};
pub use crate::services::orchestrator::BatchOrchestrator;
