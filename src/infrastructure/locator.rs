use crate::config::LocatorConfig;
use crate::services::locator::TelegramLocator;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared HTTP client for locator calls and content fetches
pub fn setup_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("photo-ingest/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub fn setup_locator(config: &LocatorConfig, client: reqwest::Client) -> Arc<TelegramLocator> {
    info!("📍 Content locator: {}", config.api_url);
    Arc::new(TelegramLocator::new(
        client,
        config.api_url.clone(),
        config.bot_token.clone(),
    ))
}
