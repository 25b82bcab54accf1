use crate::config::S3Config;
use crate::services::storage::{ObjectStore, S3ObjectStore};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_storage(config: &S3Config) -> Arc<S3ObjectStore> {
    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        config.endpoint_url.as_deref().unwrap_or("aws"),
        config.bucket
    );

    let mut loader = aws_config::from_env()
        .region(Region::new(config.region.clone()))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "static",
        ));
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    Arc::new(S3ObjectStore::new(
        s3_client,
        config.bucket.clone(),
        config.region.clone(),
        config.endpoint_url.clone(),
    ))
}

/// Non-fatal startup check; logs and reports whether the bucket is reachable
pub async fn check_bucket(store: &dyn ObjectStore, bucket: &str) -> bool {
    match store.exists(bucket).await {
        Ok(true) => {
            info!("✅ Bucket '{}' is accessible", bucket);
            true
        }
        Ok(false) => {
            warn!("🪣 Bucket '{}' does not exist", bucket);
            false
        }
        Err(e) => {
            warn!("❌ Bucket '{}' is not accessible: {}", bucket, e);
            false
        }
    }
}
