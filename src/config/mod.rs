use crate::models::Operation;
use std::env;
use std::time::Duration;

/// Image-quality gates applied to one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPolicy {
    /// Reject bodies smaller than `min_file_size`
    pub enforce_min_file_size: bool,

    /// Reject images whose width or height is below `min_image_dimension`
    pub enforce_min_dimension: bool,

    /// Fail the item when the image header cannot be decoded.
    /// When false, dimensions fall back to `0x0`.
    pub require_decodable: bool,
}

impl OperationPolicy {
    pub fn strict() -> Self {
        Self {
            enforce_min_file_size: true,
            enforce_min_dimension: true,
            require_decodable: true,
        }
    }

    pub fn permissive() -> Self {
        Self {
            enforce_min_file_size: true,
            enforce_min_dimension: false,
            require_decodable: false,
        }
    }
}

/// Limits consumed by the acquisition pipeline
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Simultaneous resolve/fetch/upload operations (default: 5)
    pub max_concurrent_downloads: usize,

    /// Maximum items per batch (default: 100)
    pub max_batch_size: usize,

    /// Maximum fetched body size in bytes (default: 10 MB)
    pub max_file_size: u64,

    /// Minimum fetched body size in bytes (default: 1 KB)
    pub min_file_size: u64,

    /// Minimum width and height for gated operations (default: 450)
    pub min_image_dimension: u32,

    /// Deadline for a single fetch or upload (default: 30s)
    pub download_timeout: Duration,

    /// Optional deadline for the whole batch; expiry cancels outstanding items
    pub batch_timeout: Option<Duration>,

    pub train_policy: OperationPolicy,
    pub inference_policy: OperationPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 5,
            max_batch_size: 100,
            max_file_size: 10 * 1024 * 1024, // 10 MB
            min_file_size: 1024,
            min_image_dimension: 450,
            download_timeout: Duration::from_secs(30),
            batch_timeout: None,
            train_policy: OperationPolicy::strict(),
            inference_policy: OperationPolicy::permissive(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_concurrent_downloads: env_parse("MAX_CONCURRENT_DOWNLOADS")
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.max_concurrent_downloads),

            max_batch_size: env_parse("MAX_BATCH_SIZE").unwrap_or(default.max_batch_size),

            max_file_size: env_parse::<u64>("MAX_FILE_SIZE_MB")
                .and_then(mib_to_bytes)
                .unwrap_or(default.max_file_size),

            min_file_size: env_parse("MIN_FILE_SIZE").unwrap_or(default.min_file_size),

            min_image_dimension: env_parse("MIN_IMAGE_DIMENSION")
                .unwrap_or(default.min_image_dimension),

            download_timeout: env_parse("DOWNLOAD_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(default.download_timeout),

            batch_timeout: env_parse("BATCH_TIMEOUT_SECONDS")
                .filter(|v: &u64| *v > 0)
                .map(Duration::from_secs),

            train_policy: OperationPolicy {
                enforce_min_file_size: env_flag("TRAIN_ENFORCE_MIN_FILE_SIZE")
                    .unwrap_or(default.train_policy.enforce_min_file_size),
                enforce_min_dimension: env_flag("TRAIN_ENFORCE_MIN_DIMENSION")
                    .unwrap_or(default.train_policy.enforce_min_dimension),
                require_decodable: default.train_policy.require_decodable,
            },

            inference_policy: OperationPolicy {
                enforce_min_file_size: env_flag("INFERENCE_ENFORCE_MIN_FILE_SIZE")
                    .unwrap_or(default.inference_policy.enforce_min_file_size),
                enforce_min_dimension: env_flag("INFERENCE_ENFORCE_MIN_DIMENSION")
                    .unwrap_or(default.inference_policy.enforce_min_dimension),
                require_decodable: default.inference_policy.require_decodable,
            },
        }
    }

    /// Relaxed limits for local runs against small fixtures
    pub fn development() -> Self {
        Self {
            min_file_size: 1,
            download_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Production limits with an overall batch deadline
    pub fn production() -> Self {
        Self {
            batch_timeout: Some(Duration::from_secs(600)),
            ..Self::from_env()
        }
    }

    pub fn policy(&self, operation: Operation) -> OperationPolicy {
        match operation {
            Operation::Train => self.train_policy,
            Operation::Inference => self.inference_policy,
        }
    }
}

/// S3-compatible object store connection settings
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
}

impl S3Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            endpoint_url: env::var("S3_ENDPOINT_URL").ok().filter(|v| !v.trim().is_empty()),
            access_key_id: required("S3_ACCESS_KEY_ID")?,
            secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
            bucket: required("S3_BUCKET_NAME")?,
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        })
    }
}

/// Telegram Bot API settings used to resolve file references
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub api_url: String,
    pub bot_token: String,
}

impl LocatorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

// None when the byte count does not fit in u64
fn mib_to_bytes(mb: u64) -> Option<u64> {
    mb.checked_mul(1024 * 1024)
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.to_lowercase() != "false" && v != "0")
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}
