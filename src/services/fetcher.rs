use crate::error::FetchError;
use crate::utils::validation::{
    DEFAULT_CONTENT_TYPE, sniff_content_type, validate_content_type, validate_file_size,
};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

/// Size bounds applied to one fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// `None` when the operation does not enforce a lower bound
    pub min_file_size: Option<u64>,
    pub max_file_size: u64,
}

/// Body and declared content type of a fetched file that passed raw validation
#[derive(Debug)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl FetchedContent {
    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Bounded-timeout HTTP retrieval with size and content-type checks
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn fetch(&self, url: &Url, limits: FetchLimits) -> Result<FetchedContent, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        // Reject before reading when the declared length is already too big
        if let Some(declared) = response.content_length()
            && declared > limits.max_file_size
        {
            return Err(FetchError::TooLarge {
                size: declared,
                max: limits.max_file_size,
            });
        }

        let declared_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > limits.max_file_size {
                return Err(FetchError::TooLarge {
                    size: bytes.len() as u64,
                    max: limits.max_file_size,
                });
            }
        }

        validate_file_size(bytes.len() as u64, limits.min_file_size, limits.max_file_size)?;

        let content_type = match declared_type.filter(|t| !t.trim().is_empty()) {
            Some(declared) => declared,
            None => sniff_content_type(&bytes)
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
        };
        let content_type = validate_content_type(&content_type)?;

        tracing::debug!(
            "Fetched {} bytes ({}) from {}",
            bytes.len(),
            content_type,
            url.host_str().unwrap_or("")
        );

        Ok(FetchedContent {
            bytes,
            content_type,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
