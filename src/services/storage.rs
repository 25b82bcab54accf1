use crate::error::StoreError;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::collections::HashMap;

/// Durable binary storage with key and metadata semantics
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key` and returns its public URL
    async fn upload(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, StoreError>;

    /// Health check, used at startup only
    async fn exists(&self, bucket: &str) -> Result<bool, StoreError>;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, region: String, endpoint_url: Option<String>) -> Self {
        Self {
            client,
            bucket,
            region,
            endpoint_url: endpoint_url.map(|e| e.trim_end_matches('/').to_string()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object_url(&self, key: &str) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, StoreError> {
        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .set_metadata(Some(metadata))
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                e
            );
            let status = e.raw_response().map(|r| r.status().as_u16());
            let message = DisplayErrorContext(&e).to_string();
            return Err(match e {
                SdkError::TimeoutError(_) => StoreError::Timeout,
                SdkError::ServiceError(_) => StoreError::Http {
                    status: status.unwrap_or(500),
                    message,
                },
                _ => match status {
                    Some(status) if status >= 400 => StoreError::Http { status, message },
                    _ => StoreError::Other(message),
                },
            });
        }

        tracing::info!("File uploaded successfully to S3: {}", key);
        Ok(self.object_url(key))
    }

    async fn exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Other(service_error.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Region};

    fn client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        Client::from_conf(config)
    }

    #[test]
    fn test_object_url_with_custom_endpoint() {
        let store = S3ObjectStore::new(
            client(),
            "photos".to_string(),
            "us-east-1".to_string(),
            Some("http://127.0.0.1:9000/".to_string()),
        );
        assert_eq!(store.object_url("1/2/3/a.jpg"), "http://127.0.0.1:9000/photos/1/2/3/a.jpg");
    }

    #[test]
    fn test_object_url_for_aws() {
        let store = S3ObjectStore::new(client(), "photos".to_string(), "eu-west-1".to_string(), None);
        assert_eq!(
            store.object_url("k.png"),
            "https://photos.s3.eu-west-1.amazonaws.com/k.png"
        );
        assert_eq!(store.bucket(), "photos");
    }
}
