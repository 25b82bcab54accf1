use crate::config::IngestConfig;
use crate::error::{ItemError, StoreError};
use crate::models::{
    BatchRequest, ErrorKind, ItemOutcome, ItemReference, Operation, OwnerContext, UploadFailure,
    UploadSuccess,
};
use crate::services::fetcher::{FetchLimits, FetchedContent, Fetcher};
use crate::services::inspector::{Dimensions, ImageInspector};
use crate::services::keys;
use crate::services::locator::ContentLocator;
use crate::services::storage::ObjectStore;
use crate::utils::validation::{is_absolute_url, parse_fetch_url};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Batch-wide values every item needs
#[derive(Debug, Clone)]
pub struct ItemScope {
    pub operation: Operation,
    pub owner: OwnerContext,
    pub batch_id: Option<String>,
}

impl From<&BatchRequest> for ItemScope {
    fn from(request: &BatchRequest) -> Self {
        Self {
            operation: request.operation,
            owner: request.owner.clone(),
            batch_id: request.batch_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    Pending,
    Resolving,
    Fetching,
    ValidatingImage,
    Uploading,
    Succeeded,
    Failed(ErrorKind),
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemStage::Pending => "pending",
            ItemStage::Resolving => "resolving",
            ItemStage::Fetching => "fetching",
            ItemStage::ValidatingImage => "validating_image",
            ItemStage::Uploading => "uploading",
            ItemStage::Succeeded => "succeeded",
            ItemStage::Failed(kind) => return write!(f, "failed({})", kind),
        };
        f.write_str(name)
    }
}

/// Fetched content that passed every check, plus the permit that covers its upload
struct Prepared {
    content: FetchedContent,
    dims: Dimensions,
    _permit: OwnedSemaphorePermit,
}

/// Runs one item through resolve, fetch, validate and upload.
///
/// The limiter is shared by every batch the processor serves: it bounds the
/// number of items holding network resources at once, process-wide.
pub struct ItemProcessor {
    config: Arc<IngestConfig>,
    locator: Arc<dyn ContentLocator>,
    store: Arc<dyn ObjectStore>,
    fetcher: Fetcher,
    inspector: ImageInspector,
    limiter: Arc<Semaphore>,
}

impl ItemProcessor {
    pub fn new(
        config: Arc<IngestConfig>,
        locator: Arc<dyn ContentLocator>,
        store: Arc<dyn ObjectStore>,
        http: reqwest::Client,
    ) -> Self {
        let fetcher = Fetcher::new(http, config.download_timeout);
        let inspector = ImageInspector::new(config.min_image_dimension);
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));
        Self {
            config,
            locator,
            store,
            fetcher,
            inspector,
            limiter,
        }
    }

    /// Always returns an outcome; every fault is classified into a `Failure`.
    ///
    /// Cancellation stops resolve, fetch and validation. An upload that has
    /// started runs to completion (bounded by `download_timeout`) so the
    /// reported outcome matches what the store holds.
    pub async fn process(
        &self,
        item: &ItemReference,
        scope: &ItemScope,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        let started = Instant::now();
        let mut stage = ItemStage::Pending;

        // Key generation is CPU-only and happens before the limiter.
        let key = keys::key_for(item, &scope.owner);
        let full_key = keys::storage_path(scope.operation, &scope.owner, &key);

        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ItemError::Cancelled),
            res = self.prepare(item, scope, &mut stage) => res,
        };
        let result = match prepared {
            Ok(prepared) => {
                self.upload(item, scope, &full_key, prepared, &mut stage, started)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(success) => {
                tracing::info!(
                    item_id = %item.id,
                    "Successfully processed item in {:.2}s",
                    success.upload_duration.as_secs_f64()
                );
                ItemOutcome::Success(success)
            }
            Err(e) => {
                let kind = e.kind();
                self.advance(item, &mut stage, ItemStage::Failed(kind));
                if kind == ErrorKind::Cancelled {
                    tracing::warn!(item_id = %item.id, "Item cancelled");
                } else {
                    tracing::error!(item_id = %item.id, error_kind = %kind, "Failed to process item: {}", e);
                }
                ItemOutcome::Failure(UploadFailure {
                    reference_id: item.id.clone(),
                    storage_key_attempted: full_key,
                    error_kind: kind,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn prepare(
        &self,
        item: &ItemReference,
        scope: &ItemScope,
        stage: &mut ItemStage,
    ) -> Result<Prepared, ItemError> {
        let policy = self.config.policy(scope.operation);
        self.advance(item, stage, ItemStage::Resolving);

        let permit = self
            .limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ItemError::Unexpected(e.to_string()))?;

        let raw_url = if is_absolute_url(&item.id) {
            item.id.trim().to_string()
        } else {
            self.locator.resolve(&item.id).await?
        };
        let url = parse_fetch_url(&raw_url).ok_or_else(|| ItemError::InvalidUrl(raw_url.clone()))?;

        self.advance(item, stage, ItemStage::Fetching);
        let limits = FetchLimits {
            min_file_size: policy
                .enforce_min_file_size
                .then_some(self.config.min_file_size),
            max_file_size: self.config.max_file_size,
        };
        let content = self.fetcher.fetch(&url, limits).await?;

        self.advance(item, stage, ItemStage::ValidatingImage);
        let dims = self.inspector.inspect(&content.bytes, policy)?;

        Ok(Prepared {
            content,
            dims,
            _permit: permit,
        })
    }

    async fn upload(
        &self,
        item: &ItemReference,
        scope: &ItemScope,
        full_key: &str,
        prepared: Prepared,
        stage: &mut ItemStage,
        started: Instant,
    ) -> Result<UploadSuccess, ItemError> {
        let Prepared { content, dims, _permit } = prepared;
        self.advance(item, stage, ItemStage::Uploading);

        let metadata = self.metadata(item, scope, dims.width, dims.height, started);
        let byte_size = content.byte_size();
        let storage_url = tokio::time::timeout(
            self.config.download_timeout,
            self.store
                .upload(content.bytes, full_key, &content.content_type, metadata),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        self.advance(item, stage, ItemStage::Succeeded);
        Ok(UploadSuccess {
            reference_id: item.id.clone(),
            storage_key: full_key.to_string(),
            storage_url,
            byte_size,
            upload_duration: started.elapsed(),
            content_type: content.content_type,
            width: dims.width,
            height: dims.height,
        })
    }

    fn advance(&self, item: &ItemReference, stage: &mut ItemStage, next: ItemStage) {
        tracing::debug!(item_id = %item.id, "{} -> {}", stage, next);
        *stage = next;
    }

    fn metadata(
        &self,
        item: &ItemReference,
        scope: &ItemScope,
        width: u32,
        height: u32,
        started: Instant,
    ) -> HashMap<String, String> {
        let mut metadata = HashMap::from([
            ("bot_id".to_string(), scope.owner.bot_id.clone()),
            ("user_id".to_string(), scope.owner.user_id.clone()),
            (
                "job_or_avatar_id".to_string(),
                scope.owner.job_or_avatar_id.clone(),
            ),
            ("item_id".to_string(), item.id.clone()),
            ("operation".to_string(), scope.operation.as_str().to_string()),
            (
                "processing_time".to_string(),
                format!("{:.3}", started.elapsed().as_secs_f64()),
            ),
            ("image_width".to_string(), width.to_string()),
            ("image_height".to_string(), height.to_string()),
        ]);
        if let Some(batch_id) = &scope.batch_id {
            metadata.insert("batch_id".to_string(), batch_id.clone());
        }
        metadata
    }
}
