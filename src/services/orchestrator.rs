use crate::config::IngestConfig;
use crate::models::{
    BatchRequest, BatchResult, CriticalError, ErrorKind, ItemOutcome, UploadFailure,
};
use crate::services::item_processor::{ItemProcessor, ItemScope};
use crate::services::locator::ContentLocator;
use crate::services::storage::ObjectStore;
use crate::utils::validation::validate_batch;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Entry point for both operations: validates a batch, fans items out under the
/// concurrency limit, and folds their outcomes into one result.
pub struct BatchOrchestrator {
    config: Arc<IngestConfig>,
    processor: Arc<ItemProcessor>,
}

impl BatchOrchestrator {
    pub fn new(
        config: IngestConfig,
        locator: Arc<dyn ContentLocator>,
        store: Arc<dyn ObjectStore>,
        http: reqwest::Client,
    ) -> Self {
        let config = Arc::new(config);
        let processor = Arc::new(ItemProcessor::new(config.clone(), locator, store, http));
        Self { config, processor }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub async fn process(&self, request: BatchRequest) -> Result<BatchResult, CriticalError> {
        self.process_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`process`](Self::process), but stops outstanding items when `cancel`
    /// fires. Items that had not started uploading are reported as `CANCELLED`.
    /// Uploads already in progress finish and report their real outcome.
    /// Dropping the returned future cancels the batch as well.
    pub async fn process_with_cancel(
        &self,
        request: BatchRequest,
        cancel: CancellationToken,
    ) -> Result<BatchResult, CriticalError> {
        let started = Instant::now();
        tracing::info!(
            batch_id = request.batch_id.as_deref().unwrap_or("-"),
            operation = %request.operation,
            "Processing batch for {}: {} items",
            request.owner.job_or_avatar_id,
            request.items.len()
        );

        if let Err(e) = validate_batch(&request.items, self.config.max_batch_size) {
            tracing::error!("Batch rejected before processing: {}", e);
            return Err(CriticalError::new(
                &request,
                ErrorKind::ValidationError,
                e.to_string(),
            ));
        }

        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();
        if let Some(limit) = self.config.batch_timeout {
            spawn_deadline(token.clone(), limit);
        }

        let scope = Arc::new(ItemScope::from(&request));
        let mut pending: FuturesUnordered<_> = request
            .items
            .iter()
            .cloned()
            .map(|item| {
                let processor = self.processor.clone();
                let scope = scope.clone();
                let token = token.clone();
                let reference_id = item.id.clone();
                let handle =
                    tokio::spawn(async move { processor.process(&item, &scope, &token).await });
                async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => join_failure(reference_id, e),
                    }
                }
            })
            .collect();

        // Single collector: outcomes are folded here as they complete.
        let mut outcomes = Vec::with_capacity(request.items.len());
        while let Some(outcome) = pending.next().await {
            outcomes.push(outcome);
        }

        aggregate(&request, outcomes, started.elapsed())
    }
}

fn spawn_deadline(token: CancellationToken, limit: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                tracing::warn!("Batch deadline of {:?} reached, cancelling outstanding items", limit);
                token.cancel();
            }
        }
    });
}

fn join_failure(reference_id: String, err: JoinError) -> ItemOutcome {
    let (error_kind, message) = if err.is_cancelled() {
        (ErrorKind::Cancelled, "Item task was cancelled".to_string())
    } else {
        tracing::error!("Item task for {} panicked: {}", reference_id, err);
        (
            ErrorKind::UnexpectedError,
            format!("Unexpected error: {}", err),
        )
    };
    ItemOutcome::Failure(UploadFailure {
        reference_id,
        storage_key_attempted: "unknown".to_string(),
        error_kind,
        message,
    })
}

/// Partitions outcomes into a result. A count mismatch means items were lost
/// and degrades to a critical error.
pub fn aggregate(
    request: &BatchRequest,
    outcomes: Vec<ItemOutcome>,
    elapsed: Duration,
) -> Result<BatchResult, CriticalError> {
    let total_items = request.items.len();
    if outcomes.len() != total_items {
        tracing::error!(
            "Aggregation produced {} outcomes for {} items",
            outcomes.len(),
            total_items
        );
        return Err(CriticalError::new(
            request,
            ErrorKind::BatchProcessingError,
            format!(
                "Batch aggregation produced {} outcomes for {} items",
                outcomes.len(),
                total_items
            ),
        ));
    }

    let mut successful = Vec::new();
    let mut failed = Vec::new();
    let mut total_bytes = 0u64;
    for outcome in outcomes {
        match outcome {
            ItemOutcome::Success(s) => {
                total_bytes += s.byte_size;
                successful.push(s);
            }
            ItemOutcome::Failure(f) => failed.push(f),
        }
    }

    tracing::info!(
        batch_id = request.batch_id.as_deref().unwrap_or("-"),
        "Batch processing completed for {}. Success: {}, Failed: {}, Time: {:.2}s",
        request.owner.job_or_avatar_id,
        successful.len(),
        failed.len(),
        elapsed.as_secs_f64()
    );

    let message = format!(
        "Batch processing completed: {}/{} files successful",
        successful.len(),
        total_items
    );

    Ok(BatchResult {
        operation: request.operation,
        owner: request.owner.clone(),
        batch_id: request.batch_id.clone(),
        total_items,
        successful,
        failed,
        total_bytes,
        processing_duration: elapsed,
        message,
    })
}
