use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Operation tag carried by every batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Train,
    Inference,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Train => "train",
            Operation::Inference => "inference",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers used to scope storage paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContext {
    pub bot_id: String,
    pub user_id: String,
    pub job_or_avatar_id: String,
}

impl OwnerContext {
    pub fn new(
        bot_id: impl Into<String>,
        user_id: impl Into<String>,
        job_or_avatar_id: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            user_id: user_id.into(),
            job_or_avatar_id: job_or_avatar_id.into(),
        }
    }
}

/// One referenced file within a batch. `id` is opaque and may itself be an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReference {
    pub id: String,
    pub explicit_key: Option<String>,
    pub original_filename: Option<String>,
}

impl ItemReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            explicit_key: None,
            original_filename: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.explicit_key = Some(key.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.original_filename = Some(filename.into());
        self
    }

    /// Explicit key, if set and not blank
    pub fn explicit_key(&self) -> Option<&str> {
        self.explicit_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub operation: Operation,
    pub items: Vec<ItemReference>,
    pub owner: OwnerContext,
    pub batch_id: Option<String>,
    #[serde(default)]
    pub priority: u8,
}

impl BatchRequest {
    pub fn new(operation: Operation, owner: OwnerContext, items: Vec<ItemReference>) -> Self {
        Self {
            operation,
            items,
            owner,
            batch_id: None,
            priority: 0,
        }
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }
}

/// Failure classification. Critical kinds abort the batch before fan-out;
/// the rest are recorded per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    BatchProcessingError,
    ResolutionError,
    InvalidUrl,
    FileTooLarge,
    FileTooSmall,
    UnsupportedFormat,
    ImageTooSmall,
    CorruptedFile,
    DownloadHttpError,
    DownloadTimeout,
    Cancelled,
    UnexpectedError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::BatchProcessingError => "BATCH_PROCESSING_ERROR",
            ErrorKind::ResolutionError => "RESOLUTION_ERROR",
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::FileTooLarge => "FILE_TOO_LARGE",
            ErrorKind::FileTooSmall => "FILE_TOO_SMALL",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::ImageTooSmall => "IMAGE_TOO_SMALL",
            ErrorKind::CorruptedFile => "CORRUPTED_FILE",
            ErrorKind::DownloadHttpError => "DOWNLOAD_HTTP_ERROR",
            ErrorKind::DownloadTimeout => "DOWNLOAD_TIMEOUT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ErrorKind::ValidationError | ErrorKind::BatchProcessingError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSuccess {
    pub reference_id: String,
    pub storage_key: String,
    pub storage_url: String,
    pub byte_size: u64,
    #[serde(with = "duration_secs")]
    pub upload_duration: Duration,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFailure {
    pub reference_id: String,
    /// Key the item would have been stored under; reported even though nothing was written
    pub storage_key_attempted: String,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// Terminal result of one item, created once by the item processor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Success(UploadSuccess),
    Failure(UploadFailure),
}

impl ItemOutcome {
    pub fn reference_id(&self) -> &str {
        match self {
            ItemOutcome::Success(s) => &s.reference_id,
            ItemOutcome::Failure(f) => &f.reference_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ItemOutcome::Success(_) => None,
            ItemOutcome::Failure(f) => Some(f.error_kind),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub operation: Operation,
    pub owner: OwnerContext,
    pub batch_id: Option<String>,
    pub total_items: usize,
    pub successful: Vec<UploadSuccess>,
    pub failed: Vec<UploadFailure>,
    pub total_bytes: u64,
    #[serde(with = "duration_secs")]
    pub processing_duration: Duration,
    pub message: String,
}

impl BatchResult {
    pub fn successful_files(&self) -> usize {
        self.successful.len()
    }

    pub fn failed_files(&self) -> usize {
        self.failed.len()
    }

    pub fn failure_for(&self, reference_id: &str) -> Option<&UploadFailure> {
        self.failed.iter().find(|f| f.reference_id == reference_id)
    }

    pub fn success_for(&self, reference_id: &str) -> Option<&UploadSuccess> {
        self.successful
            .iter()
            .find(|s| s.reference_id == reference_id)
    }
}

/// Whole-batch failure: no item was attempted
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{error_kind}: {message}")]
pub struct CriticalError {
    pub operation: Operation,
    pub owner: OwnerContext,
    pub batch_id: Option<String>,
    pub error_kind: ErrorKind,
    pub message: String,
    pub not_attempted: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl CriticalError {
    pub fn new(request: &BatchRequest, error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation: request.operation,
            owner: request.owner.clone(),
            batch_id: request.batch_id.clone(),
            error_kind,
            message: message.into(),
            not_attempted: request.item_ids(),
            timestamp: Utc::now(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_wire_names() {
        for kind in [
            ErrorKind::ValidationError,
            ErrorKind::ResolutionError,
            ErrorKind::DownloadHttpError,
            ErrorKind::Cancelled,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
        assert!(ErrorKind::BatchProcessingError.is_critical());
        assert!(!ErrorKind::ImageTooSmall.is_critical());
    }

    #[test]
    fn test_blank_explicit_key_is_ignored() {
        let item = ItemReference::new("abc").with_key("   ");
        assert_eq!(item.explicit_key(), None);

        let item = ItemReference::new("abc").with_key(" custom/key.png ");
        assert_eq!(item.explicit_key(), Some("custom/key.png"));
    }

    #[test]
    fn test_critical_error_lists_every_item() {
        let request = BatchRequest::new(
            Operation::Train,
            OwnerContext::new("1", "2", "3"),
            vec![ItemReference::new("a"), ItemReference::new("b")],
        )
        .with_batch_id("batch-7");

        let err = CriticalError::new(&request, ErrorKind::ValidationError, "duplicate ids");
        assert_eq!(err.not_attempted, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.batch_id.as_deref(), Some("batch-7"));
        assert_eq!(err.to_string(), "VALIDATION_ERROR: duplicate ids");
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = ItemOutcome::Failure(UploadFailure {
            reference_id: "x".to_string(),
            storage_key_attempted: "1/2/3/k.jpg".to_string(),
            error_kind: ErrorKind::FileTooSmall,
            message: "too small".to_string(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error_kind"], "FILE_TOO_SMALL");
    }
}
