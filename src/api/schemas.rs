//! Inbound and outbound message shapes for the broker boundary.
//!
//! Two inbound schema versions exist in the wild. Both are translated into the
//! single internal [`BatchRequest`] by [`parse_inbound`], so the pipeline never
//! sees wire-format variants.

use crate::models::{BatchRequest, BatchResult, CriticalError, ItemReference, Operation, OwnerContext};
use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;
use validator::Validate;

pub const RESULT_TOPIC: &str = "photo_upload_result";
pub const ERROR_TOPIC: &str = "photo_upload_error";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Invalid payload: {0}")]
    Inconsistent(String),
}

/// v1 header tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Header {
    Inf,
    Train,
}

impl From<Header> for Operation {
    fn from(header: Header) -> Self {
        match header {
            Header::Inf => Operation::Inference,
            Header::Train => Operation::Train,
        }
    }
}

/// v1: parallel `file_id` / `s3_key` lists scoped by chat and job
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUploadRequestV1 {
    pub header: Header,
    pub file_id: Vec<String>,
    pub s3_key: Vec<String>,
    pub bot_id: i64,
    pub chat_id: i64,
    pub job_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhotoFile {
    #[validate(length(min = 1, max = 1024))]
    pub file_id: String,
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
}

/// v2: explicit operation, per-photo records, avatar scoping and optional batch id
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhotoUploadRequestV2 {
    pub operation: Operation,
    pub photos: Vec<PhotoFile>,
    pub bot_id: i64,
    pub user_id: i64,
    pub avatar_id: i64,
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub batch_id: Option<String>,
    #[serde(default)]
    #[validate(range(max = 10))]
    pub priority: u8,
}

/// Either schema version, chosen by its discriminating key (`operation` for v2,
/// `header` for v1) so field errors name the field rather than the enum.
#[derive(Debug, Clone)]
pub enum InboundRequest {
    V2(PhotoUploadRequestV2),
    V1(PhotoUploadRequestV1),
}

impl<'de> Deserialize<'de> for InboundRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.get("operation").is_some() {
            serde_json::from_value(value)
                .map(InboundRequest::V2)
                .map_err(de::Error::custom)
        } else if value.get("header").is_some() {
            serde_json::from_value(value)
                .map(InboundRequest::V1)
                .map_err(de::Error::custom)
        } else {
            Err(de::Error::custom(
                "expected an `operation` (v2) or `header` (v1) field",
            ))
        }
    }
}

impl InboundRequest {
    pub fn into_batch_request(self) -> Result<BatchRequest, SchemaError> {
        match self {
            InboundRequest::V1(v1) => v1.into_batch_request(),
            InboundRequest::V2(v2) => v2.into_batch_request(),
        }
    }
}

impl PhotoUploadRequestV1 {
    pub fn into_batch_request(self) -> Result<BatchRequest, SchemaError> {
        if self.s3_key.len() != self.file_id.len() {
            return Err(SchemaError::Inconsistent(
                "s3_key list must have same length as file_id list".to_string(),
            ));
        }

        let items = self
            .file_id
            .into_iter()
            .zip(self.s3_key)
            .map(|(id, key)| ItemReference {
                id,
                explicit_key: Some(key).filter(|k| !k.trim().is_empty()),
                original_filename: None,
            })
            .collect();

        Ok(BatchRequest {
            operation: self.header.into(),
            items,
            owner: OwnerContext::new(
                self.bot_id.to_string(),
                self.chat_id.to_string(),
                self.job_id.to_string(),
            ),
            batch_id: None,
            priority: 0,
        })
    }
}

impl PhotoUploadRequestV2 {
    pub fn into_batch_request(self) -> Result<BatchRequest, SchemaError> {
        self.validate()?;
        for photo in &self.photos {
            photo.validate()?;
        }

        match self.operation {
            Operation::Train if self.batch_id.is_none() => {
                return Err(SchemaError::Inconsistent(
                    "train requests require batch_id".to_string(),
                ));
            }
            Operation::Inference if self.photos.len() > 1 => {
                return Err(SchemaError::Inconsistent(
                    "inference requests carry a single photo".to_string(),
                ));
            }
            _ => {}
        }

        let items = self
            .photos
            .into_iter()
            .map(|photo| ItemReference {
                id: photo.file_id,
                explicit_key: photo.s3_key,
                original_filename: photo.original_filename,
            })
            .collect();

        Ok(BatchRequest {
            operation: self.operation,
            items,
            owner: OwnerContext::new(
                self.bot_id.to_string(),
                self.user_id.to_string(),
                self.avatar_id.to_string(),
            ),
            batch_id: self.batch_id,
            priority: self.priority,
        })
    }
}

/// Parses either schema version and adapts it to a [`BatchRequest`]
pub fn parse_inbound(payload: &[u8]) -> Result<BatchRequest, SchemaError> {
    let inbound: InboundRequest = serde_json::from_slice(payload)?;
    inbound.into_batch_request()
}

/// Outcome paired with the topic it is published on
#[derive(Debug, Serialize)]
pub struct OutboundMessage {
    pub topic: &'static str,
    pub payload: serde_json::Value,
}

pub fn envelope(outcome: &Result<BatchResult, CriticalError>) -> Result<OutboundMessage, serde_json::Error> {
    Ok(match outcome {
        Ok(result) => OutboundMessage {
            topic: RESULT_TOPIC,
            payload: serde_json::to_value(result)?,
        },
        Err(critical) => OutboundMessage {
            topic: ERROR_TOPIC,
            payload: serde_json::to_value(critical)?,
        },
    })
}
