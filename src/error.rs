use crate::models::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Faults raised by a content locator
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Reference not found or expired: {0}")]
    NotFound(String),

    #[error("Locator API error: {0}")]
    Api(String),

    #[error("Locator transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Faults raised by an object store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Object store request timed out")]
    Timeout,

    #[error("Object store error: {0}")]
    Other(String),
}

/// Faults raised while retrieving and checking raw content
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error downloading file: {status}")]
    Http { status: u16 },

    #[error("Timeout downloading file after {0:?}")]
    Timeout(Duration),

    #[error("File size {size} bytes is below minimum {min} bytes")]
    TooSmall { size: u64, min: u64 },

    #[error("File size {size} bytes exceeds maximum allowed {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Download failed: {0}")]
    Transport(String),
}

/// Faults raised while decoding or gating image dimensions
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Failed to decode image: {0}")]
    Corrupted(String),

    #[error("Image {width}x{height} is below minimum dimension {min}px")]
    TooSmall { width: u32, height: u32, min: u32 },
}

/// Everything that can end one item's lifecycle early
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Failed to resolve file URL: {0}")]
    Resolution(#[from] LocatorError),

    #[error("Invalid file URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Image(#[from] InspectError),

    #[error("Upload failed: {0}")]
    Store(#[from] StoreError),

    #[error("Cancelled before upload completed")]
    Cancelled,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ItemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemError::Resolution(_) => ErrorKind::ResolutionError,
            ItemError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            ItemError::Fetch(e) => match e {
                FetchError::Http { .. } => ErrorKind::DownloadHttpError,
                FetchError::Timeout(_) => ErrorKind::DownloadTimeout,
                FetchError::TooSmall { .. } => ErrorKind::FileTooSmall,
                FetchError::TooLarge { .. } => ErrorKind::FileTooLarge,
                FetchError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
                FetchError::Transport(_) => ErrorKind::UnexpectedError,
            },
            ItemError::Image(e) => match e {
                InspectError::Corrupted(_) => ErrorKind::CorruptedFile,
                InspectError::TooSmall { .. } => ErrorKind::ImageTooSmall,
            },
            ItemError::Store(e) => match e {
                StoreError::Http { .. } => ErrorKind::DownloadHttpError,
                StoreError::Timeout => ErrorKind::DownloadTimeout,
                StoreError::Other(_) => ErrorKind::UnexpectedError,
            },
            ItemError::Cancelled => ErrorKind::Cancelled,
            ItemError::Unexpected(_) => ErrorKind::UnexpectedError,
        }
    }
}
