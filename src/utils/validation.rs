use crate::error::FetchError;
use crate::models::ItemReference;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Content types accepted for ingestion
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

/// Assumed when the source declares no content type and sniffing finds nothing
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchValidationError {
    #[error("Batch cannot be empty")]
    Empty,

    #[error("Batch size {size} exceeds maximum limit of {max} files")]
    TooLarge { size: usize, max: usize },

    #[error("Batch contains duplicate file ids: {}", .0.join(", "))]
    DuplicateIds(Vec<String>),
}

/// Pre-flight checks run before any network call
pub fn validate_batch(
    items: &[ItemReference],
    max_batch_size: usize,
) -> Result<(), BatchValidationError> {
    if items.is_empty() {
        return Err(BatchValidationError::Empty);
    }

    if items.len() > max_batch_size {
        return Err(BatchValidationError::TooLarge {
            size: items.len(),
            max: max_batch_size,
        });
    }

    let mut seen = HashSet::with_capacity(items.len());
    let mut duplicates = Vec::new();
    for item in items {
        if !seen.insert(item.id.as_str()) && !duplicates.contains(&item.id) {
            duplicates.push(item.id.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(BatchValidationError::DuplicateIds(duplicates));
    }

    tracing::debug!("Batch validation passed for {} items", items.len());
    Ok(())
}

/// Validates body size against the configured bounds. `min` is `None` when the
/// operation does not enforce a lower bound.
pub fn validate_file_size(size: u64, min: Option<u64>, max: u64) -> Result<(), FetchError> {
    if size > max {
        return Err(FetchError::TooLarge { size, max });
    }
    if let Some(min) = min
        && size < min
    {
        return Err(FetchError::TooSmall { size, min });
    }
    Ok(())
}

/// Strips parameters and lowercases a content-type header value
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Validates a declared content type against the supported image set
pub fn validate_content_type(content_type: &str) -> Result<String, FetchError> {
    let normalized = normalize_content_type(content_type);

    if SUPPORTED_CONTENT_TYPES.contains(&normalized.as_str()) {
        return Ok(normalized);
    }

    Err(FetchError::UnsupportedFormat(content_type.to_string()))
}

/// Guesses a content type from magic bytes
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

/// True when the reference is already a fetchable http(s) URL
pub fn is_absolute_url(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Parses a resolved URL; requires an http(s) scheme and a host
pub fn parse_fetch_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ids: &[&str]) -> Vec<ItemReference> {
        ids.iter().map(|id| ItemReference::new(*id)).collect()
    }

    #[test]
    fn test_validate_batch() {
        assert!(validate_batch(&items(&["a", "b"]), 2).is_ok());
        assert_eq!(validate_batch(&[], 2), Err(BatchValidationError::Empty));
        assert_eq!(
            validate_batch(&items(&["a", "b", "c"]), 2),
            Err(BatchValidationError::TooLarge { size: 3, max: 2 })
        );
        assert_eq!(
            validate_batch(&items(&["a", "b", "a", "a"]), 10),
            Err(BatchValidationError::DuplicateIds(vec!["a".to_string()]))
        );
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, Some(1024), 2048).is_ok());
        assert!(validate_file_size(2048, Some(1024), 2048).is_ok());
        assert!(matches!(
            validate_file_size(1023, Some(1024), 2048),
            Err(FetchError::TooSmall { size: 1023, min: 1024 })
        ));
        assert!(matches!(
            validate_file_size(2049, Some(1024), 2048),
            Err(FetchError::TooLarge { .. })
        ));
        assert!(validate_file_size(1, None, 2048).is_ok());
    }

    #[test]
    fn test_validate_content_type() {
        assert_eq!(validate_content_type("image/png").unwrap(), "image/png");
        assert_eq!(validate_content_type("IMAGE/JPEG; charset=binary").unwrap(), "image/jpeg");
        assert!(validate_content_type("image/webp").is_ok());
        assert!(validate_content_type("image/bmp").is_ok());

        assert!(validate_content_type("text/html").is_err());
        assert!(validate_content_type("image/tiff").is_err());
        assert!(validate_content_type("application/octet-stream").is_err());
    }

    #[test]
    fn test_sniff_content_type() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(sniff_content_type(&png), Some("image/png"));
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_content_type(b"hello"), None);
    }

    #[test]
    fn test_urls() {
        assert!(is_absolute_url("https://example.com/a.jpg"));
        assert!(is_absolute_url("HTTP://example.com/a.jpg"));
        assert!(!is_absolute_url("AgACAgIAAxkBAAI"));

        assert!(parse_fetch_url("https://api.telegram.org/file/bot1/photos/a.jpg").is_some());
        assert!(parse_fetch_url("ftp://example.com/a.jpg").is_none());
        assert!(parse_fetch_url("not a url").is_none());
        assert!(parse_fetch_url("https://").is_none());
    }
}
