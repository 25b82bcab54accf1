//! Storage key derivation.
//!
//! Generated keys look like `photos/{user}/{YYYY}/{MM}/{DD}/{item}-{random}{ext}`:
//! the date and user segments are fixed-position so downstream consumers can
//! split on `/`, and the random suffix keeps concurrent calls for the same
//! item from colliding.

use crate::models::{ItemReference, Operation, OwnerContext};
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

pub const DEFAULT_EXTENSION: &str = ".jpg";

const MAX_SEGMENT_LEN: usize = 64;

pub fn generate(owner_user_id: &str, item_id: &str, extension: &str) -> String {
    generate_at(owner_user_id, item_id, extension, Utc::now())
}

pub fn generate_at(
    owner_user_id: &str,
    item_id: &str,
    extension: &str,
    now: DateTime<Utc>,
) -> String {
    format!(
        "photos/{}/{}/{}-{}{}",
        sanitize_segment(owner_user_id),
        now.format("%Y/%m/%d"),
        sanitize_segment(item_stem(item_id)),
        Uuid::new_v4().simple(),
        normalize_extension(extension),
    )
}

/// Extension taken from the original filename, `.jpg` otherwise
pub fn extension_for(original_filename: Option<&str>) -> String {
    original_filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Explicit key if present, generated key otherwise
pub fn key_for(item: &ItemReference, owner: &OwnerContext) -> String {
    match item.explicit_key() {
        Some(key) => key.trim_start_matches('/').to_string(),
        None => generate(
            &owner.user_id,
            &item.id,
            &extension_for(item.original_filename.as_deref()),
        ),
    }
}

/// Prefixes owner scoping. Train and Inference live under disjoint prefixes.
pub fn storage_path(operation: Operation, owner: &OwnerContext, key: &str) -> String {
    let scoped = format!(
        "{}/{}/{}/{}",
        owner.bot_id, owner.user_id, owner.job_or_avatar_id, key
    );
    match operation {
        Operation::Train => scoped,
        Operation::Inference => format!("uploads/{}/{}", operation.as_str(), scoped),
    }
}

// URL references contribute only their last path segment.
fn item_stem(item_id: &str) -> &str {
    let trimmed = item_id.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let last = last.split(['?', '#']).next().unwrap_or(last);
    Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(last)
}

fn sanitize_segment(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SEGMENT_LEN)
        .collect();

    if sanitized.is_empty() {
        "item".to_string()
    } else {
        sanitized
    }
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().trim_start_matches('.');
    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        format!(".{}", ext.to_ascii_lowercase())
    }
}
