//! Bucket name and object key validation plus the on-disk layout.
//!
//! Layout used by the filesystem adapter:
//!
//! ```text
//! {root}/{tenant}/{bucket}/objects/{key}      object bytes
//! {root}/{tenant}/{bucket}/meta/{key}.json    ObjectMetadata sidecar
//! ```
//!
//! Head and Get read the same sidecar, which keeps their ETags identical for
//! unchanged content.

use crate::traits::{StorageError, StorageResult};
use silo_core::constants::MULTIPART_ARTIFACT_PREFIX;

pub const MAX_KEY_LEN: usize = 1024;

/// Validate a bucket name: lowercase S3-ish, 3-63 chars, must start with an
/// alphanumeric.
pub fn validate_bucket_name(bucket: &str) -> StorageResult<()> {
    let len = bucket.len();
    if !(3..=63).contains(&len) {
        return Err(StorageError::InvalidKey(format!(
            "Bucket name must be 3-63 characters: {}",
            bucket
        )));
    }
    let mut chars = bucket.chars();
    let first = chars.next().unwrap_or(' ');
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return Err(StorageError::InvalidKey(format!(
            "Bucket name must start with a lowercase letter or digit: {}",
            bucket
        )));
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.'))
    {
        return Err(StorageError::InvalidKey(format!(
            "Bucket name contains invalid characters: {}",
            bucket
        )));
    }
    Ok(())
}

/// Validate a percent-decoded object key: slash-delimited path, no traversal.
pub fn validate_object_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Object key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey(format!(
            "Object key exceeds {} bytes",
            MAX_KEY_LEN
        )));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Object key must not start with '/'".to_string(),
        ));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::InvalidKey(
            "Object key contains empty or traversal segments".to_string(),
        ));
    }
    if key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Object key contains NUL".to_string(),
        ));
    }
    Ok(())
}

/// True for multipart part artifacts, which are hidden from listings, usage
/// accounting, and quota evaluation.
pub fn is_multipart_artifact(key: &str) -> bool {
    key.starts_with(MULTIPART_ARTIFACT_PREFIX)
}
