//! Storage abstraction trait
//!
//! This module defines the `ObjectStore` trait that all storage backends must
//! implement. The request orchestration layer only ever talks to
//! `Arc<dyn ObjectStore>`, so adapters are swappable without touching engine
//! logic.

use async_trait::async_trait;
use bytes::Bytes;
use md5::{Digest, Md5};
use silo_core::models::ObjectMetadata;
use silo_core::TenantId;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Bucket not empty: {0}")]
    BucketNotEmpty(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Content identity token: lowercase hex MD5, S3-compatible.
pub fn compute_etag(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Storage abstraction trait
///
/// All backends must scope every operation to the given tenant. Object keys
/// passed here are already percent-decoded and validated by the caller;
/// adapters still re-check for path traversal as defense at the boundary.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket. Idempotent: creating an existing bucket succeeds.
    async fn create_bucket(&self, tenant: &TenantId, bucket: &str) -> StorageResult<()>;

    /// Delete an empty bucket. Fails with `BucketNotEmpty` if objects remain.
    async fn delete_bucket(&self, tenant: &TenantId, bucket: &str) -> StorageResult<()>;

    async fn bucket_exists(&self, tenant: &TenantId, bucket: &str) -> StorageResult<bool>;

    /// List bucket names for a tenant, sorted.
    async fn list_buckets(&self, tenant: &TenantId) -> StorageResult<Vec<String>>;

    /// Write an object. The previous version, if any, stays visible to
    /// readers until the new one is fully committed.
    async fn put_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<ObjectMetadata>;

    /// Read a whole object with its metadata.
    async fn get_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(Bytes, ObjectMetadata)>;

    /// Read an inclusive byte range `[start, end]` of an object. The caller
    /// is responsible for clamping `end` to the object length.
    async fn get_object_range(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<(Bytes, ObjectMetadata)>;

    /// Metadata only. Reports the same ETag as `get_object` for unchanged
    /// content.
    async fn head_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<ObjectMetadata>;

    /// Delete an object. `NotFound` if it does not exist.
    async fn delete_object(&self, tenant: &TenantId, bucket: &str, key: &str)
        -> StorageResult<()>;

    /// List objects in a bucket, optionally filtered by key prefix, sorted by
    /// key. Multipart part artifacts are excluded.
    async fn list_objects(
        &self,
        tenant: &TenantId,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<(String, ObjectMetadata)>>;

    /// Current usage for a tenant: (total bytes, object count), excluding
    /// multipart part artifacts.
    async fn usage(&self, tenant: &TenantId) -> StorageResult<(u64, u64)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_etag_is_md5_hex() {
        // RFC 1321 test vector
        assert_eq!(compute_etag(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(compute_etag(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }
}
