//! In-memory storage adapter.
//!
//! Backs the test suite and ephemeral deployments. Behavior mirrors
//! `LocalStore`, including artifact filtering and tenant isolation.

use crate::keys::{is_multipart_artifact, validate_bucket_name, validate_object_key};
use crate::traits::{compute_etag, ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use silo_core::models::ObjectMetadata;
use silo_core::TenantId;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

type BucketMap = BTreeMap<String, ObjectRecord>;

#[derive(Clone)]
struct ObjectRecord {
    data: Bytes,
    metadata: ObjectMetadata,
}

/// Object store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    // tenant -> bucket -> key -> record
    inner: Mutex<HashMap<String, BTreeMap<String, BucketMap>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create_bucket(&self, tenant: &TenantId, bucket: &str) -> StorageResult<()> {
        validate_bucket_name(bucket)?;
        let mut inner = self.inner.lock().await;
        inner
            .entry(tenant.as_str().to_string())
            .or_default()
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_bucket(&self, tenant: &TenantId, bucket: &str) -> StorageResult<()> {
        validate_bucket_name(bucket)?;
        let mut inner = self.inner.lock().await;
        let buckets = inner
            .get_mut(tenant.as_str())
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        if objects.keys().any(|k| !is_multipart_artifact(k)) {
            return Err(StorageError::BucketNotEmpty(bucket.to_string()));
        }
        buckets.remove(bucket);
        Ok(())
    }

    async fn bucket_exists(&self, tenant: &TenantId, bucket: &str) -> StorageResult<bool> {
        validate_bucket_name(bucket)?;
        let inner = self.inner.lock().await;
        Ok(inner
            .get(tenant.as_str())
            .is_some_and(|buckets| buckets.contains_key(bucket)))
    }

    async fn list_buckets(&self, tenant: &TenantId) -> StorageResult<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .get(tenant.as_str())
            .map(|buckets| buckets.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn put_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<ObjectMetadata> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        let mut inner = self.inner.lock().await;
        let objects = inner
            .get_mut(tenant.as_str())
            .and_then(|buckets| buckets.get_mut(bucket))
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        let metadata = ObjectMetadata {
            etag: compute_etag(&data),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
        };
        objects.insert(
            key.to_string(),
            ObjectRecord {
                data,
                metadata: metadata.clone(),
            },
        );
        Ok(metadata)
    }

    async fn get_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(Bytes, ObjectMetadata)> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        let inner = self.inner.lock().await;
        let objects = inner
            .get(tenant.as_str())
            .and_then(|buckets| buckets.get(bucket))
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        let record = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;
        Ok((record.data.clone(), record.metadata.clone()))
    }

    async fn get_object_range(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<(Bytes, ObjectMetadata)> {
        let (data, metadata) = self.get_object(tenant, bucket, key).await?;
        if start > end || end >= metadata.size {
            return Err(StorageError::Backend(format!(
                "Range {}-{} outside object of {} bytes",
                start, end, metadata.size
            )));
        }
        let slice = data.slice(start as usize..=end as usize);
        Ok((slice, metadata))
    }

    async fn head_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<ObjectMetadata> {
        let (_, metadata) = self.get_object(tenant, bucket, key).await?;
        Ok(metadata)
    }

    async fn delete_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<()> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        let mut inner = self.inner.lock().await;
        let objects = inner
            .get_mut(tenant.as_str())
            .and_then(|buckets| buckets.get_mut(bucket))
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn list_objects(
        &self,
        tenant: &TenantId,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<(String, ObjectMetadata)>> {
        validate_bucket_name(bucket)?;
        let inner = self.inner.lock().await;
        let objects = inner
            .get(tenant.as_str())
            .and_then(|buckets| buckets.get(bucket))
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        Ok(objects
            .iter()
            .filter(|(key, _)| !is_multipart_artifact(key))
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, record)| (key.clone(), record.metadata.clone()))
            .collect())
    }

    async fn usage(&self, tenant: &TenantId) -> StorageResult<(u64, u64)> {
        let inner = self.inner.lock().await;
        let Some(buckets) = inner.get(tenant.as_str()) else {
            return Ok((0, 0));
        };
        let mut total_bytes = 0u64;
        let mut object_count = 0u64;
        for objects in buckets.values() {
            for (key, record) in objects {
                if is_multipart_artifact(key) {
                    continue;
                }
                total_bytes += record.metadata.size;
                object_count += 1;
            }
        }
        Ok((total_bytes, object_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryStore::new();
        let tenant = TenantId::parse("acme").unwrap();
        store.create_bucket(&tenant, "docs").await.unwrap();

        let put = store
            .put_object(&tenant, "docs", "k.txt", Bytes::from_static(b"bytes"), "text/plain")
            .await
            .unwrap();
        let (data, meta) = store.get_object(&tenant, "docs", "k.txt").await.unwrap();
        assert_eq!(&data[..], b"bytes");
        assert_eq!(put.etag, meta.etag);
    }

    #[tokio::test]
    async fn test_put_to_unknown_bucket_fails() {
        let store = MemoryStore::new();
        let tenant = TenantId::parse("acme").unwrap();
        let result = store
            .put_object(&tenant, "nope", "k", Bytes::new(), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::BucketNotFound(_))));
    }

    #[tokio::test]
    async fn test_usage_skips_artifacts() {
        let store = MemoryStore::new();
        let tenant = TenantId::parse("acme").unwrap();
        store.create_bucket(&tenant, "docs").await.unwrap();
        store
            .put_object(&tenant, "docs", "real", Bytes::from_static(b"1234"), "text/plain")
            .await
            .unwrap();
        store
            .put_object(
                &tenant,
                "docs",
                ".uploads/u/part.1",
                Bytes::from_static(b"xxxxxxxx"),
                "application/octet-stream",
            )
            .await
            .unwrap();

        let (bytes, count) = store.usage(&tenant).await.unwrap();
        assert_eq!((bytes, count), (4, 1));
    }
}
