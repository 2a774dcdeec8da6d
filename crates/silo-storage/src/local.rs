//! Local filesystem storage adapter.
//!
//! Objects are committed with a temp-file + rename sequence (data first, then
//! the metadata sidecar), so a concurrent reader either sees the previous
//! complete version or the new one, never a partial write.

use crate::keys::{is_multipart_artifact, validate_bucket_name, validate_object_key};
use crate::traits::{compute_etag, ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use silo_core::models::ObjectMetadata;
use silo_core::TenantId;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";

/// Filesystem-backed object store.
#[derive(Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    /// Create a new adapter rooted at `base_path` (created if missing).
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::Config(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(LocalStore { base_path })
    }

    fn bucket_dir(&self, tenant: &TenantId, bucket: &str) -> StorageResult<PathBuf> {
        validate_bucket_name(bucket)?;
        Ok(self.base_path.join(tenant.as_str()).join(bucket))
    }

    fn object_path(&self, tenant: &TenantId, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_object_key(key)?;
        Ok(self.bucket_dir(tenant, bucket)?.join(OBJECTS_DIR).join(key))
    }

    fn meta_path(&self, tenant: &TenantId, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_object_key(key)?;
        Ok(self
            .bucket_dir(tenant, bucket)?
            .join(META_DIR)
            .join(format!("{}.json", key)))
    }

    async fn require_bucket(&self, tenant: &TenantId, bucket: &str) -> StorageResult<PathBuf> {
        let dir = self.bucket_dir(tenant, bucket)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        Ok(dir)
    }

    async fn read_meta(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<ObjectMetadata> {
        let path = self.meta_path(tenant, bucket, key)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map_err(|e| StorageError::Backend(format!("Corrupt metadata for {}: {}", key, e)))
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension(format!("tmp.{}", uuid_suffix()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Walk a directory tree collecting relative file paths.
    async fn walk_files(root: &Path) -> StorageResult<Vec<String>> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let ty = entry.file_type().await?;
                if ty.is_dir() {
                    stack.push(path);
                } else if ty.is_file() {
                    if let Ok(rel) = path.strip_prefix(root) {
                        out.push(rel.to_string_lossy().replace('\\', "/"));
                    }
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

fn uuid_suffix() -> String {
    // Nanosecond timestamp is unique enough for temp names within one dir.
    format!("{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

/// Keys `a` and `a/b` land on the same path as file vs directory under
/// `objects/`. Surface that as a key error instead of a backend failure.
fn map_key_collision(err: StorageError, bucket: &str, key: &str) -> StorageError {
    match &err {
        StorageError::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::AlreadyExists
                    | std::io::ErrorKind::NotADirectory
                    | std::io::ErrorKind::IsADirectory
            ) =>
        {
            StorageError::InvalidKey(format!(
                "Key {}/{} collides with an existing object path",
                bucket, key
            ))
        }
        _ => err,
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn create_bucket(&self, tenant: &TenantId, bucket: &str) -> StorageResult<()> {
        let dir = self.bucket_dir(tenant, bucket)?;
        fs::create_dir_all(dir.join(OBJECTS_DIR)).await?;
        fs::create_dir_all(dir.join(META_DIR)).await?;
        tracing::debug!(tenant = %tenant, bucket = %bucket, "Bucket created");
        Ok(())
    }

    async fn delete_bucket(&self, tenant: &TenantId, bucket: &str) -> StorageResult<()> {
        let dir = self.require_bucket(tenant, bucket).await?;
        let meta_files = Self::walk_files(&dir.join(META_DIR)).await?;
        let has_objects = meta_files
            .iter()
            .any(|rel| !is_multipart_artifact(rel.trim_end_matches(".json")));
        if has_objects {
            return Err(StorageError::BucketNotEmpty(bucket.to_string()));
        }
        fs::remove_dir_all(&dir).await?;
        tracing::debug!(tenant = %tenant, bucket = %bucket, "Bucket deleted");
        Ok(())
    }

    async fn bucket_exists(&self, tenant: &TenantId, bucket: &str) -> StorageResult<bool> {
        let dir = self.bucket_dir(tenant, bucket)?;
        Ok(fs::try_exists(&dir).await.unwrap_or(false))
    }

    async fn list_buckets(&self, tenant: &TenantId) -> StorageResult<Vec<String>> {
        let tenant_dir = self.base_path.join(tenant.as_str());
        let mut buckets = Vec::new();
        let mut entries = match fs::read_dir(&tenant_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(buckets),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                buckets.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    async fn put_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<ObjectMetadata> {
        self.require_bucket(tenant, bucket).await?;
        let data_path = self.object_path(tenant, bucket, key)?;
        let meta_path = self.meta_path(tenant, bucket, key)?;

        let metadata = ObjectMetadata {
            etag: compute_etag(&data),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
        };

        let start = std::time::Instant::now();
        Self::write_atomic(&data_path, &data)
            .await
            .map_err(|e| map_key_collision(e, bucket, key))?;
        let meta_json = serde_json::to_vec(&metadata)
            .map_err(|e| StorageError::Backend(format!("Failed to encode metadata: {}", e)))?;
        Self::write_atomic(&meta_path, &meta_json).await?;

        tracing::info!(
            tenant = %tenant,
            bucket = %bucket,
            key = %key,
            size_bytes = metadata.size,
            etag = %metadata.etag,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local store put successful"
        );
        Ok(metadata)
    }

    async fn get_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(Bytes, ObjectMetadata)> {
        self.require_bucket(tenant, bucket).await?;
        let metadata = self.read_meta(tenant, bucket, key).await?;
        let path = self.object_path(tenant, bucket, key)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => return Err(e.into()),
        };
        Ok((Bytes::from(data), metadata))
    }

    async fn get_object_range(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<(Bytes, ObjectMetadata)> {
        self.require_bucket(tenant, bucket).await?;
        let metadata = self.read_meta(tenant, bucket, key).await?;
        if start > end || end >= metadata.size {
            return Err(StorageError::Backend(format!(
                "Range {}-{} outside object of {} bytes",
                start, end, metadata.size
            )));
        }
        let path = self.object_path(tenant, bucket, key)?;
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => return Err(e.into()),
        };
        file.seek(std::io::SeekFrom::Start(start)).await?;
        let len = (end - start + 1) as usize;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok((Bytes::from(buf), metadata))
    }

    async fn head_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<ObjectMetadata> {
        self.require_bucket(tenant, bucket).await?;
        self.read_meta(tenant, bucket, key).await
    }

    async fn delete_object(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
    ) -> StorageResult<()> {
        self.require_bucket(tenant, bucket).await?;
        let meta_path = self.meta_path(tenant, bucket, key)?;
        if !fs::try_exists(&meta_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }
        // Remove metadata first so readers stop observing the object before
        // its bytes disappear.
        fs::remove_file(&meta_path).await?;
        let data_path = self.object_path(tenant, bucket, key)?;
        if let Err(e) = fs::remove_file(&data_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        tracing::info!(tenant = %tenant, bucket = %bucket, key = %key, "Local store delete successful");
        Ok(())
    }

    async fn list_objects(
        &self,
        tenant: &TenantId,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<(String, ObjectMetadata)>> {
        let dir = self.require_bucket(tenant, bucket).await?;
        let meta_files = Self::walk_files(&dir.join(META_DIR)).await?;
        let mut out = Vec::new();
        for rel in meta_files {
            let Some(key) = rel.strip_suffix(".json") else {
                continue;
            };
            if is_multipart_artifact(key) {
                continue;
            }
            if let Some(prefix) = prefix {
                if !key.starts_with(prefix) {
                    continue;
                }
            }
            let metadata = self.read_meta(tenant, bucket, key).await?;
            out.push((key.to_string(), metadata));
        }
        Ok(out)
    }

    async fn usage(&self, tenant: &TenantId) -> StorageResult<(u64, u64)> {
        let mut total_bytes = 0u64;
        let mut object_count = 0u64;
        for bucket in self.list_buckets(tenant).await? {
            for (_, metadata) in self.list_objects(tenant, &bucket, None).await? {
                total_bytes += metadata.size;
                object_count += 1;
            }
        }
        Ok((total_bytes, object_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tenant() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    #[tokio::test]
    async fn test_put_get_head_agree_on_etag() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let tenant = tenant();

        store.create_bucket(&tenant, "photos").await.unwrap();
        let put = store
            .put_object(&tenant, "photos", "a/b.txt", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();

        let (data, got) = store.get_object(&tenant, "photos", "a/b.txt").await.unwrap();
        let head = store.head_object(&tenant, "photos", "a/b.txt").await.unwrap();

        assert_eq!(&data[..], b"hello");
        assert_eq!(put.etag, got.etag);
        assert_eq!(got.etag, head.etag);
        assert_eq!(head.size, 5);
        assert_eq!(head.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_range_read() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let tenant = tenant();

        store.create_bucket(&tenant, "photos").await.unwrap();
        store
            .put_object(
                &tenant,
                "photos",
                "r.bin",
                Bytes::from((0u8..100).collect::<Vec<_>>()),
                "application/octet-stream",
            )
            .await
            .unwrap();

        let (data, _) = store
            .get_object_range(&tenant, "photos", "r.bin", 50, 99)
            .await
            .unwrap();
        assert_eq!(data.len(), 50);
        assert_eq!(data[0], 50);
        assert_eq!(data[49], 99);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let tenant = tenant();
        store.create_bucket(&tenant, "photos").await.unwrap();

        let result = store.get_object(&tenant, "photos", "../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        let result = store.get_object(&tenant, "photos", "/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let tenant = tenant();
        store.create_bucket(&tenant, "photos").await.unwrap();

        let result = store.delete_object(&tenant, "photos", "missing.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        // Idempotence of outcome: second attempt fails the same way.
        let result = store.delete_object(&tenant, "photos", "missing.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bucket_delete_requires_empty() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let tenant = tenant();
        store.create_bucket(&tenant, "photos").await.unwrap();
        store
            .put_object(&tenant, "photos", "x.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();

        let result = store.delete_bucket(&tenant, "photos").await;
        assert!(matches!(result, Err(StorageError::BucketNotEmpty(_))));

        store.delete_object(&tenant, "photos", "x.txt").await.unwrap();
        store.delete_bucket(&tenant, "photos").await.unwrap();
        assert!(!store.bucket_exists(&tenant, "photos").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_excludes_artifacts_and_honors_prefix() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let tenant = tenant();
        store.create_bucket(&tenant, "photos").await.unwrap();

        for key in ["a/1.txt", "a/2.txt", "b/3.txt", ".uploads/u1/part.1"] {
            store
                .put_object(&tenant, "photos", key, Bytes::from_static(b"x"), "text/plain")
                .await
                .unwrap();
        }

        let all = store.list_objects(&tenant, "photos", None).await.unwrap();
        assert_eq!(
            all.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["a/1.txt", "a/2.txt", "b/3.txt"]
        );

        let a_only = store
            .list_objects(&tenant, "photos", Some("a/"))
            .await
            .unwrap();
        assert_eq!(a_only.len(), 2);

        let (bytes, count) = store.usage(&tenant).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(bytes, 3);
    }

    #[tokio::test]
    async fn test_key_prefix_collision_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let tenant = tenant();
        store.create_bucket(&tenant, "photos").await.unwrap();

        store
            .put_object(&tenant, "photos", "a", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        let result = store
            .put_object(&tenant, "photos", "a/b", Bytes::from_static(b"y"), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        // Reverse order: a deeper key first, then its prefix as a flat key.
        store
            .put_object(&tenant, "photos", "c/d", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        let result = store
            .put_object(&tenant, "photos", "c", Bytes::from_static(b"y"), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        // The original objects are untouched.
        let (data, _) = store.get_object(&tenant, "photos", "a").await.unwrap();
        assert_eq!(&data[..], b"x");
        let (data, _) = store.get_object(&tenant, "photos", "c/d").await.unwrap();
        assert_eq!(&data[..], b"x");
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        let t1 = TenantId::parse("one").unwrap();
        let t2 = TenantId::parse("two").unwrap();

        store.create_bucket(&t1, "shared-name").await.unwrap();
        store
            .put_object(&t1, "shared-name", "k", Bytes::from_static(b"secret"), "text/plain")
            .await
            .unwrap();

        assert!(!store.bucket_exists(&t2, "shared-name").await.unwrap());
        let result = store.get_object(&t2, "shared-name", "k").await;
        assert!(matches!(result, Err(StorageError::BucketNotFound(_))));
    }
}
