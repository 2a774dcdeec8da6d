//! Multipart upload orchestration.
//!
//! State machine: `Initiated → Uploading → {Completed | Aborted}`. Session
//! state lives in-process; part payloads live in the backend under
//! `{bucket}/.uploads/{upload_id}/part.{n}`, a prefix hidden from listings,
//! usage accounting, and quota evaluation. Parts for one upload may arrive
//! concurrently and in any order; the caller-specified order at completion is
//! the merge order.

use crate::error::storage_error_to_app;
use crate::services::quota::QuotaService;
use bytes::{Bytes, BytesMut};
use silo_core::constants::{MULTIPART_ARTIFACT_PREFIX, MULTIPART_MAX_PART_NUMBER};
use silo_core::models::{
    CompleteMultipartResponse, PartInfo, PartListResponse, UploadStatus,
};
use silo_core::{AppError, Config, TenantId};
use silo_storage::ObjectStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

struct UploadState {
    tenant: TenantId,
    bucket: String,
    key: String,
    content_type: String,
    status: UploadStatus,
    parts: BTreeMap<u32, PartInfo>,
}

impl UploadState {
    fn is_active(&self) -> bool {
        matches!(self.status, UploadStatus::Initiated | UploadStatus::Uploading)
    }
}

#[derive(Clone)]
pub struct MultipartUploadManager {
    uploads: Arc<tokio::sync::Mutex<HashMap<Uuid, UploadState>>>,
    store: Arc<dyn ObjectStore>,
    quota: QuotaService,
    config: Config,
}

fn part_artifact_key(upload_id: Uuid, part_number: u32) -> String {
    format!("{}{}/part.{}", MULTIPART_ARTIFACT_PREFIX, upload_id, part_number)
}

impl MultipartUploadManager {
    pub fn new(store: Arc<dyn ObjectStore>, quota: QuotaService, config: Config) -> Self {
        MultipartUploadManager {
            uploads: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            store,
            quota,
            config,
        }
    }

    /// Start an upload session for `bucket`/`key`. The bucket must exist.
    pub async fn initiate(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<Uuid, AppError> {
        if !self
            .store
            .bucket_exists(tenant, bucket)
            .await
            .map_err(storage_error_to_app)?
        {
            return Err(AppError::NotFound(format!("Bucket not found: {}", bucket)));
        }

        let upload_id = Uuid::new_v4();
        let mut uploads = self.uploads.lock().await;
        uploads.insert(
            upload_id,
            UploadState {
                tenant: tenant.clone(),
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                status: UploadStatus::Initiated,
                parts: BTreeMap::new(),
            },
        );
        tracing::info!(tenant_id = %tenant, bucket, key, upload_id = %upload_id, "Multipart upload initiated");
        Ok(upload_id)
    }

    /// Store one part. Idempotent per part number; re-uploading a number
    /// overwrites the previous payload.
    pub async fn upload_part(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        upload_id: Uuid,
        part_number: u32,
        data: Bytes,
    ) -> Result<PartInfo, AppError> {
        if part_number == 0 || part_number > MULTIPART_MAX_PART_NUMBER {
            return Err(AppError::InvalidInput(format!(
                "Part number must be 1-{}",
                MULTIPART_MAX_PART_NUMBER
            )));
        }
        let max_part = self.config.multipart_max_part_size_bytes;
        if max_part != 0 && data.len() as u64 > max_part {
            return Err(AppError::PayloadTooLarge(format!(
                "Part exceeds configured maximum of {} bytes",
                max_part
            )));
        }

        {
            let uploads = self.uploads.lock().await;
            require_active(&uploads, upload_id, tenant, bucket, key)?;
        }

        // Lock released while the part streams to the backend so sibling
        // parts can upload concurrently.
        let artifact_key = part_artifact_key(upload_id, part_number);
        let metadata = self
            .store
            .put_object(tenant, bucket, &artifact_key, data, "application/octet-stream")
            .await
            .map_err(storage_error_to_app)?;

        let part = PartInfo {
            part_number,
            etag: metadata.etag,
            size: metadata.size,
        };

        let mut uploads = self.uploads.lock().await;
        match uploads.get_mut(&upload_id) {
            Some(upload) if upload.is_active() => {
                upload.status = UploadStatus::Uploading;
                upload.parts.insert(part_number, part.clone());
                Ok(part)
            }
            // Aborted while the part was in flight; drop the orphan artifact.
            _ => {
                drop(uploads);
                if let Err(err) = self.store.delete_object(tenant, bucket, &artifact_key).await {
                    tracing::warn!(error = %err, upload_id = %upload_id, "Failed to clean up orphaned part");
                }
                Err(unknown_upload(upload_id))
            }
        }
    }

    /// Parts recorded so far, sorted by part number. Empty after an abort.
    pub async fn get_parts(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        upload_id: Uuid,
    ) -> Result<PartListResponse, AppError> {
        let uploads = self.uploads.lock().await;
        let upload = find_upload(&uploads, upload_id, tenant, bucket, key)?;
        Ok(PartListResponse {
            upload_id,
            status: upload.status,
            parts: upload.parts.values().cloned().collect(),
        })
    }

    /// Merge parts in the caller-specified order into the final object.
    ///
    /// Rejects duplicate part numbers, missing referenced parts, and
    /// undersized parts (all but the last listed) before any backend merge
    /// traffic, then checks quota on the aggregate.
    pub async fn complete(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        upload_id: Uuid,
        ordered_parts: &[u32],
    ) -> Result<CompleteMultipartResponse, AppError> {
        let (content_type, listed): (String, Vec<PartInfo>) = {
            let uploads = self.uploads.lock().await;
            let upload = require_active(&uploads, upload_id, tenant, bucket, key)?;

            if ordered_parts.is_empty() {
                return Err(AppError::InvalidInput(
                    "Completion requires at least one part".to_string(),
                ));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = ordered_parts.iter().find(|n| !seen.insert(**n)) {
                return Err(AppError::InvalidInput(format!(
                    "Duplicate part number: {}",
                    dup
                )));
            }
            let mut listed = Vec::with_capacity(ordered_parts.len());
            for number in ordered_parts {
                match upload.parts.get(number) {
                    Some(part) => listed.push(part.clone()),
                    None => {
                        return Err(AppError::InvalidInput(format!(
                            "Part {} was never uploaded",
                            number
                        )))
                    }
                }
            }
            let min_part = self.config.multipart_min_part_size_bytes;
            for part in &listed[..listed.len() - 1] {
                if part.size < min_part {
                    return Err(AppError::InvalidInput(format!(
                        "Part {} is {} bytes, below the {} byte minimum",
                        part.part_number, part.size, min_part
                    )));
                }
            }
            let max_part = self.config.multipart_max_part_size_bytes;
            if max_part != 0 {
                if let Some(part) = listed.iter().find(|p| p.size > max_part) {
                    return Err(AppError::PayloadTooLarge(format!(
                        "Part {} exceeds configured maximum of {} bytes",
                        part.part_number, max_part
                    )));
                }
            }
            (upload.content_type.clone(), listed)
        };

        let total_size: u64 = listed.iter().map(|p| p.size).sum();
        self.quota.ensure_within(tenant, total_size, 1).await?;

        let mut merged = BytesMut::with_capacity(total_size as usize);
        for part in &listed {
            let artifact_key = part_artifact_key(upload_id, part.part_number);
            let (data, _) = self
                .store
                .get_object(tenant, bucket, &artifact_key)
                .await
                .map_err(storage_error_to_app)?;
            merged.extend_from_slice(&data);
        }

        let metadata = self
            .store
            .put_object(tenant, bucket, key, merged.freeze(), &content_type)
            .await
            .map_err(storage_error_to_app)?;

        self.delete_artifacts(tenant, bucket, upload_id, &listed).await;

        let mut uploads = self.uploads.lock().await;
        if let Some(upload) = uploads.get_mut(&upload_id) {
            upload.status = UploadStatus::Completed;
            upload.parts.clear();
        }
        tracing::info!(
            tenant_id = %tenant,
            bucket,
            key,
            upload_id = %upload_id,
            size = metadata.size,
            etag = %metadata.etag,
            "Multipart upload completed"
        );

        Ok(CompleteMultipartResponse {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: metadata.etag,
            size: metadata.size,
        })
    }

    /// Abort an upload and delete its part artifacts. Idempotent: aborting an
    /// already-aborted upload succeeds.
    pub async fn abort(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        upload_id: Uuid,
    ) -> Result<(), AppError> {
        let parts: Vec<PartInfo> = {
            let mut uploads = self.uploads.lock().await;
            let upload = find_upload_mut(&mut uploads, upload_id, tenant, bucket, key)?;
            match upload.status {
                UploadStatus::Aborted => return Ok(()),
                UploadStatus::Completed => return Err(unknown_upload(upload_id)),
                _ => {}
            }
            upload.status = UploadStatus::Aborted;
            let parts = upload.parts.values().cloned().collect();
            upload.parts.clear();
            parts
        };

        self.delete_artifacts(tenant, bucket, upload_id, &parts).await;
        tracing::info!(tenant_id = %tenant, bucket, key, upload_id = %upload_id, "Multipart upload aborted");
        Ok(())
    }

    async fn delete_artifacts(
        &self,
        tenant: &TenantId,
        bucket: &str,
        upload_id: Uuid,
        parts: &[PartInfo],
    ) {
        for part in parts {
            let artifact_key = part_artifact_key(upload_id, part.part_number);
            if let Err(err) = self.store.delete_object(tenant, bucket, &artifact_key).await {
                tracing::warn!(
                    error = %err,
                    upload_id = %upload_id,
                    part_number = part.part_number,
                    "Failed to delete part artifact"
                );
            }
        }
    }
}

fn unknown_upload(upload_id: Uuid) -> AppError {
    AppError::NotFound(format!("Upload not found: {}", upload_id))
}

fn find_upload<'a>(
    uploads: &'a HashMap<Uuid, UploadState>,
    upload_id: Uuid,
    tenant: &TenantId,
    bucket: &str,
    key: &str,
) -> Result<&'a UploadState, AppError> {
    uploads
        .get(&upload_id)
        .filter(|u| u.tenant == *tenant && u.bucket == bucket && u.key == key)
        .ok_or_else(|| unknown_upload(upload_id))
}

fn find_upload_mut<'a>(
    uploads: &'a mut HashMap<Uuid, UploadState>,
    upload_id: Uuid,
    tenant: &TenantId,
    bucket: &str,
    key: &str,
) -> Result<&'a mut UploadState, AppError> {
    uploads
        .get_mut(&upload_id)
        .filter(|u| u.tenant == *tenant && u.bucket == bucket && u.key == key)
        .ok_or_else(|| unknown_upload(upload_id))
}

fn require_active<'a>(
    uploads: &'a HashMap<Uuid, UploadState>,
    upload_id: Uuid,
    tenant: &TenantId,
    bucket: &str,
    key: &str,
) -> Result<&'a UploadState, AppError> {
    let upload = find_upload(uploads, upload_id, tenant, bucket, key)?;
    if !upload.is_active() {
        return Err(unknown_upload(upload_id));
    }
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::ErrorMetadata;
    use silo_storage::MemoryStore;

    fn tenant() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    async fn manager(min_part_size: u64) -> (MultipartUploadManager, Arc<dyn ObjectStore>) {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        store.create_bucket(&tenant(), "photos").await.unwrap();
        let mut config = Config::for_tests();
        config.multipart_min_part_size_bytes = min_part_size;
        let quota = QuotaService::new(store.clone(), config.clone());
        (
            MultipartUploadManager::new(store.clone(), quota, config),
            store,
        )
    }

    #[tokio::test]
    async fn test_out_of_order_upload_merges_in_listed_order() {
        let (manager, store) = manager(2).await;
        let id = manager
            .initiate(&tenant(), "photos", "big.bin", "application/octet-stream")
            .await
            .unwrap();

        for n in [3u32, 1, 2] {
            let payload = Bytes::from(vec![n as u8; 4]);
            manager
                .upload_part(&tenant(), "photos", "big.bin", id, n, payload)
                .await
                .unwrap();
        }

        let result = manager
            .complete(&tenant(), "photos", "big.bin", id, &[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(result.size, 12);

        let (data, metadata) = store.get_object(&tenant(), "photos", "big.bin").await.unwrap();
        assert_eq!(&data[..], &[1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
        assert_eq!(metadata.etag, result.etag);

        // Artifacts are gone and never counted.
        let (total, count) = store.usage(&tenant()).await.unwrap();
        assert_eq!((total, count), (12, 1));
    }

    #[tokio::test]
    async fn test_duplicate_part_numbers_rejected_before_merge() {
        let (manager, store) = manager(2).await;
        let id = manager
            .initiate(&tenant(), "photos", "dup.bin", "application/octet-stream")
            .await
            .unwrap();
        for n in [1u32, 2] {
            manager
                .upload_part(&tenant(), "photos", "dup.bin", id, n, Bytes::from_static(b"data"))
                .await
                .unwrap();
        }

        let err = manager
            .complete(&tenant(), "photos", "dup.bin", id, &[1, 1, 2])
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        // No merged object was written.
        assert!(store.head_object(&tenant(), "photos", "dup.bin").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_referenced_part_rejected() {
        let (manager, _) = manager(2).await;
        let id = manager
            .initiate(&tenant(), "photos", "m.bin", "application/octet-stream")
            .await
            .unwrap();
        manager
            .upload_part(&tenant(), "photos", "m.bin", id, 1, Bytes::from_static(b"data"))
            .await
            .unwrap();

        let err = manager
            .complete(&tenant(), "photos", "m.bin", id, &[1, 5])
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[tokio::test]
    async fn test_min_part_size_exempts_last_listed_part() {
        let (manager, _) = manager(4).await;
        let id = manager
            .initiate(&tenant(), "photos", "s.bin", "application/octet-stream")
            .await
            .unwrap();
        manager
            .upload_part(&tenant(), "photos", "s.bin", id, 1, Bytes::from_static(b"xy"))
            .await
            .unwrap();
        manager
            .upload_part(&tenant(), "photos", "s.bin", id, 2, Bytes::from_static(b"full"))
            .await
            .unwrap();

        // Part 1 is undersized and not last.
        let err = manager
            .complete(&tenant(), "photos", "s.bin", id, &[1, 2])
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);

        // Reversed order puts the undersized part last, which is allowed.
        assert!(manager
            .complete(&tenant(), "photos", "s.bin", id, &[2, 1])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_abort_is_idempotent_and_clears_parts() {
        let (manager, store) = manager(2).await;
        let id = manager
            .initiate(&tenant(), "photos", "a.bin", "application/octet-stream")
            .await
            .unwrap();
        manager
            .upload_part(&tenant(), "photos", "a.bin", id, 1, Bytes::from_static(b"data"))
            .await
            .unwrap();

        manager.abort(&tenant(), "photos", "a.bin", id).await.unwrap();
        manager.abort(&tenant(), "photos", "a.bin", id).await.unwrap();

        let parts = manager
            .get_parts(&tenant(), "photos", "a.bin", id)
            .await
            .unwrap();
        assert_eq!(parts.status, UploadStatus::Aborted);
        assert!(parts.parts.is_empty());

        // No retrievable object, no further part traffic.
        assert!(store.head_object(&tenant(), "photos", "a.bin").await.is_err());
        let err = manager
            .upload_part(&tenant(), "photos", "a.bin", id, 2, Bytes::from_static(b"data"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_unknown_upload_and_tenant_mismatch() {
        let (manager, _) = manager(2).await;
        let err = manager
            .get_parts(&tenant(), "photos", "x.bin", Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 404);

        let id = manager
            .initiate(&tenant(), "photos", "x.bin", "application/octet-stream")
            .await
            .unwrap();
        let rival = TenantId::parse("rival").unwrap();
        let err = manager
            .get_parts(&rival, "photos", "x.bin", id)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 404);
    }
}
