use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a multipart upload.
///
/// `Initiated → Uploading → {Completed | Aborted}`. Completed and aborted
/// uploads reject further part traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Initiated,
    Uploading,
    Completed,
    Aborted,
}

/// One uploaded part as recorded by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PartInfo {
    /// 1-based part number.
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
}

/// Response for initiating a multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitiateMultipartResponse {
    pub upload_id: Uuid,
    pub bucket: String,
    pub key: String,
}

/// Parts recorded so far for an upload, sorted by part number.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartListResponse {
    pub upload_id: Uuid,
    pub status: UploadStatus,
    pub parts: Vec<PartInfo>,
}

/// Request body for completing a multipart upload.
///
/// `parts` lists part numbers in the order they should be concatenated; it
/// need not match the order parts were physically uploaded in.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CompleteMultipartRequest {
    pub parts: Vec<u32>,
}

/// Response for a completed multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompleteMultipartResponse {
    pub bucket: String,
    pub key: String,
    /// ETag of the merged object.
    pub etag: String,
    pub size: u64,
}
