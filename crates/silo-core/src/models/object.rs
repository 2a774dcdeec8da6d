use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata describing one stored object.
///
/// Head and Get both read this record, so they always report the same ETag
/// for unchanged content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ObjectMetadata {
    /// Lowercase hex MD5 of the content. Emitted quoted in HTTP headers.
    pub etag: String,
    /// Content length in bytes.
    pub size: u64,
    /// MIME type supplied at write time.
    pub content_type: String,
    /// Time of the last write.
    pub last_modified: DateTime<Utc>,
}

/// One bucket in a tenant's namespace.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BucketSummary {
    pub name: String,
}

/// One object in a listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ObjectSummary {
    /// Slash-delimited object key.
    pub key: String,
    pub etag: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Response for object listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListObjectsResponse {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub objects: Vec<ObjectSummary>,
}

/// Response returned by a successful Put.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PutObjectResponse {
    pub bucket: String,
    pub key: String,
    pub etag: String,
    pub size: u64,
    pub content_type: String,
}

/// Current tenant usage as reported by the storage backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub total_bytes: u64,
    pub object_count: u64,
}
