use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request to issue a presigned capability URL for an object operation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PresignRequest {
    /// HTTP method the capability grants (GET, HEAD, PUT, DELETE).
    #[validate(length(min = 3, max = 6, message = "Method must be GET, HEAD, PUT or DELETE"))]
    pub method: String,
    #[validate(length(min = 3, max = 63, message = "Bucket name must be 3-63 characters"))]
    pub bucket: String,
    #[validate(length(min = 1, max = 1024, message = "Key must be 1-1024 characters"))]
    pub key: String,
    /// Requested lifetime in seconds; clamped to the configured maximum.
    #[serde(default)]
    pub expiry_seconds: Option<u64>,
    /// Upper bound on the request body for PUT capabilities.
    #[serde(default)]
    pub max_bytes: Option<u64>,
    /// Content type the capability is restricted to, if any.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Request to issue a presigned capability URL for a transform operation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TransformPresignRequest {
    #[validate(length(min = 3, max = 63, message = "Bucket name must be 3-63 characters"))]
    pub bucket: String,
    #[validate(length(min = 1, max = 1024, message = "Key must be 1-1024 characters"))]
    pub key: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Output format (jpeg, png, webp). Defaults to jpeg when omitted.
    #[serde(default)]
    pub format: Option<String>,
    /// Output quality 1-100.
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub expiry_seconds: Option<u64>,
}

/// Issued capability URL.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PresignResponse {
    /// Relative URL carrying `exp`, `sig` and any declared constraints.
    pub url: String,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
}
