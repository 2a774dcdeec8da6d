//! Error types module
//!
//! This module provides the core error types used throughout Silo. All errors
//! are unified under the `AppError` enum, which maps each failure class to a
//! stable HTTP status and machine-readable code via `ErrorMetadata`.

use crate::models::quota::QuotaEvaluation;
use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
/// This trait allows errors to self-describe their HTTP response characteristics.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "QUOTA_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Content-Length required")]
    LengthRequired,

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Quota exceeded: {}", .0.reason.as_deref().unwrap_or("limit reached"))]
    QuotaExceeded(Box<QuotaEvaluation>),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    #[error("Transform timed out")]
    TransformTimeout,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

// Error conversion implementations

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// Reduces duplication in the ErrorMetadata impl; client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidInput(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "AUTH_ERROR",
            false,
            Some("Supply a valid signature or bearer scope and tenant header"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Request a token with the required scope"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the bucket, key, or upload id exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            false,
            Some("Resolve the conflicting state and retry"),
            false,
            LogLevel::Debug,
        ),
        AppError::LengthRequired => (
            411,
            "LENGTH_REQUIRED",
            false,
            Some("Send a Content-Length header"),
            false,
            LogLevel::Debug,
        ),
        AppError::PreconditionFailed(_) => (
            412,
            "PRECONDITION_FAILED",
            false,
            Some("Refresh the ETag and retry"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce the payload size"),
            false,
            LogLevel::Debug,
        ),
        AppError::QuotaExceeded(_) => (
            413,
            "QUOTA_EXCEEDED",
            false,
            Some("Free space or raise the tenant quota"),
            false,
            LogLevel::Warn,
        ),
        AppError::UnsupportedMediaType(_) => (
            415,
            "UNSUPPORTED_MEDIA_TYPE",
            false,
            Some("Check the content type or image format"),
            false,
            LogLevel::Debug,
        ),
        AppError::RangeNotSatisfiable(_) => (
            416,
            "RANGE_NOT_SATISFIABLE",
            false,
            Some("Check the Range header against the object size"),
            false,
            LogLevel::Debug,
        ),
        AppError::TransformTimeout => (
            504,
            "TRANSFORM_TIMEOUT",
            true,
            Some("Retry with smaller dimensions"),
            false,
            LogLevel::Warn,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::LengthRequired => "LengthRequired",
            AppError::PreconditionFailed(_) => "PreconditionFailed",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::QuotaExceeded(_) => "QuotaExceeded",
            AppError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            AppError::RangeNotSatisfiable(_) => "RangeNotSatisfiable",
            AppError::TransformTimeout => "TransformTimeout",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Quota counters carried by a QuotaExceeded error, if any.
    pub fn quota_evaluation(&self) -> Option<&QuotaEvaluation> {
        match self {
            AppError::QuotaExceeded(eval) => Some(eval),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quota::{QuotaEvaluation, QuotaLimits};

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("Bucket not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_quota_exceeded() {
        let limits = QuotaLimits {
            max_total_bytes: 1000,
            max_object_count: 0,
            max_object_size_bytes: 0,
        };
        let mut eval = QuotaEvaluation::ok(limits, 900, 3, 150);
        eval.exceeded = true;
        eval.reason = Some("total bytes limit exceeded".to_string());
        let err = AppError::QuotaExceeded(Box::new(eval));
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "QUOTA_EXCEEDED");
        assert_eq!(err.log_level(), LogLevel::Warn);
        let eval = err.quota_evaluation().expect("carries evaluation");
        assert_eq!(eval.current_total_bytes, 900);
        assert_eq!(eval.incoming_bytes, 150);
    }

    #[test]
    fn test_error_metadata_storage_is_sensitive() {
        let err = AppError::Storage("disk failure".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to access storage");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_status_table_matches_contract() {
        assert_eq!(AppError::LengthRequired.http_status_code(), 411);
        assert_eq!(
            AppError::PreconditionFailed("etag".into()).http_status_code(),
            412
        );
        assert_eq!(
            AppError::RangeNotSatisfiable("bytes=x-".into()).http_status_code(),
            416
        );
        assert_eq!(
            AppError::UnsupportedMediaType("decode".into()).http_status_code(),
            415
        );
        assert_eq!(AppError::TransformTimeout.http_status_code(), 504);
        assert_eq!(AppError::Conflict("not empty".into()).http_status_code(), 409);
    }
}
