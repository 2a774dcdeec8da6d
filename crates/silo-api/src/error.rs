//! HTTP error response conversion
//!
//! **Preferred handler pattern:** Return `Result<impl IntoResponse, HttpAppError>`.
//! Use `AppError` (or types that implement `Into<AppError>`) for errors and
//! `.map_err(Into::into)` so they become `HttpAppError` and render consistently
//! (status, body, logging).

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use silo_core::{AppError, ErrorMetadata, LogLevel};
use silo_processing::TransformError;
use silo_storage::StorageError;
use utoipa::ToSchema;

/// Quota counters attached to 413 quota rejections, camelCase on the wire.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaErrorExtensions {
    pub max_total_bytes: u64,
    pub max_object_size_bytes: u64,
    pub max_object_count: u64,
    pub current_total_bytes: u64,
    pub current_object_count: u64,
    pub incoming_bytes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Correlation id for 5xx responses, also emitted in the server log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub quota: Option<QuotaErrorExtensions>,
}

/// Wrapper type for AppError to implement IntoResponse.
/// Necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from silo-core).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Map storage backend failures onto the engine's error table.
pub fn storage_error_to_app(err: StorageError) -> AppError {
    match err {
        StorageError::BucketNotFound(name) => {
            AppError::NotFound(format!("Bucket not found: {}", name))
        }
        StorageError::BucketNotEmpty(name) => {
            AppError::Conflict(format!("Bucket not empty: {}", name))
        }
        StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
        StorageError::InvalidKey(message) => AppError::InvalidInput(message),
        StorageError::Backend(message) => AppError::Storage(message),
        StorageError::Io(err) => AppError::Storage(err.to_string()),
        StorageError::Config(message) => AppError::Internal(message),
    }
}

/// Map transform pipeline failures onto the engine's error table.
pub fn transform_error_to_app(err: TransformError) -> AppError {
    match err {
        TransformError::Decode(message) => {
            AppError::UnsupportedMediaType(format!("Failed to decode source image: {}", message))
        }
        TransformError::Encode(message) => {
            AppError::UnsupportedMediaType(format!("Failed to encode output image: {}", message))
        }
        TransformError::SourceTooLarge { pixels, max } => AppError::InvalidInput(format!(
            "Source image has {} pixels, limit is {}",
            pixels, max
        )),
        TransformError::Timeout => AppError::TransformTimeout,
        TransformError::Worker(message) => AppError::Internal(message),
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_error_to_app(err))
    }
}

impl From<TransformError> for HttpAppError {
    fn from(err: TransformError) -> Self {
        HttpAppError(transform_error_to_app(err))
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(err: validator::ValidationErrors) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on
/// deserialization failure, instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError, correlation_id: Option<&str>) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error.detailed_message(),
                error_type = error_type,
                correlation_id = correlation_id.unwrap_or("-"),
                "Error occurred"
            );
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let is_production = is_production_env();

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let correlation_id = if status.is_server_error() {
            Some(uuid::Uuid::new_v4().to_string())
        } else {
            None
        };

        log_error(app_error, correlation_id.as_deref());

        let details = if app_error.is_sensitive() && is_production {
            None
        } else {
            Some(app_error.detailed_message())
        };

        let quota = app_error.quota_evaluation().map(|eval| QuotaErrorExtensions {
            max_total_bytes: eval.max_total_bytes,
            max_object_size_bytes: eval.max_object_size_bytes,
            max_object_count: eval.max_object_count,
            current_total_bytes: eval.current_total_bytes,
            current_object_count: eval.current_object_count,
            incoming_bytes: eval.incoming_bytes,
        });

        let body = ErrorResponse {
            error: app_error.client_message(),
            details,
            error_type: Some(app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(str::to_string),
            correlation_id,
            quota,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::models::{QuotaEvaluation, QuotaLimits};

    #[test]
    fn test_storage_error_mapping() {
        assert_eq!(
            storage_error_to_app(StorageError::BucketNotFound("b".into())).http_status_code(),
            404
        );
        assert_eq!(
            storage_error_to_app(StorageError::BucketNotEmpty("b".into())).http_status_code(),
            409
        );
        assert_eq!(
            storage_error_to_app(StorageError::InvalidKey("k".into())).http_status_code(),
            400
        );
        assert_eq!(
            storage_error_to_app(StorageError::Backend("down".into())).http_status_code(),
            500
        );
    }

    #[test]
    fn test_transform_error_mapping() {
        assert_eq!(
            transform_error_to_app(TransformError::Decode("bad".into())).http_status_code(),
            415
        );
        assert_eq!(
            transform_error_to_app(TransformError::Timeout).http_status_code(),
            504
        );
        assert_eq!(
            transform_error_to_app(TransformError::SourceTooLarge { pixels: 10, max: 5 })
                .http_status_code(),
            400
        );
    }

    #[test]
    fn test_quota_extensions_serialize_camel_case() {
        let limits = QuotaLimits {
            max_total_bytes: 1000,
            max_object_count: 0,
            max_object_size_bytes: 0,
        };
        let mut eval = QuotaEvaluation::ok(limits, 900, 3, 150);
        eval.exceeded = true;
        eval.reason = Some("total bytes limit exceeded".to_string());
        let err = AppError::QuotaExceeded(Box::new(eval));

        let quota = err.quota_evaluation().map(|e| QuotaErrorExtensions {
            max_total_bytes: e.max_total_bytes,
            max_object_size_bytes: e.max_object_size_bytes,
            max_object_count: e.max_object_count,
            current_total_bytes: e.current_total_bytes,
            current_object_count: e.current_object_count,
            incoming_bytes: e.incoming_bytes,
        });
        let json = serde_json::to_value(quota.unwrap()).unwrap();
        assert_eq!(json["maxTotalBytes"], 1000);
        assert_eq!(json["currentTotalBytes"], 900);
        assert_eq!(json["incomingBytes"], 150);
    }
}
