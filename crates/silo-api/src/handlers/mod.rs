pub mod buckets;
pub mod conditional;
pub mod health;
pub mod multipart;
pub mod objects;
pub mod presign;
pub mod transform;
pub mod usage;

use crate::auth::TenantContext;
use crate::error::storage_error_to_app;
use crate::services::ObjectCapability;
use crate::state::AppState;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use silo_core::AppError;
use utoipa::IntoParams;

/// Presign query parameters accepted on object routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PresignQuery {
    pub exp: Option<u64>,
    pub sig: Option<String>,
    pub max: Option<u64>,
    pub ct: Option<String>,
}

/// Validate a bucket name and a percent-decoded object key, and refuse
/// client traffic against the reserved multipart artifact prefix.
pub(crate) fn validate_path(bucket: &str, key: &str) -> Result<(), AppError> {
    silo_storage::keys::validate_bucket_name(bucket).map_err(storage_error_to_app)?;
    silo_storage::keys::validate_object_key(key).map_err(storage_error_to_app)?;
    if silo_storage::keys::is_multipart_artifact(key) {
        return Err(AppError::InvalidInput(
            "Object key uses a reserved prefix".to_string(),
        ));
    }
    Ok(())
}

/// Authorize an object operation: a valid presigned capability if one is
/// supplied, otherwise the bearer scope matching the method.
pub(crate) fn authorize_object(
    state: &AppState,
    ctx: &TenantContext,
    query: &PresignQuery,
    method: &str,
    bucket: &str,
    key: &str,
    is_write: bool,
) -> Result<(), AppError> {
    if let Some(sig) = &query.sig {
        let expires_at = query.exp.ok_or_else(|| {
            AppError::Unauthorized("Presigned request is missing exp".to_string())
        })?;
        let capability = ObjectCapability {
            max_bytes: query.max,
            content_type: query.ct.clone(),
        };
        return state.presign.validate_object(
            &ctx.tenant_id,
            method,
            bucket,
            key,
            expires_at,
            &capability,
            sig,
        );
    }
    if is_write {
        ctx.require_write()
    } else {
        ctx.require_read()
    }
}

/// Insert headers, skipping any value that is not a valid header encoding.
pub(crate) fn insert_headers(map: &mut HeaderMap, pairs: Vec<(HeaderName, String)>) {
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            map.insert(name, value);
        }
    }
}
