//! On-demand image transforms.
//!
//! This endpoint accepts presigned capabilities only; bearer scopes are never
//! honored here. The transform cache key includes the source object's ETag,
//! so overwriting the source invalidates derived entries without an explicit
//! signal.

use crate::auth::TenantContext;
use crate::error::{storage_error_to_app, transform_error_to_app, ErrorResponse, HttpAppError};
use crate::handlers::presign::validate_dimensions;
use crate::handlers::{insert_headers, validate_path};
use crate::services::TransformCapability;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use silo_core::AppError;
use silo_processing::{OutputFormat, ResizeDimensions, TransformCacheKey, TransformRequest};
use std::sync::Arc;
use utoipa::IntoParams;

const DEFAULT_QUALITY: u8 = 80;

#[derive(Debug, Deserialize, IntoParams)]
pub struct TransformQuery {
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub fmt: Option<String>,
    pub q: Option<u8>,
    pub exp: Option<u64>,
    pub sig: Option<String>,
}

#[utoipa::path(
    get,
    path = "/transform/{bucket}/{key}",
    tag = "transform",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        TransformQuery
    ),
    responses(
        (status = 200, description = "Transformed image"),
        (status = 401, description = "Missing or invalid capability", body = ErrorResponse),
        (status = 404, description = "Unknown object or transforms disabled", body = ErrorResponse),
        (status = 415, description = "Source not decodable as an image", body = ErrorResponse),
        (status = 504, description = "Transform timed out", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "transform")
)]
pub async fn get_transform(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<TransformQuery>,
) -> Result<Response, HttpAppError> {
    if !state.config.transform_enabled {
        return Err(HttpAppError(AppError::NotFound(
            "Transforms are not enabled".to_string(),
        )));
    }
    validate_path(&bucket, &key)?;

    let (expires_at, signature) = match (query.exp, &query.sig) {
        (Some(exp), Some(sig)) => (exp, sig),
        _ => {
            return Err(HttpAppError(AppError::Unauthorized(
                "Transform requests require a presigned capability".to_string(),
            )))
        }
    };
    let capability = TransformCapability {
        width: query.w,
        height: query.h,
        format: query.fmt.clone(),
        quality: query.q,
    };
    state.presign.validate_transform(
        &ctx.tenant_id,
        &bucket,
        &key,
        expires_at,
        &capability,
        signature,
    )?;

    let format = match &query.fmt {
        Some(raw) => OutputFormat::parse(raw).ok_or_else(|| {
            HttpAppError(AppError::InvalidInput(format!(
                "Unsupported output format: {}",
                raw
            )))
        })?,
        None => OutputFormat::Jpeg,
    };
    validate_dimensions(&state, query.w, query.h)?;
    let quality = query.q.unwrap_or(DEFAULT_QUALITY);
    if quality == 0 || quality > 100 {
        return Err(HttpAppError(AppError::InvalidInput(
            "Quality must be 1-100".to_string(),
        )));
    }

    let metadata = state
        .store
        .head_object(&ctx.tenant_id, &bucket, &key)
        .await
        .map_err(storage_error_to_app)?;

    let cache_key = TransformCacheKey {
        tenant: ctx.tenant_id.as_str().to_string(),
        bucket: bucket.clone(),
        key: key.clone(),
        source_etag: metadata.etag.clone(),
        format,
        width: query.w,
        height: query.h,
        quality,
    };
    if let Some(cached) = state.transform_cache.get(&cache_key) {
        return Ok(transform_response(cached.bytes, cached.content_type));
    }

    let (source, _) = state
        .store
        .get_object(&ctx.tenant_id, &bucket, &key)
        .await
        .map_err(storage_error_to_app)?;

    let request = TransformRequest {
        dimensions: ResizeDimensions {
            width: query.w,
            height: query.h,
        },
        format,
        quality,
    };
    let (bytes, content_type) = state
        .transform_engine
        .transform(source, request)
        .await
        .map_err(transform_error_to_app)?;

    state
        .transform_cache
        .put(cache_key, bytes.clone(), content_type);
    Ok(transform_response(bytes, content_type))
}

fn transform_response(bytes: bytes::Bytes, content_type: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    insert_headers(
        &mut headers,
        vec![
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::VARY, "Accept-Encoding".to_string()),
        ],
    );
    (StatusCode::OK, headers, bytes).into_response()
}
