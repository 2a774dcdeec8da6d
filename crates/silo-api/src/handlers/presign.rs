//! Capability URL issuance.
//!
//! Issuing a capability requires the bearer scope matching the granted
//! method; the issued URL itself then works without a bearer token.

use crate::auth::TenantContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::validate_path;
use crate::services::{ObjectCapability, TransformCapability};
use crate::state::AppState;
use axum::{extract::State, Json};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use silo_core::models::{PresignRequest, PresignResponse, TransformPresignRequest};
use silo_core::AppError;
use silo_processing::OutputFormat;
use std::sync::Arc;
use validator::Validate;

/// Characters escaped in path segments; `/` stays literal so keys keep their
/// slash-delimited shape.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const QUERY_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>');

fn encode_path(key: &str) -> String {
    utf8_percent_encode(key, PATH_SET).to_string()
}

fn encode_query(value: &str) -> String {
    utf8_percent_encode(value, QUERY_SET).to_string()
}

#[utoipa::path(
    post,
    path = "/presign",
    tag = "presign",
    request_body = PresignRequest,
    responses(
        (status = 200, description = "Capability URL issued", body = PresignResponse),
        (status = 400, description = "Invalid method, bucket, or key", body = ErrorResponse),
        (status = 403, description = "Missing scope for the granted method", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(tenant_id = %ctx.tenant_id, operation = "presign_object")
)]
pub async fn presign_object(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PresignRequest>,
) -> Result<Json<PresignResponse>, HttpAppError> {
    request.validate()?;

    let method = request.method.to_uppercase();
    match method.as_str() {
        "GET" | "HEAD" => ctx.require_read()?,
        "PUT" | "DELETE" => ctx.require_write()?,
        other => {
            return Err(HttpAppError(AppError::InvalidInput(format!(
                "Method {} cannot be presigned",
                other
            ))))
        }
    }
    validate_path(&request.bucket, &request.key)?;

    let expires_at = state.presign.expiry_for(request.expiry_seconds);
    let capability = ObjectCapability {
        max_bytes: request.max_bytes,
        content_type: request.content_type.clone(),
    };
    let signature = state.presign.sign_object(
        &ctx.tenant_id,
        &method,
        &request.bucket,
        &request.key,
        expires_at,
        &capability,
    );

    let mut url = format!(
        "/objects/{}/{}?exp={}",
        request.bucket,
        encode_path(&request.key),
        expires_at
    );
    if let Some(max_bytes) = request.max_bytes {
        url.push_str(&format!("&max={}", max_bytes));
    }
    if let Some(content_type) = &request.content_type {
        url.push_str(&format!("&ct={}", encode_query(content_type)));
    }
    url.push_str(&format!("&sig={}", signature));

    Ok(Json(PresignResponse { url, expires_at }))
}

#[utoipa::path(
    post,
    path = "/presign/transform",
    tag = "presign",
    request_body = TransformPresignRequest,
    responses(
        (status = 200, description = "Transform capability URL issued", body = PresignResponse),
        (status = 400, description = "Invalid format or dimensions", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(tenant_id = %ctx.tenant_id, operation = "presign_transform")
)]
pub async fn presign_transform(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<TransformPresignRequest>,
) -> Result<Json<PresignResponse>, HttpAppError> {
    request.validate()?;
    ctx.require_read()?;
    validate_path(&request.bucket, &request.key)?;

    // Canonicalize the format name so the URL and the signature agree.
    let format = match &request.format {
        Some(raw) => Some(
            OutputFormat::parse(raw)
                .ok_or_else(|| {
                    HttpAppError(AppError::InvalidInput(format!(
                        "Unsupported output format: {}",
                        raw
                    )))
                })?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    validate_dimensions(&state, request.width, request.height)?;
    if let Some(quality) = request.quality {
        if quality == 0 || quality > 100 {
            return Err(HttpAppError(AppError::InvalidInput(
                "Quality must be 1-100".to_string(),
            )));
        }
    }

    let expires_at = state.presign.expiry_for(request.expiry_seconds);
    let transform = TransformCapability {
        width: request.width,
        height: request.height,
        format: format.clone(),
        quality: request.quality,
    };
    let signature = state.presign.sign_transform(
        &ctx.tenant_id,
        &request.bucket,
        &request.key,
        expires_at,
        &transform,
    );

    let mut url = format!(
        "/transform/{}/{}?",
        request.bucket,
        encode_path(&request.key)
    );
    if let Some(width) = request.width {
        url.push_str(&format!("w={}&", width));
    }
    if let Some(height) = request.height {
        url.push_str(&format!("h={}&", height));
    }
    if let Some(format) = &format {
        url.push_str(&format!("fmt={}&", format));
    }
    if let Some(quality) = request.quality {
        url.push_str(&format!("q={}&", quality));
    }
    url.push_str(&format!("exp={}&sig={}", expires_at, signature));

    Ok(Json(PresignResponse { url, expires_at }))
}

pub(crate) fn validate_dimensions(
    state: &AppState,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(), HttpAppError> {
    if let Some(width) = width {
        if width == 0 || width > state.config.transform_max_width {
            return Err(HttpAppError(AppError::InvalidInput(format!(
                "Width must be 1-{}",
                state.config.transform_max_width
            ))));
        }
    }
    if let Some(height) = height {
        if height == 0 || height > state.config.transform_max_height {
            return Err(HttpAppError(AppError::InvalidInput(format!(
                "Height must be 1-{}",
                state.config.transform_max_height
            ))));
        }
    }
    Ok(())
}
