//! Multipart upload routes.

use crate::auth::TenantContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::conditional::quote_etag;
use crate::handlers::{insert_headers, validate_path};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use silo_core::models::{
    CompleteMultipartRequest, CompleteMultipartResponse, InitiateMultipartResponse, PartInfo,
    PartListResponse,
};
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadIdQuery {
    #[serde(rename = "uploadId")]
    pub upload_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/multipart/{bucket}/initiate/{key}",
    tag = "multipart",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key")
    ),
    responses(
        (status = 201, description = "Upload session created", body = InitiateMultipartResponse),
        (status = 404, description = "Unknown bucket", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, headers),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "initiate_multipart")
)]
pub async fn initiate(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_write()?;
    validate_path(&bucket, &key)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    let upload_id = state
        .multipart
        .initiate(&ctx.tenant_id, &bucket, &key, content_type)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(InitiateMultipartResponse {
            upload_id,
            bucket,
            key,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/multipart/{bucket}/parts/{part_number}/{key}",
    tag = "multipart",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("part_number" = u32, Path, description = "1-based part number"),
        ("key" = String, Path, description = "Object key"),
        UploadIdQuery
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Part stored", body = PartInfo),
        (status = 400, description = "Invalid part number", body = ErrorResponse),
        (status = 404, description = "Unknown or closed upload", body = ErrorResponse),
        (status = 413, description = "Part exceeds configured maximum", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query, body),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, part_number, operation = "upload_part")
)]
pub async fn upload_part(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, part_number, key)): Path<(String, u32, String)>,
    Query(query): Query<UploadIdQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_write()?;
    validate_path(&bucket, &key)?;

    let part = state
        .multipart
        .upload_part(&ctx.tenant_id, &bucket, &key, query.upload_id, part_number, body)
        .await?;

    let mut response_headers = HeaderMap::new();
    insert_headers(
        &mut response_headers,
        vec![(header::ETAG, quote_etag(&part.etag))],
    );
    Ok((StatusCode::OK, response_headers, Json(part)))
}

#[utoipa::path(
    get,
    path = "/multipart/{bucket}/uploads/{key}",
    tag = "multipart",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        UploadIdQuery
    ),
    responses(
        (status = 200, description = "Recorded parts, sorted by number", body = PartListResponse),
        (status = 404, description = "Unknown upload", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "get_parts")
)]
pub async fn get_parts(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<UploadIdQuery>,
) -> Result<Json<PartListResponse>, HttpAppError> {
    ctx.require_read()?;
    validate_path(&bucket, &key)?;
    let parts = state
        .multipart
        .get_parts(&ctx.tenant_id, &bucket, &key, query.upload_id)
        .await?;
    Ok(Json(parts))
}

#[utoipa::path(
    post,
    path = "/multipart/{bucket}/complete/{key}",
    tag = "multipart",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        UploadIdQuery
    ),
    request_body = CompleteMultipartRequest,
    responses(
        (status = 200, description = "Parts merged into the final object", body = CompleteMultipartResponse),
        (status = 400, description = "Duplicate, missing, or undersized parts", body = ErrorResponse),
        (status = 404, description = "Unknown upload", body = ErrorResponse),
        (status = 413, description = "Quota exceeded", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query, request),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "complete_multipart")
)]
pub async fn complete(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<UploadIdQuery>,
    ValidatedJson(request): ValidatedJson<CompleteMultipartRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_write()?;
    validate_path(&bucket, &key)?;

    let result = state
        .multipart
        .complete(&ctx.tenant_id, &bucket, &key, query.upload_id, &request.parts)
        .await?;
    state.versions.bump(&ctx.tenant_id).await;

    let mut response_headers = HeaderMap::new();
    insert_headers(
        &mut response_headers,
        vec![(header::ETAG, quote_etag(&result.etag))],
    );
    Ok((StatusCode::OK, response_headers, Json(result)))
}

#[utoipa::path(
    delete,
    path = "/multipart/{bucket}/abort/{key}",
    tag = "multipart",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        UploadIdQuery
    ),
    responses(
        (status = 204, description = "Upload aborted"),
        (status = 404, description = "Unknown upload", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "abort_multipart")
)]
pub async fn abort(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<UploadIdQuery>,
) -> Result<StatusCode, HttpAppError> {
    ctx.require_write()?;
    validate_path(&bucket, &key)?;
    state
        .multipart
        .abort(&ctx.tenant_id, &bucket, &key, query.upload_id)
        .await?;
    state.versions.bump(&ctx.tenant_id).await;
    Ok(StatusCode::NO_CONTENT)
}
