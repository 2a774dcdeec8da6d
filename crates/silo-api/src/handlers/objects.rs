//! Object read/write orchestration.

use crate::auth::TenantContext;
use crate::error::{storage_error_to_app, ErrorResponse, HttpAppError};
use crate::handlers::conditional::{
    check_preconditions, object_headers, parse_range, quote_etag, Precondition, RangeOutcome,
};
use crate::handlers::{authorize_object, insert_headers, validate_path, PresignQuery};
use crate::services::{CachedResult, ResultCache};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use silo_core::models::{ListObjectsResponse, ObjectSummary, PutObjectResponse};
use silo_core::AppError;
use std::sync::Arc;
use utoipa::IntoParams;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn declared_content_length(headers: &HeaderMap) -> Result<u64, AppError> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(AppError::LengthRequired)
}

fn request_content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[utoipa::path(
    put,
    path = "/objects/{bucket}/{key}",
    tag = "objects",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        PresignQuery
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Object stored", body = PutObjectResponse),
        (status = 401, description = "Missing tenant or authorization", body = ErrorResponse),
        (status = 411, description = "Missing Content-Length", body = ErrorResponse),
        (status = 413, description = "Quota exceeded", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query, headers, body),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "put_object")
)]
pub async fn put_object(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<PresignQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    validate_path(&bucket, &key)?;
    authorize_object(&state, &ctx, &query, "PUT", &bucket, &key, true)?;

    let content_length = declared_content_length(&headers)?;
    let content_type = request_content_type(&headers);

    // The server is the final authority on presign-declared constraints.
    if query.sig.is_some() {
        if let Some(max_bytes) = query.max {
            if content_length > max_bytes {
                return Err(HttpAppError(AppError::PayloadTooLarge(format!(
                    "Body exceeds the {} byte capability limit",
                    max_bytes
                ))));
            }
        }
        if let Some(declared_type) = &query.ct {
            if *declared_type != content_type {
                return Err(HttpAppError(AppError::UnsupportedMediaType(format!(
                    "Capability is restricted to {}",
                    declared_type
                ))));
            }
        }
    }

    state
        .quota
        .ensure_within(&ctx.tenant_id, content_length, 1)
        .await?;

    let metadata = state
        .store
        .put_object(&ctx.tenant_id, &bucket, &key, body, &content_type)
        .await
        .map_err(storage_error_to_app)?;
    state.versions.bump(&ctx.tenant_id).await;

    let mut response_headers = HeaderMap::new();
    insert_headers(
        &mut response_headers,
        vec![(header::ETAG, quote_etag(&metadata.etag))],
    );
    Ok((
        StatusCode::CREATED,
        response_headers,
        Json(PutObjectResponse {
            bucket,
            key,
            etag: metadata.etag,
            size: metadata.size,
            content_type: metadata.content_type,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/objects/{bucket}/{key}",
    tag = "objects",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        PresignQuery
    ),
    responses(
        (status = 200, description = "Full object body"),
        (status = 206, description = "Partial content"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Unknown bucket or object", body = ErrorResponse),
        (status = 416, description = "Range not satisfiable", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query, headers),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "get_object")
)]
pub async fn get_object(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<PresignQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    validate_path(&bucket, &key)?;
    authorize_object(&state, &ctx, &query, "GET", &bucket, &key, false)?;

    let metadata = state
        .store
        .head_object(&ctx.tenant_id, &bucket, &key)
        .await
        .map_err(storage_error_to_app)?;

    let mut response_headers = HeaderMap::new();
    insert_headers(&mut response_headers, object_headers(&metadata));

    if check_preconditions(&headers, &metadata.etag)? == Precondition::NotModified {
        return Ok((StatusCode::NOT_MODIFIED, response_headers).into_response());
    }

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    match parse_range(range_header, metadata.size)? {
        RangeOutcome::Full => {
            let (data, metadata) = state
                .store
                .get_object(&ctx.tenant_id, &bucket, &key)
                .await
                .map_err(storage_error_to_app)?;
            insert_headers(
                &mut response_headers,
                vec![(header::CONTENT_TYPE, metadata.content_type)],
            );
            Ok((StatusCode::OK, response_headers, data).into_response())
        }
        RangeOutcome::Empty => {
            insert_headers(
                &mut response_headers,
                vec![(header::CONTENT_TYPE, metadata.content_type)],
            );
            Ok((StatusCode::OK, response_headers, Bytes::new()).into_response())
        }
        RangeOutcome::Partial { start, end } => {
            let (data, metadata) = state
                .store
                .get_object_range(&ctx.tenant_id, &bucket, &key, start, end)
                .await
                .map_err(storage_error_to_app)?;
            insert_headers(
                &mut response_headers,
                vec![
                    (header::CONTENT_TYPE, metadata.content_type),
                    (
                        header::CONTENT_RANGE,
                        format!("bytes {}-{}/{}", start, end, metadata.size),
                    ),
                ],
            );
            Ok((StatusCode::PARTIAL_CONTENT, response_headers, data).into_response())
        }
    }
}

#[utoipa::path(
    head,
    path = "/objects/{bucket}/{key}",
    tag = "objects",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        PresignQuery
    ),
    responses(
        (status = 200, description = "Object metadata in headers"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Unknown bucket or object", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query, headers),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "head_object")
)]
pub async fn head_object(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<PresignQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    validate_path(&bucket, &key)?;
    authorize_object(&state, &ctx, &query, "HEAD", &bucket, &key, false)?;

    // Version-scoped cache: any mutation bumps the version, so stale entries
    // are orphaned rather than invalidated.
    let version = state.versions.current(&ctx.tenant_id).await;
    let cache_key = ResultCache::head_key(version, &ctx.tenant_id, &bucket, &key);
    let metadata = match state.result_cache.get(&cache_key) {
        Some(CachedResult::Head(metadata)) => metadata,
        _ => {
            let metadata = state
                .store
                .head_object(&ctx.tenant_id, &bucket, &key)
                .await
                .map_err(storage_error_to_app)?;
            state
                .result_cache
                .put(cache_key, CachedResult::Head(metadata.clone()));
            metadata
        }
    };

    let mut response_headers = HeaderMap::new();
    insert_headers(&mut response_headers, object_headers(&metadata));

    if check_preconditions(&headers, &metadata.etag)? == Precondition::NotModified {
        return Ok((StatusCode::NOT_MODIFIED, response_headers).into_response());
    }

    insert_headers(
        &mut response_headers,
        vec![
            (header::CONTENT_TYPE, metadata.content_type.clone()),
            (header::CONTENT_LENGTH, metadata.size.to_string()),
        ],
    );
    Ok((StatusCode::OK, response_headers).into_response())
}

#[utoipa::path(
    delete,
    path = "/objects/{bucket}/{key}",
    tag = "objects",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key"),
        PresignQuery
    ),
    responses(
        (status = 204, description = "Object deleted"),
        (status = 404, description = "Unknown bucket or object", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query),
    fields(tenant_id = %ctx.tenant_id, bucket = %bucket, key = %key, operation = "delete_object")
)]
pub async fn delete_object(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<PresignQuery>,
) -> Result<StatusCode, HttpAppError> {
    validate_path(&bucket, &key)?;
    authorize_object(&state, &ctx, &query, "DELETE", &bucket, &key, true)?;

    state
        .store
        .delete_object(&ctx.tenant_id, &bucket, &key)
        .await
        .map_err(storage_error_to_app)?;
    state.versions.bump(&ctx.tenant_id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListObjectsQuery {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
}

#[utoipa::path(
    get,
    path = "/objects",
    tag = "objects",
    params(ListObjectsQuery),
    responses(
        (status = 200, description = "Objects in the bucket", body = ListObjectsResponse),
        (status = 400, description = "Missing bucket parameter", body = ErrorResponse),
        (status = 404, description = "Unknown bucket", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, query),
    fields(tenant_id = %ctx.tenant_id, operation = "list_objects")
)]
pub async fn list_objects(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Json<ListObjectsResponse>, HttpAppError> {
    ctx.require_read()?;
    let bucket = query.bucket.ok_or_else(|| {
        HttpAppError(AppError::InvalidInput(
            "Missing bucket query parameter".to_string(),
        ))
    })?;
    silo_storage::keys::validate_bucket_name(&bucket).map_err(storage_error_to_app)?;
    let prefix = query.prefix.as_deref().filter(|p| !p.is_empty());

    let version = state.versions.current(&ctx.tenant_id).await;
    let cache_key = ResultCache::list_key(version, &ctx.tenant_id, &bucket, prefix);
    if let Some(CachedResult::List(cached)) = state.result_cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let objects = state
        .store
        .list_objects(&ctx.tenant_id, &bucket, prefix)
        .await
        .map_err(storage_error_to_app)?;

    let response = ListObjectsResponse {
        bucket,
        prefix: prefix.map(str::to_string),
        objects: objects
            .into_iter()
            .map(|(key, metadata)| ObjectSummary {
                key,
                etag: metadata.etag,
                size: metadata.size,
                last_modified: metadata.last_modified,
            })
            .collect(),
    };
    state
        .result_cache
        .put(cache_key, CachedResult::List(response.clone()));
    Ok(Json(response))
}
