//! Bucket CRUD.

use crate::auth::TenantContext;
use crate::error::{storage_error_to_app, ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use silo_core::models::BucketSummary;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/buckets",
    tag = "buckets",
    responses(
        (status = 200, description = "Buckets owned by the tenant", body = [BucketSummary]),
        (status = 401, description = "Missing tenant or authorization", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id, operation = "list_buckets"))]
pub async fn list_buckets(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BucketSummary>>, HttpAppError> {
    ctx.require_read()?;
    let buckets = state
        .store
        .list_buckets(&ctx.tenant_id)
        .await
        .map_err(storage_error_to_app)?;
    Ok(Json(
        buckets.into_iter().map(|name| BucketSummary { name }).collect(),
    ))
}

#[utoipa::path(
    put,
    path = "/buckets/{bucket}",
    tag = "buckets",
    params(("bucket" = String, Path, description = "Bucket name")),
    responses(
        (status = 201, description = "Bucket exists"),
        (status = 400, description = "Invalid bucket name", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id, bucket = %bucket, operation = "create_bucket"))]
pub async fn create_bucket(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<StatusCode, HttpAppError> {
    ctx.require_write()?;
    silo_storage::keys::validate_bucket_name(&bucket).map_err(storage_error_to_app)?;
    state
        .store
        .create_bucket(&ctx.tenant_id, &bucket)
        .await
        .map_err(storage_error_to_app)?;
    state.versions.bump(&ctx.tenant_id).await;
    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    delete,
    path = "/buckets/{bucket}",
    tag = "buckets",
    params(("bucket" = String, Path, description = "Bucket name")),
    responses(
        (status = 204, description = "Bucket deleted"),
        (status = 404, description = "Unknown bucket", body = ErrorResponse),
        (status = 409, description = "Bucket not empty", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id, bucket = %bucket, operation = "delete_bucket"))]
pub async fn delete_bucket(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<StatusCode, HttpAppError> {
    ctx.require_write()?;
    state
        .store
        .delete_bucket(&ctx.tenant_id, &bucket)
        .await
        .map_err(storage_error_to_app)?;
    state.versions.bump(&ctx.tenant_id).await;
    Ok(StatusCode::NO_CONTENT)
}
