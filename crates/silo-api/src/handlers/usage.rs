//! Tenant usage reporting.

use crate::auth::TenantContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{extract::State, Json};
use silo_core::models::UsageResponse;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/usage",
    tag = "usage",
    responses(
        (status = 200, description = "Current tenant usage", body = UsageResponse),
        (status = 401, description = "Missing tenant or authorization", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id, operation = "usage"))]
pub async fn get_usage(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
) -> Result<Json<UsageResponse>, HttpAppError> {
    ctx.require_read()?;
    let (total_bytes, object_count) = state.quota.usage(&ctx.tenant_id).await?;
    Ok(Json(UsageResponse {
        total_bytes,
        object_count,
    }))
}
