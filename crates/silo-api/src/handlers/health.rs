//! Liveness probe.

use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
