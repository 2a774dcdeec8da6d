//! Router assembly and middleware stack.

use crate::api_doc::ApiDoc;
use crate::handlers::{buckets, health, multipart, objects, presign, transform, usage};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post, put},
    Json, Router,
};
use silo_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Fallback request body cap when no per-object quota limit is configured.
const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024 * 1024;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn body_limit(config: &Config) -> usize {
    match config.quota_defaults.max_object_size_bytes {
        0 => DEFAULT_BODY_LIMIT_BYTES,
        limit => limit as usize,
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let limit = body_limit(&state.config);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/buckets", get(buckets::list_buckets))
        .route(
            "/buckets/{bucket}",
            put(buckets::create_bucket).delete(buckets::delete_bucket),
        )
        .route("/objects", get(objects::list_objects))
        .route(
            "/objects/{bucket}/{*key}",
            put(objects::put_object)
                .get(objects::get_object)
                .head(objects::head_object)
                .delete(objects::delete_object),
        )
        .route(
            "/multipart/{bucket}/initiate/{*key}",
            post(multipart::initiate),
        )
        .route(
            "/multipart/{bucket}/parts/{part_number}/{*key}",
            put(multipart::upload_part),
        )
        .route(
            "/multipart/{bucket}/uploads/{*key}",
            get(multipart::get_parts),
        )
        .route(
            "/multipart/{bucket}/complete/{*key}",
            post(multipart::complete),
        )
        .route("/multipart/{bucket}/abort/{*key}", delete(multipart::abort))
        .route("/presign", post(presign::presign_object))
        .route("/presign/transform", post(presign::presign_transform))
        .route("/transform/{bucket}/{*key}", get(transform::get_transform))
        .route("/usage", get(usage::get_usage))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
