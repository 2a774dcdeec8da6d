//! Silo API Library
//!
//! This crate provides the HTTP handlers, services, and application setup for
//! the storage engine: request orchestration over the `ObjectStore` backend,
//! presigned capability URLs, quotas, multipart uploads, version-scoped
//! result caching, and the transform endpoint.

pub mod api_doc;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use routes::build_router;
pub use state::AppState;
