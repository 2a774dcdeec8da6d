//! Silo Core Library
//!
//! This crate provides core domain models, error types, configuration, and
//! validation shared across all Silo components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod tenant;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use tenant::TenantId;
