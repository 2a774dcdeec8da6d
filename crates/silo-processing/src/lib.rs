//! Silo Processing Library
//!
//! On-demand image transform pipeline: decode, aspect-preserving resize, and
//! re-encode, executed on a bounded blocking pool with a hard timeout, plus an
//! ETag-keyed result cache.

pub mod cache;
pub mod engine;
pub mod formats;
pub mod png_repair;
pub mod resize;

pub use cache::{CachedTransform, TransformCache, TransformCacheKey};
pub use engine::{TransformEngine, TransformEngineOptions, TransformError, TransformRequest};
pub use formats::OutputFormat;
pub use resize::ResizeDimensions;
