//! Storage backend factory.

use crate::local::LocalStore;
use crate::memory::MemoryStore;
use crate::traits::{ObjectStore, StorageResult};
use silo_core::config::{Config, StorageBackendKind};
use std::sync::Arc;

/// Build the configured storage backend.
pub async fn create_store(config: &Config) -> StorageResult<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        StorageBackendKind::Local => {
            let store = LocalStore::new(config.local_storage_path.clone()).await?;
            tracing::info!(path = %config.local_storage_path, "Using local filesystem storage");
            Ok(Arc::new(store))
        }
        StorageBackendKind::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
