//! Application state.
//!
//! Everything handlers need hangs off one `Arc<AppState>`: the storage
//! backend behind its trait object, the stateless services, and the two
//! caches. The tenant version store is an explicit handle created here at
//! startup, not a global.

use crate::services::{
    MultipartUploadManager, PresignService, QuotaService, ResultCache, TenantVersionStore,
};
use silo_core::Config;
use silo_processing::{TransformCache, TransformEngine, TransformEngineOptions};
use silo_storage::{create_store, ObjectStore};
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub presign: PresignService,
    pub quota: QuotaService,
    pub multipart: MultipartUploadManager,
    pub versions: TenantVersionStore,
    pub result_cache: ResultCache,
    pub transform_engine: TransformEngine,
    pub transform_cache: TransformCache,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>, anyhow::Error> {
        let store = create_store(&config).await?;
        Ok(Self::with_store(config, store))
    }

    /// Build state around an existing backend. Tests inject a `MemoryStore`
    /// here.
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>) -> Arc<Self> {
        let presign = PresignService::new(
            &config.presign_secret,
            config.presign_default_expiry_secs,
            config.presign_max_expiry_secs,
        );
        let quota = QuotaService::new(store.clone(), config.clone());
        let multipart =
            MultipartUploadManager::new(store.clone(), quota.clone(), config.clone());
        let result_cache = ResultCache::new(
            config.result_cache_capacity,
            Duration::from_secs(config.result_cache_ttl_secs),
        );
        let transform_engine = TransformEngine::new(TransformEngineOptions {
            concurrency: config.transform_concurrency,
            timeout: Duration::from_secs(config.transform_timeout_secs),
            png_repair: config.transform_png_repair,
            max_source_pixels: config.transform_max_pixels,
        });
        let transform_cache = TransformCache::new(
            config.transform_cache_entries,
            config.transform_cache_max_bytes,
            Duration::from_secs(config.transform_cache_ttl_secs),
        );

        Arc::new(AppState {
            config,
            store,
            presign,
            quota,
            multipart,
            versions: TenantVersionStore::new(),
            result_cache,
            transform_engine,
            transform_cache,
        })
    }
}
