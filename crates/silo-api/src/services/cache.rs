//! Version-scoped result cache for list/head responses.
//!
//! Keys embed the tenant's current cache version, read fresh per request, so
//! a version bump orphans stale entries instead of actively deleting them.
//! A short TTL is the second, independent invalidation path: a missed bump
//! cannot cause unbounded staleness.

use lru::LruCache;
use silo_core::models::{ListObjectsResponse, ObjectMetadata};
use silo_core::TenantId;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-tenant monotonic cache version counter.
///
/// An explicit handle owned by `AppState` and passed into the components that
/// need it; lifecycle is owned by the process, initialized once at startup.
#[derive(Clone)]
pub struct TenantVersionStore {
    versions: Arc<tokio::sync::Mutex<HashMap<String, u64>>>,
}

impl TenantVersionStore {
    pub fn new() -> Self {
        TenantVersionStore {
            versions: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Current version for a tenant. Tenants start at 0.
    pub async fn current(&self, tenant: &TenantId) -> u64 {
        let versions = self.versions.lock().await;
        versions.get(tenant.as_str()).copied().unwrap_or(0)
    }

    /// Increment atomically on every mutation. Concurrent writers each bump
    /// independently; readers are at worst one version behind, never reverted.
    pub async fn bump(&self, tenant: &TenantId) -> u64 {
        let mut versions = self.versions.lock().await;
        let version = versions.entry(tenant.as_str().to_string()).or_insert(0);
        *version += 1;
        *version
    }
}

impl Default for TenantVersionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached orchestration results.
#[derive(Debug, Clone)]
pub enum CachedResult {
    List(ListObjectsResponse),
    Head(ObjectMetadata),
}

struct Entry {
    value: CachedResult,
    inserted_at: Instant,
}

/// Capacity-bounded TTL cache keyed by version-scoped strings.
#[derive(Clone)]
pub struct ResultCache {
    entries: Arc<Mutex<LruCache<String, Entry>>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is non-zero");
        ResultCache {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl,
        }
    }

    pub fn list_key(version: u64, tenant: &TenantId, bucket: &str, prefix: Option<&str>) -> String {
        format!(
            "v{}:{}:list:{}:{}",
            version,
            tenant,
            bucket,
            prefix.unwrap_or("")
        )
    }

    pub fn head_key(version: u64, tenant: &TenantId, bucket: &str, key: &str) -> String {
        format!("v{}:{}:head:{}:{}", version, tenant, bucket, key)
    }

    pub fn get(&self, key: &str) -> Option<CachedResult> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: CachedResult) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tenant() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    fn head_value(etag: &str) -> CachedResult {
        CachedResult::Head(ObjectMetadata {
            etag: etag.to_string(),
            size: 3,
            content_type: "text/plain".to_string(),
            last_modified: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_version_bump_is_monotonic() {
        let versions = TenantVersionStore::new();
        assert_eq!(versions.current(&tenant()).await, 0);
        assert_eq!(versions.bump(&tenant()).await, 1);
        assert_eq!(versions.bump(&tenant()).await, 2);
        assert_eq!(versions.current(&tenant()).await, 2);

        let other = TenantId::parse("rival").unwrap();
        assert_eq!(versions.current(&other).await, 0);
    }

    #[test]
    fn test_version_scoped_keys_orphan_stale_entries() {
        let cache = ResultCache::new(16, Duration::from_secs(60));
        let key_v1 = ResultCache::head_key(1, &tenant(), "photos", "a.png");
        cache.put(key_v1.clone(), head_value("etag1"));

        assert!(cache.get(&key_v1).is_some());
        // After a mutation the caller reads version 2; the v1 entry is
        // simply never looked up again.
        let key_v2 = ResultCache::head_key(2, &tenant(), "photos", "a.png");
        assert!(cache.get(&key_v2).is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ResultCache::new(16, Duration::from_millis(0));
        let key = ResultCache::list_key(1, &tenant(), "photos", None);
        cache.put(
            key.clone(),
            CachedResult::List(ListObjectsResponse {
                bucket: "photos".to_string(),
                prefix: None,
                objects: vec![],
            }),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = ResultCache::new(2, Duration::from_secs(60));
        for i in 0..3 {
            cache.put(format!("key{}", i), head_value("e"));
        }
        assert!(cache.get("key0").is_none());
        assert!(cache.get("key2").is_some());
    }
}
