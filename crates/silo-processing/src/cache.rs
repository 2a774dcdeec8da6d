//! Transform result cache.
//!
//! Keys include the source object's ETag, so overwriting the source
//! automatically orphans every derived entry without an explicit
//! invalidation signal. Entries are bounded by count, total bytes, and TTL.

use crate::formats::OutputFormat;
use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Full identity of a derived image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformCacheKey {
    pub tenant: String,
    pub bucket: String,
    pub key: String,
    pub source_etag: String,
    pub format: OutputFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: u8,
}

/// Cached transform output.
#[derive(Debug, Clone)]
pub struct CachedTransform {
    pub bytes: Bytes,
    pub content_type: &'static str,
    inserted_at: Instant,
}

struct CacheInner {
    entries: LruCache<TransformCacheKey, CachedTransform>,
    total_bytes: u64,
}

/// LRU + TTL + byte-budget bounded cache for transform results.
pub struct TransformCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    max_bytes: u64,
}

impl TransformCache {
    pub fn new(max_entries: usize, max_bytes: u64, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).expect("max(1) is non-zero");
        TransformCache {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                total_bytes: 0,
            }),
            ttl,
            max_bytes,
        }
    }

    pub fn get(&self, key: &TransformCacheKey) -> Option<CachedTransform> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.clone()),
            Some(_) => {
                if let Some(stale) = inner.entries.pop(key) {
                    inner.total_bytes = inner.total_bytes.saturating_sub(stale.bytes.len() as u64);
                }
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: TransformCacheKey, bytes: Bytes, content_type: &'static str) {
        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = inner.entries.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.bytes.len() as u64);
        }
        // Stay under the byte budget by evicting least-recently-used entries.
        while inner.total_bytes + size > self.max_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes =
                        inner.total_bytes.saturating_sub(evicted.bytes.len() as u64);
                }
                None => break,
            }
        }
        if let Some((_, displaced)) = inner.entries.push(
            key,
            CachedTransform {
                bytes,
                content_type,
                inserted_at: Instant::now(),
            },
        ) {
            inner.total_bytes = inner.total_bytes.saturating_sub(displaced.bytes.len() as u64);
        }
        inner.total_bytes += size;
    }
}
