//! Thread-safe in-memory LRU cache (§4.1).

use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// In-memory value, wrapping the raw JSON with expiry/namespace/version
/// bookkeeping used by `CacheManager`.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub value: Value,
    pub expires_at_unix: Option<u64>,
    pub namespace: String,
    pub version: String,
}

impl CacheRecord {
    pub fn is_expired(&self, now_unix: u64) -> bool {
        self.expires_at_unix.is_some_and(|exp| exp <= now_unix)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub max_size: usize,
    pub current_size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe LRU, bounded by `max_size >= 1`. All mutating operations hold
/// a single mutex; `items()` returns a snapshot taken under the lock so
/// readers are not blocked by writers once the snapshot is copied out.
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

struct Inner {
    map: LruCache<String, CacheRecord>,
    hits: u64,
    misses: u64,
}

impl MemoryCache {
    pub fn new(max_size: usize) -> Self {
        let cap = NonZeroUsize::new(max_size.max(1)).expect("max(1, _) is never zero");
        Self {
            inner: Mutex::new(Inner {
                map: LruCache::new(cap),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheRecord> {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        match inner.map.get(key) {
            Some(record) => {
                let record = record.clone();
                inner.hits += 1;
                Some(record)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn set(&self, key: String, value: CacheRecord) {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        inner.map.put(key, value);
    }

    /// O(1) removal, no counter change.
    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        inner.map.pop(key);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        inner.map.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Removes every entry recorded under `namespace`, leaving the rest and
    /// the hit/miss counters untouched.
    pub fn clear_namespace(&self, namespace: &str) {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        let stale: Vec<String> = inner
            .map
            .iter()
            .filter(|(_, record)| record.namespace == namespace)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            inner.map.pop(&key);
        }
    }

    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.lock().expect("memory cache lock poisoned");
        MemoryStats {
            max_size: inner.map.cap().get(),
            current_size: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    /// Snapshot of all `(key, record)` pairs, most-recently-used first.
    pub fn items(&self) -> Vec<(String, CacheRecord)> {
        let inner = self.inner.lock().expect("memory cache lock poisoned");
        inner
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
