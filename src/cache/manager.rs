//! Cache façade tying the memory and persistent tiers together, plus
//! singleflight dedup (§4.3).

use crate::cache::memory::{CacheRecord, MemoryCache, MemoryStats};
use crate::cache::persistent::{CacheEntry, PersistentCache, PersistentStats};
use crate::errors::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

/// Capacity of the write-behind queue. A full queue is not an error: the
/// write degrades to synchronous (§4.3), matching the reference
/// implementation's `queue.Full` fallback in `_schedule_persist`.
const PERSIST_QUEUE_CAPACITY: usize = 256;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

enum PersistJob {
    Set(CacheEntry),
    Delete(String),
    Clear(Option<String>),
}

/// Runtime behavior knobs, sourced from the `[cache]` config section.
#[derive(Debug, Clone)]
pub struct CacheManagerConfig {
    pub enabled: bool,
    pub persist: bool,
    pub async_persist: bool,
    pub singleflight: bool,
    /// Applied when a caller's `set` passes `ttl_secs: None`. `0` means no
    /// default (the entry never expires unless the caller says otherwise).
    pub default_ttl_secs: u64,
    pub async_queue_size: usize,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persist: true,
            async_persist: true,
            singleflight: true,
            default_ttl_secs: 0,
            async_queue_size: PERSIST_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheManagerStats {
    pub enabled: bool,
    pub memory: MemoryStats,
    pub persistent: PersistentStats,
    pub async_persist: bool,
    pub pending_writes: usize,
}

/// Per-key mutual exclusion so concurrent callers computing the same
/// cache key collapse into one in-flight computation, the Rust analogue of
/// the reference implementation's `SingleFlight` lock dictionary. Stale
/// entries are reclaimed lazily: a guard is dropped from the registry once
/// its `Arc` strong count falls to 1 (held only by the registry itself).
#[derive(Default)]
pub struct SingleFlight {
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, blocking until any concurrent holder for
    /// the same key releases it. Hold the returned guard for the duration of
    /// the computation that should be deduplicated.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().expect("singleflight registry poisoned");
            locks.entry(key.to_string()).or_default().clone()
        };
        let guard = entry.lock_owned().await;
        self.gc(key);
        guard
    }

    fn gc(&self, key: &str) {
        let mut locks = self.locks.lock().expect("singleflight registry poisoned");
        if let Some(entry) = locks.get(key) {
            if Arc::strong_count(entry) <= 1 {
                locks.remove(key);
            }
        }
    }
}

/// Two-tier cache: an `lru`-bounded memory layer backed by a `rusqlite`
/// store, with an async write-behind queue for persistence so cache writes
/// never block the caller on disk I/O.
pub struct CacheManager {
    memory: MemoryCache,
    persistent: Arc<PersistentCache>,
    singleflight: SingleFlight,
    persist_tx: Option<mpsc::Sender<PersistJob>>,
    dropped_jobs: AtomicU64,
    pending_writes: Arc<AtomicU64>,
    config: CacheManagerConfig,
}

impl CacheManager {
    pub fn new(memory_max_size: usize, persistent: Arc<PersistentCache>) -> Self {
        Self::with_config(CacheManagerConfig::default(), memory_max_size, persistent)
    }

    /// `config.persist == false` makes the cache memory-only; with it `true`
    /// but `config.async_persist == false`, writes go straight to SQLite on
    /// the calling task instead of through the write-behind queue.
    pub fn with_config(config: CacheManagerConfig, memory_max_size: usize, persistent: Arc<PersistentCache>) -> Self {
        let pending_writes = Arc::new(AtomicU64::new(0));
        let persist_tx = if config.persist && config.async_persist {
            let (persist_tx, persist_rx) = mpsc::channel(config.async_queue_size.max(1));
            let writer_store = persistent.clone();
            let writer_pending = pending_writes.clone();
            tokio::spawn(run_persist_writer(writer_store, persist_rx, writer_pending));
            Some(persist_tx)
        } else {
            None
        };
        Self {
            memory: MemoryCache::new(memory_max_size),
            persistent,
            singleflight: SingleFlight::new(),
            persist_tx,
            dropped_jobs: AtomicU64::new(0),
            pending_writes,
            config,
        }
    }

    /// Stable key composition: `namespace::version::cache_key`, matching the
    /// reference implementation's `compose_key`.
    pub fn compose_key(namespace: &str, version: &str, cache_key: &str) -> String {
        format!("{namespace}::{version}::{cache_key}")
    }

    pub fn get(&self, namespace: &str, version: &str, cache_key: &str) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }
        let key = Self::compose_key(namespace, version, cache_key);
        let now = now_unix();
        if let Some(record) = self.memory.get(&key) {
            if !record.is_expired(now) {
                return Some(record.value);
            }
            self.memory.delete(&key);
        }

        if !self.config.persist {
            return None;
        }

        // `PersistentCache::get` purges an expired row itself and returns
        // `None` for it, so a hit here is already known-live.
        let entry = self.persistent.get(&key, now).ok().flatten()?;
        self.memory.set(
            key,
            CacheRecord {
                value: entry.value.clone(),
                expires_at_unix: entry.expires_at_unix,
                namespace: entry.namespace,
                version: entry.version,
            },
        );
        Some(entry.value)
    }

    /// Store `value` under the composed key. `ttl_secs == Some(0)` expires
    /// the entry immediately, a no-op write (Open Question #2); `None` never
    /// expires.
    pub fn set(&self, namespace: &str, version: &str, cache_key: &str, value: Value, ttl_secs: Option<u64>) {
        if !self.config.enabled {
            return;
        }
        let ttl_secs = ttl_secs.or({
            (self.config.default_ttl_secs > 0).then_some(self.config.default_ttl_secs)
        });
        if ttl_secs == Some(0) {
            return;
        }
        let key = Self::compose_key(namespace, version, cache_key);
        let now = now_unix();
        let expires_at_unix = ttl_secs.map(|ttl| now + ttl);

        self.memory.set(
            key.clone(),
            CacheRecord {
                value: value.clone(),
                expires_at_unix,
                namespace: namespace.to_string(),
                version: version.to_string(),
            },
        );

        if !self.config.persist {
            return;
        }
        self.schedule_persist(PersistJob::Set(CacheEntry {
            cache_key: key,
            namespace: namespace.to_string(),
            version: version.to_string(),
            value,
            ttl: ttl_secs,
            created_at_unix: now,
            last_accessed_unix: now,
            expires_at_unix,
            hit_count: 0,
        }));
    }

    pub fn delete(&self, namespace: &str, version: &str, cache_key: &str) {
        if !self.config.enabled {
            return;
        }
        let key = Self::compose_key(namespace, version, cache_key);
        self.memory.delete(&key);
        if self.config.persist {
            self.schedule_persist(PersistJob::Delete(key));
        }
    }

    pub fn clear(&self, namespace: Option<&str>) {
        match namespace {
            Some(ns) => self.memory.clear_namespace(ns),
            None => self.memory.clear(),
        }
        if self.config.persist {
            self.schedule_persist(PersistJob::Clear(namespace.map(str::to_string)));
        }
    }

    pub fn bulk_get(&self, namespace: &str, version: &str, cache_keys: &[String]) -> HashMap<String, Value> {
        cache_keys
            .iter()
            .filter_map(|k| self.get(namespace, version, k).map(|v| (k.clone(), v)))
            .collect()
    }

    /// Acquire the singleflight guard for a composed key. Callers hold the
    /// guard while checking the cache and, on miss, computing and storing
    /// the result, so concurrent callers for the same key never duplicate
    /// the underlying work (§4.3, §5 concurrency model).
    pub async fn singleflight_guard(&self, namespace: &str, version: &str, cache_key: &str) -> OwnedMutexGuard<()> {
        if !self.config.singleflight {
            // A guard on a lock nobody else holds: no real dedup, but callers
            // still get a uniform `OwnedMutexGuard<()>` to hold.
            return Arc::new(AsyncMutex::new(())).lock_owned().await;
        }
        let key = Self::compose_key(namespace, version, cache_key);
        self.singleflight.acquire(&key).await
    }

    pub fn stats(&self) -> Result<CacheManagerStats> {
        Ok(CacheManagerStats {
            enabled: self.config.enabled,
            memory: self.memory.stats(),
            persistent: self.persistent.stats()?,
            async_persist: self.config.persist && self.config.async_persist,
            pending_writes: self.pending_writes.load(Ordering::Relaxed) as usize,
        })
    }

    /// Snapshot of every live (non-expired) in-memory entry, for diagnostics.
    pub fn dump(&self) -> Vec<(String, Value)> {
        let now = now_unix();
        self.memory
            .items()
            .into_iter()
            .filter(|(_, record)| !record.is_expired(now))
            .map(|(key, record)| (key, record.value))
            .collect()
    }

    fn schedule_persist(&self, job: PersistJob) {
        let Some(persist_tx) = &self.persist_tx else {
            // `async_persist == false`: write inline on the caller's task.
            apply_persist_job(&self.persistent, job);
            return;
        };
        self.pending_writes.fetch_add(1, Ordering::Relaxed);
        match persist_tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.pending_writes.fetch_sub(1, Ordering::Relaxed);
                warn!("persist queue full, writing synchronously");
                apply_persist_job(&self.persistent, job);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.pending_writes.fetch_sub(1, Ordering::Relaxed);
                self.dropped_jobs.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

async fn run_persist_writer(store: Arc<PersistentCache>, mut rx: mpsc::Receiver<PersistJob>, pending: Arc<AtomicU64>) {
    while let Some(job) = rx.recv().await {
        apply_persist_job(&store, job);
        pending.fetch_sub(1, Ordering::Relaxed);
    }
}

fn apply_persist_job(store: &PersistentCache, job: PersistJob) {
    let result = match job {
        PersistJob::Set(entry) => store.set(&entry),
        PersistJob::Delete(key) => store.delete(&key),
        PersistJob::Clear(namespace) => store.clear(namespace.as_deref()),
    };
    if let Err(e) = result {
        warn!("persistent cache write failed: {e}");
    }
}
