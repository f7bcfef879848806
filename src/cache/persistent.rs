//! SQLite-backed persistent cache store (§4.2).

use crate::errors::{EngineError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// One row of `cache_entries`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_key: String,
    pub namespace: String,
    pub version: String,
    pub value: Value,
    pub ttl: Option<u64>,
    pub created_at_unix: u64,
    pub last_accessed_unix: u64,
    pub expires_at_unix: Option<u64>,
    pub hit_count: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PersistentStats {
    pub entry_count: u64,
    pub total_hit_count: u64,
}

/// `rusqlite` connection wrapped in a `Mutex`, matching the reference
/// application's memory-store idiom: a single connection, WAL journaling,
/// and a short busy timeout rather than a connection pool.
pub struct PersistentCache {
    conn: Mutex<Connection>,
}

impl PersistentCache {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| EngineError::Cache(format!("failed to open cache database: {e}")))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;
             PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| EngineError::Cache(format!("failed to set cache PRAGMAs: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                version TEXT NOT NULL,
                value BLOB NOT NULL,
                ttl INTEGER,
                created_at INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                expires_at INTEGER,
                hit_count INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_cache_entries_namespace ON cache_entries(namespace);
            CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);",
        )
        .map_err(|e| EngineError::Cache(format!("failed to create cache schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Fetch by key. An expired row is purged on the spot and reported as
    /// absent, per the entry's literal expiry contract; a live row has its
    /// `hit_count`/`last_accessed` bumped as a side effect, as the teacher's
    /// equivalent `memory_db` read paths do for access-tracked rows.
    pub fn get(&self, cache_key: &str, now_unix: u64) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().expect("persistent cache lock poisoned");
        let row = conn
            .query_row(
                "SELECT cache_key, namespace, version, value, ttl, created_at, last_accessed, expires_at, hit_count
                 FROM cache_entries WHERE cache_key = ?1",
                params![cache_key],
                row_to_entry,
            )
            .optional()
            .map_err(|e| EngineError::Cache(format!("cache read failed: {e}")))?;

        let Some(entry) = row else {
            return Ok(None);
        };

        if entry.expires_at_unix.is_some_and(|exp| exp <= now_unix) {
            conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![cache_key])
                .map_err(|e| EngineError::Cache(format!("cache expiry purge failed: {e}")))?;
            return Ok(None);
        }

        conn.execute(
            "UPDATE cache_entries SET hit_count = hit_count + 1, last_accessed = ?2 WHERE cache_key = ?1",
            params![cache_key, now_unix as i64],
        )
        .map_err(|e| EngineError::Cache(format!("cache hit-count update failed: {e}")))?;

        Ok(Some(entry))
    }

    pub fn set(&self, entry: &CacheEntry) -> Result<()> {
        let value_bytes = serde_json::to_vec(&entry.value)
            .map_err(|e| EngineError::Cache(format!("cache value serialization failed: {e}")))?;
        let conn = self.conn.lock().expect("persistent cache lock poisoned");
        conn.execute(
            "INSERT INTO cache_entries
                (cache_key, namespace, version, value, ttl, created_at, last_accessed, expires_at, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
             ON CONFLICT(cache_key) DO UPDATE SET
                namespace = excluded.namespace,
                version = excluded.version,
                value = excluded.value,
                ttl = excluded.ttl,
                created_at = excluded.created_at,
                last_accessed = excluded.last_accessed,
                expires_at = excluded.expires_at,
                hit_count = 0",
            params![
                entry.cache_key,
                entry.namespace,
                entry.version,
                value_bytes,
                entry.ttl.map(|v| v as i64),
                entry.created_at_unix as i64,
                entry.last_accessed_unix as i64,
                entry.expires_at_unix.map(|v| v as i64),
            ],
        )
        .map_err(|e| EngineError::Cache(format!("cache write failed: {e}")))?;
        Ok(())
    }

    pub fn delete(&self, cache_key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("persistent cache lock poisoned");
        conn.execute(
            "DELETE FROM cache_entries WHERE cache_key = ?1",
            params![cache_key],
        )
        .map_err(|e| EngineError::Cache(format!("cache delete failed: {e}")))?;
        Ok(())
    }

    /// Delete all rows, or only a namespace's rows when `namespace` is given.
    pub fn clear(&self, namespace: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().expect("persistent cache lock poisoned");
        match namespace {
            Some(ns) => conn.execute("DELETE FROM cache_entries WHERE namespace = ?1", params![ns]),
            None => conn.execute("DELETE FROM cache_entries", params![]),
        }
        .map_err(|e| EngineError::Cache(format!("cache clear failed: {e}")))?;
        Ok(())
    }

    /// Delete rows whose `expires_at` has passed `now_unix`; returns the
    /// number of rows removed.
    pub fn cleanup_expired(&self, now_unix: u64) -> Result<u64> {
        let conn = self.conn.lock().expect("persistent cache lock poisoned");
        let removed = conn
            .execute(
                "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now_unix as i64],
            )
            .map_err(|e| EngineError::Cache(format!("cache cleanup failed: {e}")))?;
        Ok(removed as u64)
    }

    pub fn stats(&self) -> Result<PersistentStats> {
        let conn = self.conn.lock().expect("persistent cache lock poisoned");
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM cache_entries",
            [],
            |row| {
                Ok(PersistentStats {
                    entry_count: row.get::<_, i64>(0)? as u64,
                    total_hit_count: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .map_err(|e| EngineError::Cache(format!("cache stats query failed: {e}")))
    }

    /// All entries in a namespace, for bulk priming / dump (§4.3).
    pub fn iter_namespace(&self, namespace: &str) -> Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().expect("persistent cache lock poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT cache_key, namespace, version, value, ttl, created_at, last_accessed, expires_at, hit_count
                 FROM cache_entries WHERE namespace = ?1",
            )
            .map_err(|e| EngineError::Cache(format!("cache query prepare failed: {e}")))?;
        let rows = stmt
            .query_map(params![namespace], row_to_entry)
            .map_err(|e| EngineError::Cache(format!("cache query failed: {e}")))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| EngineError::Cache(format!("cache row decode failed: {e}")))?);
        }
        Ok(out)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CacheEntry> {
    let value_bytes: Vec<u8> = row.get(3)?;
    let value: Value = serde_json::from_slice(&value_bytes).unwrap_or(Value::Null);
    Ok(CacheEntry {
        cache_key: row.get(0)?,
        namespace: row.get(1)?,
        version: row.get(2)?,
        value,
        ttl: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        created_at_unix: row.get::<_, i64>(5)? as u64,
        last_accessed_unix: row.get::<_, i64>(6)? as u64,
        expires_at_unix: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        hit_count: row.get::<_, i64>(8)? as u64,
    })
}
