//! SQLite durable cache store implementation.
//!
//! Implements `DurableCacheStore` from `workpass-core` using sqlx with split
//! read/write pools. Values are stored as JSON text; timestamps are stored
//! as fixed-width RFC 3339 UTC text so SQL range comparisons order
//! correctly.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use workpass_core::cache::DurableCacheStore;
use workpass_types::cache::CacheEntry;
use workpass_types::error::CacheStoreError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DurableCacheStore`.
pub struct SqliteCacheStore {
    pool: DatabasePool,
}

impl SqliteCacheStore {
    /// Create a new cache store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct CacheRow {
    value: String,
    created_at: String,
    expires_at: String,
}

impl CacheRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            value: row.try_get("value")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry, CacheStoreError> {
        let value: serde_json::Value = serde_json::from_str(&self.value)
            .map_err(|e| CacheStoreError::Serialization(format!("invalid JSON value: {e}")))?;
        Ok(CacheEntry {
            value,
            created_at: parse_datetime(&self.created_at)?,
            expires_at: parse_datetime(&self.expires_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheStoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheStoreError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC formatting so lexicographic order matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Escape LIKE wildcards so prefix deletion matches the literal prefix,
/// never a glob.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ---------------------------------------------------------------------------
// DurableCacheStore implementation
// ---------------------------------------------------------------------------

impl DurableCacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheStoreError> {
        let row = sqlx::query("SELECT value, created_at, expires_at FROM result_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let cache_row =
                    CacheRow::from_row(&row).map_err(|e| CacheStoreError::Query(e.to_string()))?;
                Ok(Some(cache_row.into_entry()?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        let value = serde_json::to_string(&entry.value)
            .map_err(|e| CacheStoreError::Serialization(format!("failed to serialize value: {e}")))?;

        sqlx::query(
            r#"INSERT INTO result_cache (key, value, created_at, expires_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET
                   value = excluded.value,
                   created_at = excluded.created_at,
                   expires_at = excluded.expires_at"#,
        )
        .bind(key)
        .bind(&value)
        .bind(format_datetime(&entry.created_at))
        .bind(format_datetime(&entry.expires_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheStoreError> {
        let result = sqlx::query("DELETE FROM result_cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheStoreError> {
        let result = sqlx::query("DELETE FROM result_cache WHERE key LIKE ? ESCAPE '\\'")
            .bind(format!("{}%", escape_like(prefix)))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheStoreError> {
        let result = sqlx::query("DELETE FROM result_cache WHERE expires_at <= ?")
            .bind(format_datetime(&now))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<(), CacheStoreError> {
        sqlx::query("DELETE FROM result_cache")
            .execute(&self.pool.writer)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        Ok(())
    }
}
