//! Durable cache store trait.
//!
//! Defines the interface for the persistent (cross-restart) cache tier.
//! The SQLite implementation lives in workpass-infra; `MemoryCacheStore`
//! below is the reference implementation for tests and ephemeral deployments.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use workpass_types::cache::CacheEntry;
use workpass_types::error::CacheStoreError;

/// Trait for the durable tier of the result cache.
///
/// Stores cache entries (value + expiry window) keyed by string. Entries are
/// overwritten whole on `put`; expiry is the caller's concern -- the store
/// only persists and filters by the timestamps it is given.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait DurableCacheStore: Send + Sync {
    /// Get an entry by key. Returns None if the key does not exist. The
    /// entry may be expired; the caller decides what to do with it.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<CacheEntry>, CacheStoreError>> + Send;

    /// Store an entry under a key (upsert).
    fn put(
        &self,
        key: &str,
        entry: &CacheEntry,
    ) -> impl std::future::Future<Output = Result<(), CacheStoreError>> + Send;

    /// Delete a key. Returns whether an entry was removed.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, CacheStoreError>> + Send;

    /// Delete every key starting with `prefix` (exact prefix, not a glob).
    /// Returns the number of entries removed.
    fn delete_prefix(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<u64, CacheStoreError>> + Send;

    /// Remove every entry whose expiry is at or before `now`. Returns the
    /// number of entries removed.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, CacheStoreError>> + Send;

    /// Unconditional wipe.
    fn clear(&self) -> impl std::future::Future<Output = Result<(), CacheStoreError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory reference implementation
// ---------------------------------------------------------------------------

/// In-memory `DurableCacheStore`.
///
/// Not durable across restarts, of course -- it exists for unit tests and
/// for deployments that opt out of persistence entirely.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DurableCacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheStoreError> {
        Ok(self.entries.get(key).map(|e| e.clone()))
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheStoreError> {
        self.entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheStoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheStoreError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - self.entries.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheStoreError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - self.entries.len()) as u64)
    }

    async fn clear(&self) -> Result<(), CacheStoreError> {
        self.entries.clear();
        Ok(())
    }
}
