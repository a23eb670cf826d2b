//! Two-tier result cache: fast in-process tier + durable external tier.
//!
//! Memoizes the result of a named workflow step so a retried workflow skips
//! redundant expensive calls (cloud uploads, AI generation). The volatile
//! tier gives zero-latency reuse within a warm process; the durable tier
//! preserves reuse across process restarts, which matters for short-lived
//! serverless execution contexts -- without it, every cold start would
//! re-run all previously-succeeded expensive steps on retry.
//!
//! The durable tier is strictly best-effort: lookup and write failures are
//! logged and treated as misses, never propagated.

pub mod store;
pub mod volatile;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use workpass_types::cache::CacheEntry;

pub use store::{DurableCacheStore, MemoryCacheStore};
pub use volatile::MemoryTier;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default TTL for standard intermediate results (uploads): 1 hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Extended TTL for expensive AI-generation results: 24 hours.
pub const EXTENDED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bound on the volatile tier's population.
pub const DEFAULT_CAPACITY: usize = 1000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for a `ResultCache`.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without an explicit one, and when
    /// promoting a durable hit into the volatile tier.
    pub default_ttl: Duration,
    /// Volatile-tier population bound.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// ResultCache
// ---------------------------------------------------------------------------

/// Two-tier key-value result cache.
///
/// Generic over `S: DurableCacheStore` so it works with any durable backend
/// (SQLite, in-memory mock, etc.). Shared across transactions behind an
/// `Arc`; all methods take `&self`.
pub struct ResultCache<S: DurableCacheStore> {
    volatile: MemoryTier,
    durable: S,
    config: CacheConfig,
}

impl<S: DurableCacheStore> ResultCache<S> {
    /// Create a cache over the given durable store with default config.
    pub fn new(durable: S) -> Self {
        Self::with_config(durable, CacheConfig::default())
    }

    pub fn with_config(durable: S, config: CacheConfig) -> Self {
        Self {
            volatile: MemoryTier::new(config.capacity),
            durable,
            config,
        }
    }

    /// The TTL applied when none is given to `set`.
    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Look up a key across both tiers.
    ///
    /// Volatile hits are served directly (expired entries are evicted and
    /// fall through). A fresh durable hit is promoted into the volatile
    /// tier with a fresh default expiry; an expired durable entry is
    /// deleted. Durable-tier failures are swallowed and treated as a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = Utc::now();
        if let Some(value) = self.volatile.get(key, now) {
            tracing::debug!(key, "cache hit (volatile)");
            return Some(value);
        }

        match self.durable.get(key).await {
            Ok(Some(entry)) if !entry.is_expired(now) => {
                tracing::debug!(key, "cache hit (durable), promoting");
                self.volatile.insert(
                    key.to_string(),
                    CacheEntry::fresh(entry.value.clone(), self.config.default_ttl),
                );
                Some(entry.value)
            }
            Ok(Some(_)) => {
                if let Err(error) = self.durable.delete(key).await {
                    tracing::warn!(key, %error, "failed to delete expired durable entry");
                }
                None
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(key, %error, "durable cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Store a value in both tiers.
    ///
    /// The volatile write always happens (with capacity eviction); the
    /// durable write is attempted with the same TTL and failures are
    /// logged and swallowed.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let entry = CacheEntry::fresh(value, ttl);

        self.volatile.insert(key.to_string(), entry.clone());

        if let Err(error) = self.durable.put(key, &entry).await {
            tracing::warn!(key, %error, "durable cache write failed, entry is volatile-only");
        }
    }

    /// Remove a key from both tiers. Returns whether either tier had it.
    pub async fn delete(&self, key: &str) -> bool {
        let in_volatile = self.volatile.remove(key);
        let in_durable = match self.durable.delete(key).await {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(key, %error, "durable cache delete failed");
                false
            }
        };
        in_volatile || in_durable
    }

    /// Remove every key starting with `prefix` (exact prefix match, not
    /// glob/regex) from both tiers. Returns the total number of removals
    /// across both tiers.
    pub async fn delete_prefix(&self, prefix: &str) -> u64 {
        let volatile = self.volatile.remove_prefix(prefix);
        let durable = match self.durable.delete_prefix(prefix).await {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!(prefix, %error, "durable cache prefix delete failed");
                0
            }
        };
        volatile + durable
    }

    /// One-shot sweep of expired entries from both tiers. Returns the count
    /// removed from the volatile tier.
    pub async fn clear_expired(&self) -> u64 {
        let now = Utc::now();
        let removed = self.volatile.purge_expired(now);
        if let Err(error) = self.durable.purge_expired(now).await {
            tracing::warn!(%error, "durable cache expiry sweep failed");
        }
        removed
    }

    /// Unconditional wipe of both tiers. Test isolation / administrative
    /// reset only.
    pub async fn clear_all(&self) {
        self.volatile.clear();
        if let Err(error) = self.durable.clear().await {
            tracing::warn!(%error, "durable cache clear failed");
        }
    }
}

impl<S: DurableCacheStore + 'static> ResultCache<S> {
    /// Spawn a background task that sweeps expired entries from both tiers
    /// every `interval`.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped; the handle can also be aborted directly.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so the first
            // sweep happens one full interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.clear_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use workpass_types::error::CacheStoreError;

    /// Durable store whose every operation fails, for best-effort checks.
    struct BrokenStore;

    impl DurableCacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheStoreError> {
            Err(CacheStoreError::Connection)
        }
        async fn put(&self, _key: &str, _entry: &CacheEntry) -> Result<(), CacheStoreError> {
            Err(CacheStoreError::Connection)
        }
        async fn delete(&self, _key: &str) -> Result<bool, CacheStoreError> {
            Err(CacheStoreError::Connection)
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheStoreError> {
            Err(CacheStoreError::Connection)
        }
        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, CacheStoreError> {
            Err(CacheStoreError::Connection)
        }
        async fn clear(&self) -> Result<(), CacheStoreError> {
            Err(CacheStoreError::Connection)
        }
    }

    #[tokio::test]
    async fn test_set_then_get_hits_volatile() {
        let cache = ResultCache::new(MemoryCacheStore::new());
        cache.set("photo:x", json!("url1"), None).await;

        assert_eq!(cache.get("photo:x").await, Some(json!("url1")));
    }

    #[tokio::test]
    async fn test_get_respects_ttl() {
        let cache = ResultCache::new(MemoryCacheStore::new());
        cache
            .set("short", json!(1), Some(Duration::from_millis(20)))
            .await;

        assert_eq!(cache.get("short").await, Some(json!(1)));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("short").await, None);
    }

    #[tokio::test]
    async fn test_durable_hit_promotes_into_volatile() {
        let store = MemoryCacheStore::new();
        let entry = CacheEntry::fresh(json!("from-disk"), Duration::from_secs(60));
        store.put("k", &entry).await.unwrap();

        let cache = ResultCache::new(store);
        // Volatile tier is empty; this must come from the durable store.
        assert_eq!(cache.get("k").await, Some(json!("from-disk")));

        // Now served from the volatile tier even if the durable copy goes away.
        cache.durable.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await, Some(json!("from-disk")));
    }

    #[tokio::test]
    async fn test_expired_durable_entry_is_deleted_and_missed() {
        let store = MemoryCacheStore::new();
        let entry = CacheEntry::fresh(json!("stale"), Duration::from_secs(0));
        store.put("k", &entry).await.unwrap();

        let cache = ResultCache::new(store);
        assert_eq!(cache.get("k").await, None);
        assert!(cache.durable.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_broken_durable_store_is_only_a_miss() {
        let cache = ResultCache::new(BrokenStore);

        // set swallows the durable failure, get still serves the volatile copy
        cache.set("k", json!(7), None).await;
        assert_eq!(cache.get("k").await, Some(json!(7)));

        // a volatile miss with a broken durable tier is just a miss
        assert_eq!(cache.get("other").await, None);

        // maintenance operations don't panic or propagate either
        assert!(cache.delete("k").await);
        assert_eq!(cache.delete_prefix("k").await, 0);
        assert_eq!(cache.clear_expired().await, 0);
        cache.clear_all().await;
    }

    #[tokio::test]
    async fn test_delete_removes_from_both_tiers() {
        let cache = ResultCache::new(MemoryCacheStore::new());
        cache.set("k", json!(1), None).await;

        assert!(cache.delete("k").await);
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.delete("k").await);
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_both_tiers() {
        let cache = ResultCache::new(MemoryCacheStore::new());
        cache.set("photo:a", json!(1), None).await;
        cache.set("photo:b", json!(2), None).await;
        cache.set("roster:a", json!(3), None).await;

        // Each entry lives in both tiers, so 2 keys = 4 removals.
        assert_eq!(cache.delete_prefix("photo:").await, 4);
        assert_eq!(cache.get("photo:a").await, None);
        assert_eq!(cache.get("roster:a").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_clear_expired_reports_volatile_count() {
        let cache = ResultCache::new(MemoryCacheStore::new());
        cache
            .set("stale", json!(1), Some(Duration::from_secs(0)))
            .await;
        cache.set("fresh", json!(2), None).await;

        assert_eq!(cache.clear_expired().await, 1);
        assert_eq!(cache.get("fresh").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = Arc::new(ResultCache::new(MemoryCacheStore::new()));
        cache
            .set("stale", json!(1), Some(Duration::from_secs(0)))
            .await;
        cache.set("fresh", json!(2), None).await;

        let handle = cache.start_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(cache.volatile.len(), 1);
        assert_eq!(cache.get("fresh").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_clear_all() {
        let cache = ResultCache::new(MemoryCacheStore::new());
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;

        cache.clear_all().await;

        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, None);
    }
}
