//! Volatile (in-process) cache tier.
//!
//! A capacity-bounded concurrent map shared by every in-flight transaction
//! in the process. Entries are immutable once set and reads tolerate
//! staleness, so no locking discipline beyond dashmap's atomic map
//! operations is needed (worst case: a redundant re-execution of an action).

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use workpass_types::cache::CacheEntry;

/// In-process cache tier with TTL-aware reads and bounded population.
///
/// When an insert finds the tier at capacity, eviction runs in two passes:
/// first all expired entries are removed; if the tier is still at or over
/// capacity, the oldest 20% by creation time are removed.
pub struct MemoryTier {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Get a live value. Expired entries are evicted on contact and
    /// reported as absent.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Some(entry.value.clone()),
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Insert an entry, evicting first if the tier is at capacity.
    pub fn insert(&self, key: String, entry: CacheEntry) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict(Utc::now());
        }
        self.entries.insert(key, entry);
    }

    /// Remove a key. Returns whether an entry was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`. Returns the count removed.
    pub fn remove_prefix(&self, prefix: &str) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        (before - self.entries.len()) as u64
    }

    /// Remove every expired entry. Returns the count removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        (before - self.entries.len()) as u64
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Two-pass eviction: expired entries first, then the oldest 20% by
    /// creation time if the tier is still at or over capacity.
    fn evict(&self, now: DateTime<Utc>) {
        let purged = self.purge_expired(now);
        if self.entries.len() < self.capacity {
            tracing::debug!(purged, "cache eviction satisfied by expired entries");
            return;
        }

        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.created_at))
            .collect();
        by_age.sort_by_key(|(_, created_at)| *created_at);

        let evict_count = (by_age.len().div_ceil(5)).max(1);
        for (key, _) in by_age.into_iter().take(evict_count) {
            self.entries.remove(&key);
        }
        tracing::debug!(purged, evicted = evict_count, "cache evicted oldest entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn fresh(value: i64) -> CacheEntry {
        CacheEntry::fresh(json!(value), Duration::from_secs(3600))
    }

    fn expired(value: i64) -> CacheEntry {
        CacheEntry::fresh(json!(value), Duration::from_secs(0))
    }

    fn aged(value: i64, age_secs: i64) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            value: json!(value),
            created_at: now - chrono::Duration::seconds(age_secs),
            expires_at: now + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn test_get_returns_live_value() {
        let tier = MemoryTier::new(10);
        tier.insert("k".to_string(), fresh(1));
        assert_eq!(tier.get("k", Utc::now()), Some(json!(1)));
    }

    #[test]
    fn test_get_evicts_expired_entry() {
        let tier = MemoryTier::new(10);
        tier.insert("k".to_string(), expired(1));

        assert_eq!(tier.get("k", Utc::now()), None);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_insert_at_capacity_purges_expired_first() {
        let tier = MemoryTier::new(3);
        tier.insert("a".to_string(), expired(1));
        tier.insert("b".to_string(), fresh(2));
        tier.insert("c".to_string(), fresh(3));

        tier.insert("d".to_string(), fresh(4));

        // The expired entry made room; both live entries survive.
        assert_eq!(tier.get("a", Utc::now()), None);
        assert_eq!(tier.get("b", Utc::now()), Some(json!(2)));
        assert_eq!(tier.get("c", Utc::now()), Some(json!(3)));
        assert_eq!(tier.get("d", Utc::now()), Some(json!(4)));
    }

    #[test]
    fn test_insert_at_capacity_evicts_oldest() {
        let tier = MemoryTier::new(5);
        tier.insert("oldest".to_string(), aged(1, 500));
        tier.insert("old".to_string(), aged(2, 400));
        for (i, key) in ["c", "d", "e"].iter().enumerate() {
            tier.insert(key.to_string(), aged(i as i64 + 3, 100));
        }

        tier.insert("new".to_string(), fresh(6));

        // ceil(5 / 5) = 1: only the single oldest entry goes.
        assert_eq!(tier.get("oldest", Utc::now()), None);
        assert_eq!(tier.get("old", Utc::now()), Some(json!(2)));
        assert_eq!(tier.get("new", Utc::now()), Some(json!(6)));
    }

    #[test]
    fn test_overwrite_existing_key_skips_eviction() {
        let tier = MemoryTier::new(2);
        tier.insert("a".to_string(), fresh(1));
        tier.insert("b".to_string(), fresh(2));

        tier.insert("a".to_string(), fresh(10));

        assert_eq!(tier.len(), 2);
        assert_eq!(tier.get("a", Utc::now()), Some(json!(10)));
        assert_eq!(tier.get("b", Utc::now()), Some(json!(2)));
    }

    #[test]
    fn test_remove_prefix_counts() {
        let tier = MemoryTier::new(10);
        tier.insert("photo:a".to_string(), fresh(1));
        tier.insert("photo:b".to_string(), fresh(2));
        tier.insert("roster:a".to_string(), fresh(3));

        assert_eq!(tier.remove_prefix("photo:"), 2);
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_purge_expired_counts() {
        let tier = MemoryTier::new(10);
        tier.insert("a".to_string(), expired(1));
        tier.insert("b".to_string(), expired(2));
        tier.insert("c".to_string(), fresh(3));

        assert_eq!(tier.purge_expired(Utc::now()), 2);
        assert_eq!(tier.len(), 1);
    }
}
