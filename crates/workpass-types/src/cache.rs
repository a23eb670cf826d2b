//! Cache entry type shared by the volatile and durable cache tiers.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single cached step result with its expiry window.
///
/// Entries are immutable once created: `set` on the cache overwrites the
/// whole entry rather than merging. Both tiers store this same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Arbitrary JSON-serializable step result.
    pub value: serde_json::Value,
    /// When the entry was created (eviction orders by this).
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served. Expired entries are treated as
    /// absent and lazily purged.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry valid for `ttl` starting now.
    pub fn fresh(value: serde_json::Value, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            value,
            created_at: now,
            expires_at: expiry(now, ttl),
        }
    }

    /// Whether the entry has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Compute `now + ttl`, saturating at the maximum representable timestamp
/// for pathological TTLs.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    ChronoDuration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
