//! Cache entries and the expiration policy applied to them.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value together with the time it was produced.
///
/// Entries are immutable once stored: a refresh replaces the whole entry,
/// it never mutates one in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// When the value was stored.
    pub stored_at: Instant,
    /// The cached value.
    pub data: T,
}

impl<T> CacheEntry<T> {
    /// Create an entry stamped with `stored_at`.
    pub fn new(data: T, stored_at: Instant) -> Self {
        Self { stored_at, data }
    }

    /// Age of the entry at `now`.
    ///
    /// An entry stamped in the future (clock skew, or a test-controlled
    /// clock) has age zero, so it can never be reported as expired.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// Whether the entry has outlived `ttl` at `now`.
    ///
    /// Strictly greater-than: an entry exactly at the TTL boundary is
    /// still fresh.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) > ttl
    }
}
