//! Usage counters for a cache instance.

use std::sync::Arc;

/// Cumulative usage counters for one cache instance.
///
/// Counters only ever increase; there is no windowing and no reset. A fresh
/// snapshot is handed to the configured stats sink after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls served from a stored value, fresh or stale.
    pub value_hits: u64,
    /// Calls that joined an in-flight invocation instead of starting one.
    pub pending_hits: u64,
    /// Calls that had to invoke the wrapped operation.
    pub misses: u64,
    /// Results committed to storage.
    pub puts: u64,
}

/// The classified events the engine records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatKind {
    ValueHit,
    PendingHit,
    Miss,
    Put,
}

impl CacheStats {
    /// Bump the counter for `kind` and return a snapshot for the sink.
    pub(crate) fn record(&mut self, kind: StatKind) -> CacheStats {
        match kind {
            StatKind::ValueHit => self.value_hits += 1,
            StatKind::PendingHit => self.pending_hits += 1,
            StatKind::Miss => self.misses += 1,
            StatKind::Put => self.puts += 1,
        }
        *self
    }
}

/// Callback receiving a counter snapshot after every change.
///
/// The sink is called synchronously and must not call back into the cache
/// it observes.
pub type StatsFn = Arc<dyn Fn(CacheStats) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_increments_one_counter() {
        let mut stats = CacheStats::default();

        let snapshot = stats.record(StatKind::Miss);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.value_hits, 0);
        assert_eq!(snapshot.pending_hits, 0);
        assert_eq!(snapshot.puts, 0);

        let snapshot = stats.record(StatKind::Put);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.puts, 1);
    }

    #[test]
    fn test_counters_are_cumulative() {
        let mut stats = CacheStats::default();
        for _ in 0..3 {
            stats.record(StatKind::ValueHit);
        }
        stats.record(StatKind::PendingHit);

        assert_eq!(
            stats,
            CacheStats {
                value_hits: 3,
                pending_hits: 1,
                misses: 0,
                puts: 0,
            }
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut stats = CacheStats::default();
        let snapshot = stats.record(StatKind::Miss);
        stats.record(StatKind::Miss);

        assert_eq!(snapshot.misses, 1);
        assert_eq!(stats.misses, 2);
    }
}
