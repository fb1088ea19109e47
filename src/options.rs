//! Configuration for a cached function.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::stats::{CacheStats, StatsFn};
use crate::storage::{ItemStorage, MemoryStorage};

/// Default TTL: unbounded, entries never expire.
pub(crate) const DEFAULT_TTL: Duration = Duration::MAX;
/// Default cleanup sweep interval: 10 seconds.
pub(crate) const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10);
/// Default diagnostic label.
pub(crate) const DEFAULT_DISPLAY_NAME: &str = "<fn>";

/// Derives a cache key from a call's arguments.
pub type KeyFn<Args> = Arc<dyn Fn(&Args) -> String + Send + Sync>;

/// Default key derivation: structural JSON serialization of the arguments.
///
/// Deterministic for any `Serialize` value; a tuple of arguments serializes
/// as a JSON array, so `(2, "a")` becomes `[2,"a"]`.
///
/// # Panics
///
/// Panics if the arguments fail to serialize (for example a map with
/// non-string keys). Supply a custom key function for such argument types.
pub fn default_cache_key<Args: Serialize>(args: &Args) -> String {
    serde_json::to_string(args).expect("cache key arguments failed to serialize as JSON")
}

/// Configuration for a [`CachedFn`](crate::CachedFn).
///
/// ```
/// use std::time::Duration;
/// use munin::CacheOptions;
///
/// let options: CacheOptions<u64, String> = CacheOptions::default()
///     .ttl(Duration::from_secs(300))
///     .stale_while_revalidate(true)
///     .display_name("user-profile");
/// ```
pub struct CacheOptions<Args, T> {
    pub(crate) ttl: Duration,
    pub(crate) stale_while_revalidate: bool,
    pub(crate) cleanup_interval: Duration,
    pub(crate) cache_key_fn: KeyFn<Args>,
    pub(crate) cache_map: Box<dyn ItemStorage<T>>,
    pub(crate) stats_fn: StatsFn,
    pub(crate) debug: bool,
    pub(crate) display_name: String,
}

impl<Args, T: Send + 'static> CacheOptions<Args, T> {
    fn with_key(cache_key_fn: KeyFn<Args>) -> Self {
        Self {
            ttl: DEFAULT_TTL,
            stale_while_revalidate: false,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            cache_key_fn,
            cache_map: Box::new(MemoryStorage::new()),
            stats_fn: Arc::new(|_: CacheStats| {}),
            debug: false,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
        }
    }

    /// Options for an argument type without a `Serialize` implementation,
    /// keyed by a custom derivation function.
    pub fn with_key_fn(f: impl Fn(&Args) -> String + Send + Sync + 'static) -> Self {
        Self::with_key(Arc::new(f))
    }

    /// Maximum age before a stored result counts as expired.
    ///
    /// A zero TTL disables persisting results entirely; overlapping calls
    /// are still collapsed onto the outstanding invocation.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Serve expired entries immediately and refresh them in the background
    /// instead of blocking the caller on a new invocation.
    pub fn stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }

    /// How often the background sweep removes expired entries.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "cleanup interval must be positive");
        self.cleanup_interval = interval;
        self
    }

    /// Replace the key derivation function.
    ///
    /// The function may project a subset of the arguments (for example key
    /// off an id field only) to collapse semantically equivalent calls onto
    /// one entry.
    pub fn cache_key_fn(mut self, f: impl Fn(&Args) -> String + Send + Sync + 'static) -> Self {
        self.cache_key_fn = Arc::new(f);
        self
    }

    /// Replace the storage backend.
    pub fn cache_map(mut self, storage: impl ItemStorage<T> + 'static) -> Self {
        self.cache_map = Box::new(storage);
        self
    }

    /// Receive a counter snapshot after every recorded event.
    pub fn stats_fn(mut self, f: impl Fn(CacheStats) + Send + Sync + 'static) -> Self {
        self.stats_fn = Arc::new(f);
        self
    }

    /// Emit per-call diagnostics through `tracing`.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Label used in diagnostics.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

impl<Args: Serialize, T: Send + 'static> Default for CacheOptions<Args, T> {
    fn default() -> Self {
        Self::with_key(Arc::new(|args: &Args| default_cache_key(args)))
    }
}
