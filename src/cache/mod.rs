//! The memoization engine: per-instance cache state and call dispatch.
//!
//! Every call runs the same ladder: derive the key, join an in-flight
//! invocation if one exists, otherwise serve a stored fresh value, otherwise
//! (with stale-while-revalidate) serve the stale value and refresh in the
//! background, otherwise drop the expired entry and invoke anew.

mod cleanup;
mod execute;

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::options::{CacheOptions, KeyFn};
use crate::stats::{CacheStats, StatKind, StatsFn};
use crate::storage::ItemStorage;

/// The boxed operation being memoized.
type Operation<Args, T, E> = dyn Fn(Args) -> BoxFuture<'static, Result<T, E>> + Send + Sync;

/// One deduplicated invocation. Every caller for the key polls a clone of
/// the same underlying future and observes the same resolution.
type SharedInvocation<T, E> = Shared<BoxFuture<'static, Result<T, Arc<E>>>>;

/// Immutable per-instance settings, shared with background tasks.
struct Settings<Args> {
    ttl: Duration,
    stale_while_revalidate: bool,
    cleanup_interval: Duration,
    cache_key_fn: KeyFn<Args>,
    stats_fn: StatsFn,
    debug: bool,
    display_name: String,
}

/// Mutable per-instance state.
///
/// All four fields change together at synchronous points under one lock;
/// the lock is never held across an await.
struct CacheInner<T, E> {
    storage: Box<dyn ItemStorage<T>>,
    in_flight: HashMap<String, SharedInvocation<T, E>>,
    stats: CacheStats,
    cleanup_task: Option<JoinHandle<()>>,
}

struct CacheState<T, E> {
    inner: Mutex<CacheInner<T, E>>,
}

impl<T, E> CacheState<T, E> {
    fn lock(&self) -> MutexGuard<'_, CacheInner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a call is served once dispatch has classified it.
enum Dispatch<T, E> {
    /// A stored value, fresh or stale; the operation is not involved.
    Value(T),
    /// A new or joined invocation to await.
    Join(SharedInvocation<T, E>),
}

/// An asynchronous operation wrapped with memoization.
///
/// Completed results are cached for the configured TTL, concurrent calls
/// for the same key collapse onto a single invocation, and expired entries
/// can be served stale while a background refresh runs.
///
/// Each instance exclusively owns its cache state; two instances never share
/// entries unless they are given a shared storage backend, in which case
/// cross-instance consistency is the backend's concern.
pub struct CachedFn<Args, T, E> {
    op: Arc<Operation<Args, T, E>>,
    settings: Arc<Settings<Args>>,
    state: Arc<CacheState<T, E>>,
}

impl<Args, T, E> CachedFn<Args, T, E>
where
    Args: 'static,
    T: Clone + Send + Sync + 'static,
    E: Display + Send + Sync + 'static,
{
    /// Wrap `op` with the given configuration.
    pub fn new<F, Fut>(op: F, options: CacheOptions<Args, T>) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let CacheOptions {
            ttl,
            stale_while_revalidate,
            cleanup_interval,
            cache_key_fn,
            cache_map,
            stats_fn,
            debug,
            display_name,
        } = options;

        Self {
            op: Arc::new(move |args: Args| op(args).boxed()),
            settings: Arc::new(Settings {
                ttl,
                stale_while_revalidate,
                cleanup_interval,
                cache_key_fn,
                stats_fn,
                debug,
                display_name,
            }),
            state: Arc::new(CacheState {
                inner: Mutex::new(CacheInner {
                    storage: cache_map,
                    in_flight: HashMap::new(),
                    stats: CacheStats::default(),
                    cleanup_task: None,
                }),
            }),
        }
    }

    /// Invoke the wrapped operation through the cache.
    ///
    /// Failures are shared: every caller collapsed onto the same invocation
    /// observes the same `Arc`-wrapped error, and nothing is stored. A
    /// failed background refresh is logged and discarded instead.
    pub async fn call(&self, args: Args) -> Result<T, Arc<E>> {
        let key = (self.settings.cache_key_fn)(&args);
        let now = Instant::now();

        let (outcome, snapshot) = {
            let mut inner = self.state.lock();
            self.dispatch(&mut inner, key, args, now)
        };
        (self.settings.stats_fn)(snapshot);

        match outcome {
            Dispatch::Value(value) => Ok(value),
            Dispatch::Join(invocation) => invocation.await,
        }
    }

    /// Remove the stored entry for the key derived from `args`.
    ///
    /// Returns whether an entry was present. An in-flight invocation for the
    /// key is left untouched; it settles on its own.
    pub fn delete(&self, args: &Args) -> bool {
        let key = (self.settings.cache_key_fn)(args);
        let removed = self.state.lock().storage.delete(&key);
        if self.settings.debug && removed {
            debug!(
                cache = %self.settings.display_name,
                cache_key = %key,
                "Deleted stored entry"
            );
        }
        removed
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    fn dispatch(
        &self,
        inner: &mut CacheInner<T, E>,
        key: String,
        args: Args,
        now: Instant,
    ) -> (Dispatch<T, E>, CacheStats) {
        let settings = &self.settings;

        // Join an outstanding invocation, unless revalidation is in
        // progress and the stale stored value can be served instead.
        if let Some(pending) = inner.in_flight.get(&key) {
            if !(settings.stale_while_revalidate && inner.storage.has(&key)) {
                if settings.debug {
                    debug!(
                        cache = %settings.display_name,
                        cache_key = %key,
                        "Cache HIT (pending), joining in-flight invocation"
                    );
                }
                let invocation = pending.clone();
                let snapshot = inner.stats.record(StatKind::PendingHit);
                return (Dispatch::Join(invocation), snapshot);
            }
        }

        match inner.storage.get(&key) {
            Some(entry) if !entry.is_expired(settings.ttl, now) => {
                let value = entry.data.clone();
                let age = entry.age(now);
                if settings.debug {
                    debug!(
                        cache = %settings.display_name,
                        cache_key = %key,
                        age_ms = age.as_millis() as u64,
                        "Cache HIT (fresh)"
                    );
                }
                let snapshot = inner.stats.record(StatKind::ValueHit);
                return (Dispatch::Value(value), snapshot);
            }
            Some(entry) if settings.stale_while_revalidate => {
                let value = entry.data.clone();
                let age = entry.age(now);
                if inner.in_flight.contains_key(&key) {
                    if settings.debug {
                        debug!(
                            cache = %settings.display_name,
                            cache_key = %key,
                            age_ms = age.as_millis() as u64,
                            "Cache HIT (stale), refresh already in flight"
                        );
                    }
                } else {
                    if settings.debug {
                        debug!(
                            cache = %settings.display_name,
                            cache_key = %key,
                            age_ms = age.as_millis() as u64,
                            "Cache HIT (stale), triggering background refresh"
                        );
                    }
                    execute::revalidate(self, inner, key, args);
                }
                let snapshot = inner.stats.record(StatKind::ValueHit);
                return (Dispatch::Value(value), snapshot);
            }
            Some(_) => {
                // Expired with revalidation disabled: drop it lazily and
                // fall through to a miss.
                inner.storage.delete(&key);
                if inner.storage.is_empty() {
                    cleanup::stop(inner);
                }
            }
            None => {}
        }

        if settings.debug {
            debug!(
                cache = %settings.display_name,
                cache_key = %key,
                "Cache MISS, invoking operation"
            );
        }
        let snapshot = inner.stats.record(StatKind::Miss);
        let invocation = execute::begin(self, inner, key, args);
        (Dispatch::Join(invocation), snapshot)
    }
}

impl<Args, T, E> Drop for CachedFn<Args, T, E> {
    fn drop(&mut self) {
        cleanup::stop(&mut self.state.lock());
    }
}
