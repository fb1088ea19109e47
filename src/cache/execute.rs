//! Execution tracking for cache misses and background revalidation.

use std::fmt::Display;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::entry::CacheEntry;
use crate::stats::StatKind;

use super::{cleanup, CacheInner, CachedFn, SharedInvocation};

/// Start the wrapped operation for `key` and register it in the in-flight
/// map, so overlapping calls join it instead of invoking again.
///
/// A detached task drives the invocation to completion, which means the
/// result is committed (and the in-flight marker removed) even if every
/// caller drops its handle mid-flight. On success with a nonzero TTL the
/// result replaces whatever entry was stored for the key; on failure
/// nothing is written and the shared error reaches every joined caller.
pub(super) fn begin<Args, T, E>(
    cached: &CachedFn<Args, T, E>,
    inner: &mut CacheInner<T, E>,
    key: String,
    args: Args,
) -> SharedInvocation<T, E>
where
    Args: 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let operation = (cached.op)(args);
    let state = Arc::clone(&cached.state);
    let settings = Arc::clone(&cached.settings);

    let invocation: SharedInvocation<T, E> = {
        let key = key.clone();
        async move {
            let result = operation.await;

            let snapshot = {
                let mut inner = state.lock();
                let snapshot = match &result {
                    Ok(value) if !settings.ttl.is_zero() => {
                        if settings.debug {
                            debug!(
                                cache = %settings.display_name,
                                cache_key = %key,
                                "Storing result"
                            );
                        }
                        inner
                            .storage
                            .set(key.clone(), CacheEntry::new(value.clone(), Instant::now()));
                        let snapshot = inner.stats.record(StatKind::Put);
                        cleanup::start(&state, &settings, &mut inner);
                        Some(snapshot)
                    }
                    _ => None,
                };
                inner.in_flight.remove(&key);
                snapshot
            };
            if let Some(snapshot) = snapshot {
                (settings.stats_fn)(snapshot);
            }

            result.map_err(Arc::new)
        }
        .boxed()
        .shared()
    };

    inner.in_flight.insert(key, invocation.clone());

    // Detached driver: the operation runs to completion no matter what the
    // callers do with their handles.
    tokio::spawn(invocation.clone());

    invocation
}

/// Start a fire-and-forget refresh for `key`.
///
/// The caller keeps serving the stale value. A failed refresh is logged and
/// discarded; it does not evict the entry it was trying to replace.
pub(super) fn revalidate<Args, T, E>(
    cached: &CachedFn<Args, T, E>,
    inner: &mut CacheInner<T, E>,
    key: String,
    args: Args,
) where
    Args: 'static,
    T: Clone + Send + Sync + 'static,
    E: Display + Send + Sync + 'static,
{
    let invocation = begin(cached, inner, key.clone(), args);
    let settings = Arc::clone(&cached.settings);

    tokio::spawn(async move {
        if let Err(err) = invocation.await {
            error!(
                cache = %settings.display_name,
                cache_key = %key,
                error = %err,
                "Background revalidation failed"
            );
        }
    });
}
