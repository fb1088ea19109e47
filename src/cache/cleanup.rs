//! Scheduled removal of expired entries.
//!
//! The sweeper is a two-state machine: idle (no task) and running (a
//! recurring task firing every cleanup interval). The first committed
//! result starts it, a sweep that leaves storage empty stops it. With
//! stale-while-revalidate enabled it never runs at all: expired entries are
//! served stale and must stay available until a refresh replaces them.

use std::sync::Arc;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use super::{CacheInner, CacheState, Settings};

/// Start the recurring sweep for this cache instance.
///
/// No-op when the sweeper is already running or when stale-while-revalidate
/// is enabled.
pub(super) fn start<Args, T, E>(
    state: &Arc<CacheState<T, E>>,
    settings: &Arc<Settings<Args>>,
    inner: &mut CacheInner<T, E>,
) where
    Args: 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    if inner.cleanup_task.is_some() || settings.stale_while_revalidate {
        return;
    }
    if settings.debug {
        debug!(
            cache = %settings.display_name,
            interval = ?settings.cleanup_interval,
            "Starting cleanup task"
        );
    }

    let state = Arc::clone(state);
    let settings = Arc::clone(settings);
    inner.cleanup_task = Some(tokio::spawn(async move {
        let mut ticker = interval(settings.cleanup_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if sweep(&state, &settings) {
                break;
            }
        }
    }));
}

/// Stop the sweeper if it is running. No-op when idle.
pub(super) fn stop<T, E>(inner: &mut CacheInner<T, E>) {
    if let Some(task) = inner.cleanup_task.take() {
        task.abort();
    }
}

/// One pass: delete every expired entry. Returns `true` once storage is
/// empty and the task should wind down.
fn sweep<Args, T, E>(state: &Arc<CacheState<T, E>>, settings: &Arc<Settings<Args>>) -> bool {
    let now = Instant::now();
    let mut inner = state.lock();

    let expired: Vec<String> = inner
        .storage
        .entries()
        .filter(|(_, entry)| entry.is_expired(settings.ttl, now))
        .map(|(key, _)| key.to_owned())
        .collect();

    if !expired.is_empty() {
        if settings.debug {
            debug!(
                cache = %settings.display_name,
                removed = expired.len(),
                "Swept expired entries"
            );
        }
        for key in &expired {
            inner.storage.delete(key);
        }
    }

    if inner.storage.is_empty() {
        if settings.debug {
            debug!(
                cache = %settings.display_name,
                "Storage empty, stopping cleanup task"
            );
        }
        // Dropping our own handle detaches the task; it unwinds right after.
        inner.cleanup_task = None;
        return true;
    }
    false
}
