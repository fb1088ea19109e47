//! munin: memoization for asynchronous operations.
//!
//! Wraps an async, key-addressable operation (a network call, a database
//! lookup) into a callable that provides:
//! - TTL caching of completed results
//! - In-flight deduplication: concurrent calls for the same key collapse
//!   onto a single invocation and observe the same resolution
//! - Optional stale-while-revalidate: expired values are served immediately
//!   while a background refresh runs
//! - A recurring cleanup sweep that removes expired entries and stops
//!   itself once storage is empty
//! - Usage counters reported to a caller-supplied sink
//!
//! The storage backend is pluggable through the [`ItemStorage`] trait;
//! [`MemoryStorage`] is the default.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use munin::{CacheOptions, CachedFn};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let square = CachedFn::new(
//!     |x: u32| async move { Ok::<_, std::io::Error>(x * x) },
//!     CacheOptions::default().ttl(Duration::from_secs(60)),
//! );
//!
//! assert_eq!(square.call(2).await.unwrap(), 4); // invokes the operation
//! assert_eq!(square.call(2).await.unwrap(), 4); // served from the cache
//! assert!(square.delete(&2));                   // manual invalidation
//! # }
//! ```

pub mod cache;
pub mod entry;
pub mod options;
pub mod stats;
pub mod storage;

pub use cache::CachedFn;
pub use entry::CacheEntry;
pub use options::{default_cache_key, CacheOptions, KeyFn};
pub use stats::{CacheStats, StatsFn};
pub use storage::{ItemStorage, MemoryStorage};
