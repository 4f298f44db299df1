//! # Weighted LRU
//!
//! A bounded, concurrent, in-memory map with least-recently-used eviction:
//! - **Weight-bounded capacity**: each entry has a weight and the total is kept
//!   at or below a configured capacity
//! - **LRU eviction** in approximate recency order
//! - **Non-blocking reads** via a sharded hash table and buffered access records
//! - **Amortized maintenance**: one thread at a time replays buffered
//!   operations onto the recency list, others never wait for it
//!
//! ## Quick Start
//!
//! ```rust
//! use weighted_lru::{Cache, CacheBuilder};
//!
//! // Capacity counts entries by default
//! let cache = Cache::new(1000);
//! cache.insert("alice", 42).unwrap();
//! assert_eq!(cache.get("alice").as_deref(), Some(&42));
//!
//! // Or bound by bytes with a weigher
//! let bytes: Cache<u64, String, _> = CacheBuilder::new(1024 * 1024)
//!     .weigher(|value: &String| value.len() as u64)
//!     .build();
//! bytes.insert(1, "x".repeat(100)).unwrap();
//! ```
//!
//! ## Consistency
//!
//! `get`, `insert` and `remove` are linearizable per key: they act on the hash
//! table directly. The recency list and weighted size are updated lazily by the
//! drainer, so:
//!
//! - `weighted_size()` may briefly exceed `capacity()` after a write, and
//!   settles within one drain;
//! - eviction order reflects accesses in approximately the order they happened,
//!   and under heavy read load some accesses may be dropped.
//!
//! Call [`Cache::drain_buffers`] to force the settled state, e.g. in tests.
//!
//! ## Async Usage
//!
//! The cache is safe to use in async contexts. No lock is ever held once a
//! method returns, and values come back as `Arc<V>`:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! async fn render(cache: Arc<Cache<UserId, Profile>>, user_id: UserId) {
//!     if let Some(profile) = cache.get(&user_id) {
//!         // Can safely await while holding the Arc
//!         expensive_async_operation(&profile).await;
//!     }
//! }
//! ```
//!
//! ## Thread Safety
//!
//! The cache is `Send + Sync` and can be shared across threads via `Arc`:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use weighted_lru::Cache;
//!
//! let cache = Arc::new(Cache::new(1024));
//!
//! let handles: Vec<_> = (0..4u64)
//!     .map(|i| {
//!         let cache = cache.clone();
//!         thread::spawn(move || {
//!             cache.insert(i, i * 10).unwrap();
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.len(), 4);
//! ```

mod buffer;
mod builder;
mod cache;
mod drain;
mod error;
mod iter;
#[cfg(feature = "metrics")]
mod metrics;
mod node;
mod recency;
mod shard;
mod weigher;

pub use builder::CacheBuilder;
pub use cache::{Cache, EvictionListener};
pub use deepsize::DeepSizeOf;
pub use error::{CacheError, Result};
pub use iter::Iter;
#[cfg(feature = "metrics")]
pub use metrics::CacheMetrics;
pub use weigher::{DeepSizeWeigher, UnitWeigher, Weigher};
