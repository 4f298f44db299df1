use std::hash::Hash;
use std::sync::Arc;

use crate::cache::{Cache, EvictionListener};
use crate::error::{CacheError, Result};
use crate::weigher::{UnitWeigher, Weigher};

/// Default number of shards and buffer stripes.
const DEFAULT_CONCURRENCY_LEVEL: usize = 16;

/// Largest accepted concurrency level.
const MAX_CONCURRENCY_LEVEL: usize = 1 << 16;

/// Builder for configuring a Cache.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use weighted_lru::{Cache, CacheBuilder};
///
/// let cache: Cache<String, Vec<u8>, _> = CacheBuilder::new(64 * 1024) // 64 KiB
///     .weigher(|value: &Vec<u8>| value.len() as u64)
///     .concurrency_level(32)
///     .eviction_listener(|key: &String, _value: Arc<Vec<u8>>| {
///         println!("evicted {key}");
///     })
///     .build();
///
/// cache.insert("blob".to_string(), vec![0; 512]).unwrap();
/// ```
pub struct CacheBuilder<K, V, W = UnitWeigher> {
	capacity: u64,
	concurrency_level: usize,
	weigher: W,
	listener: Option<EvictionListener<K, V>>,
}

impl<K, V> CacheBuilder<K, V> {
	/// Create a new builder with the given maximum total weight.
	///
	/// Entries weigh 1 unless a weigher is set, so by default the capacity is an
	/// entry count.
	pub fn new(capacity: u64) -> Self {
		Self {
			capacity,
			concurrency_level: DEFAULT_CONCURRENCY_LEVEL,
			weigher: UnitWeigher,
			listener: None,
		}
	}
}

impl<K, V, W> CacheBuilder<K, V, W> {
	/// Set the number of shards and buffer stripes.
	///
	/// More stripes reduce contention but increase memory overhead.
	/// Will be rounded up to the next power of 2.
	///
	/// Default: 16
	pub fn concurrency_level(mut self, level: usize) -> Self {
		self.concurrency_level = level;
		self
	}

	/// Set how entries are weighed on insert.
	pub fn weigher<W2>(self, weigher: W2) -> CacheBuilder<K, V, W2>
	where
		W2: Weigher<V>,
	{
		CacheBuilder {
			capacity: self.capacity,
			concurrency_level: self.concurrency_level,
			weigher,
			listener: self.listener,
		}
	}

	/// Set a callback for entries evicted by capacity pressure.
	///
	/// The listener runs on whichever thread performed the eviction, after the
	/// maintenance lock is released. It is not called for `remove()`, `clear()`
	/// or replaced values.
	pub fn eviction_listener<F>(mut self, listener: F) -> Self
	where
		F: Fn(&K, Arc<V>) + Send + Sync + 'static,
	{
		self.listener = Some(Arc::new(listener));
		self
	}
}

impl<K, V, W> CacheBuilder<K, V, W>
where
	K: Hash + Eq,
	W: Weigher<V>,
{
	/// Build the cache, validating the configuration.
	///
	/// # Errors
	///
	/// [`CacheError::InvalidArgument`] if the capacity or concurrency level is
	/// zero, or the concurrency level is above 65536.
	pub fn try_build(self) -> Result<Cache<K, V, W>> {
		if self.capacity == 0 {
			return Err(CacheError::InvalidArgument("capacity must be positive"));
		}
		if self.concurrency_level == 0 {
			return Err(CacheError::InvalidArgument("concurrency level must be positive"));
		}
		if self.concurrency_level > MAX_CONCURRENCY_LEVEL {
			return Err(CacheError::InvalidArgument("concurrency level must be at most 65536"));
		}

		let stripes = self.concurrency_level.next_power_of_two();
		Ok(Cache::with_config(self.capacity, stripes, self.weigher, self.listener))
	}

	/// Build the cache with the configured settings.
	///
	/// # Panics
	///
	/// Panics if the configuration is invalid; see [`try_build`](Self::try_build).
	pub fn build(self) -> Cache<K, V, W> {
		match self.try_build() {
			Ok(cache) => cache,
			Err(err) => panic!("invalid cache configuration: {err}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_default() {
		let cache: Cache<u32, u32> = CacheBuilder::new(1024).build();
		assert!(cache.is_empty());
		assert_eq!(cache.capacity(), 1024);
		assert_eq!(cache.shard_count(), DEFAULT_CONCURRENCY_LEVEL);
	}

	#[test]
	fn test_builder_rounds_concurrency_level() {
		let cache: Cache<u32, u32> = CacheBuilder::new(1024).concurrency_level(20).build();
		assert_eq!(cache.shard_count(), 32);
	}

	#[test]
	fn test_builder_with_weigher() {
		let cache = CacheBuilder::<&str, u64>::new(10).weigher(|value: &u64| *value).build();
		cache.insert("a", 6).unwrap();
		cache.drain_buffers();
		assert_eq!(cache.weighted_size(), 6);
	}

	#[test]
	fn test_try_build_rejects_zero_capacity() {
		let result = CacheBuilder::<u32, u32>::new(0).try_build();
		assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
	}

	#[test]
	fn test_try_build_rejects_bad_concurrency() {
		let zero = CacheBuilder::<u32, u32>::new(8).concurrency_level(0).try_build();
		assert!(matches!(zero, Err(CacheError::InvalidArgument(_))));

		let huge = CacheBuilder::<u32, u32>::new(8).concurrency_level(usize::MAX).try_build();
		assert!(matches!(huge, Err(CacheError::InvalidArgument(_))));
	}

	#[test]
	#[should_panic(expected = "capacity must be positive")]
	fn test_build_panics_on_invalid() {
		CacheBuilder::<u32, u32>::new(0).build();
	}
}
