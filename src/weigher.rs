use deepsize::DeepSizeOf;

/// Maps a cached value to its capacity cost.
///
/// Weights are plain `u64`s, so a negative weight cannot be expressed. A weight of
/// zero is allowed and makes the entry free with respect to capacity, though it
/// still participates in recency ordering.
///
/// Any `Fn(&V) -> u64 + Send + Sync` closure is a weigher:
///
/// ```
/// use weighted_lru::{Cache, CacheBuilder};
///
/// let cache: Cache<u32, String, _> = CacheBuilder::new(1024)
///     .weigher(|value: &String| value.len() as u64)
///     .build();
/// cache.insert(1, "hello".to_string()).unwrap();
/// cache.drain_buffers();
/// assert_eq!(cache.weighted_size(), 5);
/// ```
pub trait Weigher<V>: Send + Sync {
	/// The weight of `value`. Must be stable for the lifetime of the entry.
	fn weigh(&self, value: &V) -> u64;
}

/// Every entry weighs 1, so capacity counts entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitWeigher;

impl<V> Weigher<V> for UnitWeigher {
	#[inline]
	fn weigh(&self, _value: &V) -> u64 {
		1
	}
}

/// Weighs a value by its deep heap footprint in bytes.
///
/// Use this for caches bounded by memory rather than entry count.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepSizeWeigher;

impl<V: DeepSizeOf> Weigher<V> for DeepSizeWeigher {
	#[inline]
	fn weigh(&self, value: &V) -> u64 {
		value.deep_size_of() as u64
	}
}

impl<V, F> Weigher<V> for F
where
	F: Fn(&V) -> u64 + Send + Sync,
{
	#[inline]
	fn weigh(&self, value: &V) -> u64 {
		self(value)
	}
}
