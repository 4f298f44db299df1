//! Cache performance metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache counters.
///
/// Counters are updated with relaxed atomics, so a snapshot taken under
/// concurrent load is approximate.
///
/// # Example
///
/// ```
/// use weighted_lru::Cache;
///
/// let cache = Cache::<u64, u64>::new(1024);
/// cache.insert(1, 10).unwrap();
/// let _ = cache.get(&1);
/// let _ = cache.get(&2);
///
/// let metrics = cache.metrics();
/// assert_eq!(metrics.hits, 1);
/// assert_eq!(metrics.misses, 1);
/// println!("Hit rate: {:.2}%", metrics.hit_rate() * 100.0);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
	/// Lookups that found a value.
	pub hits: u64,
	/// Lookups that found nothing.
	pub misses: u64,
	/// New keys inserted.
	pub inserts: u64,
	/// Existing keys whose value was replaced.
	pub updates: u64,
	/// Entries removed by capacity pressure.
	pub evictions: u64,
	/// Entries removed via `remove()`.
	pub removals: u64,
	/// Inserts rejected because the entry alone exceeds capacity.
	pub rejections: u64,
	/// Completed drain passes.
	pub drains: u64,
	/// Tracked weight as of the last drain.
	pub weighted_size: u64,
	/// Maximum weighted capacity.
	pub capacity: u64,
	/// Entries currently in the hash table.
	pub entry_count: usize,
}

impl CacheMetrics {
	/// Hits over total lookups, or 0.0 before any lookup.
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses;
		if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
	}

	/// Weighted size over capacity.
	pub fn utilization(&self) -> f64 {
		if self.capacity == 0 {
			0.0
		} else {
			self.weighted_size as f64 / self.capacity as f64
		}
	}

	/// Hits plus misses.
	pub fn total_accesses(&self) -> u64 {
		self.hits + self.misses
	}

	/// Inserts plus updates.
	pub fn total_writes(&self) -> u64 {
		self.inserts + self.updates
	}
}

/// Live counters owned by a cache.
#[derive(Default)]
pub(crate) struct Counters {
	pub hits: AtomicU64,
	pub misses: AtomicU64,
	pub inserts: AtomicU64,
	pub updates: AtomicU64,
	pub evictions: AtomicU64,
	pub removals: AtomicU64,
	pub rejections: AtomicU64,
	pub drains: AtomicU64,
}

impl Counters {
	#[inline]
	pub fn bump(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}

	#[inline]
	pub fn add(counter: &AtomicU64, n: u64) {
		counter.fetch_add(n, Ordering::Relaxed);
	}

	pub fn snapshot(&self, weighted_size: u64, capacity: u64, entry_count: usize) -> CacheMetrics {
		CacheMetrics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			inserts: self.inserts.load(Ordering::Relaxed),
			updates: self.updates.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			removals: self.removals.load(Ordering::Relaxed),
			rejections: self.rejections.load(Ordering::Relaxed),
			drains: self.drains.load(Ordering::Relaxed),
			weighted_size,
			capacity,
			entry_count,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hit_rate() {
		let metrics = CacheMetrics {
			hits: 3,
			misses: 1,
			..Default::default()
		};
		assert!((metrics.hit_rate() - 0.75).abs() < f64::EPSILON);
		assert_eq!(metrics.total_accesses(), 4);
		assert_eq!(CacheMetrics::default().hit_rate(), 0.0);
	}

	#[test]
	fn test_utilization() {
		let metrics = CacheMetrics {
			weighted_size: 5,
			capacity: 10,
			..Default::default()
		};
		assert!((metrics.utilization() - 0.5).abs() < f64::EPSILON);
		assert_eq!(CacheMetrics::default().utilization(), 0.0);
	}

	#[test]
	fn test_counters_snapshot() {
		let counters = Counters::default();
		Counters::bump(&counters.hits);
		Counters::add(&counters.evictions, 3);

		let metrics = counters.snapshot(7, 10, 2);
		assert_eq!(metrics.hits, 1);
		assert_eq!(metrics.evictions, 3);
		assert_eq!(metrics.weighted_size, 7);
		assert_eq!(metrics.capacity, 10);
		assert_eq!(metrics.entry_count, 2);
		assert_eq!(metrics.total_writes(), 0);
	}
}
