//! Multi-threaded stress tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use weighted_lru::{Cache, CacheBuilder};

const THREADS: usize = 8;

#[test]
fn test_concurrent_inserts_respect_capacity() {
	let cache = Arc::new(Cache::new(100));
	let barrier = Arc::new(Barrier::new(THREADS));

	let handles: Vec<_> = (0..THREADS)
		.map(|t| {
			let cache = Arc::clone(&cache);
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				for i in 0..2_000u64 {
					cache.insert(t as u64 * 1_000_000 + i, i).unwrap();
				}
			})
		})
		.collect();

	for handle in handles {
		handle.join().unwrap();
	}
	cache.drain_buffers();

	assert_eq!(cache.len(), 100);
	assert_eq!(cache.weighted_size(), 100);
	assert_eq!(cache.iter().count(), 100);
}

#[test]
fn test_inserts_balance_with_evictions() {
	let evicted = Arc::new(AtomicU64::new(0));
	let counter = Arc::clone(&evicted);
	let cache = Arc::new(
		CacheBuilder::new(64)
			.eviction_listener(move |_: &u64, _: Arc<u64>| {
				counter.fetch_add(1, Ordering::Relaxed);
			})
			.build(),
	);

	let per_thread = 5_000u64;
	let handles: Vec<_> = (0..THREADS as u64)
		.map(|t| {
			let cache = Arc::clone(&cache);
			thread::spawn(move || {
				for i in 0..per_thread {
					// Distinct keys per thread: every insert adds a new entry
					cache.insert(t * per_thread + i, i).unwrap();
				}
			})
		})
		.collect();

	for handle in handles {
		handle.join().unwrap();
	}
	cache.drain_buffers();

	let inserted = THREADS as u64 * per_thread;
	assert_eq!(inserted, cache.len() as u64 + evicted.load(Ordering::Relaxed));
	assert!(cache.weighted_size() <= cache.capacity());
}

#[test]
fn test_mixed_workload_stays_consistent() {
	let cache: Arc<Cache<u64, u64, _>> = Arc::new(
		CacheBuilder::new(500).weigher(|value: &u64| value % 5).concurrency_level(4).build(),
	);
	let barrier = Arc::new(Barrier::new(THREADS));

	let handles: Vec<_> = (0..THREADS as u64)
		.map(|t| {
			let cache = Arc::clone(&cache);
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				let mut state = t.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
				for _ in 0..20_000 {
					// xorshift
					state ^= state << 13;
					state ^= state >> 7;
					state ^= state << 17;
					let key = state % 1_000;
					match state % 10 {
						0..=4 => {
							let _ = cache.get(&key);
						}
						5..=7 => {
							cache.insert(key, state).unwrap();
						}
						8 => {
							cache.remove(&key);
						}
						_ => {
							let _ = cache.insert_if_absent(key, state);
						}
					}
				}
			})
		})
		.collect();

	for handle in handles {
		handle.join().unwrap();
	}
	cache.drain_buffers();

	assert!(cache.weighted_size() <= cache.capacity());
	let expected: u64 = cache.iter().map(|(_, value)| *value % 5).sum();
	assert_eq!(cache.weighted_size(), expected);
	assert_eq!(cache.iter().count(), cache.len());
	assert_eq!(cache.ascending_keys(usize::MAX).len(), cache.len());
}

#[test]
fn test_removed_keys_stay_removed() {
	let cache = Arc::new(Cache::new(10_000));
	for i in 0..1_000u64 {
		cache.insert(i, i).unwrap();
	}

	let handles: Vec<_> = (0..4u64)
		.map(|t| {
			let cache = Arc::clone(&cache);
			thread::spawn(move || {
				for i in (t..1_000).step_by(4) {
					assert_eq!(cache.remove(&i).as_deref(), Some(&i));
				}
			})
		})
		.collect();

	for handle in handles {
		handle.join().unwrap();
	}
	cache.drain_buffers();

	assert!(cache.is_empty());
	assert_eq!(cache.weighted_size(), 0);
	assert!(cache.ascending_keys(usize::MAX).is_empty());
}

#[test]
fn test_clear_during_writes() {
	let cache = Arc::new(Cache::new(1_000));
	let writers: Vec<_> = (0..4u64)
		.map(|t| {
			let cache = Arc::clone(&cache);
			thread::spawn(move || {
				for i in 0..5_000 {
					cache.insert(t * 10_000 + i % 700, i).unwrap();
				}
			})
		})
		.collect();

	for _ in 0..20 {
		cache.clear();
		thread::yield_now();
	}

	for handle in writers {
		handle.join().unwrap();
	}
	cache.drain_buffers();

	assert_eq!(cache.weighted_size(), cache.len() as u64);
	assert_eq!(cache.ascending_keys(usize::MAX).len(), cache.len());
	assert!(cache.len() <= 1_000);
}

#[cfg(feature = "metrics")]
#[test]
fn test_metrics_account_for_every_insert() {
	let cache = Arc::new(Cache::new(32));
	let handles: Vec<_> = (0..THREADS as u64)
		.map(|t| {
			let cache = Arc::clone(&cache);
			thread::spawn(move || {
				for i in 0..1_000u64 {
					cache.insert((t << 32) | i, i).unwrap();
				}
			})
		})
		.collect();

	for handle in handles {
		handle.join().unwrap();
	}
	cache.drain_buffers();

	let metrics = cache.metrics();
	assert_eq!(metrics.inserts, THREADS as u64 * 1_000);
	assert_eq!(metrics.inserts, metrics.entry_count as u64 + metrics.evictions);
}
