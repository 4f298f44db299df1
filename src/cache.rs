use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use ahash::RandomState;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::buffer::{Buffers, ReadStatus, Record};
use crate::builder::CacheBuilder;
use crate::drain::{DrainOutcome, Policy};
use crate::error::{CacheError, Result};
use crate::iter::Iter;
#[cfg(feature = "metrics")]
use crate::metrics::{CacheMetrics, Counters};
use crate::node::Node;
use crate::shard::Shard;
use crate::weigher::{UnitWeigher, Weigher};

/// Callback invoked with each entry evicted by capacity pressure.
pub type EvictionListener<K, V> = Arc<dyn Fn(&K, Arc<V>) + Send + Sync>;

/// Upper bound on drain passes made by [`Cache::drain_buffers`].
const MAX_DRAIN_PASSES: usize = 4;

/// Thread-safe, weight-bounded LRU cache.
///
/// The cache can be shared across threads via `Arc<Cache>`. All methods are
/// synchronous and never hold a lock across a call into user code other than
/// the weigher.
///
/// # Structure
///
/// - **Hash table**: keys are striped over a power-of-two number of shards, each
///   behind its own `RwLock`. Lookups take a shard read lock, so readers never
///   block each other; writers only contend within a shard.
/// - **Recency list**: a single LRU ordering of every live entry. It is touched
///   only by whichever thread holds the maintenance lock.
/// - **Buffers**: reads and writes append a record to a striped ring buffer
///   instead of reordering the list themselves.
/// - **Drain**: a thread that fills a buffer, or any writer, tries the
///   maintenance lock; if it gets it, it replays the buffered records onto the
///   recency list and evicts from the LRU end until the weight fits. If another
///   thread is already draining it simply returns.
///
/// Visibility of `get`/`insert`/`remove` depends only on the hash table. The
/// drain bounds memory and keeps the ordering faithful, so `weighted_size()` may
/// briefly exceed `capacity()` between a write and the next drain.
///
/// # Example
///
/// ```
/// use weighted_lru::Cache;
///
/// let cache = Cache::new(2);
/// cache.insert("a", 1).unwrap();
/// cache.insert("b", 2).unwrap();
/// let _ = cache.get(&"a");
/// cache.insert("c", 3).unwrap();
/// cache.drain_buffers();
///
/// // "b" was least recently used
/// assert!(cache.get(&"b").is_none());
/// assert_eq!(cache.get(&"a").as_deref(), Some(&1));
/// ```
pub struct Cache<K, V, W = UnitWeigher> {
	/// Sharded hash table, the source of truth for lookups
	shards: Box<[RwLock<Shard<K, V>>]>,
	shard_mask: usize,
	hasher: RandomState,
	/// Pending access and write records
	buffers: Buffers<K, V>,
	/// Recency list and tracked weight; this mutex is the maintenance lock
	policy: Mutex<Policy<K, V>>,
	weigher: W,
	listener: Option<EvictionListener<K, V>>,
	/// Entries in the hash table
	entry_count: AtomicUsize,
	/// Tracked weight published by the last drain
	weighted_size: AtomicU64,
	capacity: AtomicU64,
	#[cfg(feature = "metrics")]
	counters: Counters,
}

impl<K, V> Cache<K, V>
where
	K: Hash + Eq,
{
	/// Create a cache holding at most `capacity` entries.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero. Use [`CacheBuilder::try_build`] to handle
	/// invalid configuration without panicking.
	pub fn new(capacity: u64) -> Self {
		CacheBuilder::new(capacity).build()
	}

	/// Create with a custom concurrency level (shard and buffer stripe count).
	///
	/// Higher levels reduce contention on writes at the cost of memory.
	pub fn with_concurrency_level(capacity: u64, concurrency_level: usize) -> Self {
		CacheBuilder::new(capacity).concurrency_level(concurrency_level).build()
	}
}

impl<K, V, W> Cache<K, V, W>
where
	K: Hash + Eq,
	W: Weigher<V>,
{
	/// Assemble a cache from validated configuration.
	///
	/// `stripes` must be a power of two.
	pub(crate) fn with_config(
		capacity: u64,
		stripes: usize,
		weigher: W,
		listener: Option<EvictionListener<K, V>>,
	) -> Self {
		debug_assert!(capacity > 0 && stripes.is_power_of_two());
		let shards = (0..stripes).map(|_| RwLock::new(Shard::new())).collect();

		Self {
			shards,
			shard_mask: stripes - 1,
			hasher: RandomState::new(),
			buffers: Buffers::new(stripes),
			policy: Mutex::new(Policy::new(capacity)),
			weigher,
			listener,
			entry_count: AtomicUsize::new(0),
			weighted_size: AtomicU64::new(0),
			capacity: AtomicU64::new(capacity),
			#[cfg(feature = "metrics")]
			counters: Counters::default(),
		}
	}

	/// Look up a value, recording the access for recency ordering.
	///
	/// Never blocks on maintenance and never evicts. The access may be reflected
	/// in the LRU order only after a later drain.
	pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let Some(node) = self.find(key) else {
			#[cfg(feature = "metrics")]
			Counters::bump(&self.counters.misses);
			return None;
		};

		#[cfg(feature = "metrics")]
		Counters::bump(&self.counters.hits);

		let value = node.value();
		self.record_read(node);
		Some(value)
	}

	/// Look up a cloned value.
	///
	/// Requires `V: Clone`. Use [`get`](Self::get) if cloning is expensive.
	pub fn get_clone<Q>(&self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
		V: Clone,
	{
		self.get(key).map(|value| (*value).clone())
	}

	/// Look up a value without touching recency order or metrics.
	pub fn peek<Q>(&self, key: &Q) -> Option<Arc<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.find(key).map(|node| node.value())
	}

	/// Check if a key is present without touching recency order.
	pub fn contains<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let hash = self.hash(key);
		self.shard(hash).read().get(hash, key).is_some()
	}

	/// Insert or replace a value, weighing it with the configured weigher.
	///
	/// Returns the previous value if the key existed.
	pub fn insert(&self, key: K, value: V) -> Result<Option<Arc<V>>> {
		let weight = self.weigher.weigh(&value);
		self.insert_with_weight(key, value, weight)
	}

	/// Insert or replace a value with an explicit weight.
	///
	/// Returns the previous value if the key existed.
	///
	/// # Errors
	///
	/// [`CacheError::CapacityImpossible`] if `weight` alone exceeds the
	/// capacity. Nothing changes in that case; an existing value for the key is
	/// left in place.
	pub fn insert_with_weight(&self, key: K, value: V, weight: u64) -> Result<Option<Arc<V>>> {
		self.check_weight(weight)?;

		let hash = self.hash(&key);
		let (record, previous) = {
			let mut shard = self.shard(hash).write();
			match shard.get(hash, &key) {
				Some(node) => {
					let (old, stamp) = node.replace(value);
					let record = Record::Update {
						node: Arc::clone(node),
						weight,
						stamp,
					};
					(record, Some(old))
				}
				None => {
					let node = Arc::new(Node::new(key, hash, value));
					let stamp = node.stamp();
					shard.insert_new(Arc::clone(&node));
					self.entry_count.fetch_add(1, Ordering::Relaxed);
					(
						Record::Add {
							node,
							weight,
							stamp,
						},
						None,
					)
				}
			}
		};

		#[cfg(feature = "metrics")]
		Counters::bump(if previous.is_some() { &self.counters.updates } else { &self.counters.inserts });

		self.record_write(record);
		Ok(previous)
	}

	/// Insert only if the key is absent.
	///
	/// Returns `None` if the value was inserted, or the existing value (which is
	/// recorded as accessed) if the key was already present.
	///
	/// # Errors
	///
	/// [`CacheError::CapacityImpossible`] if the key is absent and `value`
	/// alone exceeds the capacity. The weight of a value that would not be
	/// stored is not checked.
	pub fn insert_if_absent(&self, key: K, value: V) -> Result<Option<Arc<V>>> {
		let hash = self.hash(&key);
		let inserted = {
			let mut shard = self.shard(hash).write();
			if let Some(existing) = shard.get(hash, &key) {
				Err(Arc::clone(existing))
			} else {
				let weight = self.weigher.weigh(&value);
				self.check_weight(weight)?;
				let node = Arc::new(Node::new(key, hash, value));
				let stamp = node.stamp();
				shard.insert_new(Arc::clone(&node));
				self.entry_count.fetch_add(1, Ordering::Relaxed);
				Ok((node, weight, stamp))
			}
		};

		match inserted {
			Ok((node, weight, stamp)) => {
				#[cfg(feature = "metrics")]
				Counters::bump(&self.counters.inserts);
				self.record_write(Record::Add {
					node,
					weight,
					stamp,
				});
				Ok(None)
			}
			Err(existing) => {
				let value = existing.value();
				self.record_read(existing);
				Ok(Some(value))
			}
		}
	}

	/// Remove a key, returning its value.
	///
	/// The key is gone from lookups immediately; its recency node is unlinked
	/// by the next drain. Removing an absent key is a no-op.
	pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let hash = self.hash(key);
		let node = {
			let mut shard = self.shard(hash).write();
			let node = shard.remove(hash, key)?;
			node.retire();
			self.entry_count.fetch_sub(1, Ordering::Relaxed);
			node
		};

		#[cfg(feature = "metrics")]
		Counters::bump(&self.counters.removals);

		let value = node.value();
		self.record_write(Record::Remove(node));
		Some(value)
	}

	/// Number of entries in the hash table.
	pub fn len(&self) -> usize {
		self.entry_count.load(Ordering::Relaxed)
	}

	/// Check if the cache is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Total weight as of the last completed drain.
	pub fn weighted_size(&self) -> u64 {
		self.weighted_size.load(Ordering::Acquire)
	}

	/// Maximum total weight.
	pub fn capacity(&self) -> u64 {
		self.capacity.load(Ordering::Relaxed)
	}

	/// Change the maximum total weight, evicting synchronously if it shrank.
	///
	/// # Errors
	///
	/// [`CacheError::InvalidArgument`] if `capacity` is zero.
	pub fn set_capacity(&self, capacity: u64) -> Result<()> {
		if capacity == 0 {
			return Err(CacheError::InvalidArgument("capacity must be positive"));
		}

		let mut policy = self.policy.lock();
		let previous = policy.capacity();
		policy.set_capacity(capacity);
		self.capacity.store(capacity, Ordering::Relaxed);
		let evicted = self.drain_locked(&mut policy).evicted;
		drop(policy);

		debug!("capacity changed from {previous} to {capacity}, evicted {}", evicted.len());
		self.notify(evicted);
		Ok(())
	}

	/// Remove every entry.
	///
	/// Holds the maintenance lock throughout, so no drain can replay records
	/// for the cleared entries. Entries inserted concurrently into shards that
	/// were already cleared survive and are linked normally.
	pub fn clear(&self) {
		let mut policy = self.policy.lock();

		let mut cleared = 0;
		for shard in self.shards.iter() {
			let mut shard = shard.write();
			let nodes = shard.drain();
			for node in &nodes {
				node.retire();
			}
			self.entry_count.fetch_sub(nodes.len(), Ordering::Relaxed);
			cleared += nodes.len();
		}
		policy.clear();

		// Buffered records for cleared nodes are now inert
		let evicted = self.drain_locked(&mut policy).evicted;
		drop(policy);

		debug!("cleared {cleared} entries");
		self.notify(evicted);
	}

	/// Apply all buffered records and evict down to capacity, blocking for the
	/// maintenance lock.
	///
	/// Ordinary operations drain on their own; call this to observe a settled
	/// state, e.g. before asserting on `weighted_size()`.
	pub fn drain_buffers(&self) {
		let mut evicted = Vec::new();
		{
			let mut policy = self.policy.lock();
			for _ in 0..MAX_DRAIN_PASSES {
				let outcome = self.drain_locked(&mut policy);
				evicted.extend(outcome.evicted);
				if outcome.applied == 0 || self.buffers.pending_writes() == 0 {
					break;
				}
			}
		}
		self.notify(evicted);
	}

	/// Iterate over entries without recording accesses.
	///
	/// The iterator is weakly consistent: it copies one shard at a time, so it
	/// reflects some but not necessarily all concurrent modifications, and never
	/// fails because of them. Call `iter()` again to restart.
	pub fn iter(&self) -> Iter<'_, K, V, W>
	where
		K: Clone,
	{
		Iter::new(self)
	}

	/// Up to `limit` keys ordered from least- to most-recently used.
	///
	/// Drains first, so the order reflects every operation completed before
	/// the call.
	pub fn ascending_keys(&self, limit: usize) -> Vec<K>
	where
		K: Clone,
	{
		self.ordered_keys(|policy| policy.ascending(limit).map(|node| node.key.clone()).collect())
	}

	/// Up to `limit` keys ordered from most- to least-recently used.
	pub fn descending_keys(&self, limit: usize) -> Vec<K>
	where
		K: Clone,
	{
		self.ordered_keys(|policy| policy.descending(limit).map(|node| node.key.clone()).collect())
	}

	/// Get a metrics snapshot.
	#[cfg(feature = "metrics")]
	pub fn metrics(&self) -> CacheMetrics {
		self.counters.snapshot(self.weighted_size(), self.capacity(), self.len())
	}

	/// Number of hash table shards.
	pub(crate) fn shard_count(&self) -> usize {
		self.shards.len()
	}

	/// Copy out the pairs of one shard under its read lock.
	pub(crate) fn snapshot_shard(&self, index: usize) -> Vec<(K, Arc<V>)>
	where
		K: Clone,
	{
		let shard = self.shards[index].read();
		shard.iter().map(|node| (node.key.clone(), node.value())).collect()
	}

	fn ordered_keys<F>(&self, collect: F) -> Vec<K>
	where
		F: FnOnce(&Policy<K, V>) -> Vec<K>,
	{
		let mut policy = self.policy.lock();
		let evicted = self.drain_locked(&mut policy).evicted;
		let keys = collect(&policy);
		drop(policy);
		self.notify(evicted);
		keys
	}

	#[inline]
	fn hash<Q>(&self, key: &Q) -> u64
	where
		Q: Hash + ?Sized,
	{
		self.hasher.hash_one(key)
	}

	#[inline]
	fn shard(&self, hash: u64) -> &RwLock<Shard<K, V>> {
		&self.shards[(hash as usize) & self.shard_mask]
	}

	fn find<Q>(&self, key: &Q) -> Option<Arc<Node<K, V>>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let hash = self.hash(key);
		let shard = self.shard(hash).read();
		shard.get(hash, key).cloned()
	}

	fn check_weight(&self, weight: u64) -> Result<()> {
		let capacity = self.capacity();
		if weight > capacity {
			#[cfg(feature = "metrics")]
			Counters::bump(&self.counters.rejections);
			warn!("rejected entry of weight {weight}: exceeds capacity {capacity}");
			return Err(CacheError::CapacityImpossible {
				weight,
				capacity,
			});
		}
		Ok(())
	}

	fn record_read(&self, node: Arc<Node<K, V>>) {
		match self.buffers.record_read(node) {
			ReadStatus::Recorded => {}
			ReadStatus::DrainRequested | ReadStatus::Full => self.try_drain(),
		}
	}

	/// Log a write record, draining first if its stripe is full, then try an
	/// opportunistic drain.
	fn record_write(&self, mut record: Record<K, V>) {
		loop {
			match self.buffers.record_write(record) {
				Ok(()) => break,
				Err(rejected) => {
					record = rejected;
					self.drain_blocking();
				}
			}
		}
		self.try_drain();
	}

	/// Drain if nobody else is; otherwise leave the work to the current drainer.
	fn try_drain(&self) {
		let Some(mut policy) = self.policy.try_lock() else {
			return;
		};
		let evicted = self.drain_locked(&mut policy).evicted;
		drop(policy);
		self.notify(evicted);
	}

	fn drain_blocking(&self) {
		let mut policy = self.policy.lock();
		let evicted = self.drain_locked(&mut policy).evicted;
		drop(policy);
		self.notify(evicted);
	}

	/// One drain pass. The caller holds the maintenance lock.
	fn drain_locked(&self, policy: &mut Policy<K, V>) -> DrainOutcome<K, V> {
		let outcome = policy.drain(&self.buffers, |node| self.evict_from_table(node));
		self.weighted_size.store(policy.weighted_size(), Ordering::Release);

		#[cfg(feature = "metrics")]
		{
			Counters::bump(&self.counters.drains);
			Counters::add(&self.counters.evictions, outcome.evicted.len() as u64);
		}

		outcome
	}

	/// Remove an eviction victim from the hash table, if it is still there.
	fn evict_from_table(&self, node: &Arc<Node<K, V>>) -> bool {
		let mut shard = self.shard(node.hash).write();
		if shard.remove_node(node) {
			node.retire();
			self.entry_count.fetch_sub(1, Ordering::Relaxed);
			true
		} else {
			false
		}
	}

	/// Run the eviction listener. Called without the maintenance lock.
	fn notify(&self, evicted: Vec<Arc<Node<K, V>>>) {
		if evicted.is_empty() {
			return;
		}
		debug!("evicted {} entries", evicted.len());
		if let Some(listener) = &self.listener {
			for node in evicted {
				listener(&node.key, node.value());
			}
		}
	}
}

impl<'a, K, V, W> IntoIterator for &'a Cache<K, V, W>
where
	K: Hash + Eq + Clone,
	W: Weigher<V>,
{
	type Item = (K, Arc<V>);
	type IntoIter = Iter<'a, K, V, W>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

impl<K, V, W> fmt::Debug for Cache<K, V, W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Cache")
			.field("len", &self.entry_count.load(Ordering::Relaxed))
			.field("weighted_size", &self.weighted_size.load(Ordering::Relaxed))
			.field("capacity", &self.capacity.load(Ordering::Relaxed))
			.field("shards", &self.shards.len())
			.finish()
	}
}
