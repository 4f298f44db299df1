use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::recency::{NIL, SlotId};

/// A cache entry, shared between the hash table and the recency list.
///
/// The table owns one `Arc<Node>` per key; the recency list holds a second
/// `Arc` while the node is linked. Value and stamp are replaced in place
/// by inserts for the same key, always under that key's shard write lock.
pub(crate) struct Node<K, V> {
	pub key: K,
	/// Pre-computed hash of `key` (selects shard and buffer stripe)
	pub hash: u64,
	value: RwLock<Arc<V>>,
	/// Write-order stamp, bumped by every in-place update
	stamp: AtomicU64,
	/// Set once the node has left the hash table (removed, evicted or cleared)
	retired: AtomicBool,
	/// Recency slot, or `NIL` when unlinked. Only touched under the maintenance lock.
	slot: AtomicUsize,
}

impl<K, V> Node<K, V> {
	pub fn new(key: K, hash: u64, value: V) -> Self {
		Self {
			key,
			hash,
			value: RwLock::new(Arc::new(value)),
			stamp: AtomicU64::new(0),
			retired: AtomicBool::new(false),
			slot: AtomicUsize::new(NIL),
		}
	}

	/// Clone the current value `Arc` (cheap reference count bump).
	#[inline]
	pub fn value(&self) -> Arc<V> {
		Arc::clone(&self.value.read())
	}

	#[inline]
	pub fn stamp(&self) -> u64 {
		self.stamp.load(Ordering::Acquire)
	}

	/// Replace the value, returning the previous value and the new stamp.
	///
	/// Callers must hold the shard write lock for this node's key. The new
	/// weight travels with the stamp in the update record.
	pub fn replace(&self, value: V) -> (Arc<V>, u64) {
		let old = std::mem::replace(&mut *self.value.write(), Arc::new(value));
		let stamp = self.stamp.fetch_add(1, Ordering::AcqRel) + 1;
		(old, stamp)
	}

	#[inline]
	pub fn is_retired(&self) -> bool {
		self.retired.load(Ordering::Acquire)
	}

	/// Mark the node as gone from the hash table.
	#[inline]
	pub fn retire(&self) {
		self.retired.store(true, Ordering::Release);
	}

	#[inline]
	pub fn slot(&self) -> Option<SlotId> {
		match self.slot.load(Ordering::Relaxed) {
			NIL => None,
			id => Some(id),
		}
	}

	#[inline]
	pub fn set_slot(&self, slot: Option<SlotId>) {
		self.slot.store(slot.unwrap_or(NIL), Ordering::Relaxed);
	}
}
