//! Maintenance: applying buffered records to the recency list and evicting.
//!
//! `Policy` is the state guarded by the cache's single maintenance lock. Only the
//! thread holding that lock reorders the recency list or changes the tracked
//! weight, so the list itself needs no finer-grained locking.
//!
//! # Resolving out-of-order records
//!
//! Records for one key share a stripe, but producers push them after releasing
//! the shard lock, so two racing writers may append in the opposite order to the
//! one the table saw. Every write record carries the stamp the node had when the
//! record was produced:
//!
//! - a write record older than the node's current stamp is dropped (the newer
//!   record carries the final weight and will be applied on its own);
//! - any record for a retired node is dropped, except `Remove`, which unlinks;
//! - an `Update` that arrives before its `Add` links the node itself.
//!
//! A pass applies every read stripe before any write stripe, so an `Access` for
//! a node whose `Add` is still buffered in the same pass is dropped.
//!
//! The running total is kept in a `u128`: a batch of records is applied before
//! eviction runs, and several capacity-sized weights in one batch may exceed
//! `u64::MAX` until the pass evicts them.

use std::sync::Arc;

use log::trace;

use crate::buffer::{Buffers, READ_BUFFER_SIZE, Record, WRITE_BUFFER_SIZE};
use crate::node::Node;
use crate::recency::RecencyList;

/// A node linked into the recency list, with the weight the policy charged for it.
pub(crate) struct Linked<K, V> {
	pub node: Arc<Node<K, V>>,
	pub weight: u64,
}

/// Result of one drain pass.
pub(crate) struct DrainOutcome<K, V> {
	/// Records consumed from the buffers
	pub applied: usize,
	/// Nodes evicted from both indexes, LRU first
	pub evicted: Vec<Arc<Node<K, V>>>,
}

pub(crate) struct Policy<K, V> {
	recency: RecencyList<Linked<K, V>>,
	weighted_size: u128,
	capacity: u64,
}

impl<K, V> Policy<K, V> {
	pub fn new(capacity: u64) -> Self {
		Self {
			recency: RecencyList::new(),
			weighted_size: 0,
			capacity,
		}
	}

	/// Tracked weight, saturated to `u64`. Never above `capacity` after a pass.
	pub fn weighted_size(&self) -> u64 {
		u64::try_from(self.weighted_size).unwrap_or(u64::MAX)
	}

	pub fn capacity(&self) -> u64 {
		self.capacity
	}

	pub fn set_capacity(&mut self, capacity: u64) {
		self.capacity = capacity;
	}

	/// Number of linked nodes.
	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.recency.len()
	}

	/// Drain every stripe once, then evict down to capacity.
	///
	/// At most one buffer's worth of records is taken from each stripe, which
	/// bounds the pause regardless of how fast producers refill.
	///
	/// `evict_from_table` must remove the node from the hash table if the table
	/// still maps its key to that node, retire it, and report whether it did.
	pub fn drain<F>(&mut self, buffers: &Buffers<K, V>, evict_from_table: F) -> DrainOutcome<K, V>
	where
		F: FnMut(&Arc<Node<K, V>>) -> bool,
	{
		let mut applied = 0;

		for stripe in 0..buffers.stripes() {
			for _ in 0..READ_BUFFER_SIZE {
				let Some(record) = buffers.pop_read(stripe) else {
					break;
				};
				self.apply(record);
				applied += 1;
			}
		}

		for stripe in 0..buffers.stripes() {
			for _ in 0..WRITE_BUFFER_SIZE {
				let Some(record) = buffers.pop_write(stripe) else {
					break;
				};
				self.apply(record);
				applied += 1;
			}
		}

		let evicted = self.evict(evict_from_table);

		trace!(
			"drained {applied} records, evicted {}, {} linked, weighted size {}/{}",
			evicted.len(),
			self.recency.len(),
			self.weighted_size,
			self.capacity
		);

		DrainOutcome {
			applied,
			evicted,
		}
	}

	fn apply(&mut self, record: Record<K, V>) {
		match record {
			Record::Access(node) => {
				if !node.is_retired()
					&& let Some(slot) = node.slot()
				{
					self.recency.move_to_back(slot);
				}
			}
			Record::Add {
				node,
				weight,
				stamp,
			}
			| Record::Update {
				node,
				weight,
				stamp,
			} => self.apply_write(node, weight, stamp),
			Record::Remove(node) => {
				self.unlink(&node);
			}
		}
	}

	fn apply_write(&mut self, node: Arc<Node<K, V>>, weight: u64, stamp: u64) {
		if node.is_retired() || stamp < node.stamp() {
			return;
		}

		match node.slot() {
			Some(slot) => {
				if let Some(linked) = self.recency.get_mut(slot) {
					self.weighted_size = self.weighted_size - u128::from(linked.weight) + u128::from(weight);
					linked.weight = weight;
				}
				self.recency.move_to_back(slot);
			}
			None => {
				let slot = self.recency.push_back(Linked {
					node: Arc::clone(&node),
					weight,
				});
				node.set_slot(Some(slot));
				self.weighted_size += u128::from(weight);
			}
		}
	}

	/// Unlink a node if it is linked, releasing its charged weight.
	fn unlink(&mut self, node: &Arc<Node<K, V>>) -> bool {
		let Some(slot) = node.slot() else {
			return false;
		};
		node.set_slot(None);
		match self.recency.remove(slot) {
			Some(linked) => {
				self.weighted_size -= u128::from(linked.weight);
				true
			}
			None => false,
		}
	}

	/// Evict from the LRU end until the tracked weight fits the capacity.
	fn evict<F>(&mut self, mut evict_from_table: F) -> Vec<Arc<Node<K, V>>>
	where
		F: FnMut(&Arc<Node<K, V>>) -> bool,
	{
		let mut evicted = Vec::new();

		while self.weighted_size > u128::from(self.capacity) {
			let Some(victim) = self.recency.front().map(|linked| Arc::clone(&linked.node)) else {
				break;
			};
			self.unlink(&victim);
			// A node already removed by the caller only needed unlinking
			if evict_from_table(&victim) {
				evicted.push(victim);
			}
		}

		evicted
	}

	/// Unlink everything and reset the tracked weight.
	pub fn clear(&mut self) {
		for linked in self.recency.iter() {
			linked.node.set_slot(None);
		}
		self.recency.clear();
		self.weighted_size = 0;
	}

	/// Up to `limit` linked nodes, least-recently used first.
	pub fn ascending(&self, limit: usize) -> impl Iterator<Item = &Arc<Node<K, V>>> {
		self.recency.iter().take(limit).map(|linked| &linked.node)
	}

	/// Up to `limit` linked nodes, most-recently used first.
	pub fn descending(&self, limit: usize) -> impl Iterator<Item = &Arc<Node<K, V>>> {
		self.recency.iter().rev().take(limit).map(|linked| &linked.node)
	}

	#[cfg(test)]
	pub fn validate(&self) {
		self.recency.validate();
		let total: u128 = self.recency.iter().map(|linked| u128::from(linked.weight)).sum();
		assert_eq!(total, self.weighted_size, "tracked weight drifted from linked weight");
		for linked in self.recency.iter() {
			assert!(linked.node.slot().is_some(), "linked node lost its slot");
		}
	}
}
