//! Striped operation buffers feeding the drainer.
//!
//! Reads and writes are logged into fixed-size ring buffers instead of touching
//! the recency list directly. A record lands in the stripe picked by its key
//! hash, so all records for one key keep their append order within a stripe.
//!
//! - **Read stripes** are lossy. A full stripe drops the access; recency is a
//!   hint and losing a few touches only perturbs ordering slightly.
//! - **Write stripes** are lossless. A full stripe hands the record back and the
//!   writer drains before retrying, since add/update/remove records carry weight
//!   accounting that must not be lost.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::node::Node;

/// Slots per read stripe.
pub(crate) const READ_BUFFER_SIZE: usize = 64;

/// Fill level at which a read stripe asks for a drain.
pub(crate) const READ_DRAIN_THRESHOLD: usize = READ_BUFFER_SIZE / 2;

/// Slots per write stripe.
pub(crate) const WRITE_BUFFER_SIZE: usize = 128;

/// A buffered operation on an entry.
pub(crate) enum Record<K, V> {
	/// First insert of a key; links the node at the MRU end.
	Add { node: Arc<Node<K, V>>, weight: u64, stamp: u64 },
	/// In-place replacement; reweighs the node and moves it to the MRU end.
	Update { node: Arc<Node<K, V>>, weight: u64, stamp: u64 },
	/// The node left the hash table; unlink it.
	Remove(Arc<Node<K, V>>),
	/// The node was read; move it to the MRU end.
	Access(Arc<Node<K, V>>),
}

impl<K, V> Record<K, V> {
	pub fn node(&self) -> &Arc<Node<K, V>> {
		match self {
			Record::Add { node, .. } | Record::Update { node, .. } => node,
			Record::Remove(node) | Record::Access(node) => node,
		}
	}
}

/// Outcome of logging a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadStatus {
	/// Logged; the stripe is below its drain threshold.
	Recorded,
	/// Logged, and the stripe reached its drain threshold.
	DrainRequested,
	/// The stripe was full and the access was dropped.
	Full,
}

pub(crate) struct Buffers<K, V> {
	reads: Box<[ArrayQueue<Record<K, V>>]>,
	writes: Box<[ArrayQueue<Record<K, V>>]>,
	mask: usize,
}

impl<K, V> Buffers<K, V> {
	/// Create `stripes` read and write stripes. `stripes` must be a power of two.
	pub fn new(stripes: usize) -> Self {
		debug_assert!(stripes.is_power_of_two());
		Self {
			reads: (0..stripes).map(|_| ArrayQueue::new(READ_BUFFER_SIZE)).collect(),
			writes: (0..stripes).map(|_| ArrayQueue::new(WRITE_BUFFER_SIZE)).collect(),
			mask: stripes - 1,
		}
	}

	#[inline]
	fn stripe(&self, hash: u64) -> usize {
		// High bits: the shard index already consumes the low ones
		((hash >> 32) as usize) & self.mask
	}

	pub fn stripes(&self) -> usize {
		self.reads.len()
	}

	/// Log an access. Never blocks.
	pub fn record_read(&self, node: Arc<Node<K, V>>) -> ReadStatus {
		let buffer = &self.reads[self.stripe(node.hash)];
		match buffer.push(Record::Access(node)) {
			Ok(()) if buffer.len() >= READ_DRAIN_THRESHOLD => ReadStatus::DrainRequested,
			Ok(()) => ReadStatus::Recorded,
			Err(_) => ReadStatus::Full,
		}
	}

	/// Log a write. Returns the record back if its stripe is full.
	pub fn record_write(&self, record: Record<K, V>) -> Result<(), Record<K, V>> {
		self.writes[self.stripe(record.node().hash)].push(record)
	}

	/// Pop the next read record from a stripe.
	#[inline]
	pub fn pop_read(&self, stripe: usize) -> Option<Record<K, V>> {
		self.reads[stripe].pop()
	}

	/// Pop the next write record from a stripe.
	#[inline]
	pub fn pop_write(&self, stripe: usize) -> Option<Record<K, V>> {
		self.writes[stripe].pop()
	}

	/// Total records currently buffered in write stripes.
	pub fn pending_writes(&self) -> usize {
		self.writes.iter().map(ArrayQueue::len).sum()
	}

	/// Total records currently buffered in read stripes.
	#[cfg(test)]
	pub fn pending_reads(&self) -> usize {
		self.reads.iter().map(ArrayQueue::len).sum()
	}
}
