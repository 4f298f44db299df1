//! Hash table shard.
//!
//! The `Cache` stripes keys across a power-of-two number of shards, each wrapped
//! in an `RwLock`, so readers never block each other and writers only contend on
//! keys that share a shard.
//!
//! Keys are hashed exactly once, by the cache, and the hash is stored in the
//! node. The shard uses `hashbrown::HashTable` so lookups and rehashes reuse that
//! stored hash instead of hashing the key again.

use std::borrow::Borrow;
use std::sync::Arc;

use hashbrown::HashTable;

use crate::node::Node;

pub(crate) struct Shard<K, V> {
	entries: HashTable<Arc<Node<K, V>>>,
}

impl<K, V> Shard<K, V>
where
	K: Eq,
{
	pub fn new() -> Self {
		Self {
			entries: HashTable::new(),
		}
	}

	/// Look up the node for `key`.
	pub fn get<Q>(&self, hash: u64, key: &Q) -> Option<&Arc<Node<K, V>>>
	where
		K: Borrow<Q>,
		Q: Eq + ?Sized,
	{
		self.entries.find(hash, |node| key.eq(node.key.borrow()))
	}

	/// Insert a node whose key is known to be absent.
	pub fn insert_new(&mut self, node: Arc<Node<K, V>>) {
		debug_assert!(self.get(node.hash, &node.key).is_none());
		self.entries.insert_unique(node.hash, node, |n| n.hash);
	}

	/// Remove and return the node for `key`.
	pub fn remove<Q>(&mut self, hash: u64, key: &Q) -> Option<Arc<Node<K, V>>>
	where
		K: Borrow<Q>,
		Q: Eq + ?Sized,
	{
		match self.entries.find_entry(hash, |node| key.eq(node.key.borrow())) {
			Ok(occupied) => Some(occupied.remove().0),
			Err(_) => None,
		}
	}

	/// Remove `node` only if the table still maps its key to this exact node.
	///
	/// Used by eviction: a key that was removed and re-inserted since the node
	/// was linked now belongs to a different node and must be left alone.
	pub fn remove_node(&mut self, node: &Arc<Node<K, V>>) -> bool {
		match self.entries.find_entry(node.hash, |n| Arc::ptr_eq(n, node)) {
			Ok(occupied) => {
				occupied.remove();
				true
			}
			Err(_) => false,
		}
	}

	/// Remove every node, returning them.
	pub fn drain(&mut self) -> Vec<Arc<Node<K, V>>> {
		self.entries.drain().collect()
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<Node<K, V>>> {
		self.entries.iter()
	}
}

impl<K: Eq, V> Default for Shard<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn node(key: &'static str, hash: u64) -> Arc<Node<String, u32>> {
		Arc::new(Node::new(key.to_string(), hash, 0))
	}

	#[test]
	fn test_shard_insert_and_get() {
		let mut shard = Shard::new();
		shard.insert_new(node("a", 1));

		assert!(shard.get(1, "a").is_some());
		assert!(shard.get(1, "b").is_none());
		assert_eq!(shard.len(), 1);
	}

	#[test]
	fn test_shard_remove() {
		let mut shard = Shard::new();
		shard.insert_new(node("a", 1));

		let removed = shard.remove(1, "a").expect("key should exist");
		assert_eq!(removed.key, "a");
		assert!(shard.remove(1, "a").is_none());
		assert_eq!(shard.len(), 0);
	}

	#[test]
	fn test_colliding_hashes_stay_distinct() {
		let mut shard = Shard::new();
		shard.insert_new(node("a", 7));
		shard.insert_new(node("b", 7));

		assert_eq!(shard.get(7, "a").map(|n| n.key.as_str()), Some("a"));
		assert_eq!(shard.get(7, "b").map(|n| n.key.as_str()), Some("b"));
		assert_eq!(shard.len(), 2);
	}

	#[test]
	fn test_remove_node_requires_identity() {
		let mut shard = Shard::new();
		let original = node("a", 1);
		shard.insert_new(original.clone());
		shard.remove(1, "a");

		let replacement = node("a", 1);
		shard.insert_new(replacement.clone());

		assert!(!shard.remove_node(&original));
		assert!(shard.get(1, "a").is_some());
		assert!(shard.remove_node(&replacement));
		assert!(shard.get(1, "a").is_none());
	}

	#[test]
	fn test_drain_empties_shard() {
		let mut shard = Shard::new();
		shard.insert_new(node("a", 1));
		shard.insert_new(node("b", 2));

		let drained = shard.drain();
		assert_eq!(drained.len(), 2);
		assert_eq!(shard.len(), 0);
		assert_eq!(shard.iter().count(), 0);
	}
}
