//! Recency ordering backed by a slot arena.
//!
//! Entries are linked by slot index rather than by pointer, so moving an entry to
//! the most-recently-used end is an O(1) splice with no unsafe code:
//!
//! ```text
//!   head (LRU)                                   tail (MRU)
//!      │                                             │
//!      ▼                                             ▼
//!   [slot 3] ◄──► [slot 0] ◄──► [slot 5] ◄──► [slot 1]
//! ```
//!
//! Freed slots are recycled through a free list. The list is not thread-safe;
//! the drainer owns it behind the maintenance lock.

/// Stable handle into a [`RecencyList`].
pub(crate) type SlotId = usize;

/// Sentinel for "no slot".
pub(crate) const NIL: SlotId = usize::MAX;

struct Slot<T> {
	value: Option<T>,
	prev: SlotId,
	next: SlotId,
}

pub(crate) struct RecencyList<T> {
	slots: Vec<Slot<T>>,
	free: Vec<SlotId>,
	head: SlotId,
	tail: SlotId,
	len: usize,
}

impl<T> RecencyList<T> {
	pub fn new() -> Self {
		Self {
			slots: Vec::new(),
			free: Vec::new(),
			head: NIL,
			tail: NIL,
			len: 0,
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	#[cfg(test)]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn get(&self, id: SlotId) -> Option<&T> {
		self.slots.get(id).and_then(|slot| slot.value.as_ref())
	}

	pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
		self.slots.get_mut(id).and_then(|slot| slot.value.as_mut())
	}

	/// The least-recently-used value.
	pub fn front(&self) -> Option<&T> {
		self.get(self.head)
	}

	#[cfg(test)]
	pub fn front_id(&self) -> Option<SlotId> {
		(self.head != NIL).then_some(self.head)
	}

	/// Link `value` at the most-recently-used end.
	pub fn push_back(&mut self, value: T) -> SlotId {
		let slot = Slot {
			value: Some(value),
			prev: self.tail,
			next: NIL,
		};
		let id = match self.free.pop() {
			Some(id) => {
				self.slots[id] = slot;
				id
			}
			None => {
				self.slots.push(slot);
				self.slots.len() - 1
			}
		};

		if self.tail == NIL {
			self.head = id;
		} else {
			self.slots[self.tail].next = id;
		}
		self.tail = id;
		self.len += 1;
		id
	}

	/// Unlink and free a slot, returning its value.
	pub fn remove(&mut self, id: SlotId) -> Option<T> {
		let value = self.slots.get_mut(id)?.value.take()?;
		self.detach(id);
		self.free.push(id);
		self.len -= 1;
		Some(value)
	}

	/// Unlink the least-recently-used slot.
	#[cfg(test)]
	pub fn pop_front(&mut self) -> Option<T> {
		self.front_id().and_then(|id| self.remove(id))
	}

	/// Splice a linked slot to the most-recently-used end.
	pub fn move_to_back(&mut self, id: SlotId) -> bool {
		if self.get(id).is_none() {
			return false;
		}
		if id == self.tail {
			return true;
		}
		self.detach(id);
		let tail = self.tail;
		let slot = &mut self.slots[id];
		slot.prev = tail;
		slot.next = NIL;
		if tail == NIL {
			self.head = id;
		} else {
			self.slots[tail].next = id;
		}
		self.tail = id;
		true
	}

	pub fn clear(&mut self) {
		self.slots.clear();
		self.free.clear();
		self.head = NIL;
		self.tail = NIL;
		self.len = 0;
	}

	/// Iterate from least- to most-recently used.
	pub fn iter(&self) -> Iter<'_, T> {
		Iter {
			list: self,
			front: self.head,
			back: self.tail,
			remaining: self.len,
		}
	}

	fn detach(&mut self, id: SlotId) {
		let (prev, next) = {
			let slot = &self.slots[id];
			(slot.prev, slot.next)
		};
		if prev == NIL {
			self.head = next;
		} else {
			self.slots[prev].next = next;
		}
		if next == NIL {
			self.tail = prev;
		} else {
			self.slots[next].prev = prev;
		}
		let slot = &mut self.slots[id];
		slot.prev = NIL;
		slot.next = NIL;
	}

	#[cfg(test)]
	pub fn validate(&self) {
		let mut count = 0;
		let mut prev = NIL;
		let mut cur = self.head;
		while cur != NIL {
			let slot = &self.slots[cur];
			assert!(slot.value.is_some(), "linked slot {cur} is empty");
			assert_eq!(slot.prev, prev, "broken back link at slot {cur}");
			prev = cur;
			cur = slot.next;
			count += 1;
		}
		assert_eq!(prev, self.tail);
		assert_eq!(count, self.len);
	}
}

impl<T> Default for RecencyList<T> {
	fn default() -> Self {
		Self::new()
	}
}

pub(crate) struct Iter<'a, T> {
	list: &'a RecencyList<T>,
	front: SlotId,
	back: SlotId,
	remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
	type Item = &'a T;

	fn next(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 {
			return None;
		}
		let slot = &self.list.slots[self.front];
		self.front = slot.next;
		self.remaining -= 1;
		slot.value.as_ref()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(self.remaining, Some(self.remaining))
	}
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
	fn next_back(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 {
			return None;
		}
		let slot = &self.list.slots[self.back];
		self.back = slot.prev;
		self.remaining -= 1;
		slot.value.as_ref()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn collect(list: &RecencyList<u32>) -> Vec<u32> {
		list.iter().copied().collect()
	}

	#[test]
	fn test_push_back_orders_lru_first() {
		let mut list = RecencyList::new();
		for i in 1..=4 {
			list.push_back(i);
		}
		assert_eq!(collect(&list), vec![1, 2, 3, 4]);
		assert_eq!(list.front(), Some(&1));
		list.validate();
	}

	#[test]
	fn test_move_to_back() {
		let mut list = RecencyList::new();
		let a = list.push_back(1);
		list.push_back(2);
		let c = list.push_back(3);

		assert!(list.move_to_back(a));
		assert_eq!(collect(&list), vec![2, 3, 1]);

		// Already at the tail
		assert!(list.move_to_back(a));
		assert_eq!(collect(&list), vec![2, 3, 1]);

		assert!(list.move_to_back(c));
		assert_eq!(collect(&list), vec![2, 1, 3]);
		list.validate();
	}

	#[test]
	fn test_remove_middle_head_and_tail() {
		let mut list = RecencyList::new();
		let a = list.push_back(1);
		let b = list.push_back(2);
		let c = list.push_back(3);

		assert_eq!(list.remove(b), Some(2));
		assert_eq!(collect(&list), vec![1, 3]);
		assert_eq!(list.remove(a), Some(1));
		assert_eq!(list.remove(c), Some(3));
		assert!(list.is_empty());
		assert_eq!(list.front_id(), None);
		list.validate();
	}

	#[test]
	fn test_remove_twice_is_none() {
		let mut list = RecencyList::new();
		let a = list.push_back(1);
		assert_eq!(list.remove(a), Some(1));
		assert_eq!(list.remove(a), None);
		assert!(!list.move_to_back(a));
	}

	#[test]
	fn test_slots_are_recycled() {
		let mut list = RecencyList::new();
		let a = list.push_back(1);
		list.push_back(2);
		list.remove(a);
		let c = list.push_back(3);
		assert_eq!(a, c);
		assert_eq!(collect(&list), vec![2, 3]);
		list.validate();
	}

	#[test]
	fn test_pop_front_and_reverse_iter() {
		let mut list = RecencyList::new();
		for i in 1..=3 {
			list.push_back(i);
		}
		assert_eq!(list.iter().rev().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
		assert_eq!(list.pop_front(), Some(1));
		assert_eq!(list.len(), 2);
		list.clear();
		assert!(list.is_empty());
		assert_eq!(list.pop_front(), None);
	}
}
