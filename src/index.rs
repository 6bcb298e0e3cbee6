// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

//! In-memory open-addressed hash index with Robin Hood probing.
//!
//! Slots are stored contiguously; on collision the entry with the larger
//! probe-sequence length (the one that has travelled further from its ideal
//! slot) keeps the slot it is occupying, and the poorer entry is displaced
//! ("rich steals from poor"). Lookups early-terminate once the scanned
//! distance exceeds the psl of the slot under the cursor: no key further
//! along the chain could still be present (see `Index::get`).

use crate::options::LOAD_FACTOR_PCT;

/// A value with an optional absolute expiry (0 means "never expires").
#[derive(Debug, Clone)]
pub struct Record {
	pub bytes: Vec<u8>,
	pub expires_at: i64,
}

impl Record {
	pub fn new(bytes: Vec<u8>, expires_at: i64) -> Record {
		Record { bytes, expires_at }
	}

	pub fn is_expired(&self, now: i64) -> bool {
		self.expires_at > 0 && now >= self.expires_at
	}
}

struct Slot {
	key: Vec<u8>,
	value: Record,
	hash: u64,
	psl: u32,
}

/// Robin Hood open-addressed map from byte keys to [`Record`]s.
pub struct Index {
	slots: Vec<Option<Slot>>,
	capacity: usize,
	count: usize,
}

impl Index {
	pub fn new(capacity: usize) -> Index {
		let capacity = capacity.max(1);
		let mut slots = Vec::with_capacity(capacity);
		slots.resize_with(capacity, || None);
		Index { slots, capacity, count: 0 }
	}

	pub fn len(&self) -> usize {
		self.count
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	fn would_exceed_load_factor(&self, prospective_count: usize) -> bool {
		prospective_count * 100 >= self.capacity * LOAD_FACTOR_PCT
	}

	/// Insert or overwrite `key` with `value`. Resizes first if the
	/// prospective count would cross the load-factor threshold.
	pub fn put(&mut self, key: &[u8], value: Record) {
		if self.would_exceed_load_factor(self.count + 1) {
			self.resize();
		}

		let hash = crate::hash::hash64(key);
		let mut carried_key = key.to_vec();
		let mut carried_value = value;
		let mut carried_hash = hash;
		let mut psl: u32 = 0;
		let mut idx = (hash as usize) % self.capacity;

		loop {
			match &mut self.slots[idx] {
				None => {
					self.slots[idx] = Some(Slot {
						key: carried_key,
						value: carried_value,
						hash: carried_hash,
						psl,
					});
					self.count += 1;
					return;
				}
				Some(existing) => {
					if existing.hash == carried_hash && existing.key == carried_key {
						existing.value = carried_value;
						return;
					}
					if psl > existing.psl {
						std::mem::swap(&mut existing.key, &mut carried_key);
						std::mem::swap(&mut existing.value, &mut carried_value);
						std::mem::swap(&mut existing.hash, &mut carried_hash);
						std::mem::swap(&mut existing.psl, &mut psl);
					}
				}
			}
			psl += 1;
			idx = (idx + 1) % self.capacity;
		}
	}

	pub fn get(&self, key: &[u8]) -> Option<&Record> {
		let slot_idx = self.find_slot(key)?;
		self.slots[slot_idx].as_ref().map(|s| &s.value)
	}

	pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Record> {
		let slot_idx = self.find_slot(key)?;
		self.slots[slot_idx].as_mut().map(|s| &mut s.value)
	}

	fn find_slot(&self, key: &[u8]) -> Option<usize> {
		let hash = crate::hash::hash64(key);
		let mut idx = (hash as usize) % self.capacity;
		let mut distance: u32 = 0;

		loop {
			match &self.slots[idx] {
				None => return None,
				Some(slot) => {
					if distance > slot.psl {
						return None;
					}
					if slot.hash == hash && slot.key == key {
						return Some(idx);
					}
				}
			}
			distance += 1;
			idx = (idx + 1) % self.capacity;
			if distance as usize > self.capacity {
				return None;
			}
		}
	}

	/// Remove `key`, back-shifting the following cluster so every remaining
	/// key stays reachable from its current psl. Returns whether a removal
	/// occurred.
	pub fn remove(&mut self, key: &[u8]) -> bool {
		let removed_idx = match self.find_slot(key) {
			Some(idx) => idx,
			None => return false,
		};

		self.slots[removed_idx] = None;
		self.count -= 1;

		let mut hole = removed_idx;
		let mut next = (hole + 1) % self.capacity;
		loop {
			let should_shift = matches!(&self.slots[next], Some(slot) if slot.psl > 0);
			if !should_shift {
				break;
			}
			let mut moved = self.slots[next].take().unwrap();
			moved.psl -= 1;
			self.slots[hole] = Some(moved);
			hole = next;
			next = (next + 1) % self.capacity;
		}

		true
	}

	pub fn contains(&self, key: &[u8]) -> bool {
		self.find_slot(key).is_some()
	}

	/// Double capacity and re-insert every occupied slot with a fresh psl.
	pub fn resize(&mut self) {
		let new_capacity = self.capacity * 2;
		let old_slots = std::mem::replace(&mut self.slots, {
			let mut v = Vec::with_capacity(new_capacity);
			v.resize_with(new_capacity, || None);
			v
		});
		self.capacity = new_capacity;

		for slot in old_slots.into_iter().flatten() {
			self.reinsert(slot.key, slot.value, slot.hash);
		}
	}

	fn reinsert(&mut self, key: Vec<u8>, value: Record, hash: u64) {
		let mut carried_key = key;
		let mut carried_value = value;
		let mut carried_hash = hash;
		let mut psl: u32 = 0;
		let mut idx = (hash as usize) % self.capacity;

		loop {
			match &mut self.slots[idx] {
				None => {
					self.slots[idx] = Some(Slot {
						key: carried_key,
						value: carried_value,
						hash: carried_hash,
						psl,
					});
					return;
				}
				Some(existing) => {
					if psl > existing.psl {
						std::mem::swap(&mut existing.key, &mut carried_key);
						std::mem::swap(&mut existing.value, &mut carried_value);
						std::mem::swap(&mut existing.hash, &mut carried_hash);
						std::mem::swap(&mut existing.psl, &mut psl);
					}
				}
			}
			psl += 1;
			idx = (idx + 1) % self.capacity;
		}
	}

	/// Free every key/value and reset to zero occupancy. Capacity is kept.
	pub fn clear(&mut self) {
		for slot in self.slots.iter_mut() {
			*slot = None;
		}
		self.count = 0;
	}

	/// Iterate every occupied slot in array order.
	pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Record)> {
		self.slots.iter().filter_map(|s| s.as_ref().map(|s| (s.key.as_slice(), &s.value)))
	}

	/// Maximum psl across occupied slots, used by probe-bound property tests.
	#[cfg(test)]
	pub fn max_psl(&self) -> u32 {
		self.slots.iter().filter_map(|s| s.as_ref().map(|s| s.psl)).max().unwrap_or(0)
	}
}
