//! Small collection primitives shared by the propagation core and operators.

use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::HashMap;

/// An indexed set of row ids with O(1) add, remove and membership test.
///
/// Iteration visits entries in insertion order, except that removals swap
/// the last entry into the vacated slot. Turn accumulators rely only on the
/// O(1) operations; arrival-order-sensitive callers keep their own order.
#[derive(Clone, Debug, Default)]
pub struct IndexedSet {
    values: Vec<usize>,
    positions: HashMap<usize, usize>,
}

impl IndexedSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Adds `value`; returns true if it was not already present.
    pub fn add(&mut self, value: usize) -> bool {
        if self.positions.contains_key(&value) {
            return false;
        }
        self.positions.insert(value, self.values.len());
        self.values.push(value);
        true
    }

    /// Removes `value`; returns true if it was present.
    pub fn remove(&mut self, value: usize) -> bool {
        match self.positions.remove(&value) {
            Some(pos) => {
                self.values.swap_remove(pos);
                if pos < self.values.len() {
                    self.positions.insert(self.values[pos], pos);
                }
                true
            }
            None => false,
        }
    }

    /// Returns whether `value` is in the set.
    #[inline]
    pub fn contains(&self, value: usize) -> bool {
        self.positions.contains_key(&value)
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Calls `action` for each entry.
    pub fn for_each(&self, mut action: impl FnMut(usize)) {
        for value in &self.values {
            action(*value);
        }
    }

    /// Returns an iterator over the entries.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.iter().copied()
    }

    /// Returns the entries as a slice.
    pub fn as_slice(&self) -> &[usize] {
        &self.values
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.values.clear();
        self.positions.clear();
    }
}

/// Maps keys to dense small integer entries, recycling freed entries.
///
/// Interning a key that is already present returns its existing entry.
/// Freed entries go onto a free list and are handed out again by later
/// interns, keeping the entry space dense.
#[derive(Clone, Debug)]
pub struct Interner<K> {
    entries: HashMap<K, usize>,
    keys: Vec<Option<K>>,
    free: Vec<usize>,
}

impl<K: Eq + Hash + Clone> Interner<K> {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            keys: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Creates an empty interner with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Returns the entry for `key`, allocating one if it is new.
    pub fn intern(&mut self, key: K) -> usize {
        if let Some(entry) = self.entries.get(&key) {
            return *entry;
        }
        let entry = match self.free.pop() {
            Some(recycled) => {
                self.keys[recycled] = Some(key.clone());
                recycled
            }
            None => {
                self.keys.push(Some(key.clone()));
                self.keys.len() - 1
            }
        };
        self.entries.insert(key, entry);
        entry
    }

    /// Returns the entry for `key` without allocating.
    pub fn entry_of(&self, key: &K) -> Option<usize> {
        self.entries.get(key).copied()
    }

    /// Releases `entry` for reuse by a later intern.
    pub fn free_entry(&mut self, entry: usize) {
        if let Some(slot) = self.keys.get_mut(entry) {
            if let Some(key) = slot.take() {
                self.entries.remove(&key);
                self.free.push(entry);
            }
        }
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries and clears the free list.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
        self.free.clear();
    }
}

impl<K: Eq + Hash + Clone> Default for Interner<K> {
    fn default() -> Self {
        Self::new()
    }
}
