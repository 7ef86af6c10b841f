//! Growable bit set.
//!
//! Backs the changed-field-sets, join-key dependency sets and active-row
//! sets used throughout the engine. Bits are addressed by non-negative
//! index and the set grows on demand when a bit is set.

use alloc::vec::Vec;

const WORD_BITS: usize = 64;

/// A growable set of bit indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    /// Creates an empty bit set.
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates an empty bit set with capacity for `bits` indices.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(WORD_BITS)),
        }
    }

    /// Sets the bit at `index`, growing if necessary.
    pub fn set(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }

    /// Clears the bit at `index`.
    pub fn clear(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word < self.words.len() {
            self.words[word] &= !(1u64 << (index % WORD_BITS));
        }
    }

    /// Returns whether the bit at `index` is set.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let word = index / WORD_BITS;
        word < self.words.len() && self.words[word] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Returns true if no bits are set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the number of set bits.
    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// ORs all bits of `other` into this set.
    pub fn or_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(other.words.iter()) {
            *dst |= *src;
        }
    }

    /// Returns whether this set and `other` share any set bit.
    pub fn intersects(&self, other: &BitSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Clears all bits.
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Calls `action` for each set bit in ascending index order.
    pub fn for_each(&self, mut action: impl FnMut(usize)) {
        for (i, word) in self.words.iter().enumerate() {
            let mut bits = *word;
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                action(i * WORD_BITS + bit);
                bits &= bits - 1;
            }
        }
    }

    /// Returns an iterator over set bit indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            let mut bits = *word;
            core::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(i * WORD_BITS + bit)
            })
        })
    }
}
