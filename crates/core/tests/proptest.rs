//! Property-based tests for the trellis-core collection primitives.

use proptest::prelude::*;
use std::collections::BTreeSet;
use trellis_core::{BitSet, IndexedSet, Interner};

/// An op stream over a set of small row ids.
fn ops_strategy() -> impl Strategy<Value = Vec<(bool, usize)>> {
    prop::collection::vec((any::<bool>(), 0usize..64), 1..200)
}

proptest! {
    /// IndexedSet agrees with a plain set under any add/remove stream.
    #[test]
    fn indexed_set_matches_reference(ops in ops_strategy()) {
        let mut set = IndexedSet::new();
        let mut reference = BTreeSet::new();
        for (add, value) in ops {
            if add {
                prop_assert_eq!(set.add(value), reference.insert(value));
            } else {
                prop_assert_eq!(set.remove(value), reference.remove(&value));
            }
            prop_assert_eq!(set.len(), reference.len());
        }
        let mut seen: Vec<usize> = set.iter().collect();
        seen.sort_unstable();
        let expected: Vec<usize> = reference.into_iter().collect();
        prop_assert_eq!(seen, expected);
    }

    /// BitSet agrees with a plain set, including ascending iteration.
    #[test]
    fn bitset_matches_reference(ops in ops_strategy()) {
        let mut bits = BitSet::new();
        let mut reference = BTreeSet::new();
        for (set, id) in ops {
            if set {
                bits.set(id);
                reference.insert(id);
            } else {
                bits.clear(id);
                reference.remove(&id);
            }
        }
        prop_assert_eq!(bits.cardinality(), reference.len());
        let mut seen = Vec::new();
        bits.for_each(|id| seen.push(id));
        let expected: Vec<usize> = reference.iter().copied().collect();
        prop_assert_eq!(seen, expected);
    }

    /// Interning is stable and entries stay dense under free/reintern
    /// cycles: every entry ever handed out is below the number of live
    /// keys plus the number of frees.
    #[test]
    fn interner_entries_stay_dense(keys in prop::collection::vec(0i64..32, 1..100)) {
        let mut interner: Interner<i64> = Interner::new();
        let mut entries = Vec::new();
        for &key in &keys {
            let entry = interner.intern(key);
            prop_assert_eq!(interner.intern(key), entry);
            prop_assert_eq!(interner.entry_of(&key), Some(entry));
            entries.push(entry);
        }
        let distinct: BTreeSet<i64> = keys.iter().copied().collect();
        prop_assert_eq!(interner.len(), distinct.len());
        // dense: entry ids never exceed the number of distinct keys
        prop_assert!(entries.into_iter().all(|entry| entry < distinct.len()));

        // freeing an entry makes it the next one handed out
        let freed = interner.entry_of(&keys[0]).unwrap();
        interner.free_entry(freed);
        prop_assert_eq!(interner.entry_of(&keys[0]), None);
        prop_assert_eq!(interner.intern(1000), freed);
    }
}
