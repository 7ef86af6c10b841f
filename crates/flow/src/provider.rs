//! Row providers: iteration over "all currently active rows".
//!
//! An output's row provider exists for late-subscriber catch-up. Stateful
//! operators share their active-row set with their provider; pass-through
//! operators delegate to their upstream source.

use crate::output::Output;
use alloc::rc::Rc;
use core::cell::RefCell;
use trellis_core::BitSet;

/// Iterates the rows currently active in an operator's output row space.
pub trait RowProvider {
    fn for_each_row(&self, action: &mut dyn FnMut(usize));
}

/// An active-row bit set shared between an operator and its row provider.
pub type SharedBitSet = Rc<RefCell<BitSet>>;

/// Provider over a shared active-row bit set.
pub struct BitSetRowProvider {
    rows: SharedBitSet,
}

impl BitSetRowProvider {
    pub fn new(rows: SharedBitSet) -> Self {
        Self { rows }
    }
}

impl RowProvider for BitSetRowProvider {
    fn for_each_row(&self, action: &mut dyn FnMut(usize)) {
        self.rows.borrow().for_each(|row| action(row));
    }
}

/// Provider that forwards to the upstream source's provider, for operators
/// whose output row space is their input row space (e.g. conflation).
pub struct DelegatedRowProvider {
    source: Rc<RefCell<Option<Output>>>,
}

impl DelegatedRowProvider {
    pub fn new(source: Rc<RefCell<Option<Output>>>) -> Self {
        Self { source }
    }
}

impl RowProvider for DelegatedRowProvider {
    fn for_each_row(&self, action: &mut dyn FnMut(usize)) {
        let provider = self
            .source
            .borrow()
            .as_ref()
            .map(|output| output.row_provider());
        if let Some(provider) = provider {
            provider.for_each_row(action);
        }
    }
}

/// Provider for outputs with no active rows.
pub struct EmptyRowProvider;

impl RowProvider for EmptyRowProvider {
    fn for_each_row(&self, _action: &mut dyn FnMut(usize)) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_bitset_provider_sees_live_changes() {
        let rows: SharedBitSet = Rc::new(RefCell::new(BitSet::new()));
        let provider = BitSetRowProvider::new(rows.clone());

        rows.borrow_mut().set(2);
        rows.borrow_mut().set(5);

        let mut seen = Vec::new();
        provider.for_each_row(&mut |row| seen.push(row));
        assert_eq!(seen, [2, 5]);

        rows.borrow_mut().clear(2);
        seen.clear();
        provider.for_each_row(&mut |row| seen.push(row));
        assert_eq!(seen, [5]);
    }

    #[test]
    fn test_empty_provider() {
        let mut seen = Vec::new();
        EmptyRowProvider.for_each_row(&mut |row| seen.push(row));
        assert!(seen.is_empty());
    }
}
