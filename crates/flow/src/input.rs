//! The subscriber contract and row sequence abstraction.

use crate::output::Output;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use trellis_core::{FieldBitSet, IndexedSet, Result, Schema};

/// Internal iteration over a set of row ids.
///
/// Event payloads are passed as sequences so every subscriber in a fan-out
/// receives the identical, read-only row set without copying.
pub trait RowSequence {
    /// Calls `action` for each row id.
    fn for_each(&self, action: &mut dyn FnMut(usize));

    /// Returns the number of rows, if cheaply known.
    fn count(&self) -> usize {
        let mut n = 0;
        self.for_each(&mut |_row| n += 1);
        n
    }
}

impl RowSequence for [usize] {
    fn for_each(&self, action: &mut dyn FnMut(usize)) {
        for row in self {
            action(*row);
        }
    }

    fn count(&self) -> usize {
        self.len()
    }
}

impl RowSequence for Vec<usize> {
    fn for_each(&self, action: &mut dyn FnMut(usize)) {
        self.as_slice().for_each(action);
    }

    fn count(&self) -> usize {
        self.len()
    }
}

impl RowSequence for IndexedSet {
    fn for_each(&self, action: &mut dyn FnMut(usize)) {
        IndexedSet::for_each(self, |row| action(row));
    }

    fn count(&self) -> usize {
        self.len()
    }
}

/// A subscriber to an operator's output.
///
/// `schema_updated(Some(..))` begins a bind; `schema_updated(None)` is the
/// unbind signal on which the subscriber must release its bound resources.
/// Binding is the only fallible step: data-path events cannot fail because
/// all resolution and casting happened at bind time.
pub trait TransformInput {
    /// Called when the subscription is established or terminated.
    fn set_source(&mut self, _source: Option<Output>) {}

    /// Announces the upstream schema, or `None` on unbind.
    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) -> Result<()>;

    /// Rows newly visible upstream.
    fn rows_added(&mut self, rows: &dyn RowSequence);

    /// Rows changed upstream; `changed_fields` holds the upstream field ids
    /// that changed, non-empty, valid for the schema in effect.
    fn rows_changed(&mut self, rows: &dyn RowSequence, changed_fields: &FieldBitSet);

    /// Rows no longer visible upstream.
    fn rows_removed(&mut self, rows: &dyn RowSequence);
}

/// Shared handle to a subscriber.
pub type InputHandle = Rc<RefCell<dyn TransformInput>>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_slice_row_sequence() {
        let rows = vec![3usize, 1, 2];
        let mut seen = Vec::new();
        RowSequence::for_each(&rows, &mut |row| seen.push(row));
        assert_eq!(seen, [3, 1, 2]);
        assert_eq!(rows.count(), 3);
    }

    #[test]
    fn test_indexed_set_row_sequence() {
        let mut set = IndexedSet::new();
        set.add(7);
        set.add(9);
        let seq: &dyn RowSequence = &set;
        assert_eq!(seq.count(), 2);
    }
}
