//! Per-turn accumulators of row state changes.
//!
//! A stateful operator records the rows it removed, added and changed over
//! one inbound event, then publishes everything with a single `fire` in
//! removes-then-adds-then-changes order. That ordering lets a row be
//! removed and an unrelated row added within the same turn without
//! ambiguity, and guarantees a changed row is never reported after its own
//! removal in the same turn.

use crate::output::Output;
use alloc::vec::Vec;
use trellis_core::{FieldBitSet, IndexedSet};

/// Plain accumulator without row dedup, for sources that already produce
/// each row at most once per turn.
#[derive(Default)]
pub struct StateChange {
    changed_fields: FieldBitSet,
    added_rows: Vec<usize>,
    changed_rows: Vec<usize>,
    removed_rows: Vec<usize>,
}

impl StateChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, row: usize) {
        self.added_rows.push(row);
    }

    pub fn change_row(&mut self, row: usize) {
        self.changed_rows.push(row);
    }

    pub fn remove_row(&mut self, row: usize) {
        self.removed_rows.push(row);
    }

    pub fn change_field(&mut self, field_id: usize) {
        self.changed_fields.field_changed(field_id);
    }

    /// Publishes accumulated changes in removes, adds, changes order, then
    /// resets for the next turn.
    pub fn fire(&mut self, output: &Output) {
        if !self.removed_rows.is_empty() {
            output.notify_removes(&self.removed_rows);
        }
        if !self.added_rows.is_empty() {
            output.notify_adds(&self.added_rows);
        }
        if !self.changed_rows.is_empty() {
            output.notify_changes(&self.changed_rows, &self.changed_fields);
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.removed_rows.clear();
        self.added_rows.clear();
        self.changed_rows.clear();
        self.changed_fields.clear();
    }
}

/// Deduplicating accumulator for operators whose turn may touch the same
/// output row several times (e.g. several members of one group).
///
/// Within a turn: removing a row cancels any pending add/change for it;
/// adding a row cancels a pending remove; `change_row_if_not_added` keeps
/// a row that was born this turn from also being reported as changed.
#[derive(Default)]
pub struct StateChangeSet {
    changed_fields: FieldBitSet,
    added_rows: IndexedSet,
    changed_rows: IndexedSet,
    removed_rows: IndexedSet,
}

impl StateChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, row: usize) {
        self.added_rows.add(row);
        self.removed_rows.remove(row);
    }

    pub fn change_row(&mut self, row: usize) {
        self.changed_rows.add(row);
    }

    pub fn change_row_if_not_added(&mut self, row: usize) {
        if !self.added_rows.contains(row) {
            self.changed_rows.add(row);
        }
    }

    pub fn remove_row(&mut self, row: usize) {
        self.changed_rows.remove(row);
        self.added_rows.remove(row);
        self.removed_rows.add(row);
    }

    pub fn change_field(&mut self, field_id: usize) {
        self.changed_fields.field_changed(field_id);
    }

    /// Returns the changed-field set being accumulated.
    pub fn changed_fields_mut(&mut self) -> &mut FieldBitSet {
        &mut self.changed_fields
    }

    /// Publishes accumulated changes in removes, adds, changes order.
    /// `removed_row_consumer` is invoked for each removed row after the
    /// remove notification, so owners can release per-row state.
    pub fn fire(&mut self, output: &Output, mut removed_row_consumer: impl FnMut(usize)) {
        if !self.removed_rows.is_empty() {
            output.notify_removes(&self.removed_rows);
        }
        if !self.added_rows.is_empty() {
            output.notify_adds(&self.added_rows);
        }
        if !self.changed_rows.is_empty() {
            output.notify_changes(&self.changed_rows, &self.changed_fields);
        }
        self.removed_rows.for_each(|row| removed_row_consumer(row));
        self.reset();
    }

    fn reset(&mut self) {
        self.removed_rows.clear();
        self.added_rows.clear();
        self.changed_rows.clear();
        self.changed_fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputHandle, RowSequence, TransformInput};
    use crate::provider::EmptyRowProvider;
    use alloc::format;
    use alloc::rc::Rc;
    use alloc::string::String;
    use core::cell::RefCell;
    use trellis_core::{Result, Schema};

    #[derive(Default)]
    struct EventLog {
        events: Vec<String>,
    }

    impl TransformInput for EventLog {
        fn schema_updated(&mut self, _schema: Option<Rc<Schema>>) -> Result<()> {
            Ok(())
        }

        fn rows_added(&mut self, rows: &dyn RowSequence) {
            let mut ids = Vec::new();
            rows.for_each(&mut |row| ids.push(row));
            ids.sort_unstable();
            self.events.push(format!("added:{:?}", ids));
        }

        fn rows_changed(&mut self, rows: &dyn RowSequence, changed: &FieldBitSet) {
            let mut ids = Vec::new();
            rows.for_each(&mut |row| ids.push(row));
            ids.sort_unstable();
            let mut fields = Vec::new();
            changed.for_each(|f| fields.push(f));
            self.events.push(format!("changed:{:?}:{:?}", ids, fields));
        }

        fn rows_removed(&mut self, rows: &dyn RowSequence) {
            let mut ids = Vec::new();
            rows.for_each(&mut |row| ids.push(row));
            ids.sort_unstable();
            self.events.push(format!("removed:{:?}", ids));
        }
    }

    fn wired_output() -> (Output, Rc<RefCell<EventLog>>) {
        let output = Output::new(Rc::new(EmptyRowProvider));
        let log = Rc::new(RefCell::new(EventLog::default()));
        let handle: InputHandle = log.clone();
        output.attach(&handle).unwrap();
        (output, log)
    }

    #[test]
    fn test_fire_order_removes_adds_changes() {
        let (output, log) = wired_output();
        let mut change = StateChange::new();
        change.change_row(3);
        change.add_row(2);
        change.remove_row(1);
        change.change_field(0);
        change.fire(&output);
        assert_eq!(
            log.borrow().events,
            ["removed:[1]", "added:[2]", "changed:[3]:[0]"]
        );
    }

    #[test]
    fn test_fire_resets_state() {
        let (output, log) = wired_output();
        let mut change = StateChange::new();
        change.add_row(1);
        change.fire(&output);
        change.fire(&output);
        assert_eq!(log.borrow().events, ["added:[1]"]);
    }

    #[test]
    fn test_set_add_then_remove_same_turn() {
        let (output, log) = wired_output();
        let mut change = StateChangeSet::new();
        change.add_row(5);
        change.remove_row(5);
        change.fire(&output, |_row| {});
        // the add was cancelled; only the remove fires
        assert_eq!(log.borrow().events, ["removed:[5]"]);
    }

    #[test]
    fn test_set_change_if_not_added_suppressed_for_new_rows() {
        let (output, log) = wired_output();
        let mut change = StateChangeSet::new();
        change.add_row(4);
        change.change_row_if_not_added(4);
        change.change_row_if_not_added(9);
        change.change_field(1);
        change.fire(&output, |_row| {});
        assert_eq!(log.borrow().events, ["added:[4]", "changed:[9]:[1]"]);
    }

    #[test]
    fn test_set_removed_row_consumer_runs_after_notify() {
        let (output, _log) = wired_output();
        let mut change = StateChangeSet::new();
        change.remove_row(2);
        change.remove_row(8);
        let mut cleaned = Vec::new();
        change.fire(&output, |row| cleaned.push(row));
        cleaned.sort_unstable();
        assert_eq!(cleaned, [2, 8]);
    }
}
