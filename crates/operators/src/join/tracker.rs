//! Per-turn accumulator for joined-row state changes.

use trellis_core::{BitSet, FieldBitSet, IndexedSet};
use trellis_flow::Output;

/// Records join add/update/remove outcomes over one inbound event and
/// publishes them in removes, adds, changes order.
///
/// `join_updated` translates side-level replacement into outbound field
/// changes by ORing the precomputed outbound field-id set of the replaced
/// side into the changed-field-set; a row that was added this turn is
/// never also reported changed.
#[derive(Default)]
pub struct JoinChangeTracker {
    changed_fields: FieldBitSet,
    added_rows: IndexedSet,
    changed_rows: IndexedSet,
    removed_rows: IndexedSet,
    left_fields: BitSet,
    right_fields: BitSet,
}

impl JoinChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the outbound field-id sets of the two sides, rebuilt on
    /// each schema bind.
    pub fn set_outbound_field_ids(&mut self, left_fields: BitSet, right_fields: BitSet) {
        self.left_fields = left_fields;
        self.right_fields = right_fields;
    }

    pub fn join_added(&mut self, out_row: usize) {
        self.added_rows.add(out_row);
        self.removed_rows.remove(out_row);
    }

    pub fn join_updated(&mut self, out_row: usize, left_replaced: bool, right_replaced: bool) {
        if !self.added_rows.contains(out_row) {
            self.changed_rows.add(out_row);
            if left_replaced {
                self.changed_fields.or_with(&self.left_fields);
            }
            if right_replaced {
                self.changed_fields.or_with(&self.right_fields);
            }
        }
    }

    pub fn join_removed(&mut self, out_row: usize) {
        self.added_rows.remove(out_row);
        self.changed_rows.remove(out_row);
        self.removed_rows.add(out_row);
    }

    /// Marks a translated outbound field as changed.
    pub fn change_field(&mut self, field_id: usize) {
        self.changed_fields.field_changed(field_id);
    }

    /// Publishes the accumulated changes and resets for the next turn.
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
