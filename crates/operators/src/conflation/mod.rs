//! Bounded batching and coalescing of change events.
//!
//! The conflator passes its upstream schema, adds and removes straight
//! through but holds change events back: a row changed several times while
//! pending is delivered once, with the union of all its reported field
//! sets, in first-arrival order. The pending batch is delivered when the
//! number of unique pending rows reaches the configured bound, when a
//! remove arrives, or when the owner calls `fire_pending_changes`.
//!
//! A row removed upstream while pending is dropped from the batch: its
//! remove still propagates, but no change is delivered for a row the
//! subscriber is about to lose.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use trellis_core::{Error, FieldBitSet, IndexedSet, Result, Schema};
use trellis_flow::{DelegatedRowProvider, InputHandle, Output, RowSequence, TransformInput};

struct ConflatorInput {
    max_pending_rows: usize,
    source: Rc<RefCell<Option<Output>>>,
    output: Output,
    // arrival order; membership lives in `is_pending`
    pending_rows: Vec<usize>,
    is_pending: IndexedSet,
    changed_fields: FieldBitSet,
    flush_buf: Vec<usize>,
}

impl ConflatorInput {
    fn flush(&mut self) {
        if self.is_pending.is_empty() {
            self.reset_pending();
            return;
        }
        self.flush_buf.clear();
        for &row in &self.pending_rows {
            if self.is_pending.contains(row) {
                self.flush_buf.push(row);
            }
        }
        if !self.flush_buf.is_empty() {
            self.output
                .notify_changes(&self.flush_buf, &self.changed_fields);
        }
        self.reset_pending();
    }

    fn reset_pending(&mut self) {
        self.pending_rows.clear();
        self.is_pending.clear();
        self.changed_fields.clear();
    }
}

impl TransformInput for ConflatorInput {
    fn set_source(&mut self, source: Option<Output>) {
        *self.source.borrow_mut() = source;
    }

    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) -> Result<()> {
        self.reset_pending();
        // identity row and field space: the upstream schema passes through
        self.output.update_schema(schema)
    }

    fn rows_added(&mut self, rows: &dyn RowSequence) {
        self.output.notify_adds(rows);
    }

    fn rows_changed(&mut self, rows: &dyn RowSequence, changed_fields: &FieldBitSet) {
        rows.for_each(&mut |row| {
            if self.is_pending.add(row) {
                self.pending_rows.push(row);
            }
        });
        changed_fields.for_each(|field_id| self.changed_fields.field_changed(field_id));
        if self.is_pending.len() >= self.max_pending_rows {
            self.flush();
        }
    }

    fn rows_removed(&mut self, rows: &dyn RowSequence) {
        rows.for_each(&mut |row| {
            self.is_pending.remove(row);
        });
        self.flush();
        self.output.notify_removes(rows);
    }
}

/// A live change conflator. Attach an upstream output to `input`; the
/// conflated stream publishes through `output` in the upstream's row
/// space.
pub struct ChangeConflator {
    input: Rc<RefCell<ConflatorInput>>,
    output: Output,
}

impl ChangeConflator {
    pub fn input(&self) -> InputHandle {
        self.input.clone()
    }

    pub fn output(&self) -> Output {
        self.output.clone()
    }

    /// Delivers the pending batch now, regardless of its size.
    pub fn fire_pending_changes(&self) {
        self.input.borrow_mut().flush();
    }

    /// Returns whether any changes are held back.
    pub fn changes_pending(&self) -> bool {
        !self.input.borrow().is_pending.is_empty()
    }
}

/// Configures and validates a `ChangeConflator`.
pub struct ConflatorBuilder {
    max_pending_rows: usize,
}

impl ConflatorBuilder {
    /// `max_pending_rows` is the unique-pending-row count at which the
    /// batch is delivered automatically.
    pub fn new(max_pending_rows: usize) -> Self {
        Self { max_pending_rows }
    }

    pub fn build(self) -> Result<ChangeConflator> {
        if self.max_pending_rows == 0 {
            return Err(Error::invalid_config("max pending rows must be positive"));
        }
        let source: Rc<RefCell<Option<Output>>> = Rc::new(RefCell::new(None));
        let output = Output::new(Rc::new(DelegatedRowProvider::new(source.clone())));
        let input = Rc::new(RefCell::new(ConflatorInput {
            max_pending_rows: self.max_pending_rows,
            source,
            output: output.clone(),
            pending_rows: Vec::new(),
            is_pending: IndexedSet::new(),
            changed_fields: FieldBitSet::new(),
            flush_buf: Vec::new(),
        }));
        Ok(ChangeConflator { input, output })
    }
}
