//! Shared fixtures: an in-memory driving table and a recording subscriber.

// not every test binary uses every fixture
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::{BitSet, Field, FieldBitSet, Result, Schema, SchemaField};
use trellis_flow::{
    BitSetRowProvider, InputHandle, Output, RowSequence, SharedBitSet, TransformInput,
};

/// An in-memory source table: mutable long and double columns, an
/// active-row set, and an `Output` for operators to subscribe to.
///
/// Row ids are handed out monotonically and never reused, so a test can
/// keep referring to a row id after removing it.
pub struct TestTable {
    schema: Rc<Schema>,
    output: Output,
    active: SharedBitSet,
    next_row: Cell<usize>,
    longs: Vec<Rc<RefCell<Vec<i64>>>>,
    doubles: Vec<Rc<RefCell<Vec<f64>>>>,
    long_names: Vec<String>,
    double_names: Vec<String>,
}

impl TestTable {
    pub fn new(name: &str, long_cols: &[&str], double_cols: &[&str]) -> Self {
        let mut fields = Vec::new();
        let mut longs = Vec::new();
        let mut doubles = Vec::new();
        for col in long_cols {
            let store: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
            let read = store.clone();
            fields.push(SchemaField::new(
                fields.len(),
                *col,
                Field::Long(Rc::new(move |row: usize| {
                    read.borrow().get(row).copied().unwrap_or(0)
                })),
            ));
            longs.push(store);
        }
        for col in double_cols {
            let store: Rc<RefCell<Vec<f64>>> = Rc::new(RefCell::new(Vec::new()));
            let read = store.clone();
            fields.push(SchemaField::new(
                fields.len(),
                *col,
                Field::Double(Rc::new(move |row: usize| {
                    read.borrow().get(row).copied().unwrap_or(0.0)
                })),
            ));
            doubles.push(store);
        }
        let schema = Schema::new(name, fields);
        let active: SharedBitSet = Rc::new(RefCell::new(BitSet::new()));
        let output = Output::new(Rc::new(BitSetRowProvider::new(active.clone())));
        Self {
            schema,
            output,
            active,
            next_row: Cell::new(0),
            longs,
            doubles,
            long_names: long_cols.iter().map(|c| c.to_string()).collect(),
            double_names: double_cols.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn output(&self) -> Output {
        self.output.clone()
    }

    pub fn publish(&self) {
        self.output.update_schema(Some(self.schema.clone())).unwrap();
    }

    pub fn unpublish(&self) {
        self.output.update_schema(None).unwrap();
    }

    /// Adds a row with positional values per declared column order and
    /// notifies subscribers. Returns the new row id.
    pub fn add_row(&self, long_values: &[i64], double_values: &[f64]) -> usize {
        assert_eq!(long_values.len(), self.longs.len());
        assert_eq!(double_values.len(), self.doubles.len());
        let row = self.next_row.get();
        self.next_row.set(row + 1);
        for (store, value) in self.longs.iter().zip(long_values) {
            let mut column = store.borrow_mut();
            column.resize(row + 1, 0);
            column[row] = *value;
        }
        for (store, value) in self.doubles.iter().zip(double_values) {
            let mut column = store.borrow_mut();
            column.resize(row + 1, 0.0);
            column[row] = *value;
        }
        self.active.borrow_mut().set(row);
        self.output.notify_adds(&vec![row]);
        row
    }

    /// Writes a long column without notifying.
    pub fn set_long(&self, col: &str, row: usize, value: i64) {
        let index = self
            .long_names
            .iter()
            .position(|name| name == col)
            .unwrap();
        let mut column = self.longs[index].borrow_mut();
        if column.len() <= row {
            column.resize(row + 1, 0);
        }
        column[row] = value;
    }

    /// Writes a double column without notifying.
    pub fn set_double(&self, col: &str, row: usize, value: f64) {
        let index = self
            .double_names
            .iter()
            .position(|name| name == col)
            .unwrap();
        let mut column = self.doubles[index].borrow_mut();
        if column.len() <= row {
            column.resize(row + 1, 0.0);
        }
        column[row] = value;
    }

    /// Notifies a change of `cols` on `rows`.
    pub fn changed(&self, rows: &[usize], cols: &[&str]) {
        let mut fields = FieldBitSet::new();
        for col in cols {
            fields.field_changed(self.schema.maybe_field(col).unwrap().field_id());
        }
        self.output.notify_changes(&rows.to_vec(), &fields);
    }

    /// Writes a long column and notifies the change.
    pub fn update_long(&self, col: &str, row: usize, value: i64) {
        self.set_long(col, row, value);
        self.changed(&[row], &[col]);
    }

    /// Writes a double column and notifies the change.
    pub fn update_double(&self, col: &str, row: usize, value: f64) {
        self.set_double(col, row, value);
        self.changed(&[row], &[col]);
    }

    /// Removes rows and notifies subscribers.
    pub fn remove(&self, rows: &[usize]) {
        for &row in rows {
            self.active.borrow_mut().clear(row);
        }
        self.output.notify_removes(&rows.to_vec());
    }
}

/// Subscriber that records every event it receives as a readable string.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<String>,
}

impl RecordingSink {
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.events)
    }
}

impl TransformInput for RecordingSink {
    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) -> Result<()> {
        match schema {
            Some(s) => self.events.push(format!("schema:{}", s.name())),
            None => self.events.push(String::from("schema:none")),
        }
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

/// Creates a recording subscriber and its attachable handle.
pub fn recording_handle() -> (Rc<RefCell<RecordingSink>>, InputHandle) {
    let sink = Rc::new(RefCell::new(RecordingSink::default()));
    let handle: InputHandle = sink.clone();
    (sink, handle)
}

/// The active rows of an output, in ascending order.
pub fn active_rows(output: &Output) -> Vec<usize> {
    let mut rows = Vec::new();
    output.row_provider().for_each_row(&mut |row| rows.push(row));
    rows.sort_unstable();
    rows
}

/// Reads a long field of the published schema.
pub fn long_value(schema: &Schema, name: &str, row: usize) -> i64 {
    match schema.maybe_field(name).unwrap().field() {
        Field::Long(f) => f.value_at(row),
        other => panic!("expected long field, got {:?}", other.field_type()),
    }
}

/// Reads a double field of the published schema.
pub fn double_value(schema: &Schema, name: &str, row: usize) -> f64 {
    match schema.maybe_field(name).unwrap().field() {
        Field::Double(f) => f.value_at(row),
        other => panic!("expected double field, got {:?}", other.field_type()),
    }
}

/// Reads an int field of the published schema.
pub fn int_value(schema: &Schema, name: &str, row: usize) -> i32 {
    match schema.maybe_field(name).unwrap().field() {
        Field::Int(f) => f.value_at(row),
        other => panic!("expected int field, got {:?}", other.field_type()),
    }
}
