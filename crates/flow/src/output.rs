//! Subscription management and event fan-out.

use crate::input::{InputHandle, RowSequence};
use crate::provider::RowProvider;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use trellis_core::{FieldBitSet, Result, Schema};

struct OutputState {
    subscribers: Vec<InputHandle>,
    schema: Option<Rc<Schema>>,
    row_provider: Rc<dyn RowProvider>,
}

/// An operator's output: the current schema, the active-row provider, and
/// the subscriber list.
///
/// Cheaply cloneable; every clone refers to the same output. Fan-out
/// iterates a snapshot of the subscriber list taken before delivery, so a
/// subscriber may attach or detach during a fan-out without affecting the
/// other subscribers of that turn.
#[derive(Clone)]
pub struct Output {
    state: Rc<RefCell<OutputState>>,
}

impl Output {
    /// Creates an output whose catch-up rows come from `row_provider`.
    pub fn new(row_provider: Rc<dyn RowProvider>) -> Self {
        Self {
            state: Rc::new(RefCell::new(OutputState {
                subscribers: Vec::new(),
                schema: None,
                row_provider,
            })),
        }
    }

    /// Returns the currently published schema, if any.
    pub fn schema(&self) -> Option<Rc<Schema>> {
        self.state.borrow().schema.clone()
    }

    /// Returns the active-row provider.
    pub fn row_provider(&self) -> Rc<dyn RowProvider> {
        self.state.borrow().row_provider.clone()
    }

    /// Returns the number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    /// Registers a subscriber. A no-op if already registered.
    ///
    /// If a schema is active, the subscriber immediately receives
    /// `schema_updated` followed by a synthetic `rows_added` of all rows
    /// currently active, catching it up before any live event.
    pub fn attach(&self, input: &InputHandle) -> Result<()> {
        let (schema, provider) = {
            let mut state = self.state.borrow_mut();
            if state.subscribers.iter().any(|s| Rc::ptr_eq(s, input)) {
                return Ok(());
            }
            state.subscribers.push(input.clone());
            (state.schema.clone(), state.row_provider.clone())
        };
        let mut subscriber = input.borrow_mut();
        subscriber.set_source(Some(self.clone()));
        if let Some(schema) = schema {
            subscriber.schema_updated(Some(schema))?;
            let mut rows = Vec::new();
            provider.for_each_row(&mut |row| rows.push(row));
            if !rows.is_empty() {
                subscriber.rows_added(&rows);
            }
        }
        Ok(())
    }

    /// Unregisters a subscriber. A no-op if not registered. The detached
    /// subscriber receives a `None` schema so it unbinds, then loses its
    /// source.
    pub fn detach(&self, input: &InputHandle) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let before = state.subscribers.len();
            state.subscribers.retain(|s| !Rc::ptr_eq(s, input));
            state.subscribers.len() != before
        };
        if removed {
            let mut subscriber = input.borrow_mut();
            // unbind cannot fail: subscribers release, not resolve
            let _ = subscriber.schema_updated(None);
            subscriber.set_source(None);
        }
    }

    /// Publishes a schema (or `None`) and fans it out to all subscribers.
    ///
    /// Returns the first bind error raised by a subscriber, after the
    /// fan-out has reached every subscriber.
    pub fn update_schema(&self, schema: Option<Rc<Schema>>) -> Result<()> {
        self.state.borrow_mut().schema = schema.clone();
        let snapshot = self.snapshot();
        let mut first_error = None;
        for subscriber in &snapshot {
            if let Err(err) = subscriber.borrow_mut().schema_updated(schema.clone()) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Fans out an add event.
    pub fn notify_adds(&self, rows: &dyn RowSequence) {
        for subscriber in &self.snapshot() {
            subscriber.borrow_mut().rows_added(rows);
        }
    }

    /// Fans out a change event.
    pub fn notify_changes(&self, rows: &dyn RowSequence, changed_fields: &FieldBitSet) {
        for subscriber in &self.snapshot() {
            subscriber.borrow_mut().rows_changed(rows, changed_fields);
        }
    }

    /// Fans out a remove event.
    pub fn notify_removes(&self, rows: &dyn RowSequence) {
        for subscriber in &self.snapshot() {
            subscriber.borrow_mut().rows_removed(rows);
        }
    }

    fn snapshot(&self) -> Vec<InputHandle> {
        self.state.borrow().subscribers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TransformInput;
    use crate::provider::{BitSetRowProvider, EmptyRowProvider, SharedBitSet};
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use trellis_core::bitset::BitSet;
    use trellis_core::field::row_identity_field;
    use trellis_core::schema::{Schema, SchemaField};

    #[derive(Default)]
    struct RecordingInput {
        events: Vec<String>,
    }

    impl TransformInput for RecordingInput {
        fn schema_updated(&mut self, schema: Option<Rc<Schema>>) -> Result<()> {
            match schema {
                Some(s) => self.events.push(alloc::format!("schema:{}", s.name())),
                None => self.events.push(String::from("schema:none")),
            }
            Ok(())
        }

        fn rows_added(&mut self, rows: &dyn RowSequence) {
            let mut ids = Vec::new();
            rows.for_each(&mut |row| ids.push(row));
            self.events.push(alloc::format!("added:{:?}", ids));
        }

        fn rows_changed(&mut self, rows: &dyn RowSequence, _changed: &FieldBitSet) {
            self.events.push(alloc::format!("changed:{}", rows.count()));
        }

        fn rows_removed(&mut self, rows: &dyn RowSequence) {
            self.events.push(alloc::format!("removed:{}", rows.count()));
        }
    }

    fn test_schema() -> Rc<Schema> {
        Schema::new(
            "src",
            vec![SchemaField::new(0, "id", row_identity_field())],
        )
    }

    fn recording_handle() -> (Rc<RefCell<RecordingInput>>, InputHandle) {
        let concrete = Rc::new(RefCell::new(RecordingInput::default()));
        let handle: InputHandle = concrete.clone();
        (concrete, handle)
    }

    #[test]
    fn test_attach_before_schema_sends_nothing() {
        let output = Output::new(Rc::new(EmptyRowProvider));
        let (recorder, handle) = recording_handle();
        output.attach(&handle).unwrap();
        assert!(recorder.borrow().events.is_empty());
    }

    #[test]
    fn test_late_attach_catches_up() {
        let rows: SharedBitSet = Rc::new(RefCell::new(BitSet::new()));
        rows.borrow_mut().set(1);
        rows.borrow_mut().set(4);
        let output = Output::new(Rc::new(BitSetRowProvider::new(rows)));
        output.update_schema(Some(test_schema())).unwrap();

        let (recorder, handle) = recording_handle();
        output.attach(&handle).unwrap();
        assert_eq!(
            recorder.borrow().events,
            ["schema:src", "added:[1, 4]"]
        );
    }

    #[test]
    fn test_attach_is_idempotent() {
        let output = Output::new(Rc::new(EmptyRowProvider));
        let (_, handle) = recording_handle();
        output.attach(&handle).unwrap();
        output.attach(&handle).unwrap();
        assert_eq!(output.subscriber_count(), 1);
    }

    #[test]
    fn test_detach_unbinds_and_is_idempotent() {
        let output = Output::new(Rc::new(EmptyRowProvider));
        output.update_schema(Some(test_schema())).unwrap();
        let (recorder, handle) = recording_handle();
        output.attach(&handle).unwrap();

        output.detach(&handle);
        output.detach(&handle);
        assert_eq!(output.subscriber_count(), 0);
        assert_eq!(recorder.borrow().events.last().unwrap(), "schema:none");

        // no further delivery after detach
        output.notify_adds(&vec![9usize]);
        assert_eq!(recorder.borrow().events.last().unwrap(), "schema:none");
    }

    #[test]
    fn test_fanout_reaches_all_subscribers() {
        let output = Output::new(Rc::new(EmptyRowProvider));
        let (rec1, h1) = recording_handle();
        let (rec2, h2) = recording_handle();
        output.attach(&h1).unwrap();
        output.attach(&h2).unwrap();

        output.notify_adds(&vec![1usize, 2]);
        let mut changed = FieldBitSet::new();
        changed.field_changed(0);
        output.notify_changes(&vec![1usize], &changed);
        output.notify_removes(&vec![2usize]);

        for rec in [rec1, rec2] {
            assert_eq!(
                rec.borrow().events,
                ["added:[1, 2]", "changed:1", "removed:1"]
            );
        }
    }

    #[test]
    fn test_detach_then_reattach_round_trip() {
        let rows: SharedBitSet = Rc::new(RefCell::new(BitSet::new()));
        for row in 0..3 {
            rows.borrow_mut().set(row);
        }
        let output = Output::new(Rc::new(BitSetRowProvider::new(rows)));
        output.update_schema(Some(test_schema())).unwrap();

        let (recorder, handle) = recording_handle();
        output.attach(&handle).unwrap();
        output.detach(&handle);
        recorder.borrow_mut().events.clear();

        output.attach(&handle).unwrap();
        assert_eq!(
            recorder.borrow().events,
            ["schema:src", "added:[0, 1, 2]"]
        );
    }
}
