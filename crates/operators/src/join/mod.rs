//! Incremental lookup join between two row streams.
//!
//! The join subscribes to a left and a right upstream output and maintains
//! the set of row pairs whose interned join keys are equal. The joined
//! output is keyed by the left row id: left fields read their source rows
//! directly, right fields read through the key-matched right row and yield
//! type defaults while unmatched.
//!
//! A field change on either side re-evaluates that row's key only when the
//! inbound changed-field-set intersects the side's join-key dependency set,
//! resolved once per schema bind.

mod mapper;
mod tracker;

use crate::interner::DynamicJoinInterner;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use mapper::LookupJoinMapper;
use tracker::JoinChangeTracker;
use trellis_core::{
    mapped_field, BitSet, Error, Field, FieldBitSet, FieldMapping, FieldMappingBuilder, Result,
    RowMapper, Schema, SchemaField, SchemaFieldResolver,
};
use trellis_flow::{BitSetRowProvider, InputHandle, Output, RowSequence, TransformInput};

/// Which sides' join-key fields appear in the joined schema. The two
/// sides' key fields are equal by construction, so emitting both is
/// usually redundant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKeyHandling {
    KeepAll,
    KeepLeft,
    KeepRight,
}

impl JoinKeyHandling {
    fn keep_left_keys(self) -> bool {
        matches!(self, JoinKeyHandling::KeepAll | JoinKeyHandling::KeepLeft)
    }

    fn keep_right_keys(self) -> bool {
        matches!(self, JoinKeyHandling::KeepAll | JoinKeyHandling::KeepRight)
    }
}

/// What to do when a right-side field name collides with a name already
/// claimed in the joined schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameConflictPolicy {
    /// Drop the colliding field from the joined schema.
    Drop,
    /// Rename with an increasing numeric suffix until free.
    NumberSuffix,
}

#[derive(Default)]
struct SideState {
    field_mapping: Option<FieldMapping>,
    join_key_dependencies: BitSet,
}

struct JoinCore {
    name: String,
    mapper: Rc<RefCell<LookupJoinMapper>>,
    tracker: JoinChangeTracker,
    output: Output,
    left_schema: Option<Rc<Schema>>,
    right_schema: Option<Rc<Schema>>,
    key_handling: JoinKeyHandling,
    name_conflicts: NameConflictPolicy,
    left_source_row_field: Option<String>,
    right_source_row_field: Option<String>,
    left: SideState,
    right: SideState,
}

impl JoinCore {
    /// Binds when both sides have a schema, tears down otherwise. A
    /// failed bind also tears down, leaving the operator unbound.
    fn schemas_updated(&mut self) -> Result<()> {
        let schemas = (self.left_schema.clone(), self.right_schema.clone());
        if let (Some(left), Some(right)) = schemas {
            if let Err(err) = self.bind(&left, &right) {
                self.tear_down();
                return Err(err);
            }
            Ok(())
        } else {
            self.tear_down();
            Ok(())
        }
    }

    fn bind(&mut self, left_schema: &Rc<Schema>, right_schema: &Rc<Schema>) -> Result<()> {
        let mut left_resolver = SchemaFieldResolver::new(left_schema, "join interner");
        let mut right_resolver = SchemaFieldResolver::new(right_schema, "join interner");
        self.mapper
            .borrow_mut()
            .bind(&mut left_resolver, &mut right_resolver)?;
        let left_deps = left_resolver.into_dependencies();
        let right_deps = right_resolver.into_dependencies();

        let mut fields: Vec<SchemaField> = Vec::new();
        let mut taken: HashMap<String, usize> = HashMap::new();
        let mut left_out = BitSet::new();
        let mut right_out = BitSet::new();
        let mut left_mapping = FieldMappingBuilder::new(left_schema.size());
        let mut right_mapping = FieldMappingBuilder::new(right_schema.size());

        if let Some(name) = self.left_source_row_field.clone() {
            let out_id =
                add_field(&mut fields, &mut taken, name, left_source_row_field());
            left_out.set(out_id);
        }
        if let Some(name) = self.right_source_row_field.clone() {
            let out_id =
                add_field(&mut fields, &mut taken, name, self.right_source_row_accessor());
            right_out.set(out_id);
        }

        let keep_left_keys = self.key_handling.keep_left_keys();
        for in_field in left_schema.fields() {
            if !keep_left_keys && left_deps.get(in_field.field_id()) {
                continue;
            }
            let Some(name) = self.resolve_name(in_field.name(), &taken) else {
                continue;
            };
            // left fields are identity-mapped: out row id == left row id
            let out_id = add_field(&mut fields, &mut taken, name, in_field.field().clone());
            left_out.set(out_id);
            left_mapping.map(in_field.field_id(), out_id);
        }

        let right_row_mapper = self.right_row_mapper();
        let keep_right_keys = self.key_handling.keep_right_keys();
        for in_field in right_schema.fields() {
            if !keep_right_keys && right_deps.get(in_field.field_id()) {
                continue;
            }
            let Some(name) = self.resolve_name(in_field.name(), &taken) else {
                continue;
            };
            let mapped = mapped_field(in_field.field(), right_row_mapper.clone());
            let out_id = add_field(&mut fields, &mut taken, name, mapped);
            right_out.set(out_id);
            right_mapping.map(in_field.field_id(), out_id);
        }

        self.left.field_mapping = Some(left_mapping.build());
        self.left.join_key_dependencies = left_deps;
        self.right.field_mapping = Some(right_mapping.build());
        self.right.join_key_dependencies = right_deps;
        self.tracker.set_outbound_field_ids(left_out, right_out);
        self.output
            .update_schema(Some(Schema::new(self.name.clone(), fields)))
    }

    fn tear_down(&mut self) {
        if self.output.schema().is_some() {
            // unbind fan-out cannot fail: subscribers release, not resolve
            let _ = self.output.update_schema(None);
        }
        self.mapper.borrow_mut().unbind();
        self.left = SideState::default();
        self.right = SideState::default();
        self.tracker
            .set_outbound_field_ids(BitSet::new(), BitSet::new());
    }

    fn right_row_mapper(&self) -> Rc<dyn RowMapper> {
        let mapper = Rc::clone(&self.mapper);
        Rc::new(move |row: usize| mapper.borrow().right_source_row(row))
    }

    fn right_source_row_accessor(&self) -> Field {
        let mapper = Rc::clone(&self.mapper);
        Field::Int(Rc::new(move |row: usize| {
            match mapper.borrow().right_source_row(row) {
                Some(right_row) => right_row as i32,
                None => -1,
            }
        }))
    }

    fn resolve_name(&self, base: &str, taken: &HashMap<String, usize>) -> Option<String> {
        if !taken.contains_key(base) {
            return Some(String::from(base));
        }
        match self.name_conflicts {
            NameConflictPolicy::Drop => None,
            NameConflictPolicy::NumberSuffix => (1usize..)
                .map(|n| format!("{}_{}", base, n))
                .find(|candidate| !taken.contains_key(candidate)),
        }
    }

    fn left_rows_added(&mut self, rows: &dyn RowSequence) {
        {
            let mut mapper = self.mapper.borrow_mut();
            rows.for_each(&mut |row| mapper.left_row_add(row, &mut self.tracker));
        }
        self.tracker.fire(&self.output);
    }

    fn left_rows_changed(&mut self, rows: &dyn RowSequence, changed: &FieldBitSet) {
        let re_eval_key = changed.intersects(&self.left.join_key_dependencies);
        if let Some(mapping) = &self.left.field_mapping {
            mapping.translate(changed, |id| self.tracker.change_field(id));
        }
        {
            let mut mapper = self.mapper.borrow_mut();
            rows.for_each(&mut |row| mapper.left_row_change(row, re_eval_key, &mut self.tracker));
        }
        self.tracker.fire(&self.output);
    }

    fn left_rows_removed(&mut self, rows: &dyn RowSequence) {
        {
            let mut mapper = self.mapper.borrow_mut();
            rows.for_each(&mut |row| mapper.left_row_remove(row, &mut self.tracker));
        }
        self.tracker.fire(&self.output);
    }

    fn right_rows_added(&mut self, rows: &dyn RowSequence) {
        {
            let mut mapper = self.mapper.borrow_mut();
            rows.for_each(&mut |row| mapper.right_row_add(row, &mut self.tracker));
        }
        self.tracker.fire(&self.output);
    }

    fn right_rows_changed(&mut self, rows: &dyn RowSequence, changed: &FieldBitSet) {
        let re_eval_key = changed.intersects(&self.right.join_key_dependencies);
        if let Some(mapping) = &self.right.field_mapping {
            mapping.translate(changed, |id| self.tracker.change_field(id));
        }
        {
            let mut mapper = self.mapper.borrow_mut();
            rows.for_each(&mut |row| mapper.right_row_change(row, re_eval_key, &mut self.tracker));
        }
        self.tracker.fire(&self.output);
    }

    fn right_rows_removed(&mut self, rows: &dyn RowSequence) {
        {
            let mut mapper = self.mapper.borrow_mut();
            rows.for_each(&mut |row| mapper.right_row_remove(row, &mut self.tracker));
        }
        self.tracker.fire(&self.output);
    }
}

fn left_source_row_field() -> Field {
    Field::Int(Rc::new(|row: usize| row as i32))
}

fn add_field(
    fields: &mut Vec<SchemaField>,
    taken: &mut HashMap<String, usize>,
    name: String,
    field: Field,
) -> usize {
    let out_id = fields.len();
    taken.insert(name.clone(), out_id);
    fields.push(SchemaField::new(out_id, name, field));
    out_id
}

struct LeftInput {
    core: Rc<RefCell<JoinCore>>,
}

impl TransformInput for LeftInput {
    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.left_schema = schema;
        core.schemas_updated()
    }

    fn rows_added(&mut self, rows: &dyn RowSequence) {
        self.core.borrow_mut().left_rows_added(rows);
    }

    fn rows_changed(&mut self, rows: &dyn RowSequence, changed_fields: &FieldBitSet) {
        self.core.borrow_mut().left_rows_changed(rows, changed_fields);
    }

    fn rows_removed(&mut self, rows: &dyn RowSequence) {
        self.core.borrow_mut().left_rows_removed(rows);
    }
}

struct RightInput {
    core: Rc<RefCell<JoinCore>>,
}

impl TransformInput for RightInput {
    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.right_schema = schema;
        core.schemas_updated()
    }

    fn rows_added(&mut self, rows: &dyn RowSequence) {
        self.core.borrow_mut().right_rows_added(rows);
    }

    fn rows_changed(&mut self, rows: &dyn RowSequence, changed_fields: &FieldBitSet) {
        self.core.borrow_mut().right_rows_changed(rows, changed_fields);
    }

    fn rows_removed(&mut self, rows: &dyn RowSequence) {
        self.core.borrow_mut().right_rows_removed(rows);
    }
}

/// A live equi-join. Attach upstream outputs to `left_input` and
/// `right_input`; the joined stream publishes through `output` once both
/// sides are bound.
pub struct Join {
    left_input: InputHandle,
    right_input: InputHandle,
    output: Output,
}

impl Join {
    pub fn left_input(&self) -> InputHandle {
        self.left_input.clone()
    }

    pub fn right_input(&self) -> InputHandle {
        self.right_input.clone()
    }

    pub fn output(&self) -> Output {
        self.output.clone()
    }
}

/// Configures and validates a `Join` before any data flows.
pub struct JoinBuilder {
    name: String,
    left_keys: Vec<String>,
    right_keys: Vec<String>,
    outer: bool,
    key_handling: JoinKeyHandling,
    name_conflicts: NameConflictPolicy,
    left_source_row_field: Option<String>,
    right_source_row_field: Option<String>,
}

impl JoinBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            left_keys: Vec::new(),
            right_keys: Vec::new(),
            outer: false,
            key_handling: JoinKeyHandling::KeepAll,
            name_conflicts: NameConflictPolicy::Drop,
            left_source_row_field: None,
            right_source_row_field: None,
        }
    }

    /// Join key field names resolved against the left schema, in key
    /// order.
    pub fn left_keys(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.left_keys = names.into_iter().map(Into::into).collect();
        self
    }

    /// Join key field names resolved against the right schema; must pair
    /// with `left_keys` position by position.
    pub fn right_keys(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.right_keys = names.into_iter().map(Into::into).collect();
        self
    }

    /// Outer join: every left row is active, matched or not.
    pub fn outer(mut self, outer: bool) -> Self {
        self.outer = outer;
        self
    }

    pub fn key_handling(mut self, key_handling: JoinKeyHandling) -> Self {
        self.key_handling = key_handling;
        self
    }

    pub fn name_conflicts(mut self, policy: NameConflictPolicy) -> Self {
        self.name_conflicts = policy;
        self
    }

    /// Adds a diagnostic int field exposing the left source row id.
    pub fn left_source_row_field(mut self, name: impl Into<String>) -> Self {
        self.left_source_row_field = Some(name.into());
        self
    }

    /// Adds a diagnostic int field exposing the matched right source row
    /// id, or -1 while unmatched.
    pub fn right_source_row_field(mut self, name: impl Into<String>) -> Self {
        self.right_source_row_field = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Join> {
        if self.name.is_empty() {
            return Err(Error::invalid_config("join name is empty"));
        }
        let interner = DynamicJoinInterner::new(self.left_keys, self.right_keys)?;
        let mapper = Rc::new(RefCell::new(LookupJoinMapper::new(
            interner.into_boxed(),
            self.outer,
        )));
        let output = Output::new(Rc::new(BitSetRowProvider::new(
            mapper.borrow().active_rows(),
        )));
        let core = Rc::new(RefCell::new(JoinCore {
            name: self.name,
            mapper,
            tracker: JoinChangeTracker::new(),
            output: output.clone(),
            left_schema: None,
            right_schema: None,
            key_handling: self.key_handling,
            name_conflicts: self.name_conflicts,
            left_source_row_field: self.left_source_row_field,
            right_source_row_field: self.right_source_row_field,
            left: SideState::default(),
            right: SideState::default(),
        }));
        Ok(Join {
            left_input: Rc::new(RefCell::new(LeftInput { core: core.clone() })),
            right_input: Rc::new(RefCell::new(RightInput { core })),
            output,
        })
    }
}
