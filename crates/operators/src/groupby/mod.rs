//! Incremental group-by over one row stream.
//!
//! Inbound rows are assigned to groups by a `GroupFunction`; each live
//! group is one parent output row whose id is the group id. The parent
//! schema carries the group id, an optional member count, optional
//! pass-through fields read via a representative member, and the outbound
//! fields of the configured aggregation functions.
//!
//! A change whose inbound fields touch neither the group function nor any
//! aggregation dependency propagates nothing. When the group function's
//! dependencies are touched, changed rows are re-assigned and may move
//! between groups; a move is a remove from the old group and an add to the
//! new one, in that order.

mod dependency;
mod functions;
mod mapping;
mod mods;

pub use functions::{
    AggregationFunction, AvgAggregation, FieldGroupFunction, GroupFunction, SumAggregation,
};
pub use mapping::{child_group_field, GroupMapping, NO_GROUP};

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use dependency::DependencyMap;
use hashbrown::HashMap;
use mapping::{count_field, group_id_field, representative_mapper};
use mods::GroupRowMods;
use trellis_core::{
    mapped_field, BitSet, Error, Field, FieldBitSet, IndexedSet, Result, Schema, SchemaField,
    SchemaFieldResolver,
};
use trellis_flow::{
    BitSetRowProvider, InputHandle, Output, RowSequence, StateChangeSet, TransformInput,
};

struct GroupByInput {
    name: String,
    group_field_name: String,
    count_field_name: Option<String>,
    forward_fields: Vec<String>,
    group_function: Box<dyn GroupFunction>,
    group_dependencies: BitSet,
    functions: Vec<Box<dyn AggregationFunction>>,
    mapping: Rc<RefCell<GroupMapping>>,
    dependency_map: DependencyMap,
    membership_fields: BitSet,
    state_change: StateChangeSet,
    changed_functions: IndexedSet,
    added: GroupRowMods,
    changed: GroupRowMods,
    removed: GroupRowMods,
    output: Output,
}

impl GroupByInput {
    fn bind(&mut self, schema: &Rc<Schema>) -> Result<()> {
        self.mapping.borrow_mut().reset();
        self.dependency_map.reset();

        let mut group_resolver = SchemaFieldResolver::new(schema, "group function");
        self.group_function.bind(&mut group_resolver)?;
        self.group_dependencies = group_resolver.into_dependencies();

        let mut fields: Vec<SchemaField> = Vec::new();
        let mut taken: HashMap<String, usize> = HashMap::new();
        let mut membership = BitSet::new();

        add_field(
            &mut fields,
            &mut taken,
            self.group_field_name.clone(),
            group_id_field(),
        )?;
        if let Some(name) = self.count_field_name.clone() {
            let out_id = add_field(&mut fields, &mut taken, name, count_field(&self.mapping))?;
            membership.set(out_id);
        }

        let representative = representative_mapper(&self.mapping);
        for name in &self.forward_fields {
            let Some(in_field) = schema.maybe_field(name) else {
                return Err(Error::field_not_found(
                    name.clone(),
                    "forwarded field",
                    schema.name(),
                ));
            };
            let mapped = mapped_field(in_field.field(), representative.clone());
            let out_id = add_field(&mut fields, &mut taken, name.clone(), mapped)?;
            self.dependency_map
                .map_inbound_to_outbound(in_field.field_id(), out_id);
            membership.set(out_id);
        }

        for index in 0..self.functions.len() {
            let mut outputs: Vec<(String, Field)> = Vec::new();
            self.functions[index]
                .collect_output_fields(&mut |name, field| outputs.push((String::from(name), field)));
            let context = match outputs.first() {
                Some((name, _field)) => format!("aggregation '{}'", name),
                None => format!("aggregation #{}", index),
            };
            let mut out_ids: Vec<usize> = Vec::with_capacity(outputs.len());
            for (name, field) in outputs {
                let out_id = add_field(&mut fields, &mut taken, name, field)?;
                membership.set(out_id);
                out_ids.push(out_id);
            }
            let mut resolver = SchemaFieldResolver::new(schema, context);
            self.functions[index].bind(&mut resolver)?;
            let dependencies = resolver.into_dependencies();
            dependencies.for_each(|inbound_id| {
                self.dependency_map.add_trigger(inbound_id, index);
                for &out_id in &out_ids {
                    self.dependency_map.map_inbound_to_outbound(inbound_id, out_id);
                }
            });
        }

        self.membership_fields = membership;
        self.output
            .update_schema(Some(Schema::new(self.name.clone(), fields)))
    }

    fn tear_down(&mut self) {
        if self.output.schema().is_some() {
            // unbind fan-out cannot fail: subscribers release, not resolve
            let _ = self.output.update_schema(None);
        }
        self.group_function.unbind();
        for function in &mut self.functions {
            function.unbind();
        }
        self.mapping.borrow_mut().reset();
        self.group_dependencies = BitSet::new();
        self.dependency_map.reset();
        self.membership_fields = BitSet::new();
        self.added.reset();
        self.changed.reset();
        self.removed.reset();
    }

    fn add_row_to_group(&mut self, row: usize, group: usize) {
        let existing = self.mapping.borrow().group_count(group);
        self.mapping.borrow_mut().map_row_to_group(row, group);
        if existing == 0 {
            self.state_change.add_row(group);
        } else {
            self.mark_membership_changed(group);
        }
        self.added.add_group_row(group, row);
    }

    fn remove_row_from_group(&mut self, row: usize) {
        let group = self.mapping.borrow_mut().unmap_row(row);
        if group == NO_GROUP {
            return;
        }
        if self.mapping.borrow().group_count(group) == 0 {
            self.state_change.remove_row(group);
        } else {
            self.mark_membership_changed(group);
        }
        self.removed.add_group_row(group, row);
    }

    /// Membership churn in a surviving group changes its count, its
    /// representative reads and every aggregate.
    fn mark_membership_changed(&mut self, group: usize) {
        if !self.membership_fields.is_empty() {
            self.state_change
                .changed_fields_mut()
                .or_with(&self.membership_fields);
        }
        self.state_change.change_row_if_not_added(group);
    }

    fn process_changes_for_stable_groups(&mut self, rows: &dyn RowSequence) {
        if self.state_change.changed_fields_mut().is_empty() && self.changed_functions.is_empty() {
            return;
        }
        rows.for_each(&mut |row| {
            let group = self.mapping.borrow().group_of_row(row);
            if group == NO_GROUP {
                return;
            }
            self.state_change.change_row_if_not_added(group);
            self.changed.add_group_row(group, row);
        });
        self.update_changed_functions();
    }

    fn process_changes_for_possible_moves(&mut self, rows: &dyn RowSequence) {
        rows.for_each(&mut |row| {
            let current = self.mapping.borrow().group_of_row(row);
            let target = self.group_function.group_of(row);
            if target == current {
                self.state_change.change_row_if_not_added(current);
                self.changed.add_group_row(current, row);
            } else {
                self.remove_row_from_group(row);
                self.add_row_to_group(row, target);
            }
        });
        if self.added.is_empty() && self.removed.is_empty() {
            self.update_changed_functions();
        } else {
            self.update_all_functions();
        }
    }

    fn update_all_functions(&mut self) {
        for function in self.functions.iter_mut() {
            dispatch(function.as_mut(), &self.added, &self.changed, &self.removed);
        }
    }

    fn update_changed_functions(&mut self) {
        for index in 0..self.functions.len() {
            if self.changed_functions.contains(index) {
                dispatch(
                    self.functions[index].as_mut(),
                    &self.added,
                    &self.changed,
                    &self.removed,
                );
            }
        }
    }

    fn fire(&mut self) {
        let group_function = &mut self.group_function;
        self.state_change
            .fire(&self.output, |group| group_function.on_empty_group(group));
        self.added.reset();
        self.changed.reset();
        self.removed.reset();
    }
}

impl TransformInput for GroupByInput {
    fn schema_updated(&mut self, schema: Option<Rc<Schema>>) -> Result<()> {
        match schema {
            Some(schema) => {
                if let Err(err) = self.bind(&schema) {
                    self.tear_down();
                    return Err(err);
                }
                Ok(())
            }
            None => {
                self.tear_down();
                Ok(())
            }
        }
    }

    fn rows_added(&mut self, rows: &dyn RowSequence) {
        rows.for_each(&mut |row| {
            let group = self.group_function.group_of(row);
            self.add_row_to_group(row, group);
        });
        self.update_all_functions();
        self.fire();
    }

    fn rows_changed(&mut self, rows: &dyn RowSequence, changed_fields: &FieldBitSet) {
        self.changed_functions.clear();
        self.dependency_map.translate(
            changed_fields,
            self.state_change.changed_fields_mut(),
            &mut self.changed_functions,
        );
        if changed_fields.intersects(&self.group_dependencies) {
            self.process_changes_for_possible_moves(rows);
        } else {
            self.process_changes_for_stable_groups(rows);
        }
        self.fire();
    }

    fn rows_removed(&mut self, rows: &dyn RowSequence) {
        rows.for_each(&mut |row| self.remove_row_from_group(row));
        self.update_all_functions();
        self.fire();
    }
}

/// Removes are delivered first so a member moving between groups has its
/// old-group contribution withdrawn before its new value is remembered.
fn dispatch(
    function: &mut dyn AggregationFunction,
    added: &GroupRowMods,
    changed: &GroupRowMods,
    removed: &GroupRowMods,
) {
    removed.fire(|group, rows| function.group_rows_removed(group, rows));
    added.fire(|group, rows| function.group_rows_added(group, rows));
    changed.fire(|group, rows| function.group_rows_changed(group, rows));
}

fn add_field(
    fields: &mut Vec<SchemaField>,
    taken: &mut HashMap<String, usize>,
    name: String,
    field: Field,
) -> Result<usize> {
    if taken.contains_key(&name) {
        return Err(Error::invalid_config(format!(
            "duplicate outbound field '{}'",
            name
        )));
    }
    let out_id = fields.len();
    taken.insert(name.clone(), out_id);
    fields.push(SchemaField::new(out_id, name, field));
    Ok(out_id)
}

/// A live group-by. Attach an upstream output to `input`; the per-group
/// parent stream publishes through `output` once bound.
pub struct GroupBy {
    input: InputHandle,
    output: Output,
}

impl GroupBy {
    pub fn input(&self) -> InputHandle {
        self.input.clone()
    }

    pub fn output(&self) -> Output {
        self.output.clone()
    }
}

/// Configures and validates a `GroupBy` before any data flows.
pub struct GroupByBuilder {
    name: String,
    group_field_name: String,
    count_field_name: Option<String>,
    forward_fields: Vec<String>,
    group_function: Option<Box<dyn GroupFunction>>,
    functions: Vec<Box<dyn AggregationFunction>>,
}

impl GroupByBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_field_name: String::from("group"),
            count_field_name: None,
            forward_fields: Vec::new(),
            group_function: None,
            functions: Vec::new(),
        }
    }

    /// Installs the group assignment. Later calls replace earlier ones.
    pub fn group_function(mut self, function: impl GroupFunction + 'static) -> Self {
        self.group_function = Some(Box::new(function));
        self
    }

    /// Shorthand for grouping by the composite value of named fields.
    pub fn group_by_fields(self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_function(FieldGroupFunction::new(names))
    }

    /// Renames the outbound group id field, `"group"` by default.
    pub fn group_field_name(mut self, name: impl Into<String>) -> Self {
        self.group_field_name = name.into();
        self
    }

    /// Publishes a member-count field under `name`.
    pub fn count_field(mut self, name: impl Into<String>) -> Self {
        self.count_field_name = Some(name.into());
        self
    }

    /// Inbound fields passed through via a representative member row.
    pub fn forward_fields(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.forward_fields = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn aggregation(mut self, function: impl AggregationFunction + 'static) -> Self {
        self.functions.push(Box::new(function));
        self
    }

    pub fn build(self) -> Result<GroupBy> {
        if self.name.is_empty() {
            return Err(Error::invalid_config("group-by name is empty"));
        }
        let Some(group_function) = self.group_function else {
            return Err(Error::invalid_config("group-by needs a group function"));
        };
        let mapping = Rc::new(RefCell::new(GroupMapping::new()));
        let output = Output::new(Rc::new(BitSetRowProvider::new(
            mapping.borrow().active_groups(),
        )));
        let input: InputHandle = Rc::new(RefCell::new(GroupByInput {
            name: self.name,
            group_field_name: self.group_field_name,
            count_field_name: self.count_field_name,
            forward_fields: self.forward_fields,
            group_function,
            group_dependencies: BitSet::new(),
            functions: self.functions,
            mapping,
            dependency_map: DependencyMap::new(),
            membership_fields: BitSet::new(),
            state_change: StateChangeSet::new(),
            changed_functions: IndexedSet::new(),
            added: GroupRowMods::new(),
            changed: GroupRowMods::new(),
            removed: GroupRowMods::new(),
            output: output.clone(),
        }));
        Ok(GroupBy { input, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn quote_schema(
        symbols: Rc<RefCell<Vec<i64>>>,
        prices: Rc<RefCell<Vec<f64>>>,
    ) -> Rc<Schema> {
        let sym = symbols.clone();
        let px = prices.clone();
        Schema::new(
            "quotes",
            vec![
                SchemaField::new(
                    0,
                    "sym",
                    Field::Long(Rc::new(move |row: usize| sym.borrow()[row])),
                ),
                SchemaField::new(
                    1,
                    "px",
                    Field::Double(Rc::new(move |row: usize| px.borrow()[row])),
                ),
                SchemaField::new(2, "venue", Field::Int(Rc::new(|_row: usize| 1))),
            ],
        )
    }

    fn built() -> (GroupBy, Rc<RefCell<Vec<i64>>>, Rc<RefCell<Vec<f64>>>) {
        let symbols = Rc::new(RefCell::new(vec![10i64, 10, 20]));
        let prices = Rc::new(RefCell::new(vec![1.0, 2.0, 3.0]));
        let group_by = GroupByBuilder::new("by_sym")
            .group_by_fields(["sym"])
            .count_field("members")
            .aggregation(SumAggregation::new("px", "px_sum"))
            .build()
            .unwrap();
        group_by
            .input()
            .borrow_mut()
            .schema_updated(Some(quote_schema(symbols.clone(), prices.clone())))
            .unwrap();
        (group_by, symbols, prices)
    }

    fn double_value(schema: &Schema, name: &str, row: usize) -> f64 {
        match schema.maybe_field(name).unwrap().field() {
            Field::Double(f) => f.value_at(row),
            _ => panic!("Wrong field type"),
        }
    }

    fn int_value(schema: &Schema, name: &str, row: usize) -> i32 {
        match schema.maybe_field(name).unwrap().field() {
            Field::Int(f) => f.value_at(row),
            _ => panic!("Wrong field type"),
        }
    }

    #[test]
    fn test_build_requires_group_function() {
        assert!(GroupByBuilder::new("g").build().is_err());
        assert!(GroupByBuilder::new("")
            .group_by_fields(["sym"])
            .build()
            .is_err());
    }

    #[test]
    fn test_bind_publishes_group_count_and_aggregate_fields() {
        let (group_by, _symbols, _prices) = built();
        let schema = group_by.output().schema().unwrap();
        assert_eq!(schema.size(), 3);
        assert!(schema.maybe_field("group").is_some());
        assert!(schema.maybe_field("members").is_some());
        assert!(schema.maybe_field("px_sum").is_some());
    }

    #[test]
    fn test_duplicate_outbound_name_fails_bind() {
        let group_by = GroupByBuilder::new("g")
            .group_by_fields(["sym"])
            .count_field("px_sum")
            .aggregation(SumAggregation::new("px", "px_sum"))
            .build()
            .unwrap();
        let symbols = Rc::new(RefCell::new(vec![1i64]));
        let prices = Rc::new(RefCell::new(vec![1.0]));
        let result = group_by
            .input()
            .borrow_mut()
            .schema_updated(Some(quote_schema(symbols, prices)));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
        assert!(group_by.output().schema().is_none());
    }

    #[test]
    fn test_groups_count_and_sum() {
        let (group_by, _symbols, _prices) = built();
        group_by.input().borrow_mut().rows_added(&vec![0usize, 1, 2]);

        let schema = group_by.output().schema().unwrap();
        // rows 0 and 1 share sym 10, row 2 is sym 20
        assert_eq!(int_value(&schema, "members", 0), 2);
        assert_eq!(int_value(&schema, "members", 1), 1);
        assert_eq!(double_value(&schema, "px_sum", 0), 3.0);
        assert_eq!(double_value(&schema, "px_sum", 1), 3.0);
    }

    #[test]
    fn test_move_between_groups() {
        let (group_by, symbols, _prices) = built();
        group_by.input().borrow_mut().rows_added(&vec![0usize, 1, 2]);

        symbols.borrow_mut()[1] = 20;
        let mut changed = FieldBitSet::new();
        changed.field_changed(0);
        group_by
            .input()
            .borrow_mut()
            .rows_changed(&vec![1usize], &changed);

        let schema = group_by.output().schema().unwrap();
        assert_eq!(int_value(&schema, "members", 0), 1);
        assert_eq!(int_value(&schema, "members", 1), 2);
        assert_eq!(double_value(&schema, "px_sum", 0), 1.0);
        assert_eq!(double_value(&schema, "px_sum", 1), 5.0);
    }

    #[test]
    fn test_remove_to_empty_frees_group() {
        let (group_by, _symbols, _prices) = built();
        group_by.input().borrow_mut().rows_added(&vec![0usize, 1, 2]);
        group_by.input().borrow_mut().rows_removed(&vec![2usize]);

        let provider = group_by.output().row_provider();
        let mut live = Vec::new();
        provider.for_each_row(&mut |group| live.push(group));
        assert_eq!(live, [0]);
    }
}
