//! Group assignment and aggregation functions.

use crate::interner::{composite_key_of, KeyValue};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use trellis_core::field::DoubleField;
use trellis_core::{Field, FieldResolver, Interner, Result};
use trellis_flow::RowSequence;

/// Assigns each inbound row to a group id.
///
/// Group ids must be dense and recyclable: `on_empty_group` is the signal
/// that an id has no members left and may be handed out again.
pub trait GroupFunction {
    /// Resolves the inbound fields the assignment reads.
    fn bind(&mut self, resolver: &mut dyn FieldResolver) -> Result<()>;

    /// Releases bound fields and grouping state.
    fn unbind(&mut self);

    /// Returns the group id for `row`, reading its current field values.
    fn group_of(&mut self, row: usize) -> usize;

    /// Called after the turn in which `group` lost its last member.
    fn on_empty_group(&mut self, group: usize);
}

/// Groups rows by the composite value of named inbound fields.
///
/// Distinct value tuples are interned to dense group ids; an id freed by
/// `on_empty_group` is reused for the next new tuple.
pub struct FieldGroupFunction {
    names: Vec<String>,
    fields: Vec<Field>,
    groups: Interner<KeyValue>,
}

impl FieldGroupFunction {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            fields: Vec::new(),
            groups: Interner::new(),
        }
    }
}

impl GroupFunction for FieldGroupFunction {
    fn bind(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        let mut fields = Vec::with_capacity(self.names.len());
        for name in &self.names {
            fields.push(resolver.find_field(name)?);
        }
        self.fields = fields;
        Ok(())
    }

    fn unbind(&mut self) {
        self.fields.clear();
        self.groups.clear();
    }

    fn group_of(&mut self, row: usize) -> usize {
        self.groups.intern(composite_key_of(&self.fields, row))
    }

    fn on_empty_group(&mut self, group: usize) {
        self.groups.free_entry(group);
    }
}

/// An incrementally maintained aggregate over the member rows of each group.
///
/// Functions publish their outbound fields through `collect_output_fields`
/// and receive batched member deltas per touched group. A changed batch is
/// only delivered when a field the function resolved at bind has changed.
pub trait AggregationFunction {
    /// Announces the outbound fields this function contributes.
    fn collect_output_fields(&self, collector: &mut dyn FnMut(&str, Field));

    /// Resolves the inbound fields the aggregate reads.
    fn bind(&mut self, resolver: &mut dyn FieldResolver) -> Result<()>;

    /// Releases bound fields and aggregate state.
    fn unbind(&mut self);

    fn group_rows_added(&mut self, group: usize, rows: &dyn RowSequence);

    fn group_rows_changed(&mut self, group: usize, rows: &dyn RowSequence);

    fn group_rows_removed(&mut self, group: usize, rows: &dyn RowSequence);
}

/// Per-group running sum of one numeric inbound field.
///
/// Keeps the last value contributed per member row so changes and removes
/// are O(1) deltas rather than rescans of the group.
pub struct SumAggregation {
    input_name: String,
    output_name: String,
    input: Option<Rc<dyn DoubleField>>,
    sums: Rc<RefCell<Vec<f64>>>,
    last_contribution: Vec<f64>,
}

impl SumAggregation {
    pub fn new(input_name: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            input_name: input_name.into(),
            output_name: output_name.into(),
            input: None,
            sums: Rc::new(RefCell::new(Vec::new())),
            last_contribution: Vec::new(),
        }
    }

    fn remember(&mut self, row: usize, value: f64) -> f64 {
        if row >= self.last_contribution.len() {
            self.last_contribution.resize(row + 1, 0.0);
        }
        let previous = self.last_contribution[row];
        self.last_contribution[row] = value;
        previous
    }
}

impl AggregationFunction for SumAggregation {
    fn collect_output_fields(&self, collector: &mut dyn FnMut(&str, Field)) {
        let sums = self.sums.clone();
        collector(
            &self.output_name,
            Field::Double(Rc::new(move |group: usize| {
                sums.borrow().get(group).copied().unwrap_or(0.0)
            })),
        );
    }

    fn bind(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.input = Some(resolver.find_double_field(&self.input_name)?);
        Ok(())
    }

    fn unbind(&mut self) {
        self.input = None;
        self.sums.borrow_mut().clear();
        self.last_contribution.clear();
    }

    fn group_rows_added(&mut self, group: usize, rows: &dyn RowSequence) {
        let Some(input) = self.input.clone() else {
            return;
        };
        let mut total = 0.0;
        rows.for_each(&mut |row| {
            let value = input.value_at(row);
            self.remember(row, value);
            total += value;
        });
        let mut sums = self.sums.borrow_mut();
        if group >= sums.len() {
            sums.resize(group + 1, 0.0);
        }
        sums[group] += total;
    }

    fn group_rows_changed(&mut self, group: usize, rows: &dyn RowSequence) {
        let Some(input) = self.input.clone() else {
            return;
        };
        let mut delta = 0.0;
        rows.for_each(&mut |row| {
            let value = input.value_at(row);
            delta += value - self.remember(row, value);
        });
        let mut sums = self.sums.borrow_mut();
        if group < sums.len() {
            sums[group] += delta;
        }
    }

    fn group_rows_removed(&mut self, group: usize, rows: &dyn RowSequence) {
        let mut withdrawn = 0.0;
        rows.for_each(&mut |row| {
            withdrawn += self.last_contribution.get(row).copied().unwrap_or(0.0);
        });
        let mut sums = self.sums.borrow_mut();
        if group < sums.len() {
            sums[group] -= withdrawn;
        }
    }
}

#[derive(Default)]
struct AvgState {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl AvgState {
    fn ensure(&mut self, group: usize) {
        if group >= self.sums.len() {
            self.sums.resize(group + 1, 0.0);
            self.counts.resize(group + 1, 0);
        }
    }
}

/// Per-group running mean of one numeric inbound field.
pub struct AvgAggregation {
    input_name: String,
    output_name: String,
    input: Option<Rc<dyn DoubleField>>,
    state: Rc<RefCell<AvgState>>,
    last_contribution: Vec<f64>,
}

impl AvgAggregation {
    pub fn new(input_name: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            input_name: input_name.into(),
            output_name: output_name.into(),
            input: None,
            state: Rc::new(RefCell::new(AvgState::default())),
            last_contribution: Vec::new(),
        }
    }

    fn remember(&mut self, row: usize, value: f64) -> f64 {
        if row >= self.last_contribution.len() {
            self.last_contribution.resize(row + 1, 0.0);
        }
        let previous = self.last_contribution[row];
        self.last_contribution[row] = value;
        previous
    }
}

impl AggregationFunction for AvgAggregation {
    fn collect_output_fields(&self, collector: &mut dyn FnMut(&str, Field)) {
        let state = self.state.clone();
        collector(
            &self.output_name,
            Field::Double(Rc::new(move |group: usize| {
                let state = state.borrow();
                match state.counts.get(group).copied().unwrap_or(0) {
                    0 => 0.0,
                    count => state.sums[group] / count as f64,
                }
            })),
        );
    }

    fn bind(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        self.input = Some(resolver.find_double_field(&self.input_name)?);
        Ok(())
    }

    fn unbind(&mut self) {
        self.input = None;
        let mut state = self.state.borrow_mut();
        state.sums.clear();
        state.counts.clear();
        self.last_contribution.clear();
    }

    fn group_rows_added(&mut self, group: usize, rows: &dyn RowSequence) {
        let Some(input) = self.input.clone() else {
            return;
        };
        let mut total = 0.0;
        let mut joined = 0;
        rows.for_each(&mut |row| {
            let value = input.value_at(row);
            self.remember(row, value);
            total += value;
            joined += 1;
        });
        let mut state = self.state.borrow_mut();
        state.ensure(group);
        state.sums[group] += total;
        state.counts[group] += joined;
    }

    fn group_rows_changed(&mut self, group: usize, rows: &dyn RowSequence) {
        let Some(input) = self.input.clone() else {
            return;
        };
        let mut delta = 0.0;
        rows.for_each(&mut |row| {
            let value = input.value_at(row);
            delta += value - self.remember(row, value);
        });
        let mut state = self.state.borrow_mut();
        if group < state.sums.len() {
            state.sums[group] += delta;
        }
    }

    fn group_rows_removed(&mut self, group: usize, rows: &dyn RowSequence) {
        let mut withdrawn = 0.0;
        let mut departed = 0;
        rows.for_each(&mut |row| {
            withdrawn += self.last_contribution.get(row).copied().unwrap_or(0.0);
            departed += 1;
        });
        let mut state = self.state.borrow_mut();
        if group < state.sums.len() {
            state.sums[group] -= withdrawn;
            state.counts[group] -= departed.min(state.counts[group]);
        }
    }
}
