//! Inbound-to-outbound change translation for the group-by operator.

use alloc::vec::Vec;
use trellis_core::{BitSet, FieldBitSet, IndexedSet};

/// Maps inbound field ids to the outbound fields they feed and the
/// aggregation functions they trigger.
///
/// Rebuilt on every schema bind. An inbound change to a field no function
/// or pass-through depends on translates to nothing, so unrelated column
/// churn never recomputes aggregates.
#[derive(Default)]
pub(crate) struct DependencyMap {
    inbound_to_outbound: Vec<BitSet>,
    inbound_triggers: Vec<Vec<usize>>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.inbound_to_outbound.clear();
        self.inbound_triggers.clear();
    }

    pub fn map_inbound_to_outbound(&mut self, inbound_id: usize, outbound_id: usize) {
        if inbound_id >= self.inbound_to_outbound.len() {
            self.inbound_to_outbound
                .resize_with(inbound_id + 1, BitSet::new);
        }
        self.inbound_to_outbound[inbound_id].set(outbound_id);
    }

    /// Registers `function_index` to be re-run when `inbound_id` changes.
    pub fn add_trigger(&mut self, inbound_id: usize, function_index: usize) {
        if inbound_id >= self.inbound_triggers.len() {
            self.inbound_triggers
                .resize_with(inbound_id + 1, Vec::new);
        }
        let triggers = &mut self.inbound_triggers[inbound_id];
        if !triggers.contains(&function_index) {
            triggers.push(function_index);
        }
    }

    /// Translates an inbound changed-field-set into outbound changed
    /// fields and the set of function indices that must re-aggregate.
    pub fn translate(
        &self,
        inbound: &FieldBitSet,
        outbound: &mut FieldBitSet,
        changed_functions: &mut IndexedSet,
    ) {
        inbound.for_each(|inbound_id| {
            if let Some(ids) = self.inbound_to_outbound.get(inbound_id) {
                outbound.or_with(ids);
            }
            if let Some(triggers) = self.inbound_triggers.get(inbound_id) {
                for &index in triggers {
                    changed_functions.add(index);
                }
            }
        });
    }
}
