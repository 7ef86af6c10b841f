//! Inbound-to-outbound field id translation.
//!
//! Built once per schema bind and reused for the lifetime of that binding
//! to translate changed-field-sets without reallocation.

use crate::field_bitset::FieldBitSet;
use alloc::vec::Vec;

/// Sentinel for an inbound field with no outbound counterpart.
pub const UNMAPPED: usize = usize::MAX;

/// Sparse array from inbound field id to outbound field id.
#[derive(Clone, Debug)]
pub struct FieldMapping {
    inbound_to_outbound: Vec<usize>,
}

impl FieldMapping {
    /// Returns the outbound field id for `inbound_field_id`, or `UNMAPPED`.
    #[inline]
    pub fn outbound_field_id(&self, inbound_field_id: usize) -> usize {
        self.inbound_to_outbound
            .get(inbound_field_id)
            .copied()
            .unwrap_or(UNMAPPED)
    }

    /// Translates an inbound changed-field-set, feeding each mapped
    /// outbound field id to `sink`.
    pub fn translate(&self, inbound: &FieldBitSet, mut sink: impl FnMut(usize)) {
        inbound.for_each(|inbound_field| {
            let outbound = self.outbound_field_id(inbound_field);
            if outbound != UNMAPPED {
                sink(outbound);
            }
        });
    }
}

/// Builder for a `FieldMapping`.
#[derive(Debug)]
pub struct FieldMappingBuilder {
    inbound_to_outbound: Vec<usize>,
}

impl FieldMappingBuilder {
    /// Creates a builder sized for `inbound_size` inbound fields.
    pub fn new(inbound_size: usize) -> Self {
        Self {
            inbound_to_outbound: alloc::vec![UNMAPPED; inbound_size],
        }
    }

    /// Maps an inbound field id to an outbound field id.
    pub fn map(&mut self, inbound_field_id: usize, outbound_field_id: usize) {
        if inbound_field_id >= self.inbound_to_outbound.len() {
            self.inbound_to_outbound.resize(inbound_field_id + 1, UNMAPPED);
        }
        self.inbound_to_outbound[inbound_field_id] = outbound_field_id;
    }

    /// Finishes the mapping.
    pub fn build(self) -> FieldMapping {
        FieldMapping {
            inbound_to_outbound: self.inbound_to_outbound,
        }
    }
}
