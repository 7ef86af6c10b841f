//! Changed-field-set delivered alongside "change" events.

use crate::bitset::BitSet;

/// The set of outbound field ids reported as changed in one turn.
///
/// Supports membership test, ascending iteration, and intersection against
/// a fixed dependency bit set. One instance is typically owned per operator
/// and reused across turns, cleared at turn end.
#[derive(Clone, Debug, Default)]
pub struct FieldBitSet {
    field_ids: BitSet,
}

impl FieldBitSet {
    /// Creates an empty changed-field-set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `field_id` as changed.
    pub fn field_changed(&mut self, field_id: usize) {
        self.field_ids.set(field_id);
    }

    /// Returns whether `field_id` is marked changed.
    #[inline]
    pub fn is_changed(&self, field_id: usize) -> bool {
        self.field_ids.get(field_id)
    }

    /// Returns the number of changed fields.
    pub fn size(&self) -> usize {
        self.field_ids.cardinality()
    }

    /// Returns true if no fields are marked.
    pub fn is_empty(&self) -> bool {
        self.field_ids.is_empty()
    }

    /// Calls `action` for each changed field id in ascending order.
    pub fn for_each(&self, action: impl FnMut(usize)) {
        self.field_ids.for_each(action);
    }

    /// Returns whether any changed field is in `dependencies`.
    pub fn intersects(&self, dependencies: &BitSet) -> bool {
        self.field_ids.intersects(dependencies)
    }

    /// ORs another set of field ids into this one.
    pub fn or_with(&mut self, other: &BitSet) {
        self.field_ids.or_with(other);
    }

    /// Clears all marks.
    pub fn clear(&mut self) {
        self.field_ids.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_mark_and_query() {
        let mut set = FieldBitSet::new();
        assert!(set.is_empty());
        set.field_changed(2);
        set.field_changed(5);
        assert!(set.is_changed(2));
        assert!(!set.is_changed(3));
        assert_eq!(set.size(), 2);
    }

    #[test]
    fn test_intersects_dependencies() {
        let mut set = FieldBitSet::new();
        set.field_changed(4);
        let mut deps = BitSet::new();
        deps.set(1);
        assert!(!set.intersects(&deps));
        deps.set(4);
        assert!(set.intersects(&deps));
    }

    #[test]
    fn test_iteration_and_clear() {
        let mut set = FieldBitSet::new();
        set.field_changed(9);
        set.field_changed(1);
        let mut seen = Vec::new();
        set.for_each(|id| seen.push(id));
        assert_eq!(seen, [1, 9]);
        set.clear();
        assert!(set.is_empty());
    }
}
