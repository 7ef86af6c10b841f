//! Row-to-group membership index.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use trellis_core::{row_identity_field, BitSet, Field, IndexedSet, RowMapper};
use trellis_flow::SharedBitSet;

/// Sentinel group id for rows not mapped to any group.
pub const NO_GROUP: usize = usize::MAX;

/// Row-to-group assignment plus the one-to-many group-to-members index.
///
/// Group ids are the parent output's row ids. The active-group bit set is
/// shared with the parent output's row provider: a group becomes active
/// when its member count goes 0 to 1 and inactive when it returns to 0.
pub struct GroupMapping {
    row_to_group: Vec<usize>,
    members: Vec<IndexedSet>,
    active_groups: SharedBitSet,
}

impl GroupMapping {
    pub fn new() -> Self {
        Self {
            row_to_group: Vec::new(),
            members: Vec::new(),
            active_groups: Rc::new(RefCell::new(BitSet::new())),
        }
    }

    /// The shared active-group set backing the parent output's row
    /// provider.
    pub fn active_groups(&self) -> SharedBitSet {
        self.active_groups.clone()
    }

    pub fn map_row_to_group(&mut self, row: usize, group: usize) {
        if row >= self.row_to_group.len() {
            self.row_to_group.resize(row + 1, NO_GROUP);
        }
        self.row_to_group[row] = group;
        if group >= self.members.len() {
            self.members.resize_with(group + 1, IndexedSet::new);
        }
        self.members[group].add(row);
        if self.members[group].len() == 1 {
            self.active_groups.borrow_mut().set(group);
        }
    }

    /// Removes `row` from its group, returning the group it was in.
    pub fn unmap_row(&mut self, row: usize) -> usize {
        let group = self.group_of_row(row);
        if group == NO_GROUP {
            return NO_GROUP;
        }
        self.row_to_group[row] = NO_GROUP;
        self.members[group].remove(row);
        if self.members[group].is_empty() {
            self.active_groups.borrow_mut().clear(group);
        }
        group
    }

    #[inline]
    pub fn group_of_row(&self, row: usize) -> usize {
        self.row_to_group.get(row).copied().unwrap_or(NO_GROUP)
    }

    pub fn group_count(&self, group: usize) -> usize {
        self.members.get(group).map_or(0, IndexedSet::len)
    }

    pub fn for_each_member(&self, group: usize, action: impl FnMut(usize)) {
        if let Some(members) = self.members.get(group) {
            members.for_each(action);
        }
    }

    /// Any current member of `group`, for reading pass-through fields.
    /// Not stable across member churn.
    pub fn representative(&self, group: usize) -> Option<usize> {
        self.members
            .get(group)
            .and_then(|members| members.as_slice().first().copied())
    }

    pub fn reset(&mut self) {
        self.row_to_group.clear();
        self.members.clear();
        self.active_groups.borrow_mut().clear_all();
    }
}

impl Default for GroupMapping {
    fn default() -> Self {
        Self::new()
    }
}

/// The parent's group-id field: the group id is the parent row id.
pub fn group_id_field() -> Field {
    row_identity_field()
}

/// An int field exposing the live member count of each group.
pub fn count_field(mapping: &Rc<RefCell<GroupMapping>>) -> Field {
    let mapping = mapping.clone();
    Field::Int(Rc::new(move |group: usize| {
        mapping.borrow().group_count(group) as i32
    }))
}

/// An int field exposing, per inbound row, the group it belongs to, or -1
/// while unmapped.
pub fn child_group_field(mapping: &Rc<RefCell<GroupMapping>>) -> Field {
    let mapping = mapping.clone();
    Field::Int(Rc::new(move |row: usize| {
        match mapping.borrow().group_of_row(row) {
            NO_GROUP => -1,
            group => group as i32,
        }
    }))
}

/// Maps a group to a representative member row for pass-through reads.
pub fn representative_mapper(mapping: &Rc<RefCell<GroupMapping>>) -> Rc<dyn RowMapper> {
    let mapping = mapping.clone();
    Rc::new(move |group: usize| mapping.borrow().representative(group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_and_counts() {
        let mut mapping = GroupMapping::new();
        mapping.map_row_to_group(0, 2);
        mapping.map_row_to_group(1, 2);
        mapping.map_row_to_group(2, 0);
        assert_eq!(mapping.group_of_row(0), 2);
        assert_eq!(mapping.group_count(2), 2);
        assert_eq!(mapping.group_count(0), 1);
        assert_eq!(mapping.group_count(9), 0);
        assert_eq!(mapping.group_of_row(99), NO_GROUP);
    }

    #[test]
    fn test_active_groups_track_emptiness() {
        let mut mapping = GroupMapping::new();
        mapping.map_row_to_group(0, 1);
        mapping.map_row_to_group(1, 1);
        assert!(mapping.active_groups().borrow().get(1));
        assert_eq!(mapping.unmap_row(0), 1);
        assert!(mapping.active_groups().borrow().get(1));
        assert_eq!(mapping.unmap_row(1), 1);
        assert!(!mapping.active_groups().borrow().get(1));
    }

    #[test]
    fn test_representative_is_a_current_member() {
        let mut mapping = GroupMapping::new();
        assert_eq!(mapping.representative(0), None);
        mapping.map_row_to_group(5, 0);
        mapping.map_row_to_group(6, 0);
        let first = mapping.representative(0).unwrap();
        assert!(first == 5 || first == 6);
        mapping.unmap_row(first);
        let second = mapping.representative(0).unwrap();
        assert_ne!(second, first);
    }

    #[test]
    fn test_child_group_field_follows_assignment() {
        let mapping = Rc::new(RefCell::new(GroupMapping::new()));
        let field = child_group_field(&mapping);
        let Field::Int(groups) = field else {
            panic!("Wrong field type");
        };
        assert_eq!(groups.value_at(0), -1);
        mapping.borrow_mut().map_row_to_group(0, 4);
        assert_eq!(groups.value_at(0), 4);
        mapping.borrow_mut().unmap_row(0);
        assert_eq!(groups.value_at(0), -1);
    }

    #[test]
    fn test_count_field_reads_live_state() {
        let mapping = Rc::new(RefCell::new(GroupMapping::new()));
        let field = count_field(&mapping);
        mapping.borrow_mut().map_row_to_group(0, 3);
        mapping.borrow_mut().map_row_to_group(1, 3);
        match field {
            Field::Int(f) => assert_eq!(f.value_at(3), 2),
            _ => panic!("Wrong field type"),
        }
    }
}
