//! Per-turn batches of rows entering, changing in, or leaving groups.

use alloc::vec::Vec;
use hashbrown::HashMap;
use trellis_core::IndexedSet;
use trellis_flow::RowSequence;

/// Accumulates member rows per group over one inbound event so each
/// aggregation function sees one batched call per touched group.
///
/// Per-group row buffers are retained across turns and reused.
#[derive(Default)]
pub(crate) struct GroupRowMods {
    groups: IndexedSet,
    rows_by_group: HashMap<usize, Vec<usize>>,
}

impl GroupRowMods {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group_row(&mut self, group: usize, row: usize) {
        self.groups.add(group);
        self.rows_by_group.entry(group).or_default().push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Calls `consumer` once per touched group with its batched rows.
    pub fn fire(&self, mut consumer: impl FnMut(usize, &dyn RowSequence)) {
        self.groups.for_each(|group| {
            if let Some(rows) = self.rows_by_group.get(&group) {
                consumer(group, rows);
            }
        });
    }

    pub fn reset(&mut self) {
        self.groups.clear();
        for rows in self.rows_by_group.values_mut() {
            rows.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn collect(mods: &GroupRowMods) -> Vec<(usize, Vec<usize>)> {
        let mut seen = Vec::new();
        mods.fire(|group, rows| {
            let mut batch = Vec::new();
            rows.for_each(&mut |row| batch.push(row));
            seen.push((group, batch));
        });
        seen
    }

    #[test]
    fn test_batches_rows_per_group() {
        let mut mods = GroupRowMods::new();
        mods.add_group_row(1, 10);
        mods.add_group_row(0, 11);
        mods.add_group_row(1, 12);
        assert_eq!(collect(&mods), vec![(1, vec![10, 12]), (0, vec![11])]);
    }

    #[test]
    fn test_reset_clears_batches_for_reuse() {
        let mut mods = GroupRowMods::new();
        mods.add_group_row(3, 7);
        mods.reset();
        assert!(mods.is_empty());
        mods.add_group_row(3, 8);
        assert_eq!(collect(&mods), vec![(3, vec![8])]);
    }
}
