//! Bidirectional row mapping between join keys and the rows holding them.

use crate::interner::JoinInterner;
use crate::join::tracker::JoinChangeTracker;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use trellis_core::{BitSet, FieldResolver, Result, NO_ROW};
use trellis_flow::SharedBitSet;

pub(crate) const NO_KEY: usize = usize::MAX;

/// The rows currently holding a key, one per side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct KeySlot {
    left: usize,
    right: usize,
}

const EMPTY_SLOT: KeySlot = KeySlot {
    left: NO_ROW,
    right: NO_ROW,
};

/// Maintains the key assignment of every left and right row and the
/// key-to-row slots that pair them.
///
/// The output row space is the left row space: a joined output row id is
/// the left row id that anchors it. `active_rows` holds the left rows
/// currently visible downstream; for an inner join those with a matched
/// right row, for an outer join every present left row.
pub struct LookupJoinMapper {
    interner: Box<dyn JoinInterner>,
    left_row_to_key: Vec<usize>,
    right_row_to_key: Vec<usize>,
    key_to_left_right: Vec<KeySlot>,
    active_rows: SharedBitSet,
    outer: bool,
}

impl LookupJoinMapper {
    pub fn new(interner: Box<dyn JoinInterner>, outer: bool) -> Self {
        Self {
            interner,
            left_row_to_key: Vec::new(),
            right_row_to_key: Vec::new(),
            key_to_left_right: Vec::new(),
            active_rows: Rc::new(RefCell::new(BitSet::new())),
            outer,
        }
    }

    /// The shared active-row set backing the join output's row provider.
    pub fn active_rows(&self) -> SharedBitSet {
        self.active_rows.clone()
    }

    /// Binds the interner to both schemas; each resolver records that
    /// side's join-key dependencies.
    pub fn bind(
        &mut self,
        left: &mut dyn FieldResolver,
        right: &mut dyn FieldResolver,
    ) -> Result<()> {
        self.interner.bind_to_schemas(left, right)
    }

    /// Releases the interner binding and all row/key state.
    pub fn unbind(&mut self) {
        self.interner.unbind();
        self.left_row_to_key.clear();
        self.right_row_to_key.clear();
        self.key_to_left_right.clear();
        self.active_rows.borrow_mut().clear_all();
    }

    /// The right row currently matched to `left_row`, if any. Safe for
    /// rows never added; they resolve to unmatched.
    pub fn right_source_row(&self, left_row: usize) -> Option<usize> {
        let key = self.left_key(left_row);
        if key != NO_KEY {
            let right = self.key_to_left_right[key].right;
            if right != NO_ROW {
                return Some(right);
            }
        }
        None
    }

    pub fn left_row_add(&mut self, left_row: usize, tracker: &mut JoinChangeTracker) {
        let key = self.interner.intern_left(left_row);
        self.map_left_row_key(left_row, key);
        self.map_left_row(left_row, NO_KEY, key, tracker);
    }

    pub fn right_row_add(&mut self, right_row: usize, tracker: &mut JoinChangeTracker) {
        let key = self.interner.intern_right(right_row);
        self.map_new_right(right_row, NO_KEY, key, tracker);
    }

    pub fn left_row_change(
        &mut self,
        left_row: usize,
        re_eval_key: bool,
        tracker: &mut JoinChangeTracker,
    ) {
        let old_key = self.left_key(left_row);
        if re_eval_key {
            let new_key = self.interner.intern_left(left_row);
            self.map_left_row_key(left_row, new_key);
            if new_key != old_key {
                self.map_left_row(left_row, old_key, new_key, tracker);
                return;
            }
        }
        if self.active_rows.borrow().get(left_row) {
            tracker.join_updated(left_row, false, false);
        }
    }

    pub fn right_row_change(
        &mut self,
        right_row: usize,
        re_eval_key: bool,
        tracker: &mut JoinChangeTracker,
    ) {
        let old_key = self.right_key(right_row);
        if re_eval_key {
            let new_key = self.interner.intern_right(right_row);
            if new_key != old_key {
                self.map_new_right(right_row, old_key, new_key, tracker);
                return;
            }
        }
        // same key as before: forward field-level changes to the owning
        // left row
        if old_key != NO_KEY {
            let left_row = self.key_to_left_right[old_key].left;
            if left_row != NO_ROW {
                tracker.join_updated(left_row, false, false);
            }
        }
    }

    pub fn left_row_remove(&mut self, left_row: usize, tracker: &mut JoinChangeTracker) {
        let key = self.left_key(left_row);
        if key == NO_KEY {
            return;
        }
        self.left_row_to_key[left_row] = NO_KEY;
        let right_row = self.key_to_left_right[key].right;
        self.key_to_left_right[key].left = NO_ROW;
        if self.outer || right_row != NO_ROW {
            self.active_rows.borrow_mut().clear(left_row);
            tracker.join_removed(left_row);
        }
    }

    pub fn right_row_remove(&mut self, right_row: usize, tracker: &mut JoinChangeTracker) {
        let key = self.right_key(right_row);
        if key == NO_KEY {
            return;
        }
        self.right_row_to_key[right_row] = NO_KEY;
        self.unmap_right(key, tracker);
    }

    fn map_left_row(
        &mut self,
        left_row: usize,
        old_key: usize,
        new_key: usize,
        tracker: &mut JoinChangeTracker,
    ) {
        if old_key != NO_KEY {
            self.key_to_left_right[old_key].left = NO_ROW;
        }

        let new_right = self.key_to_left_right[new_key].right;
        self.key_to_left_right[new_key].left = left_row;

        let old_active = self.active_rows.borrow().get(left_row);
        let new_active = self.outer || new_right != NO_ROW;
        if new_active && !old_active {
            self.active_rows.borrow_mut().set(left_row);
            tracker.join_added(left_row);
        } else if !new_active && old_active {
            self.active_rows.borrow_mut().clear(left_row);
            tracker.join_removed(left_row);
        } else if new_active {
            tracker.join_updated(left_row, false, old_key != new_key);
        }
    }

    fn map_new_right(
        &mut self,
        right_row: usize,
        old_key: usize,
        new_key: usize,
        tracker: &mut JoinChangeTracker,
    ) {
        let key_change = old_key != new_key;
        if old_key != NO_KEY && key_change {
            let old_left = self.key_to_left_right[old_key].left;
            self.key_to_left_right[old_key].right = NO_ROW;
            if old_left != NO_ROW {
                if self.outer {
                    tracker.join_updated(old_left, false, true);
                } else {
                    self.active_rows.borrow_mut().clear(old_left);
                    tracker.join_removed(old_left);
                }
            }
        }
        self.map_right_row_key(right_row, new_key);
        let new_left = self.key_to_left_right[new_key].left;
        self.key_to_left_right[new_key].right = right_row;
        if new_left != NO_ROW {
            if self.outer {
                tracker.join_updated(new_left, false, key_change);
            } else {
                self.active_rows.borrow_mut().set(new_left);
                tracker.join_added(new_left);
            }
        }
    }

    fn unmap_right(&mut self, old_key: usize, tracker: &mut JoinChangeTracker) {
        let old_left = self.key_to_left_right[old_key].left;
        self.key_to_left_right[old_key].right = NO_ROW;
        if old_left != NO_ROW {
            if self.outer {
                tracker.join_updated(old_left, false, true);
            } else {
                self.active_rows.borrow_mut().clear(old_left);
                tracker.join_removed(old_left);
            }
        }
    }

    fn left_key(&self, row: usize) -> usize {
        self.left_row_to_key.get(row).copied().unwrap_or(NO_KEY)
    }

    fn right_key(&self, row: usize) -> usize {
        self.right_row_to_key.get(row).copied().unwrap_or(NO_KEY)
    }

    fn map_left_row_key(&mut self, row: usize, key: usize) {
        if row >= self.left_row_to_key.len() {
            self.left_row_to_key.resize(row + 1, NO_KEY);
        }
        self.left_row_to_key[row] = key;
        self.ensure_key_slot(key);
    }

    fn map_right_row_key(&mut self, row: usize, key: usize) {
        if row >= self.right_row_to_key.len() {
            self.right_row_to_key.resize(row + 1, NO_KEY);
        }
        self.right_row_to_key[row] = key;
        self.ensure_key_slot(key);
    }

    fn ensure_key_slot(&mut self, key: usize) {
        if key >= self.key_to_left_right.len() {
            self.key_to_left_right.resize(key + 1, EMPTY_SLOT);
        }
    }
}
