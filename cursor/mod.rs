//! The cursor: a stateful positioning handle over one tree. `spec.md` §3,
//! §4.2, §4.9.

pub mod modify;
pub mod search;
pub mod truncate;

use crate::block_manager::validate_item_size;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::page::{ColVarCell, Position};
use crate::tree::{Tree, TreeShape};
use crate::txn::Txn;
use bitflags::bitflags;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CursorFlags: u8 {
        /// Column store: let the engine pick the next record number.
        const APPEND = 1 << 0;
        /// Insert tolerates existing keys; remove tolerates missing keys.
        const OVERWRITE = 1 << 1;
        /// Positioned past the logical end of a fixed-length tree.
        const MAX_RECORD = 1 << 2;
    }
}

/// A positioning handle over one tree. Not safe to share across threads
/// (`spec.md` §5); owned by exactly one session.
pub struct Cursor {
    pub(crate) tree: Arc<Tree>,
    pub(crate) session: Rc<Session>,
    pub(crate) flags: CursorFlags,
    pub(crate) position: Position,
    pub(crate) compare: i32,
    /// The page write generation observed at the last search; `modify`
    /// primitives compare against the page's current generation to detect
    /// a concurrent structural change and signal `Error::Restart`.
    pub(crate) search_generation: u64,
    pub(crate) key: Vec<u8>,
    pub(crate) recno: u64,
    pub(crate) value: Vec<u8>,
}

impl Cursor {
    pub fn new(tree: Arc<Tree>, session: Rc<Session>) -> Self {
        Self {
            tree,
            session,
            flags: CursorFlags::empty(),
            position: Position::None,
            compare: 0,
            search_generation: 0,
            key: Vec::new(),
            recno: 0,
            value: Vec::new(),
        }
    }

    pub fn flags(&self) -> CursorFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: CursorFlags) {
        self.flags = flags;
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<Vec<u8>>) {
        self.key = key.into();
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) {
        self.value = value.into();
    }

    pub fn recno(&self) -> u64 {
        self.recno
    }

    pub fn set_recno(&mut self, recno: u64) {
        self.recno = recno;
    }

    pub fn compare_result(&self) -> i32 {
        self.compare
    }

    pub fn is_positioned(&self) -> bool {
        self.position != Position::None
    }

    /// Releases the cursor's position. Leaves buffers intact.
    pub fn reset(&mut self) {
        self.position = Position::None;
        self.compare = 0;
    }

    /// Releases the position and scratch buffers.
    pub fn close(&mut self) {
        self.reset();
        self.key.clear();
        self.value.clear();
        self.recno = 0;
    }

    /// `invalid`: does the cursor's current position reference a live,
    /// visible record? The sole gatekeeper for whether a search-equal
    /// result is exposed to the caller (`spec.md` §4.2).
    pub(crate) fn invalid(&self, reader: &Txn) -> bool {
        if self.tree.shape() == TreeShape::ColFix && self.flags.contains(CursorFlags::MAX_RECORD) {
            return true;
        }

        match self.position {
            Position::None => {
                trace!("invalid: unpositioned cursor");
                true
            }
            Position::Insert(j) => {
                let content = self.tree.page_cache().pin_leaf();
                let guard = content.page().content.read();
                let chain = match self.tree.shape() {
                    TreeShape::Row => guard.as_row().insert_list[j].update_chain.clone(),
                    TreeShape::ColVar => guard.as_col_var().insert_list[j].update_chain.clone(),
                    TreeShape::ColFix => unreachable!("fixed-length column-stores have no insert list"),
                };
                drop(guard);
                match chain.visible(self.tree.oracle(), reader) {
                    // Nothing visible at all: there is no on-page slot
                    // backing an insert-list entry in this single-page
                    // model, so unlike the on-page cases below there is
                    // nothing to fall through to.
                    None => {
                        trace!("invalid: insert-list entry has no visible version");
                        true
                    }
                    Some(update) => update.tombstone,
                }
            }
            Position::Slot(i) => {
                let guard = self.tree.page_cache().pin_leaf();
                let content = guard.page().content.read();
                match self.tree.shape() {
                    TreeShape::ColFix => {
                        let page = content.as_col_fix();
                        let out_of_range = i >= page.last_recno() as usize;
                        if out_of_range {
                            trace!("invalid: col-fix slot {i} past last_recno");
                        }
                        out_of_range
                    }
                    TreeShape::ColVar => {
                        let page = content.as_col_var();
                        if page.slots.is_empty() {
                            trace!("invalid: col-var page is empty");
                            return true;
                        }
                        let slot = &page.slots[i];
                        if let Some(chain) = &slot.update_chain {
                            if let Some(update) = chain.visible(self.tree.oracle(), reader) {
                                return update.tombstone;
                            }
                        }
                        matches!(slot.cell, ColVarCell::Deleted)
                    }
                    TreeShape::Row => {
                        let page = content.as_row();
                        if page.slots.is_empty() {
                            trace!("invalid: row page is empty");
                            return true;
                        }
                        match &page.slots[i].update_chain {
                            Some(chain) => {
                                matches!(chain.visible(self.tree.oracle(), reader), Some(u) if u.tombstone)
                            }
                            None => false,
                        }
                    }
                }
            }
        }
    }

    /// `compare(a, b) -> {-1,0,+1}` (`spec.md` §4.9).
    pub fn compare(&self, other: &Cursor) -> i32 {
        match self.tree.shape() {
            TreeShape::Row => {
                use std::cmp::Ordering;
                match self.tree.collator().compare(&self.key, &other.key) {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                }
            }
            TreeShape::ColVar | TreeShape::ColFix => match self.recno.cmp(&other.recno) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            },
        }
    }

    /// `equals(a, b) -> bool`, used by truncate to detect "start caught up
    /// to stop" (`spec.md` §4.9).
    pub fn equals(&self, other: &Cursor) -> bool {
        match self.tree.shape() {
            TreeShape::Row => Arc::ptr_eq(&self.tree, &other.tree) && self.position == other.position,
            TreeShape::ColVar | TreeShape::ColFix => self.recno == other.recno,
        }
    }

    pub(crate) fn validate_row_key_size(&self) -> Result<()> {
        validate_item_size(self.tree.block_manager().as_ref(), self.key.len() as u64)
    }

    pub(crate) fn validate_row_value_size(&self) -> Result<()> {
        validate_item_size(self.tree.block_manager().as_ref(), self.value.len() as u64)
    }

    pub(crate) fn validate_col_var_value_size(&self) -> Result<()> {
        validate_item_size(self.tree.block_manager().as_ref(), self.value.len() as u64)
    }

    /// `COL_FIX` values must be exactly one byte (`spec.md` §4.1).
    pub(crate) fn validate_col_fix_value(&self) -> Result<u8> {
        if self.value.len() != 1 {
            return Err(Error::InvalidArgument(format!(
                "fixed-length column value must be exactly 1 byte, got {}",
                self.value.len()
            )));
        }
        Ok(self.value[0])
    }

    /// The implicit-record policy's applicability test (`spec.md` §4.3):
    /// true when the position search landed on is not an exact match, the
    /// tree is `COL_FIX`, `MAX_RECORD` isn't set, and the requested record
    /// number is within the page's dense range (`<= last_recno`) — a gap
    /// that a later insert already zero-filled — or beyond it, which the
    /// policy also treats as an existing zero record per §4.3's "writing
    /// record N implicitly creates records between" rule: any N is
    /// reachable by implicit fill, so only `MAX_RECORD` disables it.
    pub(crate) fn implicit_record_applies(&self) -> bool {
        self.tree.shape() == TreeShape::ColFix
            && !self.flags.contains(CursorFlags::MAX_RECORD)
            && self.compare != 0
    }

    /// Called by the first write a cursor makes, per `spec.md` §3's
    /// `bulk_load_ok` invariant.
    pub(crate) fn clear_bulk_load_ok(&self) {
        self.tree.clear_bulk_load_ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn new_row_cursor() -> Cursor {
        let tree = Tree::new_row();
        let session = Rc::new(tree.open_session());
        Cursor::new(tree, session)
    }

    #[test]
    fn unpositioned_cursor_is_invalid() {
        let cursor = new_row_cursor();
        let txn = cursor.session.begin_operation();
        assert!(cursor.invalid(&txn));
    }

    #[test]
    fn compare_uses_collator_for_row_store() {
        let tree = Tree::new_row();
        let session = Rc::new(tree.open_session());
        let mut a = Cursor::new(tree.clone(), session.clone());
        let mut b = Cursor::new(tree, session);
        a.set_key(b"apple".to_vec());
        b.set_key(b"banana".to_vec());
        assert_eq!(a.compare(&b), -1);
        assert_eq!(b.compare(&a), 1);
    }

    #[test]
    fn equals_uses_recno_for_column_stores() {
        let tree = Tree::new_col_var();
        let session = Rc::new(tree.open_session());
        let mut a = Cursor::new(tree.clone(), session.clone());
        let mut b = Cursor::new(tree, session);
        a.set_recno(3);
        b.set_recno(3);
        assert!(a.equals(&b));
        b.set_recno(4);
        assert!(!a.equals(&b));
    }
}
