//! `insert`/`remove`/`update` drivers and the `row_modify`/`col_modify`
//! splice primitives they call. `spec.md` §4.6, §4.7, §4.8.

use super::{Cursor, CursorFlags};
use crate::error::{retry_on_restart, Error, Result};
use crate::storage::page::{ColVarInsertEntry, Position, RowInsertEntry};
use crate::tree::TreeShape;
use crate::update::UpdateChain;
use std::cmp::Ordering;
use std::sync::Arc;

impl Cursor {
    /// `insert` (`spec.md` §4.6). Clears `bulk_load_ok`, retries on
    /// `RESTART`, and leaves the cursor unpositioned on success.
    pub fn insert(&mut self) -> Result<()> {
        self.validate_sizes_for_write()?;
        self.clear_bulk_load_ok();

        let result = retry_on_restart(|| self.insert_attempt());
        self.reset();
        result
    }

    fn insert_attempt(&mut self) -> Result<()> {
        match self.tree.shape() {
            TreeShape::Row => self.insert_row(),
            TreeShape::ColVar | TreeShape::ColFix => self.insert_column(),
        }
    }

    fn insert_row(&mut self) -> Result<()> {
        self.locate_and_position();
        let txn = self.session.begin_operation();
        if !self.flags.contains(CursorFlags::OVERWRITE) && self.compare == 0 && !self.invalid(&txn) {
            self.session.end_operation(false);
            return Err(Error::DuplicateKey);
        }
        let value = self.value.clone();
        let result = self.row_splice(false, Some(value), txn.id);
        self.session.end_operation(result.is_ok());
        result.map(|_| ())
    }

    fn insert_column(&mut self) -> Result<()> {
        let append = self.flags.contains(CursorFlags::APPEND);
        let saved_recno = self.recno;
        if append {
            // Position the search past the last record; the real record
            // number is chosen by `col_modify` itself.
            self.recno = u64::MAX;
        }
        self.locate_and_position();
        if append {
            self.recno = 0;
        }
        let txn = self.session.begin_operation();
        if !append && !self.flags.contains(CursorFlags::OVERWRITE) {
            let duplicate =
                (self.compare == 0 && !self.invalid(&txn)) || (self.compare != 0 && self.implicit_record_applies());
            if duplicate {
                self.session.end_operation(false);
                self.recno = saved_recno;
                return Err(Error::DuplicateKey);
            }
        }
        let value = self.value.clone();
        let result = self.col_splice(append, false, value, txn.id);
        self.session.end_operation(result.is_ok());
        match result {
            Ok(assigned) => {
                if append {
                    self.recno = assigned;
                } else {
                    self.recno = saved_recno;
                }
                Ok(())
            }
            Err(e) => {
                self.recno = saved_recno;
                Err(e)
            }
        }
    }

    /// `remove` (`spec.md` §4.7). `NOTFOUND` maps to success when the
    /// cursor carries `OVERWRITE` (idempotent delete).
    pub fn remove(&mut self) -> Result<()> {
        if self.tree.shape() == TreeShape::Row {
            self.validate_row_key_size()?;
        }
        let result = retry_on_restart(|| self.remove_attempt());
        match result {
            Err(Error::NotFound) if self.flags.contains(CursorFlags::OVERWRITE) => {
                self.reset();
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    fn remove_attempt(&mut self) -> Result<()> {
        match self.tree.shape() {
            TreeShape::Row => self.remove_row(),
            TreeShape::ColVar | TreeShape::ColFix => self.remove_column(),
        }
    }

    fn remove_row(&mut self) -> Result<()> {
        self.locate_and_position();
        let txn = self.session.begin_operation();
        if self.compare != 0 || self.invalid(&txn) {
            self.session.end_operation(false);
            return Err(Error::NotFound);
        }
        let result = self.row_splice(true, None, txn.id);
        self.session.end_operation(result.is_ok());
        result.map(|_| ())
    }

    fn remove_column(&mut self) -> Result<()> {
        let requested_recno = self.recno;
        self.locate_and_position();
        let txn = self.session.begin_operation();
        if self.compare != 0 || self.invalid(&txn) {
            if self.implicit_record_applies() {
                self.session.end_operation(true);
                self.recno = requested_recno;
                return Ok(());
            }
            self.session.end_operation(false);
            return Err(Error::NotFound);
        }
        let result = self.col_splice(false, true, Vec::new(), txn.id);
        self.session.end_operation(result.is_ok());
        match result {
            Ok(_) => {
                self.recno = requested_recno;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// `update` (`spec.md` §4.8). Leaves the cursor positioned and
    /// exposes engine copies of key/value on success.
    pub fn update(&mut self) -> Result<()> {
        self.validate_sizes_for_write()?;
        self.clear_bulk_load_ok();
        let result = retry_on_restart(|| self.update_attempt());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn update_attempt(&mut self) -> Result<()> {
        match self.tree.shape() {
            TreeShape::Row => self.update_row(),
            TreeShape::ColVar | TreeShape::ColFix => self.update_column(),
        }
    }

    fn update_row(&mut self) -> Result<()> {
        self.locate_and_position();
        let txn = self.session.begin_operation();
        if !self.flags.contains(CursorFlags::OVERWRITE) && (self.compare != 0 || self.invalid(&txn)) {
            self.session.end_operation(false);
            return Err(Error::NotFound);
        }
        let value = self.value.clone();
        let result = self.row_splice(false, Some(value), txn.id);
        self.session.end_operation(result.is_ok());
        result.map(|_| ())
    }

    fn update_column(&mut self) -> Result<()> {
        self.locate_and_position();
        let txn = self.session.begin_operation();
        if !self.flags.contains(CursorFlags::OVERWRITE)
            && (self.compare != 0 || self.invalid(&txn))
            && !self.implicit_record_applies()
        {
            self.session.end_operation(false);
            return Err(Error::NotFound);
        }
        let value = self.value.clone();
        let result = self.col_splice(false, false, value, txn.id);
        self.session.end_operation(result.is_ok());
        match result {
            Ok(assigned) => {
                self.recno = assigned;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// The truncate loop's `rmfunc(anchor, positioned=true)`: a tombstone
    /// splice against the cursor's current position without a preceding
    /// full search, sound because the anchor stays pinned on the page
    /// generation the last `next`/`prev` step validated (`spec.md` §4.10).
    pub(crate) fn remove_positioned(&mut self) -> Result<()> {
        let txn = self.session.begin_operation();
        let result = match self.tree.shape() {
            TreeShape::Row => self.row_splice(true, None, txn.id).map(|_| ()),
            TreeShape::ColVar | TreeShape::ColFix => self.col_splice(false, true, Vec::new(), txn.id).map(|_| ()),
        };
        self.session.end_operation(result.is_ok());
        result
    }

    fn validate_sizes_for_write(&self) -> Result<()> {
        match self.tree.shape() {
            TreeShape::Row => {
                self.validate_row_key_size()?;
                self.validate_row_value_size()
            }
            TreeShape::ColVar => self.validate_col_var_value_size(),
            TreeShape::ColFix => self.validate_col_fix_value().map(|_| ()),
        }
    }

    /// `row_modify`: splice a value or tombstone onto the chain at the
    /// cursor's current position, or start a new one on the insert list.
    /// Detects a concurrent structural change via the page's write
    /// generation and signals `Error::Restart`.
    pub(crate) fn row_splice(&mut self, tombstone: bool, value: Option<Vec<u8>>, txn_id: u64) -> Result<Position> {
        let guard = self.tree.page_cache().pin_leaf();
        let mut content = guard.page().content.write();
        if guard.page().write_generation() != self.search_generation {
            return Err(Error::Restart);
        }
        let row = content.as_row_mut();
        let (position, chain, grew) = match self.position {
            Position::Slot(i) if self.compare == 0 => {
                let slot = &mut row.slots[i];
                let chain = slot.update_chain.get_or_insert_with(|| Arc::new(UpdateChain::new())).clone();
                push(&chain, tombstone, value, txn_id);
                (Position::Slot(i), chain, false)
            }
            Position::Insert(j) if self.compare == 0 => {
                let chain = row.insert_list[j].update_chain.clone();
                push(&chain, tombstone, value, txn_id);
                (Position::Insert(j), chain, false)
            }
            _ => {
                let chain = Arc::new(UpdateChain::new());
                push(&chain, tombstone, value, txn_id);
                let key = self.key.clone();
                let idx = row
                    .insert_list
                    .partition_point(|e| self.tree.collator().compare(&e.key, &key) == Ordering::Less);
                row.insert_list.insert(idx, RowInsertEntry { key, update_chain: chain.clone() });
                (Position::Insert(idx), chain, true)
            }
        };
        drop(content);
        if grew {
            guard.page().bump_write_generation();
        }
        self.position = position;
        self.compare = 0;
        self.session.note_touched(chain);
        Ok(position)
    }

    /// `col_modify`, generalized over `COL_VAR` (chain-backed, supports
    /// `APPEND`) and `COL_FIX` (flat, unversioned — see `DESIGN.md`).
    /// Returns the record number the write landed on (the assigned one,
    /// for `APPEND`).
    pub(crate) fn col_splice(
        &mut self,
        append: bool,
        tombstone: bool,
        value: Vec<u8>,
        txn_id: u64,
    ) -> Result<u64> {
        match self.tree.shape() {
            TreeShape::ColFix => self.col_fix_splice(append, tombstone, value),
            TreeShape::ColVar => self.col_var_splice(append, tombstone, value, txn_id),
            TreeShape::Row => unreachable!(),
        }
    }

    fn col_fix_splice(&mut self, append: bool, tombstone: bool, value: Vec<u8>) -> Result<u64> {
        let guard = self.tree.page_cache().pin_leaf();
        let mut content = guard.page().content.write();
        if !append && guard.page().write_generation() != self.search_generation {
            return Err(Error::Restart);
        }
        let page = content.as_col_fix_mut();
        let before = page.last_recno();
        let recno = if append { before + 1 } else { self.recno };
        let byte = if tombstone { 0 } else { value[0] };
        page.put(recno, byte);
        let grew = page.last_recno() > before;
        drop(content);
        if grew {
            guard.page().bump_write_generation();
        }
        self.position = Position::Slot((recno - 1) as usize);
        self.compare = 0;
        Ok(recno)
    }

    fn col_var_splice(&mut self, append: bool, tombstone: bool, value: Vec<u8>, txn_id: u64) -> Result<u64> {
        let guard = self.tree.page_cache().pin_leaf();
        let mut content = guard.page().content.write();
        if !append && guard.page().write_generation() != self.search_generation {
            return Err(Error::Restart);
        }
        let col = content.as_col_var_mut();

        if append {
            let recno = col.next_append_recno();
            let chain = Arc::new(UpdateChain::new());
            push(&chain, tombstone, Some(value), txn_id);
            let idx = col.insert_list.len();
            col.insert_list.push(ColVarInsertEntry { recno, update_chain: chain.clone() });
            drop(content);
            guard.page().bump_write_generation();
            self.position = Position::Insert(idx);
            self.compare = 0;
            self.session.note_touched(chain);
            return Ok(recno);
        }

        let assigned = self.recno;
        let (position, chain, grew) = match self.position {
            Position::Slot(i) if self.compare == 0 => {
                let slot = &mut col.slots[i];
                let chain = slot.update_chain.get_or_insert_with(|| Arc::new(UpdateChain::new())).clone();
                push(&chain, tombstone, Some(value), txn_id);
                (Position::Slot(i), chain, false)
            }
            Position::Insert(j) if self.compare == 0 => {
                let chain = col.insert_list[j].update_chain.clone();
                push(&chain, tombstone, Some(value), txn_id);
                (Position::Insert(j), chain, false)
            }
            _ => {
                let chain = Arc::new(UpdateChain::new());
                push(&chain, tombstone, Some(value), txn_id);
                let idx = col.insert_list.partition_point(|e| e.recno < assigned);
                col.insert_list.insert(idx, ColVarInsertEntry { recno: assigned, update_chain: chain.clone() });
                (Position::Insert(idx), chain, true)
            }
        };
        drop(content);
        if grew {
            guard.page().bump_write_generation();
        }
        self.position = position;
        self.compare = 0;
        self.session.note_touched(chain);
        Ok(assigned)
    }
}

fn push(chain: &Arc<UpdateChain>, tombstone: bool, value: Option<Vec<u8>>, txn_id: u64) {
    if tombstone {
        chain.push_tombstone(txn_id);
    } else {
        chain.push_value(txn_id, value.expect("non-tombstone write carries a value"));
    }
}

