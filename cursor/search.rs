//! `search` and `search_near`, plus the `next`/`prev` iteration primitives
//! truncate reuses. `spec.md` §4.4, §4.5.

use super::Cursor;
use crate::error::{Error, Result};
use crate::storage::page::{ColVarCell, Position};
use crate::tree::TreeShape;
use crate::txn::Txn;
use crate::update::UpdateChain;
use std::cmp::Ordering;
use std::sync::Arc;

/// Resolves a slot/insert-entry's visible content: `Some(value)` if a
/// chain exists and has a visible, non-tombstone version; `None` means
/// "fall back to the base content" (no chain, or nothing visible yet).
fn visible_override(chain: &Arc<UpdateChain>, tree: &crate::tree::Tree, txn: &Txn) -> Option<Vec<u8>> {
    match chain.visible(tree.oracle(), txn) {
        Some(update) if !update.tombstone => update.value.clone(),
        _ => None,
    }
}

impl Cursor {
    /// `search`: validate, position, and interpret the result (`spec.md`
    /// §4.4). Leaves the cursor positioned on success; clears position on
    /// `NOTFOUND` or any other failure (the error-resolve routine).
    pub fn search(&mut self) -> Result<()> {
        if self.tree.shape() == TreeShape::Row {
            self.validate_row_key_size()?;
        }
        self.locate_and_position();
        let txn = self.session.begin_operation();
        let result = self.interpret_search_result(&txn);
        self.session.end_operation(result.is_ok());
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// `search_near`: like `search`, but returns a tri-valued `exact`
    /// instead of failing on a near miss (`spec.md` §4.5).
    pub fn search_near(&mut self) -> Result<i32> {
        if self.tree.shape() == TreeShape::Row {
            self.validate_row_key_size()?;
        }
        self.locate_and_position();
        let txn = self.session.begin_operation();
        let result = self.search_near_inner(&txn);
        self.session.end_operation(result.is_ok());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn search_near_inner(&mut self, txn: &Txn) -> Result<i32> {
        if self.compare != 0 && self.implicit_record_applies() {
            self.synthesize_implicit_record();
            return Ok(0);
        }
        if !self.invalid(txn) {
            self.kv_return(txn);
            return Ok(self.compare);
        }
        if self.step(Direction::Next, txn).is_ok() {
            return Ok(1);
        }
        // The step found nothing forward; the tree may have moved since
        // the first search (the page pin was released in between), so a
        // plain retry of next() is not equivalent to re-searching.
        self.locate_and_position();
        if !self.invalid(txn) {
            self.kv_return(txn);
            return Ok(self.compare);
        }
        if self.step(Direction::Prev, txn).is_ok() {
            return Ok(-1);
        }
        Err(Error::NotFound)
    }

    /// `next`: advance to the next visible record, skipping tombstones.
    pub fn next(&mut self) -> Result<()> {
        let txn = self.session.begin_operation();
        let result = self.step(Direction::Next, &txn);
        self.session.end_operation(result.is_ok());
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// `prev`: the mirror of `next`.
    pub fn prev(&mut self) -> Result<()> {
        let txn = self.session.begin_operation();
        let result = self.step(Direction::Prev, &txn);
        self.session.end_operation(result.is_ok());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn interpret_search_result(&mut self, txn: &Txn) -> Result<()> {
        if self.compare == 0 && !self.invalid(txn) {
            self.kv_return(txn);
            Ok(())
        } else if self.implicit_record_applies() {
            self.synthesize_implicit_record();
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Positions the cursor via the shape-appropriate search primitive,
    /// recording `compare` and the page generation searched at.
    pub(crate) fn locate_and_position(&mut self) {
        let guard = self.tree.page_cache().pin_leaf();
        self.search_generation = guard.page().write_generation();
        let content = guard.page().content.read();
        let located = match self.tree.shape() {
            TreeShape::Row => content
                .as_row()
                .locate(&self.key, &|a, b| self.tree.collator().compare(a, b)),
            TreeShape::ColVar => content.as_col_var().locate(self.recno),
            TreeShape::ColFix => content.as_col_fix().locate(self.recno),
        };
        self.position = located.position;
        self.compare = located.compare;
    }

    /// `kv_return`: materializes the current position's caller-visible
    /// key and value into the cursor's buffers.
    fn kv_return(&mut self, txn: &Txn) {
        let guard = self.tree.page_cache().pin_leaf();
        let content = guard.page().content.read();
        match (self.tree.shape(), self.position) {
            (TreeShape::Row, Position::Slot(i)) => {
                let slot = &content.as_row().slots[i];
                self.key = slot.key.clone();
                self.value = slot
                    .update_chain
                    .as_ref()
                    .and_then(|c| visible_override(c, &self.tree, txn))
                    .unwrap_or_else(|| slot.value.clone());
            }
            (TreeShape::Row, Position::Insert(j)) => {
                let entry = &content.as_row().insert_list[j];
                self.key = entry.key.clone();
                self.value = visible_override(&entry.update_chain, &self.tree, txn).unwrap_or_default();
            }
            (TreeShape::ColVar, Position::Slot(i)) => {
                let slot = &content.as_col_var().slots[i];
                self.recno = slot.recno;
                self.value = slot
                    .update_chain
                    .as_ref()
                    .and_then(|c| visible_override(c, &self.tree, txn))
                    .unwrap_or_else(|| match &slot.cell {
                        ColVarCell::Value(v) => v.clone(),
                        ColVarCell::Deleted => Vec::new(),
                    });
            }
            (TreeShape::ColVar, Position::Insert(j)) => {
                let entry = &content.as_col_var().insert_list[j];
                self.recno = entry.recno;
                self.value = visible_override(&entry.update_chain, &self.tree, txn).unwrap_or_default();
            }
            (TreeShape::ColFix, Position::Slot(_)) => {
                self.value = vec![content.as_col_fix().get(self.recno).unwrap_or(0)];
            }
            (_, Position::None) => unreachable!("kv_return called on an unpositioned cursor"),
            (TreeShape::ColFix, Position::Insert(_)) => {
                unreachable!("fixed-length column-stores have no insert list")
            }
        }
    }

    /// Synthesizes the zero-valued result the implicit-record policy
    /// promises for a `COL_FIX` gap (`spec.md` §4.3). The record number is
    /// whatever the caller requested; no page access is needed since an
    /// implicit record's value is always zero.
    fn synthesize_implicit_record(&mut self) {
        self.value = vec![0];
    }

    fn step(&mut self, dir: Direction, txn: &Txn) -> Result<()> {
        match self.tree.shape() {
            TreeShape::ColFix => self.step_col_fix(dir, txn),
            TreeShape::Row | TreeShape::ColVar => self.step_keyed(dir, txn),
        }
    }

    fn step_col_fix(&mut self, dir: Direction, _txn: &Txn) -> Result<()> {
        let guard = self.tree.page_cache().pin_leaf();
        let content = guard.page().content.read();
        let page = content.as_col_fix();
        let candidate = match dir {
            Direction::Next => self.recno + 1,
            Direction::Prev => {
                if self.recno == 0 {
                    return Err(Error::NotFound);
                }
                self.recno - 1
            }
        };
        if candidate == 0 || candidate > page.last_recno() {
            return Err(Error::NotFound);
        }
        self.recno = candidate;
        self.position = Position::Slot((candidate - 1) as usize);
        self.compare = 0;
        self.value = vec![page.get(candidate).unwrap_or(0)];
        Ok(())
    }

    /// Shared `next`/`prev` stepping for row-store and var-length
    /// column-store: scan every slot/insert-list entry in order relative
    /// to the cursor's current key/recno, skipping any that `invalid`
    /// rejects, and stop at the first visible one.
    fn step_keyed(&mut self, dir: Direction, txn: &Txn) -> Result<()> {
        let guard = self.tree.page_cache().pin_leaf();
        self.search_generation = guard.page().write_generation();
        let content = guard.page().content.read();

        let mut candidates: Vec<(Ordering, Position)> = match self.tree.shape() {
            TreeShape::Row => {
                let page = content.as_row();
                let mut v: Vec<(Ordering, Position)> = page
                    .slots
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (self.tree.collator().compare(&s.key, &self.key), Position::Slot(i)))
                    .collect();
                v.extend(page.insert_list.iter().enumerate().map(|(j, e)| {
                    (self.tree.collator().compare(&e.key, &self.key), Position::Insert(j))
                }));
                v
            }
            TreeShape::ColVar => {
                let page = content.as_col_var();
                let mut v: Vec<(Ordering, Position)> = page
                    .slots
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (s.recno.cmp(&self.recno), Position::Slot(i)))
                    .collect();
                v.extend(
                    page.insert_list
                        .iter()
                        .enumerate()
                        .map(|(j, e)| (e.recno.cmp(&self.recno), Position::Insert(j))),
                );
                v
            }
            TreeShape::ColFix => unreachable!("handled by step_col_fix"),
        };

        match dir {
            Direction::Next => {
                candidates.retain(|(ord, _)| *ord == Ordering::Greater);
                candidates.sort_by_key(|(_, pos)| position_sort_key(&content, self.tree.shape(), *pos));
            }
            Direction::Prev => {
                candidates.retain(|(ord, _)| *ord == Ordering::Less);
                candidates.sort_by_key(|(_, pos)| std::cmp::Reverse(position_sort_key(&content, self.tree.shape(), *pos)));
            }
        }
        // `invalid` independently pins the page and re-acquires this same
        // read lock; holding `content` across the loop would self-deadlock
        // against a writer queued in between the two acquisitions.
        drop(content);

        for (_, pos) in candidates {
            self.position = pos;
            self.compare = 0;
            if !self.invalid(txn) {
                self.kv_return(txn);
                return Ok(());
            }
        }
        Err(Error::NotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

fn position_sort_key(content: &crate::storage::page::PageContent, shape: TreeShape, pos: Position) -> Vec<u8> {
    match (shape, pos) {
        (TreeShape::Row, Position::Slot(i)) => content.as_row().slots[i].key.clone(),
        (TreeShape::Row, Position::Insert(j)) => content.as_row().insert_list[j].key.clone(),
        (TreeShape::ColVar, Position::Slot(i)) => content.as_col_var().slots[i].recno.to_be_bytes().to_vec(),
        (TreeShape::ColVar, Position::Insert(j)) => content.as_col_var().insert_list[j].recno.to_be_bytes().to_vec(),
        _ => unreachable!("fixed-length column-stores sort by recno directly"),
    }
}
