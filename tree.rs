//! A tree is the cursor layer's root handle: one shape (row-store or one
//! of the two column-store layouts), one collator, one block manager, and
//! the single leaf page standing in for "the page located by search"
//! (`spec.md` §1, §3).

use crate::block_manager::{default_block_manager, BlockManager};
use crate::collator::{default_collator, Collator};
use crate::session::Session;
use crate::storage::page::{ColFixPage, ColVarPage, Page, PageContent, RowPage};
use crate::storage::pager::PageCache;
use crate::storage::wal::TruncateLog;
use crate::txn::{new_oracle, SharedOracle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which of the three concrete layouts a tree stores, per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeShape {
    Row,
    ColVar,
    ColFix,
}

#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub max_object_size: u64,
    pub block_size: u64,
    /// Whether the truncate log records range entries (`storage::wal`).
    pub truncate_log_enabled: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_object_size: 2 * crate::block_manager::ONE_GIB,
            block_size: 4096,
            truncate_log_enabled: true,
        }
    }
}

/// The cursor layer's root handle. One `Tree` backs any number of
/// sessions and cursors; `Tree` itself is `Send + Sync` and shared via
/// `Arc`, while each `Session`/`Cursor` built on top of it is confined to
/// one thread (`spec.md` §5).
pub struct Tree {
    shape: TreeShape,
    collator: Arc<dyn Collator>,
    block_manager: Arc<dyn BlockManager>,
    page_cache: PageCache,
    truncate_log: TruncateLog,
    oracle: SharedOracle,
    /// Cleared the first time a write lands and never set again — a bulk
    /// loader checks this once, optimistically, and falls back to the
    /// normal insert path if it's already false by the time it looks.
    /// Racy by design (`spec.md` §5); no synchronization stronger than
    /// `Ordering::Relaxed` is warranted.
    bulk_load_ok: AtomicBool,
}

impl Tree {
    fn new(shape: TreeShape, content: PageContent, collator: Arc<dyn Collator>, config: TreeConfig) -> Arc<Self> {
        Arc::new(Self {
            shape,
            collator,
            block_manager: default_block_manager(),
            page_cache: PageCache::new(Page::new(content)),
            truncate_log: TruncateLog::new(config.truncate_log_enabled),
            oracle: new_oracle(),
            bulk_load_ok: AtomicBool::new(true),
        })
    }

    pub fn new_row() -> Arc<Self> {
        Self::new_row_with(default_collator(), TreeConfig::default())
    }

    pub fn new_row_with(collator: Arc<dyn Collator>, config: TreeConfig) -> Arc<Self> {
        Self::new(TreeShape::Row, PageContent::Row(RowPage::default()), collator, config)
    }

    pub fn new_col_var() -> Arc<Self> {
        Self::new_col_var_with(TreeConfig::default())
    }

    pub fn new_col_var_with(config: TreeConfig) -> Arc<Self> {
        Self::new(
            TreeShape::ColVar,
            PageContent::ColVar(ColVarPage::default()),
            default_collator(),
            config,
        )
    }

    pub fn new_col_fix() -> Arc<Self> {
        Self::new_col_fix_with(TreeConfig::default())
    }

    pub fn new_col_fix_with(config: TreeConfig) -> Arc<Self> {
        Self::new(
            TreeShape::ColFix,
            PageContent::ColFix(ColFixPage::default()),
            default_collator(),
            config,
        )
    }

    pub fn shape(&self) -> TreeShape {
        self.shape
    }

    pub fn collator(&self) -> &Arc<dyn Collator> {
        &self.collator
    }

    pub fn block_manager(&self) -> &Arc<dyn BlockManager> {
        &self.block_manager
    }

    pub fn page_cache(&self) -> &PageCache {
        &self.page_cache
    }

    pub fn truncate_log(&self) -> &TruncateLog {
        &self.truncate_log
    }

    pub(crate) fn oracle(&self) -> &SharedOracle {
        &self.oracle
    }

    /// A new session sharing this tree's transaction oracle.
    pub fn open_session(&self) -> Session {
        Session::new(self.oracle.clone())
    }

    pub fn bulk_load_ok(&self) -> bool {
        self.bulk_load_ok.load(Ordering::Relaxed)
    }

    /// Called by the first write any cursor makes against this tree.
    pub(crate) fn clear_bulk_load_ok(&self) {
        self.bulk_load_ok.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_load_ok_starts_true_and_latches_false() {
        let tree = Tree::new_row();
        assert!(tree.bulk_load_ok());
        tree.clear_bulk_load_ok();
        assert!(!tree.bulk_load_ok());
        tree.clear_bulk_load_ok();
        assert!(!tree.bulk_load_ok());
    }

    #[test]
    fn open_session_shares_the_tree_oracle() {
        let tree = Tree::new_col_fix();
        let a = tree.open_session();
        let b = tree.open_session();
        let txn_a = a.begin_operation();
        a.end_operation(true);
        let txn_b = b.begin_operation();
        assert!(txn_b.snapshot >= txn_a.id);
    }
}
