//! The page cache and eviction engine, named as an external collaborator
//! by `spec.md` §1 and §5. Real eviction and multi-page structure are out
//! of scope; what's modeled here is the part the cursor layer actually
//! touches: handing out a pinned reference to "the leaf page located by
//! search" and releasing it again.

use crate::storage::page::Page;
use std::sync::Arc;

/// Hands out the single leaf page backing a tree, pinned for the lifetime
/// of the returned guard. Stands in for the teacher's `Pager::read_page` +
/// `Page::set_locked`/`clear_locked` pair.
pub struct PageCache {
    leaf: Arc<Page>,
}

impl PageCache {
    pub fn new(leaf: Arc<Page>) -> Self {
        Self { leaf }
    }

    /// Pins and returns the leaf page. The caller must release it via
    /// `PinGuard::drop` (or explicit `release`), which happens at reset,
    /// close, successful insert, and error-resolve per `spec.md` §5.
    pub fn pin_leaf(&self) -> PinGuard {
        self.leaf.pin();
        PinGuard {
            page: self.leaf.clone(),
            released: false,
        }
    }
}

/// RAII pin on a leaf page. Dropping it unpins; `release` does the same
/// explicitly so call sites can document the moment they let go of the
/// page, matching `spec.md` §4.12's "leave-page routine".
pub struct PinGuard {
    page: Arc<Page>,
    released: bool,
}

impl PinGuard {
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    pub fn release(mut self) {
        self.page.unpin();
        self.released = true;
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        if !self.released {
            self.page.unpin();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::{ColFixPage, PageContent};

    #[test]
    fn pin_and_release_round_trips() {
        let page = Page::new(PageContent::ColFix(ColFixPage::default()));
        let cache = PageCache::new(page);
        let guard = cache.pin_leaf();
        guard.release();
    }
}
