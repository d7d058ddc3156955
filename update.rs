//! Per-key update chains. See `spec.md` §3 ("Update chain").

use crate::txn::{Oracle, Txn};
use parking_lot::Mutex;
use std::sync::Arc;

/// A single versioned write. Chains are newest-first; `next` points at the
/// version this one shadows.
#[derive(Debug)]
pub struct Update {
    pub txn_id: u64,
    pub tombstone: bool,
    pub value: Option<Vec<u8>>,
    pub next: Option<Arc<Update>>,
}

impl Update {
    fn value_node(txn_id: u64, value: Vec<u8>, next: Option<Arc<Update>>) -> Arc<Self> {
        Arc::new(Self {
            txn_id,
            tombstone: false,
            value: Some(value),
            next,
        })
    }

    fn tombstone_node(txn_id: u64, next: Option<Arc<Update>>) -> Arc<Self> {
        Arc::new(Self {
            txn_id,
            tombstone: true,
            value: None,
            next,
        })
    }
}

/// The mutable head of a per-key update chain. Owned by a `Slot` or an
/// `InsertListEntry`; spliced under the page's write lock.
#[derive(Debug, Default)]
pub struct UpdateChain {
    head: Mutex<Option<Arc<Update>>>,
}

impl UpdateChain {
    pub fn new() -> Self {
        Self {
            head: Mutex::new(None),
        }
    }

    /// Splices a new version onto the head of the chain.
    pub fn push_value(&self, txn_id: u64, value: Vec<u8>) {
        let mut head = self.head.lock();
        let next = head.take();
        *head = Some(Update::value_node(txn_id, value, next));
    }

    pub fn push_tombstone(&self, txn_id: u64) {
        let mut head = self.head.lock();
        let next = head.take();
        *head = Some(Update::tombstone_node(txn_id, next));
    }

    /// Removes every version written by `txn_id` from the head of the
    /// chain, in effect undoing that transaction. This is the "in-memory
    /// undo record" `spec.md` §4.10/§5 require even when a truncate range
    /// is logged as a single WAL entry.
    pub fn rollback(&self, txn_id: u64) {
        let mut head = self.head.lock();
        while matches!(head.as_ref(), Some(u) if u.txn_id == txn_id) {
            let next = head.as_ref().and_then(|u| u.next.clone());
            *head = next;
        }
    }

    /// `txn_read`: walks the chain and returns the newest version visible
    /// under `reader`'s snapshot, or `None` if nothing is visible (the
    /// caller falls through to the on-page slot contents).
    pub fn visible(&self, oracle: &Oracle, reader: &Txn) -> Option<Arc<Update>> {
        let mut node = self.head.lock().clone();
        while let Some(u) = node {
            if oracle.visible(u.txn_id, reader) {
                return Some(u);
            }
            node = u.next.clone();
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.head.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::Oracle;

    #[test]
    fn newest_visible_version_wins() {
        let oracle = Oracle::new();
        let mut t1 = oracle.begin();
        oracle.commit(&mut t1);
        let mut t2 = oracle.begin();
        oracle.commit(&mut t2);
        let reader = oracle.begin();

        let chain = UpdateChain::new();
        chain.push_value(t1.id, b"v1".to_vec());
        chain.push_value(t2.id, b"v2".to_vec());

        let visible = chain.visible(&oracle, &reader).unwrap();
        assert_eq!(visible.value.as_deref(), Some(&b"v2"[..]));
    }

    #[test]
    fn tombstone_shadows_older_value() {
        let oracle = Oracle::new();
        let mut t1 = oracle.begin();
        oracle.commit(&mut t1);
        let mut t2 = oracle.begin();
        oracle.commit(&mut t2);
        let reader = oracle.begin();

        let chain = UpdateChain::new();
        chain.push_value(t1.id, b"v1".to_vec());
        chain.push_tombstone(t2.id);

        let visible = chain.visible(&oracle, &reader).unwrap();
        assert!(visible.tombstone);
    }

    #[test]
    fn rollback_discards_only_that_txns_versions() {
        let oracle = Oracle::new();
        let mut t1 = oracle.begin();
        oracle.commit(&mut t1);
        let t2 = oracle.begin();
        let reader_after = oracle.begin();

        let chain = UpdateChain::new();
        chain.push_value(t1.id, b"v1".to_vec());
        chain.push_value(t2.id, b"v2".to_vec());
        chain.rollback(t2.id);

        let visible = chain.visible(&oracle, &reader_after).unwrap();
        assert_eq!(visible.value.as_deref(), Some(&b"v1"[..]));
    }
}
