//! The transactional visibility oracle (`txn_read`) and the session-level
//! transaction state it reads against. See `spec.md` §3 ("Update chain")
//! and §6 (`txn_read`).

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically assigns transaction ids and tracks which of them have
/// committed. Shared across all sessions of a database, the same way the
/// teacher's page cache is shared across sessions via `Arc<RwLock<_>>`.
#[derive(Debug, Default)]
pub struct Oracle {
    next_id: AtomicU64,
    committed: RwLock<HashSet<u64>>,
}

impl Oracle {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            committed: RwLock::new(HashSet::new()),
        }
    }

    /// Assigns a fresh transaction id and the read snapshot (the highest
    /// committed id visible at the moment of begin) that goes with it.
    pub fn begin(&self) -> Txn {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.committed.read().iter().copied().max().unwrap_or(0);
        Txn {
            id,
            snapshot,
            committed: false,
        }
    }

    pub fn commit(&self, txn: &mut Txn) {
        self.committed.write().insert(txn.id);
        txn.committed = true;
    }

    /// Returns whether a write tagged with `writer_txn` is visible to a
    /// reader holding `reader`. A reader always sees its own writes; it
    /// sees other transactions' writes once they've committed at or before
    /// the reader's snapshot.
    pub fn visible(&self, writer_txn: u64, reader: &Txn) -> bool {
        if writer_txn == reader.id {
            return true;
        }
        writer_txn <= reader.snapshot && self.committed.read().contains(&writer_txn)
    }
}

/// A single transaction's identity and read snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Txn {
    pub id: u64,
    pub snapshot: u64,
    committed: bool,
}

impl Txn {
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

/// Shared handle to the oracle, cheaply cloned into every `Session`.
pub type SharedOracle = Arc<Oracle>;

pub fn new_oracle() -> SharedOracle {
    Arc::new(Oracle::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_writes_are_always_visible() {
        let oracle = Oracle::new();
        let txn = oracle.begin();
        assert!(oracle.visible(txn.id, &txn));
    }

    #[test]
    fn uncommitted_writes_from_other_txns_are_invisible() {
        let oracle = Oracle::new();
        let writer = oracle.begin();
        let reader = oracle.begin();
        assert!(!oracle.visible(writer.id, &reader));
    }

    #[test]
    fn committed_writes_become_visible_to_later_snapshots() {
        let oracle = Oracle::new();
        let mut writer = oracle.begin();
        oracle.commit(&mut writer);
        let reader = oracle.begin();
        assert!(oracle.visible(writer.id, &reader));
    }

    #[test]
    fn committed_writes_after_a_snapshot_stay_invisible() {
        let oracle = Oracle::new();
        let reader = oracle.begin();
        let mut writer = oracle.begin();
        oracle.commit(&mut writer);
        assert!(!oracle.visible(writer.id, &reader));
    }
}
