//! A session owns cursors and the currently active transaction, if any.
//! See `spec.md` §5 ("a session owns its cursors") and the transaction
//! model added in `SPEC_FULL.md` §3.

use crate::txn::{SharedOracle, Txn};
use crate::update::UpdateChain;
use std::cell::RefCell;
use std::sync::Arc;

#[derive(Default)]
struct SessionState {
    txn: Option<Txn>,
    /// `true` once the caller has called `begin_transaction`; distinguishes
    /// a user-managed transaction (left open across operations until an
    /// explicit commit/rollback) from an autocommit transaction (opened
    /// and closed within a single cursor operation).
    explicit: bool,
    touched: Vec<Arc<UpdateChain>>,
}

/// Owns a session's transaction state. A session is not safe to share
/// across threads (`spec.md` §5); it is used from a single thread via
/// `Rc<Session>`.
pub struct Session {
    oracle: SharedOracle,
    state: RefCell<SessionState>,
}

impl Session {
    pub fn new(oracle: SharedOracle) -> Self {
        Self {
            oracle,
            state: RefCell::new(SessionState::default()),
        }
    }

    /// Begins a user-managed transaction. Every cursor operation run
    /// before the matching `commit_transaction`/`rollback_transaction`
    /// shares its snapshot and commits or rolls back together.
    pub fn begin_transaction(&self) {
        let mut s = self.state.borrow_mut();
        assert!(s.txn.is_none(), "a transaction is already active on this session");
        s.txn = Some(self.oracle.begin());
        s.explicit = true;
    }

    pub fn commit_transaction(&self) {
        let mut s = self.state.borrow_mut();
        let mut txn = s
            .txn
            .take()
            .expect("commit_transaction called with no active transaction");
        self.oracle.commit(&mut txn);
        s.explicit = false;
        s.touched.clear();
    }

    /// Discards every write this transaction made, by walking the chains
    /// it touched and stripping its versions back off (the "in-memory
    /// undo record" from `spec.md` §4.10/§5).
    pub fn rollback_transaction(&self) {
        let mut s = self.state.borrow_mut();
        let txn = s
            .txn
            .take()
            .expect("rollback_transaction called with no active transaction");
        for chain in s.touched.drain(..) {
            chain.rollback(txn.id);
        }
        s.explicit = false;
    }

    /// Returns the transaction the next operation should read/write
    /// under, opening an autocommit transaction if none is active yet.
    pub(crate) fn begin_operation(&self) -> Txn {
        let mut s = self.state.borrow_mut();
        match s.txn {
            Some(txn) => txn,
            None => {
                let txn = self.oracle.begin();
                s.txn = Some(txn);
                txn
            }
        }
    }

    pub(crate) fn note_touched(&self, chain: Arc<UpdateChain>) {
        self.state.borrow_mut().touched.push(chain);
    }

    /// Finalizes the transaction opened by `begin_operation`, if it was an
    /// autocommit one: commits on success, rolls back the chains this
    /// operation touched on failure. A user-managed transaction is left
    /// untouched — the caller commits or rolls it back explicitly.
    pub(crate) fn end_operation(&self, success: bool) {
        let mut s = self.state.borrow_mut();
        if s.explicit {
            return;
        }
        if let Some(mut txn) = s.txn.take() {
            if success {
                self.oracle.commit(&mut txn);
            } else {
                for chain in s.touched.drain(..) {
                    chain.rollback(txn.id);
                }
            }
        }
        s.touched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::new_oracle;

    #[test]
    fn explicit_transaction_rollback_undoes_touched_chains() {
        let oracle = new_oracle();
        let session = Session::new(oracle);
        session.begin_transaction();
        let txn = session.begin_operation();

        let chain = Arc::new(UpdateChain::new());
        chain.push_value(txn.id, b"v1".to_vec());
        session.note_touched(chain.clone());

        session.rollback_transaction();
        assert!(chain.is_empty());
    }

    #[test]
    fn autocommit_operation_commits_on_success() {
        let oracle = new_oracle();
        let session = Session::new(oracle.clone());
        let txn = session.begin_operation();
        session.end_operation(true);

        let reader = oracle.begin();
        assert!(oracle.visible(txn.id, &reader));
    }
}
