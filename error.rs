//! Error taxonomy for the cursor layer. See `spec.md` §7.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No matching / no further record.
    #[error("not found")]
    NotFound,

    /// Non-overwrite insert against an existing (including implicit) record.
    #[error("duplicate key")]
    DuplicateKey,

    /// Concurrent page change invalidated the cursor's position; the caller
    /// retries from search. Never surfaced past the retry loops in `cursor`.
    #[error("restart")]
    Restart,

    /// Size exceeds limits, or a fixed-length value is not exactly one byte.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Propagated from the block manager.
    #[error("block manager: {0}")]
    BlockManager(String),

    /// Propagated from the page cache / pager.
    #[error("page cache: {0}")]
    PageCache(String),

    /// Propagated from the transaction oracle.
    #[error("transaction: {0}")]
    Transaction(String),
}

impl Error {
    pub fn is_restart(&self) -> bool {
        matches!(self, Error::Restart)
    }
}

/// The `RESTART` retry shape shared by `insert`/`remove`/`update`/
/// `range_truncate`'s outer loop (`spec.md` §9: "loop-structured by
/// design").
pub fn retry_on_restart<T>(mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
    loop {
        match attempt() {
            Err(Error::Restart) => continue,
            other => return other,
        }
    }
}
