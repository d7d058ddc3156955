//! The write-ahead log's truncate-range recorder, named as an external
//! collaborator by `spec.md` §1 and exercised by `cursor::truncate` via
//! `txn_truncate_log`/`txn_truncate_end` (`spec.md` §6, §4.10).
//!
//! When logging is enabled, a range truncate is recorded once, as a single
//! range entry, instead of once per removed record — `spec.md` §4.10 calls
//! this eliding the individual in-memory removes from the log while still
//! requiring each of them to produce the in-memory undo record rollback
//! needs. The undo side of that contract lives in `update::UpdateChain`;
//! this module is only the logging side.

use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct TruncateLogEntry {
    pub start: Option<Vec<u8>>,
    pub stop: Option<Vec<u8>>,
}

/// The engine's truncate-range log. `enabled = false` models the engine
/// running with logging off entirely, in which case no range entry is
/// ever recorded (individual removes still happen, they just aren't WAL
/// entries either — out of scope for this crate beyond the flag itself).
#[derive(Debug, Default)]
pub struct TruncateLog {
    enabled: bool,
    entries: Mutex<Vec<TruncateLogEntry>>,
}

impl TruncateLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<TruncateLogEntry> {
        self.entries.lock().clone()
    }

    /// `txn_truncate_log`: opens a logging scope for `[start, stop]`. The
    /// returned guard's `Drop` is `txn_truncate_end`, so the scope closes
    /// on every exit path out of `range_truncate`, success or error alike.
    pub fn begin_scope<'a>(
        &'a self,
        start: Option<&[u8]>,
        stop: Option<&[u8]>,
    ) -> TruncateScope<'a> {
        if self.enabled {
            trace!("txn_truncate_log(start={:?}, stop={:?})", start, stop);
            self.entries.lock().push(TruncateLogEntry {
                start: start.map(|s| s.to_vec()),
                stop: stop.map(|s| s.to_vec()),
            });
        }
        TruncateScope { log: self }
    }
}

pub struct TruncateScope<'a> {
    log: &'a TruncateLog,
}

impl Drop for TruncateScope<'_> {
    fn drop(&mut self) {
        if self.log.enabled {
            trace!("txn_truncate_end()");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_log_records_a_single_range_entry() {
        let log = TruncateLog::new(true);
        {
            let _scope = log.begin_scope(Some(b"a"), Some(b"j"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start.as_deref(), Some(&b"a"[..]));
        assert_eq!(entries[0].stop.as_deref(), Some(&b"j"[..]));
    }

    #[test]
    fn disabled_log_records_nothing() {
        let log = TruncateLog::new(false);
        let _scope = log.begin_scope(Some(b"a"), None);
        assert!(log.entries().is_empty());
    }
}
