//! `range_truncate`: remove every record in `[start, stop]`. `spec.md`
//! §4.10.

use super::Cursor;
use crate::error::{retry_on_restart, Error, Result};
use crate::session::Session;
use crate::tree::{Tree, TreeShape};
use std::rc::Rc;
use std::sync::Arc;

enum Bound {
    Key(Vec<u8>),
    Recno(u64),
}

impl Bound {
    fn apply(&self, cursor: &mut Cursor) {
        match self {
            Bound::Key(k) => cursor.set_key(k.clone()),
            Bound::Recno(r) => cursor.set_recno(*r),
        }
    }
}

/// Row-store range truncate: `start`/`stop` are byte-string keys, either
/// absent (meaning "from the beginning"/"to the end").
pub fn range_truncate_row(tree: &Arc<Tree>, session: &Rc<Session>, start: Option<&[u8]>, stop: Option<&[u8]>) -> Result<()> {
    assert_eq!(tree.shape(), TreeShape::Row);
    range_truncate(
        tree,
        session,
        start.map(|k| Bound::Key(k.to_vec())),
        stop.map(|k| Bound::Key(k.to_vec())),
        false,
    )
}

/// Variable-length column-store range truncate: `start`/`stop` are record
/// numbers.
pub fn range_truncate_col_var(tree: &Arc<Tree>, session: &Rc<Session>, start: Option<u64>, stop: Option<u64>) -> Result<()> {
    assert_eq!(tree.shape(), TreeShape::ColVar);
    range_truncate(tree, session, start.map(Bound::Recno), stop.map(Bound::Recno), false)
}

/// Fixed-length column-store range truncate. Every candidate's value byte
/// is inspected first; zero-valued records (implicit or explicitly zero)
/// are skipped, since fixed-length records cannot be deleted and writing
/// zero over an already-zero record is both wasted work and a violation
/// of "returned records must have existed" (`spec.md` §4.10).
pub fn range_truncate_col_fix(tree: &Arc<Tree>, session: &Rc<Session>, start: Option<u64>, stop: Option<u64>) -> Result<()> {
    assert_eq!(tree.shape(), TreeShape::ColFix);
    range_truncate(tree, session, start.map(Bound::Recno), stop.map(Bound::Recno), true)
}

fn range_truncate(
    tree: &Arc<Tree>,
    session: &Rc<Session>,
    start: Option<Bound>,
    stop: Option<Bound>,
    skip_zero: bool,
) -> Result<()> {
    if start.is_none() && stop.is_none() {
        return Err(Error::InvalidArgument(
            "range_truncate requires at least one bound".to_string(),
        ));
    }

    let start_key = start.as_ref().map(bound_log_bytes);
    let stop_key = stop.as_ref().map(bound_log_bytes);
    let _scope = tree.truncate_log().begin_scope(start_key.as_deref(), stop_key.as_deref());

    // Both endpoints must be fully instantiated by search before the loop
    // (`spec.md` §4.10): truncate compares positions, not keys, and
    // cursors may arrive carrying only the bound value.
    let start_led = start.is_some();
    let mut start_cursor = start.map(|b| {
        let mut c = Cursor::new(tree.clone(), session.clone());
        b.apply(&mut c);
        c
    });
    let mut stop_cursor = stop.map(|b| {
        let mut c = Cursor::new(tree.clone(), session.clone());
        b.apply(&mut c);
        c
    });
    if let Some(c) = start_cursor.as_mut() {
        c.search()?;
    }
    if let Some(c) = stop_cursor.as_mut() {
        c.search()?;
    }

    retry_on_restart(|| {
        let mut anchor = if start_led {
            clone_position(start_cursor.as_ref().unwrap())
        } else {
            clone_position(stop_cursor.as_ref().unwrap())
        };
        let bound = if start_led { stop_cursor.as_ref() } else { start_cursor.as_ref() };
        run_truncate_attempt(&mut anchor, bound, start_led, skip_zero)
    })
}

/// Re-derives a fresh cursor positioned the same way as `source`, for the
/// next outer-loop attempt after a `RESTART`.
fn clone_position(source: &Cursor) -> Cursor {
    let mut c = Cursor::new(source.tree.clone(), source.session.clone());
    match source.tree.shape() {
        TreeShape::Row => c.set_key(source.key().to_vec()),
        TreeShape::ColVar | TreeShape::ColFix => c.set_recno(source.recno()),
    }
    c
}

fn run_truncate_attempt(anchor: &mut Cursor, bound: Option<&Cursor>, start_led: bool, skip_zero: bool) -> Result<()> {
    // "remove(anchor)": a full-search remove primes the page.
    anchor.remove()?;

    loop {
        if let Some(bound) = bound {
            if anchor.equals(bound) {
                break;
            }
        }
        let step = if start_led { anchor.next() } else { anchor.prev() };
        match step {
            Err(Error::NotFound) => break,
            Err(e) => return Err(e),
            Ok(()) => {}
        }

        if skip_zero && anchor.value().first() == Some(&0) {
            continue;
        }

        match anchor.remove_positioned() {
            Err(Error::Restart) => return Err(Error::Restart),
            Err(e) => return Err(e),
            Ok(()) => {}
        }
    }
    Ok(())
}

fn bound_log_bytes(bound: &Bound) -> Vec<u8> {
    match bound {
        Bound::Key(k) => k.clone(),
        Bound::Recno(r) => r.to_be_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn insert_row(tree: &Arc<Tree>, session: &Rc<Session>, key: &[u8], value: &[u8]) {
        let mut c = Cursor::new(tree.clone(), session.clone());
        c.set_key(key.to_vec());
        c.set_value(value.to_vec());
        c.insert().unwrap();
    }

    #[test]
    fn range_truncate_removes_only_the_inclusive_range() {
        let tree = Tree::new_row();
        let session = Rc::new(tree.open_session());
        for k in [b"a" as &[u8], b"b", b"c", b"d", b"e", b"f", b"g", b"h", b"i", b"j"] {
            insert_row(&tree, &session, k, b"v");
        }

        range_truncate_row(&tree, &session, Some(b"c"), Some(b"g")).unwrap();

        for k in [b"c" as &[u8], b"d", b"e", b"f", b"g"] {
            let mut c = Cursor::new(tree.clone(), session.clone());
            c.set_key(k.to_vec());
            assert!(matches!(c.search(), Err(Error::NotFound)));
        }
        for k in [b"b" as &[u8], b"h"] {
            let mut c = Cursor::new(tree.clone(), session.clone());
            c.set_key(k.to_vec());
            c.search().unwrap();
        }
    }
}
