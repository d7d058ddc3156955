//! Integration tests against the six concrete scenarios in `spec.md` §8,
//! plus a handful of the idempotence/boundary properties listed there.

use btree_cursor::cursor::truncate::range_truncate_row;
use btree_cursor::{Cursor, CursorFlags, Error, Tree};
use std::rc::Rc;

#[test]
fn row_store_insert_search_remove() {
    let tree = Tree::new_row();
    let session = Rc::new(tree.open_session());

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"apple".to_vec());
    c.set_value(b"red".to_vec());
    c.insert().unwrap();
    c.set_key(b"banana".to_vec());
    c.set_value(b"yellow".to_vec());
    c.insert().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"banana".to_vec());
    c.search().unwrap();
    assert_eq!(c.value(), b"yellow");

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"apple".to_vec());
    c.remove().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"apple".to_vec());
    assert!(matches!(c.search(), Err(Error::NotFound)));

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"avocado".to_vec());
    let exact = c.search_near().unwrap();
    assert_eq!(exact, 1);
    assert_eq!(c.value(), b"yellow");
}

#[test]
fn column_var_append_assigns_increasing_recnos() {
    let tree = Tree::new_col_var();
    let session = Rc::new(tree.open_session());

    let mut recnos = Vec::new();
    for value in [b"v1" as &[u8], b"v2", b"v3"] {
        let mut c = Cursor::new(tree.clone(), session.clone());
        c.set_flags(CursorFlags::APPEND);
        c.set_value(value.to_vec());
        c.insert().unwrap();
        recnos.push(c.recno());
    }
    assert_eq!(recnos, vec![1, 2, 3]);

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_recno(2);
    c.search().unwrap();
    assert_eq!(c.value(), b"v2");
}

#[test]
fn column_fix_implicit_fill_and_remove() {
    let tree = Tree::new_col_fix();
    let session = Rc::new(tree.open_session());

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_flags(CursorFlags::OVERWRITE);
    c.set_recno(5);
    c.set_value(vec![0x7]);
    c.insert().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_recno(3);
    c.search().unwrap();
    assert_eq!(c.value(), &[0]);

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_recno(3);
    c.remove().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_recno(3);
    c.search().unwrap();
    assert_eq!(c.value(), &[0]);
}

#[test]
fn column_fix_append_assigns_increasing_recnos() {
    let tree = Tree::new_col_fix();
    let session = Rc::new(tree.open_session());

    let mut recnos = Vec::new();
    for byte in [0x1u8, 0x2, 0x3] {
        let mut c = Cursor::new(tree.clone(), session.clone());
        c.set_flags(CursorFlags::APPEND);
        c.set_value(vec![byte]);
        c.insert().unwrap();
        recnos.push(c.recno());
    }
    assert_eq!(recnos, vec![1, 2, 3]);

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_recno(2);
    c.search().unwrap();
    assert_eq!(c.value(), &[0x2]);
}

#[test]
fn duplicate_key_insert_without_overwrite() {
    let tree = Tree::new_row();
    let session = Rc::new(tree.open_session());

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"k".to_vec());
    c.set_value(b"v1".to_vec());
    c.insert().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"k".to_vec());
    c.set_value(b"v2".to_vec());
    assert!(matches!(c.insert(), Err(Error::DuplicateKey)));

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"k".to_vec());
    c.search().unwrap();
    assert_eq!(c.value(), b"v1");
}

#[test]
fn search_near_falls_back_to_only_key() {
    let tree = Tree::new_row();
    let session = Rc::new(tree.open_session());

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"m".to_vec());
    c.set_value(b"mango".to_vec());
    c.insert().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"z".to_vec());
    let exact = c.search_near().unwrap();
    assert_eq!(exact, -1);
    assert_eq!(c.value(), b"mango");
}

#[test]
fn range_truncate_removes_only_the_bounded_keys() {
    let tree = Tree::new_row();
    let session = Rc::new(tree.open_session());
    for k in b'a'..=b'j' {
        let mut c = Cursor::new(tree.clone(), session.clone());
        c.set_key(vec![k]);
        c.set_value(vec![k]);
        c.insert().unwrap();
    }

    range_truncate_row(&tree, &session, Some(b"c"), Some(b"g")).unwrap();

    for k in b'c'..=b'g' {
        let mut c = Cursor::new(tree.clone(), session.clone());
        c.set_key(vec![k]);
        assert!(matches!(c.search(), Err(Error::NotFound)));
    }
    for k in [b'b', b'h'] {
        let mut c = Cursor::new(tree.clone(), session.clone());
        c.set_key(vec![k]);
        c.search().unwrap();
    }
}

#[test]
fn idempotent_delete_on_overwrite_cursor() {
    let tree = Tree::new_row();
    let session = Rc::new(tree.open_session());

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_flags(CursorFlags::OVERWRITE);
    c.set_key(b"ghost".to_vec());
    c.remove().unwrap();
    c.set_key(b"ghost".to_vec());
    c.remove().unwrap();
}

#[test]
fn max_record_flag_forces_not_found_instead_of_zero() {
    let tree = Tree::new_col_fix();
    let session = Rc::new(tree.open_session());

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_flags(CursorFlags::OVERWRITE);
    c.set_recno(1);
    c.set_value(vec![1]);
    c.insert().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_flags(CursorFlags::MAX_RECORD);
    c.set_recno(1);
    assert!(matches!(c.search(), Err(Error::NotFound)));
}

#[test]
fn update_after_insert_is_visible_to_later_search() {
    let tree = Tree::new_row();
    let session = Rc::new(tree.open_session());

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"k".to_vec());
    c.set_value(b"v".to_vec());
    c.insert().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"k".to_vec());
    c.set_value(b"v-prime".to_vec());
    c.update().unwrap();

    let mut c = Cursor::new(tree.clone(), session.clone());
    c.set_key(b"k".to_vec());
    c.search().unwrap();
    assert_eq!(c.value(), b"v-prime");
}
