use std::path::Path;

use super::MemoryConnection;
use super::Visibility;
use crate::storage::store_test::StoreTestSuite;
use crate::storage::store_test::TABLE;
use crate::storage::store_test::TABLE_OPTIONS;
use crate::Connection;
use crate::Cursor;
use crate::Session;
use crate::StoreError;

#[test]
fn test_mem_store() {
    let conn = MemoryConnection::open(Path::new("/unused"), "create").unwrap();
    StoreTestSuite::run_all_tests(&conn);
}

fn conn_with_table() -> MemoryConnection {
    let conn = MemoryConnection::new();
    conn.open_session(None)
        .unwrap()
        .create(TABLE, TABLE_OPTIONS)
        .unwrap();
    conn
}

#[test]
fn test_deferred_writes_are_invisible_until_published() {
    let conn = conn_with_table();
    let session = conn.open_session(None).unwrap();
    let mut cursor = session.open_cursor(TABLE, None).unwrap();

    conn.set_visibility(Visibility::Deferred);
    cursor.set_key("k");
    cursor.set_value("v1");
    cursor.insert().unwrap();

    cursor.set_key("k");
    assert!(matches!(cursor.search(), Err(StoreError::NotFound)));
    assert_eq!(conn.len(TABLE).unwrap(), 0);

    assert_eq!(conn.publish_pending(), 1);
    cursor.set_key("k");
    cursor.search().unwrap();
    assert_eq!(cursor.get_value().unwrap(), "v1");
}

#[test]
fn test_deferred_update_keeps_old_value_visible() {
    let conn = conn_with_table();
    let session = conn.open_session(None).unwrap();
    let mut cursor = session.open_cursor(TABLE, None).unwrap();
    cursor.set_key("k");
    cursor.set_value("old");
    cursor.insert().unwrap();

    conn.set_visibility(Visibility::Deferred);
    cursor.set_value("new");
    cursor.update().unwrap();

    cursor.search().unwrap();
    assert_eq!(cursor.get_value().unwrap(), "old");

    conn.set_visibility(Visibility::Immediate);
    conn.publish_pending();
    cursor.search().unwrap();
    assert_eq!(cursor.get_value().unwrap(), "new");
}

#[test]
fn test_overwrite_false_sees_pending_writes() {
    let conn = conn_with_table();
    conn.set_visibility(Visibility::Deferred);
    let session = conn.open_session(None).unwrap();
    let mut cursor = session.open_cursor(TABLE, Some("overwrite=false")).unwrap();
    cursor.set_key("k");
    cursor.set_value("v");
    cursor.insert().unwrap();
    assert!(matches!(cursor.insert(), Err(StoreError::DuplicateKey)));
}

#[test]
fn test_clones_share_tables() {
    let conn = conn_with_table();
    let other = conn.clone();
    let mut cursor = other.open_session(None).unwrap().open_cursor(TABLE, None).unwrap();
    cursor.set_key("k");
    cursor.set_value("v");
    cursor.insert().unwrap();
    assert_eq!(conn.len(TABLE).unwrap(), 1);
    assert!(!conn.is_empty(TABLE).unwrap());
}
