use kvharness::check::run_check;
use kvharness::open_connection;
use kvharness::open_worker_cursor;
use kvharness::recreate_table;
use kvharness::Backend;
use kvharness::SledConnection;
use tempfile::tempdir;

use crate::commons::small_config;

#[test]
fn read_check_is_clean_on_sled() {
    let dir = tempdir().unwrap();
    let config = small_config(Backend::Sled, dir.path());
    let conn: SledConnection = open_connection(&config.store.home, &config.store.connection_options).unwrap();
    recreate_table(&conn, &config.store.table, &config.store.table_options).unwrap();

    let (_session, mut cursor) = open_worker_cursor(&conn, None, &config.store.table, None).unwrap();
    let report = run_check(&mut cursor, 2_000).unwrap();

    assert_eq!(report.checked, 2_000);
    assert!(report.is_clean());
}
