use kvharness::consistency::run_stress;
use kvharness::consistency::StressPlan;
use kvharness::open_connection;
use kvharness::recreate_table;
use kvharness::Backend;
use kvharness::MemoryConnection;
use kvharness::SledConnection;
use tempfile::tempdir;

use crate::commons::small_config;

#[test]
fn stress_passes_on_sled() {
    let dir = tempdir().unwrap();
    let config = small_config(Backend::Sled, dir.path());
    let conn: SledConnection = open_connection(&config.store.home, &config.store.connection_options).unwrap();
    recreate_table(&conn, &config.store.table, &config.store.table_options).unwrap();

    let report = run_stress(&conn, &StressPlan::from_config(&config, Some(2_000))).unwrap();
    assert_eq!(report.reads, 2_000);
    assert_eq!(report.writes, 2_000);
}

#[test]
fn stress_passes_on_memory() {
    let dir = tempdir().unwrap();
    let config = small_config(Backend::Memory, dir.path());
    let conn = MemoryConnection::new();
    recreate_table(&conn, &config.store.table, &config.store.table_options).unwrap();

    let report = run_stress(&conn, &StressPlan::from_config(&config, Some(2_000))).unwrap();
    assert_eq!(report.reads + report.writes, 4_000);
}
