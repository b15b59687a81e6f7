use kvharness::open_connection;
use kvharness::workload::run_benchmark;
use kvharness::Backend;
use kvharness::Connection;
use kvharness::HarnessConfig;
use kvharness::MemoryConnection;
use kvharness::SledConnection;
use tempfile::tempdir;

use crate::commons::small_config;

fn run_end_to_end<C: Connection>(config: &HarnessConfig) {
    let conn: C = open_connection(&config.store.home, &config.store.connection_options).unwrap();
    let (populated, report) = run_benchmark(&conn, config).unwrap();

    assert_eq!(populated.inserted, 1000);
    assert_eq!(report.workers.len(), 4);
    assert_eq!(report.total_reads() + report.total_writes(), 40_000);
    assert!(report.total_reads() > 0);
    assert!(report.total_writes() > 0);
    assert!(report.overall.read >= 0.0);
    assert!(report.overall.write >= 0.0);
    assert!(report.overall.total() > 0.0);
    conn.close().unwrap();
}

#[test]
fn benchmark_end_to_end_on_memory() {
    let dir = tempdir().unwrap();
    let config = small_config(Backend::Memory, dir.path());
    run_end_to_end::<MemoryConnection>(&config);
}

#[test]
fn benchmark_end_to_end_on_sled() {
    let dir = tempdir().unwrap();
    let config = small_config(Backend::Sled, dir.path());
    run_end_to_end::<SledConnection>(&config);
}

#[test]
fn rerun_starts_from_a_fresh_table() {
    let dir = tempdir().unwrap();
    let mut config = small_config(Backend::Sled, dir.path());
    config.workload.op_count = 100;
    run_end_to_end_twice(&config);
}

fn run_end_to_end_twice(config: &HarnessConfig) {
    let conn: SledConnection = open_connection(&config.store.home, &config.store.connection_options).unwrap();
    // a second bulk load only works if the table was dropped in between
    run_benchmark(&conn, config).unwrap();
    let (populated, _) = run_benchmark(&conn, config).unwrap();
    assert_eq!(populated.inserted, 1000);
}
