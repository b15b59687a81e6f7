use std::sync::atomic::AtomicBool;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing_test::traced_test;

use crate::keyspace::KeyEncoding;
use crate::monitor::WorkerCounters;
use crate::populate::populate;
use crate::populate::PopulatePlan;
use crate::storage::recreate_table;
use crate::storage::MockCursor;
use crate::workload::*;
use crate::Error;
use crate::MemoryConnection;
use crate::OpKind;
use crate::StoreError;
use crate::WorkerRole;

const TABLE: &str = "lsm:workload";
const TABLE_OPTIONS: &str = "key_format=S,value_format=S";

fn plan(
    read_ratio: f64,
    op_count: u64,
    threads: usize,
) -> WorkloadPlan {
    WorkloadPlan {
        entry_count: 1000,
        value_size: 16,
        read_ratio,
        op_count,
        threads,
        encoding: KeyEncoding::Padded { width: 16 },
        table: TABLE.to_string(),
        session_options: "isolation=read-uncommitted".to_string(),
        seed_base: 0,
        report_interval: Duration::from_millis(10),
    }
}

fn populated(entry_count: u64) -> MemoryConnection {
    let conn = MemoryConnection::new();
    recreate_table(&conn, TABLE, TABLE_OPTIONS).unwrap();
    populate(
        &conn,
        &PopulatePlan {
            entry_count,
            value_size: 16,
            threads: 2,
            encoding: KeyEncoding::Padded { width: 16 },
            table: TABLE.to_string(),
            cursor_options: "bulk".to_string(),
            seed_base: 0,
            report_interval: Duration::from_millis(10),
        },
    )
    .unwrap();
    conn
}

#[test]
fn op_mix_extremes_are_exclusive() {
    let mut rng = SmallRng::seed_from_u64(7);
    let all_reads = OpMix::new(1.0);
    let all_writes = OpMix::new(0.0);
    for _ in 0..10_000 {
        assert_eq!(all_reads.choose(&mut rng), Op::Read);
        assert_eq!(all_writes.choose(&mut rng), Op::Write);
    }
}

#[test]
fn op_mix_clamps_out_of_range_ratios() {
    assert_eq!(OpMix::new(1.5), OpMix::new(1.0));
    assert_eq!(OpMix::new(-0.2), OpMix::new(0.0));
}

#[test]
fn op_mix_converges_to_ratio() {
    let mut rng = SmallRng::seed_from_u64(42);
    for ratio in [0.1, 0.5, 0.9] {
        let mix = OpMix::new(ratio);
        let n = 200_000;
        let reads = (0..n).filter(|_| mix.choose(&mut rng) == Op::Read).count();
        let observed = reads as f64 / n as f64;
        assert!((observed - ratio).abs() < 0.01, "ratio {ratio}, observed {observed}");
    }
}

#[test]
fn worker_counts_every_operation() {
    let conn = populated(1000);
    let plan = plan(0.5, 5000, 1);
    let counters = WorkerCounters::default();
    let (_session, mut cursor) = crate::storage::open_worker_cursor(&conn, None, TABLE, None).unwrap();

    let report = WorkloadWorker::new(0, &plan, &counters)
        .run(&mut cursor, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(report.counts.total(), 5000);
    assert!(report.counts.reads > 0);
    assert!(report.counts.writes > 0);
    assert_eq!(counters.snapshot(), report.counts);
}

#[test]
fn writes_keep_the_keyspace_closed() {
    let conn = populated(1000);
    let plan = plan(0.0, 3000, 1);
    let counters = WorkerCounters::default();
    let (_session, mut cursor) = crate::storage::open_worker_cursor(&conn, None, TABLE, None).unwrap();

    WorkloadWorker::new(0, &plan, &counters)
        .run(&mut cursor, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(counters.snapshot().writes, 3000);
    assert_eq!(conn.len(TABLE).unwrap(), 1000);
}

#[test]
fn failed_search_is_fatal() {
    let plan = plan(1.0, 10, 1);
    let counters = WorkerCounters::default();
    let mut cursor = MockCursor::new();
    cursor.expect_set_key().return_const(());
    cursor.expect_search().times(1).returning(|| Err(StoreError::NotFound));

    let err = WorkloadWorker::new(3, &plan, &counters)
        .run(&mut cursor, &AtomicBool::new(false))
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Operation {
            role: WorkerRole::Workload,
            worker: 3,
            op: OpKind::Search,
            source: StoreError::NotFound,
        }
    ));
    assert_eq!(counters.snapshot().total(), 0);
}

#[test]
fn failed_update_is_fatal() {
    let plan = plan(0.0, 10, 1);
    let counters = WorkerCounters::default();
    let mut cursor = MockCursor::new();
    cursor.expect_set_key().return_const(());
    cursor.expect_set_value().return_const(());
    cursor.expect_update().times(2).returning({
        let mut calls = 0;
        move || {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(StoreError::Unsupported("update"))
            }
        }
    });

    let err = WorkloadWorker::new(0, &plan, &counters)
        .run(&mut cursor, &AtomicBool::new(false))
        .unwrap_err();

    assert!(matches!(err, Error::Operation { op: OpKind::Update, .. }));
    assert_eq!(counters.snapshot().writes, 1);
}

#[test]
fn abort_flag_stops_worker() {
    let plan = plan(0.5, 10, 1);
    let counters = WorkerCounters::default();
    let mut cursor = MockCursor::new();

    let err = WorkloadWorker::new(1, &plan, &counters)
        .run(&mut cursor, &AtomicBool::new(true))
        .unwrap_err();

    assert!(err.is_secondary());
}

#[test]
#[traced_test]
fn run_workload_aggregates_all_workers() {
    let conn = populated(1000);
    let plan = plan(0.5, 10_000, 4);

    let report = run_workload(&conn, &plan).unwrap();

    assert_eq!(report.workers.len(), 4);
    assert_eq!(report.total_reads() + report.total_writes(), 40_000);
    for w in &report.workers {
        assert_eq!(w.counts.total(), 10_000);
    }
    assert!(report.overall.read >= 0.0);
    assert!(report.overall.write >= 0.0);
    assert!(logs_contain("Overall Total Throughput"));
}

#[test]
fn run_workload_on_missing_table_fails_setup() {
    let conn = MemoryConnection::new();
    let err = run_workload(&conn, &plan(0.5, 10, 2)).unwrap_err();
    assert!(matches!(
        err,
        Error::Setup {
            source: StoreError::NoSuchTable(_),
            ..
        }
    ));
}

#[test]
fn run_workload_surfaces_missing_keys() {
    // reads of an empty table fail on the first search
    let conn = MemoryConnection::new();
    recreate_table(&conn, TABLE, TABLE_OPTIONS).unwrap();

    let err = run_workload(&conn, &plan(1.0, 100, 3)).unwrap_err();
    assert!(matches!(
        err,
        Error::Operation {
            op: OpKind::Search,
            ..
        }
    ));
}
