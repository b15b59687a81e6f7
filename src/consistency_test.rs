use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing_test::traced_test;

use crate::consistency::*;
use crate::storage::create_table;
use crate::storage::open_worker_cursor;
use crate::storage::MockCursor;
use crate::Cursor;
use crate::Error;
use crate::MemoryConnection;
use crate::OpKind;
use crate::StoreError;
use crate::Visibility;
use crate::WorkerRole;

const TABLE: &str = "lsm:mirror";

fn plan(
    entry_count: u64,
    iterations: u64,
) -> StressPlan {
    StressPlan {
        entry_count,
        value_size: 8,
        table: TABLE.to_string(),
        session_options: "isolation=read-uncommitted".to_string(),
        seed_base: 0,
        iterations: Some(iterations),
    }
}

fn conn() -> MemoryConnection {
    let conn = MemoryConnection::new();
    create_table(&conn, TABLE, "key_format=S,value_format=S").unwrap();
    conn
}

#[test]
fn mirror_slots_are_independent() {
    let mirror = MirrorTable::new(4);
    assert_eq!(mirror.len(), 4);
    let mut a = mirror.lock(0);
    a.push_str("x");
    // another slot can be locked while slot 0 is held
    assert!(mirror.lock(1).is_empty());
    drop(a);
    assert_eq!(*mirror.lock(0), "x");
}

#[test]
fn mirrored_populate_matches_store() {
    let conn = conn();
    let mirror = MirrorTable::new(50);
    let (_session, mut cursor) = open_worker_cursor(&conn, None, TABLE, None).unwrap();

    populate_mirrored(&mut cursor, &mirror, 8, 0).unwrap();

    let mut key = String::new();
    for i in 0..50 {
        assert_eq!(mirror.lock(i).len(), 7);
        check_cycle(&mut cursor, &mirror, i, &mut key).unwrap();
    }
    assert_eq!(conn.len(TABLE).unwrap(), 50);
}

#[test]
fn write_then_check_agrees() {
    let conn = conn();
    let mirror = MirrorTable::new(10);
    let (_session, mut cursor) = open_worker_cursor(&conn, None, TABLE, None).unwrap();
    populate_mirrored(&mut cursor, &mirror, 8, 0).unwrap();

    let mut rng = SmallRng::seed_from_u64(1);
    let mut key = String::new();
    let before = mirror.lock(3).clone();
    write_cycle(&mut cursor, &mirror, 3, 8, &mut rng, &mut key).unwrap();
    assert_eq!(key, "3");
    assert_ne!(*mirror.lock(3), before);
    check_cycle(&mut cursor, &mirror, 3, &mut key).unwrap();
}

#[test]
fn lost_write_is_reported() {
    let conn = conn();
    let mirror = MirrorTable::new(10);
    let (_session, mut cursor) = open_worker_cursor(&conn, None, TABLE, None).unwrap();
    populate_mirrored(&mut cursor, &mirror, 8, 0).unwrap();

    // the store accepts the write but readers keep seeing the old value
    conn.set_visibility(Visibility::Deferred);
    let stale = mirror.lock(7).clone();
    let mut rng = SmallRng::seed_from_u64(9);
    let mut key = String::new();
    write_cycle(&mut cursor, &mirror, 7, 8, &mut rng, &mut key).unwrap();

    let err = check_cycle(&mut cursor, &mirror, 7, &mut key).unwrap_err();
    match err {
        Error::Inconsistent {
            key,
            expected,
            actual,
        } => {
            assert_eq!(key, "7");
            assert_eq!(actual, stale);
            assert_eq!(expected, *mirror.lock(7));
        }
        other => panic!("unexpected error: {other}"),
    }

    conn.publish_pending();
    check_cycle(&mut cursor, &mirror, 7, &mut key).unwrap();
}

#[test]
fn missing_key_is_a_read_failure() {
    let mirror = MirrorTable::new(2);
    let mut cursor = MockCursor::new();
    cursor.expect_set_key().return_const(());
    cursor.expect_search().returning(|| Err(StoreError::NotFound));

    let err = check_cycle(&mut cursor, &mirror, 1, &mut String::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Operation {
            role: WorkerRole::Reader,
            op: OpKind::Search,
            ..
        }
    ));
}

#[test]
fn failed_update_is_a_write_failure() {
    let mirror = MirrorTable::new(2);
    let mut cursor = MockCursor::new();
    cursor.expect_set_key().return_const(());
    cursor.expect_set_value().return_const(());
    cursor.expect_update().returning(|| Err(StoreError::NotFound));

    let mut rng = SmallRng::seed_from_u64(0);
    let err = write_cycle(&mut cursor, &mirror, 0, 8, &mut rng, &mut String::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Operation {
            role: WorkerRole::Writer,
            op: OpKind::Update,
            ..
        }
    ));
}

#[test]
#[traced_test]
fn stress_on_consistent_store_passes() {
    let conn = conn();
    let report = run_stress(&conn, &plan(64, 5_000)).unwrap();
    assert_eq!(report, StressReport { reads: 5_000, writes: 5_000 });
    assert!(logs_contain("finished populating database"));
}

#[test]
fn stress_stops_both_threads_on_failure() {
    let conn = conn();
    let plan = plan(100_000, 1_000);
    // nothing populated: the reader fails on the first key the writer has not touched
    let mirror = MirrorTable::new(plan.entry_count);

    let err = run_reader_writer(&conn, &plan, &mirror).unwrap_err();
    assert!(matches!(
        err,
        Error::Operation {
            role: WorkerRole::Reader,
            ..
        }
    ));
}
