//! Read/write consistency stress test.
//!
//! The process keeps its own copy of every value it wrote (the mirror). One
//! writer thread rewrites random keys in both the mirror and the store; one
//! reader thread re-reads random keys from the store and compares them with
//! the mirror. Both hold the key's slot lock for the whole pair of steps, so
//! for any key the reader always sees the mirror and the store after the same
//! write. A difference means the store lost or reordered a write.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;

use crate::keyspace::fill_random_value;
use crate::keyspace::worker_seed;
use crate::keyspace::KeyEncoding;
use crate::populate::first_error;
use crate::storage::open_worker_cursor;
use crate::Connection;
use crate::Cursor;
use crate::Error;
use crate::HarnessConfig;
use crate::OpKind;
use crate::Result;
use crate::Session;
use crate::WorkerRole;

/// Expected value of every key, each behind its own lock.
pub struct MirrorTable {
    slots: Box<[Mutex<String>]>,
}

impl MirrorTable {
    pub fn new(entry_count: u64) -> Self {
        let slots = (0..entry_count).map(|_| Mutex::new(String::new())).collect();
        Self { slots }
    }

    pub fn len(&self) -> u64 {
        self.slots.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Locks the slot of `key`. Other keys stay available.
    pub fn lock(
        &self,
        key: u64,
    ) -> MutexGuard<'_, String> {
        self.slots[key as usize].lock()
    }
}

#[derive(Debug, Clone)]
pub struct StressPlan {
    pub entry_count: u64,
    pub value_size: usize,
    pub table: String,
    pub session_options: String,
    pub seed_base: u64,
    /// Cycles per thread; `None` runs until the process is killed
    pub iterations: Option<u64>,
}

impl StressPlan {
    /// Plain decimal keys; population is therefore not a bulk load.
    pub const ENCODING: KeyEncoding = KeyEncoding::Plain;

    pub fn from_config(
        config: &HarnessConfig,
        iterations: Option<u64>,
    ) -> Self {
        Self {
            entry_count: config.workload.entry_count,
            value_size: config.workload.value_size,
            table: config.store.table.clone(),
            session_options: config.store.session_options.clone(),
            seed_base: config.workload.seed_base,
            iterations,
        }
    }
}

/// Writes every key once through `cursor`, recording each value in `mirror`.
#[instrument(skip_all, fields(entry_count = mirror.len()))]
pub fn populate_mirrored<C: Cursor>(
    cursor: &mut C,
    mirror: &MirrorTable,
    value_size: usize,
    seed_base: u64,
) -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(worker_seed(seed_base, 'm', 0));
    let mut key = String::new();
    for i in 0..mirror.len() {
        let mut slot = mirror.lock(i);
        fill_random_value(&mut slot, value_size, &mut rng);
        StressPlan::ENCODING.encode_into(i, &mut key);
        cursor.set_key(&key);
        cursor.set_value(&slot);
        cursor
            .insert()
            .map_err(|e| Error::op(WorkerRole::Init, 0, OpKind::Insert, e))?;
    }
    info!("finished populating database");
    Ok(())
}

/// One writer step: new value into the mirror, then into the store, under the slot lock.
pub fn write_cycle<C: Cursor, R: Rng + ?Sized>(
    cursor: &mut C,
    mirror: &MirrorTable,
    key: u64,
    value_size: usize,
    rng: &mut R,
    key_buf: &mut String,
) -> Result<()> {
    let mut slot = mirror.lock(key);
    StressPlan::ENCODING.encode_into(key, key_buf);
    fill_random_value(&mut slot, value_size, rng);
    cursor.set_key(key_buf);
    cursor.set_value(&slot);
    cursor
        .update()
        .map_err(|e| Error::op(WorkerRole::Writer, 0, OpKind::Update, e))
}

/// One reader step: read the store and compare with the mirror, under the slot lock.
pub fn check_cycle<C: Cursor>(
    cursor: &mut C,
    mirror: &MirrorTable,
    key: u64,
    key_buf: &mut String,
) -> Result<()> {
    let slot = mirror.lock(key);
    StressPlan::ENCODING.encode_into(key, key_buf);
    cursor.set_key(key_buf);
    cursor
        .search()
        .map_err(|e| Error::op(WorkerRole::Reader, 0, OpKind::Search, e))?;
    let actual = cursor
        .get_value()
        .map_err(|e| Error::op(WorkerRole::Reader, 0, OpKind::GetValue, e))?;
    if actual != *slot {
        return Err(Error::Inconsistent {
            key: key_buf.clone(),
            expected: slot.clone(),
            actual,
        });
    }
    Ok(())
}

/// Loops `cycle` over random keys until done, aborted, or it fails.
fn drive<R, F>(
    role: WorkerRole,
    rng: &mut R,
    entry_count: u64,
    iterations: Option<u64>,
    abort: &AtomicBool,
    mut cycle: F,
) -> Result<u64>
where
    R: Rng,
    F: FnMut(&mut R, u64) -> Result<()>,
{
    let mut done = 0u64;
    while iterations.map_or(true, |n| done < n) {
        if abort.load(Ordering::Relaxed) {
            return Err(Error::Aborted { role, worker: 0 });
        }
        let key = rng.gen_range(0..entry_count);
        cycle(&mut *rng, key)?;
        done += 1;
    }
    Ok(done)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressReport {
    pub reads: u64,
    pub writes: u64,
}

/// Populates store and mirror, then runs one reader and one writer.
///
/// With `iterations: None` this only returns on failure.
#[instrument(skip_all, fields(entry_count = plan.entry_count))]
pub fn run_stress<C: Connection>(
    conn: &C,
    plan: &StressPlan,
) -> Result<StressReport> {
    let mirror = MirrorTable::new(plan.entry_count);
    {
        let (session, mut cursor) = open_worker_cursor(conn, None, &plan.table, None)?;
        populate_mirrored(&mut cursor, &mirror, plan.value_size, plan.seed_base)?;
        drop(cursor);
        if let Err(e) = session.close() {
            debug!("populate session close: {e}");
        }
    }
    run_reader_writer(conn, plan, &mirror)
}

/// Runs the reader and writer threads against a store already matching `mirror`.
pub fn run_reader_writer<C: Connection>(
    conn: &C,
    plan: &StressPlan,
    mirror: &MirrorTable,
) -> Result<StressReport> {
    let abort = AtomicBool::new(false);

    let (reads, writes) = std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let result = open_worker_cursor(conn, Some(&plan.session_options), &plan.table, None)
                .and_then(|(_session, mut cursor)| {
                    let mut rng = SmallRng::seed_from_u64(worker_seed(plan.seed_base, 'r', 0));
                    let mut key_buf = String::new();
                    drive(
                        WorkerRole::Reader,
                        &mut rng,
                        plan.entry_count,
                        plan.iterations,
                        &abort,
                        |_, key| check_cycle(&mut cursor, mirror, key, &mut key_buf),
                    )
                });
            stop_on_error(WorkerRole::Reader, &result, &abort);
            result
        });

        let writer = s.spawn(|| {
            let result = open_worker_cursor(conn, Some(&plan.session_options), &plan.table, None)
                .and_then(|(_session, mut cursor)| {
                    let mut rng = SmallRng::seed_from_u64(worker_seed(plan.seed_base, 'w', 0));
                    let mut key_buf = String::new();
                    drive(
                        WorkerRole::Writer,
                        &mut rng,
                        plan.entry_count,
                        plan.iterations,
                        &abort,
                        |rng, key| write_cycle(&mut cursor, mirror, key, plan.value_size, rng, &mut key_buf),
                    )
                });
            stop_on_error(WorkerRole::Writer, &result, &abort);
            result
        });

        let reads = reader.join().unwrap_or_else(|_| {
            Err(Error::WorkerPanicked {
                role: WorkerRole::Reader,
                worker: 0,
            })
        });
        let writes = writer.join().unwrap_or_else(|_| {
            Err(Error::WorkerPanicked {
                role: WorkerRole::Writer,
                worker: 0,
            })
        });
        (reads, writes)
    });

    let counts = first_error(vec![reads, writes])?;
    Ok(StressReport {
        reads: counts[0],
        writes: counts[1],
    })
}

fn stop_on_error<T>(
    role: WorkerRole,
    result: &Result<T>,
    abort: &AtomicBool,
) {
    if let Err(e) = result {
        if !e.is_secondary() {
            error!("{role} thread: {e}");
        }
        abort.store(true, Ordering::Relaxed);
    }
}
