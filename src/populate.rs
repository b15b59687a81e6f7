//! Parallel bulk population.
//!
//! The keyspace is split into one contiguous range per loader thread. Each
//! loader walks its range in increasing key order through a bulk cursor, so
//! the store only ever sees appends within a range.

use std::ops::Range;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;

use crate::keyspace::fill_random_value;
use crate::keyspace::partition;
use crate::keyspace::worker_seed;
use crate::keyspace::KeyEncoding;
use crate::monitor::rate;
use crate::monitor::sample_every;
use crate::monitor::FinishGuard;
use crate::storage::open_worker_cursor;
use crate::Connection;
use crate::Cursor;
use crate::Error;
use crate::HarnessConfig;
use crate::OpKind;
use crate::Result;
use crate::Session;
use crate::WorkerRole;

/// Everything a population run needs.
#[derive(Debug, Clone)]
pub struct PopulatePlan {
    pub entry_count: u64,
    pub value_size: usize,
    pub threads: usize,
    pub encoding: KeyEncoding,
    pub table: String,
    pub cursor_options: String,
    pub seed_base: u64,
    pub report_interval: Duration,
}

impl PopulatePlan {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            entry_count: config.workload.entry_count,
            value_size: config.workload.value_size,
            threads: config.workload.populate_threads,
            encoding: KeyEncoding::Padded {
                width: config.workload.key_width,
            },
            table: config.store.table.clone(),
            cursor_options: config.store.bulk_cursor_options.clone(),
            seed_base: config.workload.seed_base,
            report_interval: config.monitor.interval(),
        }
    }
}

/// One loader's slice of the keyspace and its progress.
///
/// `current` is the next key to insert; the reporter reads it without
/// coordinating with the loader.
#[derive(Debug)]
pub struct InitWorker {
    pub index: usize,
    pub range: Range<u64>,
    current: AtomicU64,
    finished: AtomicBool,
}

impl InitWorker {
    pub fn new(
        index: usize,
        range: Range<u64>,
    ) -> Self {
        Self {
            index,
            current: AtomicU64::new(range.start),
            range,
            finished: AtomicBool::new(false),
        }
    }

    /// Keys inserted so far.
    pub fn inserted(&self) -> u64 {
        self.current.load(Ordering::Relaxed) - self.range.start
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Inserts every key of the range, in order, through `cursor`.
    pub fn load<C: Cursor>(
        &self,
        cursor: &mut C,
        plan: &PopulatePlan,
        abort: &AtomicBool,
    ) -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(worker_seed(plan.seed_base, 'i', self.index));
        let mut key = String::new();
        let mut value = String::with_capacity(plan.value_size);

        for i in self.range.clone() {
            if abort.load(Ordering::Relaxed) {
                return Err(Error::Aborted {
                    role: WorkerRole::Init,
                    worker: self.index,
                });
            }
            plan.encoding.encode_into(i, &mut key);
            fill_random_value(&mut value, plan.value_size, &mut rng);
            cursor.set_key(&key);
            cursor.set_value(&value);
            cursor
                .insert()
                .map_err(|e| Error::op(WorkerRole::Init, self.index, OpKind::Insert, e))?;
            self.current.store(i + 1, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PopulateReport {
    pub inserted: u64,
    pub elapsed: Duration,
}

/// Loads `[0, entry_count)` into `plan.table` with `plan.threads` loaders.
///
/// The first loader error stops every other loader and is returned.
#[instrument(skip_all, fields(entry_count = plan.entry_count, threads = plan.threads))]
pub fn populate<C: Connection>(
    conn: &C,
    plan: &PopulatePlan,
) -> Result<PopulateReport> {
    let workers: Vec<InitWorker> = partition(plan.entry_count, plan.threads)
        .into_iter()
        .enumerate()
        .map(|(i, r)| InitWorker::new(i, r))
        .collect();
    let abort = AtomicBool::new(false);
    let started = Instant::now();

    let results: Vec<Result<()>> = std::thread::scope(|s| {
        let handles: Vec<_> = workers
            .iter()
            .map(|w| {
                let abort = &abort;
                s.spawn(move || {
                    let _finished = FinishGuard::new(&w.finished);
                    let result = open_worker_cursor(
                        conn,
                        None,
                        &plan.table,
                        Some(&plan.cursor_options),
                    )
                    .and_then(|(session, mut cursor)| {
                        w.load(&mut cursor, plan, abort)?;
                        drop(cursor);
                        if let Err(e) = session.close() {
                            debug!("init thread {} session close: {e}", w.index);
                        }
                        Ok(())
                    });
                    if let Err(e) = &result {
                        if !e.is_secondary() {
                            error!("init thread {}: {e}", w.index);
                        }
                        abort.store(true, Ordering::Relaxed);
                    }
                    result
                })
            })
            .collect();

        report_progress(&workers, plan.entry_count, plan.report_interval);

        handles
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                h.join().unwrap_or_else(|_| {
                    Err(Error::WorkerPanicked {
                        role: WorkerRole::Init,
                        worker: i,
                    })
                })
            })
            .collect()
    });

    first_error(results)?;

    let inserted = workers.iter().map(InitWorker::inserted).sum();
    info!("database populated");
    Ok(PopulateReport {
        inserted,
        elapsed: started.elapsed(),
    })
}

/// Logs progress and insert throughput once per interval until every loader is done.
fn report_progress(
    workers: &[InitWorker],
    entry_count: u64,
    interval: Duration,
) {
    sample_every(
        interval,
        || {
            let mut all_finished = true;
            let mut inserted = 0;
            for w in workers {
                all_finished &= w.is_finished();
                inserted += w.inserted();
            }
            (inserted, all_finished)
        },
        |prev, cur, elapsed| {
            let progress = cur as f64 / entry_count as f64 * 100.0;
            info!(
                inserted = cur,
                "populating progress: {:.1}%, insert throughput: {:.2} ops/sec",
                progress,
                rate(cur.saturating_sub(prev), elapsed)
            );
        },
    );
}

/// Picks the root-cause error, skipping workers that only stopped because of it.
pub(crate) fn first_error<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut oks = Vec::with_capacity(results.len());
    let mut secondary = None;
    for r in results {
        match r {
            Ok(v) => oks.push(v),
            Err(e) if e.is_secondary() => {
                secondary.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    match secondary {
        Some(e) => Err(e),
        None => Ok(oks),
    }
}
