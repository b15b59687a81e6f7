//! Randomized point read / point update workload.
//!
//! Each worker owns its session, cursor, generator and counters. Workers share
//! nothing but the store, which does its own concurrency control, so no lock
//! is taken here.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

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
use crate::monitor::aggregate;
use crate::monitor::Throughput;
use crate::monitor::ThroughputMonitor;
use crate::monitor::WorkerCounters;
use crate::monitor::WorkerReport;
use crate::populate::first_error;
use crate::populate::populate;
use crate::populate::PopulatePlan;
use crate::populate::PopulateReport;
use crate::storage::open_worker_cursor;
use crate::storage::recreate_table;
use crate::Connection;
use crate::Cursor;
use crate::Error;
use crate::HarnessConfig;
use crate::OpKind;
use crate::Result;
use crate::Session;
use crate::WorkerRole;

/// Range of the bounded draw compared against the read ratio.
const DRAW_RANGE: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

/// Chooses reads with probability `read_ratio`.
///
/// A draw in `[0, DRAW_RANGE)` is a read when strictly below
/// `read_ratio * DRAW_RANGE`; ties go to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpMix {
    threshold: u32,
}

impl OpMix {
    pub fn new(read_ratio: f64) -> Self {
        let ratio = read_ratio.clamp(0.0, 1.0);
        Self {
            threshold: (DRAW_RANGE as f64 * ratio) as u32,
        }
    }

    pub fn choose<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Op {
        if rng.gen_range(0..DRAW_RANGE) < self.threshold {
            Op::Read
        } else {
            Op::Write
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadPlan {
    pub entry_count: u64,
    pub value_size: usize,
    pub read_ratio: f64,
    pub op_count: u64,
    pub threads: usize,
    pub encoding: KeyEncoding,
    pub table: String,
    pub session_options: String,
    pub seed_base: u64,
    pub report_interval: Duration,
}

impl WorkloadPlan {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            entry_count: config.workload.entry_count,
            value_size: config.workload.value_size,
            read_ratio: config.workload.read_ratio,
            op_count: config.workload.op_count,
            threads: config.workload.thread_count,
            encoding: KeyEncoding::Padded {
                width: config.workload.key_width,
            },
            table: config.store.table.clone(),
            session_options: config.store.session_options.clone(),
            seed_base: config.workload.seed_base,
            report_interval: config.monitor.interval(),
        }
    }
}

/// One workload thread.
pub struct WorkloadWorker<'a> {
    pub index: usize,
    plan: &'a WorkloadPlan,
    counters: &'a WorkerCounters,
}

impl<'a> WorkloadWorker<'a> {
    pub fn new(
        index: usize,
        plan: &'a WorkloadPlan,
        counters: &'a WorkerCounters,
    ) -> Self {
        Self {
            index,
            plan,
            counters,
        }
    }

    /// Issues `op_count` operations against uniformly drawn keys.
    ///
    /// Lookups only need to succeed; the value read is discarded.
    pub fn run<C: Cursor>(
        &self,
        cursor: &mut C,
        abort: &AtomicBool,
    ) -> Result<WorkerReport> {
        let plan = self.plan;
        let mix = OpMix::new(plan.read_ratio);
        let mut rng = SmallRng::seed_from_u64(worker_seed(plan.seed_base, 'w', self.index));
        let mut key = String::new();
        let mut value = String::with_capacity(plan.value_size);

        let started = Instant::now();
        for _ in 0..plan.op_count {
            if abort.load(Ordering::Relaxed) {
                return Err(Error::Aborted {
                    role: WorkerRole::Workload,
                    worker: self.index,
                });
            }

            let op = mix.choose(&mut rng);
            plan.encoding.encode_into(rng.gen_range(0..plan.entry_count), &mut key);
            cursor.set_key(&key);
            match op {
                Op::Read => {
                    cursor
                        .search()
                        .map_err(|e| Error::op(WorkerRole::Workload, self.index, OpKind::Search, e))?;
                    self.counters.record_read();
                }
                Op::Write => {
                    fill_random_value(&mut value, plan.value_size, &mut rng);
                    cursor.set_value(&value);
                    cursor
                        .update()
                        .map_err(|e| Error::op(WorkerRole::Workload, self.index, OpKind::Update, e))?;
                    self.counters.record_write();
                }
            }
        }
        let elapsed = started.elapsed();

        Ok(WorkerReport {
            index: self.index,
            counts: self.counters.snapshot(),
            elapsed,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadReport {
    pub workers: Vec<WorkerReport>,
    pub overall: Throughput,
}

impl WorkloadReport {
    pub fn total_reads(&self) -> u64 {
        self.workers.iter().map(|w| w.counts.reads).sum()
    }

    pub fn total_writes(&self) -> u64 {
        self.workers.iter().map(|w| w.counts.writes).sum()
    }
}

/// Runs `plan.threads` workers against an already populated table while the
/// monitor reports live throughput, then aggregates per-worker results.
#[instrument(skip_all, fields(threads = plan.threads, op_count = plan.op_count))]
pub fn run_workload<C: Connection>(
    conn: &C,
    plan: &WorkloadPlan,
) -> Result<WorkloadReport> {
    let counters: Vec<WorkerCounters> = (0..plan.threads).map(|_| WorkerCounters::default()).collect();
    let abort = AtomicBool::new(false);

    let results: Vec<Result<WorkerReport>> = std::thread::scope(|s| {
        let handles: Vec<_> = counters
            .iter()
            .enumerate()
            .map(|(index, counters)| {
                let abort = &abort;
                s.spawn(move || {
                    let _finished = counters.finish_guard();
                    let worker = WorkloadWorker::new(index, plan, counters);
                    let result = open_worker_cursor(
                        conn,
                        Some(&plan.session_options),
                        &plan.table,
                        None,
                    )
                    .and_then(|(session, mut cursor)| {
                        let report = worker.run(&mut cursor, abort)?;
                        drop(cursor);
                        if let Err(e) = session.close() {
                            debug!("workload thread {index} session close: {e}");
                        }
                        Ok(report)
                    });
                    if let Err(e) = &result {
                        if !e.is_secondary() {
                            error!("workload thread {index}: {e}");
                        }
                        abort.store(true, Ordering::Relaxed);
                    }
                    result
                })
            })
            .collect();

        ThroughputMonitor::new(&counters, plan.report_interval).run();

        handles
            .into_iter()
            .enumerate()
            .map(|(worker, h)| {
                h.join().unwrap_or_else(|_| {
                    Err(Error::WorkerPanicked {
                        role: WorkerRole::Workload,
                        worker,
                    })
                })
            })
            .collect()
    });

    let workers = first_error(results)?;
    let overall = aggregate(&workers);
    info!(
        "Overall Read Throughput: {:.2} ops/sec, Overall Write Throughput: {:.2} ops/sec, Overall Total Throughput: {:.2} ops/sec",
        overall.read,
        overall.write,
        overall.total()
    );
    Ok(WorkloadReport { workers, overall })
}

/// Full benchmark: fresh table, parallel population, then the workload.
pub fn run_benchmark<C: Connection>(
    conn: &C,
    config: &HarnessConfig,
) -> Result<(PopulateReport, WorkloadReport)> {
    recreate_table(conn, &config.store.table, &config.store.table_options)?;
    let populated = populate(conn, &PopulatePlan::from_config(config))?;
    let report = run_workload(conn, &WorkloadPlan::from_config(config))?;
    Ok((populated, report))
}
