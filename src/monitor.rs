//! Live throughput sampling and the final per-worker aggregation.
//!
//! Workers bump their own counters with `Relaxed` atomics and the monitor reads
//! them once per interval without any further synchronization. A snapshot may
//! lag the true counts a little; counters only grow, so the next sample picks
//! up whatever was missed.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::info;

/// Counters one workload worker publishes to the monitor.
#[derive(Debug, Default)]
pub struct WorkerCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    finished: AtomicBool,
}

impl WorkerCounters {
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Marks the worker finished when dropped, panics included.
    pub(crate) fn finish_guard(&self) -> FinishGuard<'_> {
        FinishGuard(&self.finished)
    }

    pub fn snapshot(&self) -> OpCounts {
        OpCounts {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

pub(crate) struct FinishGuard<'a>(&'a AtomicBool);

impl<'a> FinishGuard<'a> {
    pub(crate) fn new(flag: &'a AtomicBool) -> Self {
        Self(flag)
    }
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub reads: u64,
    pub writes: u64,
}

impl OpCounts {
    pub fn total(&self) -> u64 {
        self.reads + self.writes
    }

    pub fn saturating_sub(
        self,
        earlier: OpCounts,
    ) -> OpCounts {
        OpCounts {
            reads: self.reads.saturating_sub(earlier.reads),
            writes: self.writes.saturating_sub(earlier.writes),
        }
    }
}

impl std::ops::Add for OpCounts {
    type Output = Self;

    fn add(
        self,
        other: Self,
    ) -> Self {
        Self {
            reads: self.reads + other.reads,
            writes: self.writes + other.writes,
        }
    }
}

impl std::iter::Sum for OpCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(OpCounts::default(), |acc, c| acc + c)
    }
}

/// Operations per second as `1000 * ops / elapsed_ms`; zero for an empty interval.
pub fn rate(
    ops: u64,
    elapsed: Duration,
) -> f64 {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    if elapsed_ms <= 0.0 {
        return 0.0;
    }
    1000.0 * ops as f64 / elapsed_ms
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub read: f64,
    pub write: f64,
}

impl Throughput {
    pub fn from_counts(
        counts: OpCounts,
        elapsed: Duration,
    ) -> Self {
        Self {
            read: rate(counts.reads, elapsed),
            write: rate(counts.writes, elapsed),
        }
    }

    pub fn total(&self) -> f64 {
        self.read + self.write
    }
}

impl std::ops::Add for Throughput {
    type Output = Self;

    fn add(
        self,
        other: Self,
    ) -> Self {
        Self {
            read: self.read + other.read,
            write: self.write + other.write,
        }
    }
}

impl std::fmt::Display for Throughput {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "Read Throughput: {:.2} ops/sec, Write Throughput: {:.2} ops/sec, Total Throughput: {:.2} ops/sec",
            self.read,
            self.write,
            self.total()
        )
    }
}

/// What one workload worker did, measured around its own op loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerReport {
    pub index: usize,
    pub counts: OpCounts,
    pub elapsed: Duration,
}

impl WorkerReport {
    pub fn throughput(&self) -> Throughput {
        Throughput::from_counts(self.counts, self.elapsed)
    }
}

/// Overall figure: each worker's rate over its own duration, summed.
///
/// This is not operations divided by the wall-clock span of the whole run.
pub fn aggregate(reports: &[WorkerReport]) -> Throughput {
    reports
        .iter()
        .map(WorkerReport::throughput)
        .fold(Throughput::default(), |acc, t| acc + t)
}

/// Calls `snapshot` every `interval` and hands consecutive samples to
/// `on_sample` with the time elapsed between them. Stops after the first
/// sample whose `done` flag is set.
pub fn sample_every<T, S, F>(
    interval: Duration,
    mut snapshot: S,
    mut on_sample: F,
) -> usize
where
    T: Copy,
    S: FnMut() -> (T, bool),
    F: FnMut(T, T, Duration),
{
    let (mut prev, _) = snapshot();
    let mut prev_at = Instant::now();
    let mut samples = 0;
    loop {
        thread::sleep(interval);
        let (cur, done) = snapshot();
        let now = Instant::now();
        on_sample(prev, cur, now.duration_since(prev_at));
        samples += 1;
        prev = cur;
        prev_at = now;
        if done {
            return samples;
        }
    }
}

/// Reports live throughput of a set of workload workers.
pub struct ThroughputMonitor<'a> {
    workers: &'a [WorkerCounters],
    interval: Duration,
}

impl<'a> ThroughputMonitor<'a> {
    pub fn new(
        workers: &'a [WorkerCounters],
        interval: Duration,
    ) -> Self {
        Self { workers, interval }
    }

    /// Sum of every worker's counters and whether all of them have finished.
    pub fn snapshot(&self) -> (OpCounts, bool) {
        let mut all_finished = true;
        let mut counts = OpCounts::default();
        for w in self.workers {
            // read the flag first so a finished worker's counts are final
            all_finished &= w.is_finished();
            counts = counts + w.snapshot();
        }
        (counts, all_finished)
    }

    /// Blocks until every worker has finished; returns the number of samples taken.
    pub fn run(&self) -> usize {
        sample_every(
            self.interval,
            || self.snapshot(),
            |prev, cur, elapsed| {
                let live = Throughput::from_counts(cur.saturating_sub(prev), elapsed);
                info!(
                    read_ops = cur.reads,
                    write_ops = cur.writes,
                    "{live}"
                );
            },
        )
    }
}
