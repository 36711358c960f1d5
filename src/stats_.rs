use core::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Cumulative wait latency and completed acquisition counts, per role.
///
/// Workers update the accumulators concurrently with lock-free additions. A
/// `snapshot` is only meaningful once every worker has been joined.
#[derive(Debug, Default)]
pub struct WaitStatistics {
    read_wait_nanos_: AtomicU64,
    write_wait_nanos_: AtomicU64,
    reads_completed_: AtomicU64,
    writes_completed_: AtomicU64,
}

impl WaitStatistics {
    pub const fn new() -> Self {
        WaitStatistics {
            read_wait_nanos_: AtomicU64::new(0),
            write_wait_nanos_: AtomicU64::new(0),
            reads_completed_: AtomicU64::new(0),
            writes_completed_: AtomicU64::new(0),
        }
    }

    pub fn reset(&self) {
        self.read_wait_nanos_.store(0, Ordering::Relaxed);
        self.write_wait_nanos_.store(0, Ordering::Relaxed);
        self.reads_completed_.store(0, Ordering::Relaxed);
        self.writes_completed_.store(0, Ordering::Relaxed);
    }

    pub fn record_read(&self, wait: Duration) {
        let _ = self
            .read_wait_nanos_
            .fetch_add(duration_nanos_(wait), Ordering::Relaxed);
        let _ = self.reads_completed_.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, wait: Duration) {
        let _ = self
            .write_wait_nanos_
            .fetch_add(duration_nanos_(wait), Ordering::Relaxed);
        let _ = self.writes_completed_.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_read_wait: Duration::from_nanos(
                self.read_wait_nanos_.load(Ordering::Relaxed)),
            total_write_wait: Duration::from_nanos(
                self.write_wait_nanos_.load(Ordering::Relaxed)),
            reads_completed: self.reads_completed_.load(Ordering::Relaxed),
            writes_completed: self.writes_completed_.load(Ordering::Relaxed),
        }
    }
}

/// A plain copy of `WaitStatistics`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_read_wait: Duration,
    pub total_write_wait: Duration,
    pub reads_completed: u64,
    pub writes_completed: u64,
}

impl StatsSnapshot {
    /// Total read wait divided by `expected_ops`, or `None` when there were no
    /// read operations to average over.
    pub fn average_read_wait(&self, expected_ops: u64) -> Option<Duration> {
        average_(self.total_read_wait, expected_ops)
    }

    /// Total write wait divided by `expected_ops`, or `None` when there were
    /// no write operations to average over.
    pub fn average_write_wait(&self, expected_ops: u64) -> Option<Duration> {
        average_(self.total_write_wait, expected_ops)
    }
}

fn duration_nanos_(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn average_(total: Duration, ops: u64) -> Option<Duration> {
    if ops == 0 {
        return Option::None;
    }
    let nanos = total.as_nanos() / u128::from(ops);
    Option::Some(Duration::from_nanos(
        u64::try_from(nanos).unwrap_or(u64::MAX)))
}
