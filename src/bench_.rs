use std::{
    fmt, io,
    thread,
    time::{Duration, Instant},
};

use super::{
    error_::Error,
    impl_::RwLock,
    narrate_::{LogNarrator, Narrator},
    state_::Policy,
    stats_::{StatsSnapshot, WaitStatistics},
    workload_::{Role, Timing, Workload},
};

/// Operations performed by each worker unless configured otherwise.
pub const K_DEFAULT_OPS_PER_WORKER: usize = 3;

/// The shape of one benchmark scenario. Immutable while the scenario runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub label: String,
    pub readers: usize,
    pub writers: usize,
    pub read_ops: usize,
    pub write_ops: usize,
}

impl ScenarioConfig {
    pub fn new(readers: usize, writers: usize) -> Self {
        ScenarioConfig {
            label: String::new(),
            readers,
            writers,
            read_ops: K_DEFAULT_OPS_PER_WORKER,
            write_ops: K_DEFAULT_OPS_PER_WORKER,
        }
    }

    pub fn with_ops(mut self, read_ops: usize, write_ops: usize) -> Self {
        self.read_ops = read_ops;
        self.write_ops = write_ops;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn expected_reads(&self) -> u64 {
        (self.readers as u64).saturating_mul(self.read_ops as u64)
    }

    pub fn expected_writes(&self) -> u64 {
        (self.writers as u64).saturating_mul(self.write_ops as u64)
    }
}

impl fmt::Display for ScenarioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "readers({}) x {} ops, writers({}) x {} ops",
            self.readers, self.read_ops, self.writers, self.write_ops,
        )
    }
}

/// The three fixed scenarios run by the binary: more readers than writers,
/// equal counts, more writers than readers.
pub fn default_scenarios() -> Vec<ScenarioConfig> {
    vec![
        ScenarioConfig::new(5, 2).with_label("More readers than writers"),
        ScenarioConfig::new(3, 3).with_label("Equal readers and writers"),
        ScenarioConfig::new(2, 5).with_label("More writers than readers"),
    ]
}

/// Aggregated outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub config: ScenarioConfig,
    pub stats: StatsSnapshot,
    /// `None` when the scenario performed no reads.
    pub average_read_wait: Option<Duration>,
    /// `None` when the scenario performed no writes.
    pub average_write_wait: Option<Duration>,
    pub elapsed: Duration,
}

impl ScenarioReport {
    fn new(
        config: &ScenarioConfig,
        stats: StatsSnapshot,
        elapsed: Duration,
    ) -> Self {
        ScenarioReport {
            config: config.clone(),
            stats,
            average_read_wait: stats.average_read_wait(config.expected_reads()),
            average_write_wait: stats
                .average_write_wait(config.expected_writes()),
            elapsed,
        }
    }
}

struct AvgMillis(Option<Duration>);

impl fmt::Display for AvgMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Option::Some(d) => write!(f, "{} ms", d.as_millis()),
            Option::None => write!(f, "n/a"),
        }
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Readers: {}, Writers: {}",
            self.config.readers, self.config.writers,
        )?;
        writeln!(
            f,
            "Average reader wait time: {}",
            AvgMillis(self.average_read_wait),
        )?;
        write!(
            f,
            "Average writer wait time: {}",
            AvgMillis(self.average_write_wait),
        )
    }
}

/// The benchmark context: one lock, its wait statistics and the narration
/// sink, shared by reference with every worker of a scenario.
pub struct Bench<T> {
    rwlock_: RwLock<T>,
    stats_: WaitStatistics,
    narrator_: Box<dyn Narrator>,
    timing_: Timing,
    update_: fn(&mut T),
}

impl<T> Bench<T>
where
    T: Send + Sync,
{
    /// Creates a context with the reader-preferring policy. `update` is
    /// applied to `data` once per write operation.
    pub fn new(data: T, update: fn(&mut T)) -> Self {
        Bench::with_policy(data, update, Policy::ReaderPreferring)
    }

    pub fn with_policy(data: T, update: fn(&mut T), policy: Policy) -> Self {
        Bench {
            rwlock_: RwLock::with_policy(data, policy),
            stats_: WaitStatistics::new(),
            narrator_: Box::new(LogNarrator),
            timing_: Timing::default(),
            update_: update,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing_ = timing;
        self
    }

    pub fn with_narrator<N>(mut self, narrator: N) -> Self
    where
        N: Narrator + 'static,
    {
        self.narrator_ = Box::new(narrator);
        self
    }

    pub fn rwlock(&self) -> &RwLock<T> {
        &self.rwlock_
    }

    pub fn stats(&self) -> &WaitStatistics {
        &self.stats_
    }

    pub fn timing(&self) -> Timing {
        self.timing_
    }

    pub fn into_inner(self) -> T {
        self.rwlock_.into_inner()
    }

    /// Runs one scenario to completion and aggregates its wait statistics.
    ///
    /// Every spawned worker is joined before this returns, whether or not the
    /// scenario succeeded. If a worker cannot be spawned, no further workers
    /// are started and `Error::ResourceExhausted` is returned once the
    /// started ones finish.
    pub fn run_scenario(
        &self,
        config: &ScenarioConfig,
    ) -> Result<ScenarioReport, Error> {
        log::debug!("[Bench::run_scenario] start {config}");
        self.stats_.reset();
        let workload = Workload::new(
            &self.rwlock_,
            &self.stats_,
            self.narrator_.as_ref(),
            self.timing_,
            self.update_,
        );
        let roles = (1..=config.readers)
            .map(|id| (Role::Reader, id, config.read_ops))
            .chain(
                (1..=config.writers)
                    .map(|id| (Role::Writer, id, config.write_ops)),
            );

        let started = Instant::now();
        thread::scope(|s| {
            let workload = &workload;
            spawn_then_join_(roles, move |name, role, id, ops| {
                thread::Builder::new()
                    .name(name.to_owned())
                    .spawn_scoped(s, move || workload.run(role, id, ops))
            })
        })?;
        let elapsed = started.elapsed();

        let report =
            ScenarioReport::new(config, self.stats_.snapshot(), elapsed);
        log::debug!(
            "[Bench::run_scenario] done {config} in {} ms",
            elapsed.as_millis(),
        );
        Result::Ok(report)
    }

    /// Runs `scenarios` one after another, narrating a heading before each and
    /// the summary followed by an empty line after it. Stops at the first
    /// failed scenario.
    pub fn run_all(
        &self,
        scenarios: &[ScenarioConfig],
    ) -> Result<Vec<ScenarioReport>, Error> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for (i, config) in scenarios.iter().enumerate() {
            self.narrator_
                .narrate(format_args!("Test case {}: {}", i + 1, config.label));
            let report = self.run_scenario(config)?;
            for line in report.to_string().lines() {
                self.narrator_.narrate(format_args!("{line}"));
            }
            self.narrator_.narrate(format_args!(""));
            reports.push(report);
        }
        Result::Ok(reports)
    }
}

/// A started worker that can be waited for.
trait WorkerHandle {
    fn join_worker(self) -> thread::Result<Result<(), Error>>;
}

impl WorkerHandle for thread::ScopedJoinHandle<'_, Result<(), Error>> {
    fn join_worker(self) -> thread::Result<Result<(), Error>> {
        self.join()
    }
}

/// Starts one worker per job through `spawn`, stopping at the first spawn
/// failure, then joins every worker that did start. Returns the first error
/// seen, a spawn failure ahead of any worker error.
fn spawn_then_join_<J, S, H>(jobs: J, mut spawn: S) -> Result<(), Error>
where
    J: IntoIterator<Item = (Role, usize, usize)>,
    S: FnMut(&str, Role, usize, usize) -> io::Result<H>,
    H: WorkerHandle,
{
    let mut first_err = Option::None;
    let mut handles = Vec::new();
    for (role, id, ops) in jobs {
        let name = format!("{}-{id}", role.to_string().to_lowercase());
        match spawn(&name, role, id, ops) {
            Result::Ok(h) => handles.push((name, h)),
            Result::Err(source) => {
                log::error!("[Bench::run_scenario] spawn {name}: {source}");
                first_err = Option::Some(Error::ResourceExhausted {
                    worker: name,
                    source,
                });
                break;
            }
        }
    }
    for (name, h) in handles {
        let r = match h.join_worker() {
            Result::Ok(r) => r,
            Result::Err(_) => Result::Err(Error::WorkerPanicked(name)),
        };
        if let Result::Err(e) = r {
            log::warn!("[Bench::run_scenario] {e}");
            let _ = first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Result::Ok(()), Result::Err)
}

impl<T> fmt::Debug for Bench<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bench")
            .field("rwlock", &self.rwlock_)
            .field("stats", &self.stats_)
            .field("timing", &self.timing_)
            .finish_non_exhaustive()
    }
}
