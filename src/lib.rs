//! A condition variable based reader-writer lock, and a micro-benchmark
//! harness measuring per-role wait latency under reader/writer contention.

mod bench_;
mod error_;
mod impl_;
mod narrate_;
mod raw_;
mod reader_;
mod state_;
mod stats_;
mod workload_;
mod writer_;

pub use bench_::{
    default_scenarios, Bench, ScenarioConfig, ScenarioReport,
    K_DEFAULT_OPS_PER_WORKER,
};
pub use error_::Error;
pub use impl_::RwLock;
pub use narrate_::{LogNarrator, Narrator, SilentNarrator, StreamNarrator};
pub use raw_::RawRwLock;
pub use reader_::ReaderGuard;
pub use state_::{LockState, Phase, Policy};
pub use stats_::{StatsSnapshot, WaitStatistics};
pub use workload_::{Role, Timing, Workload};
pub use writer_::WriterGuard;

#[cfg(test)]mod tests_;

pub mod x_deps {
    pub use chrono;
    pub use log;
}
