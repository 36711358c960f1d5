use anyhow::{Context, Result};
use env_logger::Env;
use log::info;

use rwlock_bench::{default_scenarios, Bench, StreamNarrator};

fn bump_(value: &mut u64) {
    *value += 1;
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let bench = Bench::new(0u64, bump_)
        .with_narrator(StreamNarrator::stdout().without_timestamps());
    info!("{:?}", bench);

    let scenarios = default_scenarios();
    let reports = bench
        .run_all(&scenarios)
        .context("benchmark scenario aborted")?;

    let writes = bench.into_inner();
    info!("{} scenarios finished, {writes} writes applied", reports.len());

    Ok(())
}
