use std::{
    error::Error as _,
    fmt, io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use super::*;

fn init_env_logger_() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bump_(value: &mut u64) {
    *value += 1;
}

fn explode_(_: &mut u64) {
    panic!("writer failed in the middle of an update");
}

fn short_timing_() -> Timing {
    Timing {
        read_hold: Duration::from_millis(2),
        read_pause: Duration::from_millis(1),
        write_hold: Duration::from_millis(4),
        write_pause: Duration::from_millis(1),
    }
}

/// Polls `cond` until it holds, failing the test after a generous deadline.
fn wait_until_(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Default)]
struct RecordingNarrator(Mutex<Vec<String>>);

impl RecordingNarrator {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Narrator for RecordingNarrator {
    fn narrate(&self, line: fmt::Arguments<'_>) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

#[tokio::test]
async fn readers_hold_the_lock_concurrently() {
    init_env_logger_();

    const READERS: usize = 6;
    let rwlock = Arc::new(RwLock::new(7usize));
    let rwlock_cloned = rwlock.clone();
    let task = tokio::task::spawn_blocking(move || {
        let barrier = Barrier::new(READERS);
        thread::scope(|s| {
            for _ in 0..READERS {
                let _ = s.spawn(|| {
                    let reader = rwlock_cloned.read().unwrap();
                    // No reader leaves before all of them are inside.
                    let _ = barrier.wait();
                    assert_eq!(*reader, 7);
                    assert_eq!(rwlock_cloned.reader_count(), READERS);
                    let _ = barrier.wait();
                });
            }
        });
    });
    let r = tokio::time::timeout(Duration::from_secs(30), task).await;
    assert!(r.expect("readers failed to overlap").is_ok());

    assert_eq!(rwlock.raw().phase().unwrap(), Phase::Idle);
    let state = rwlock.raw().snapshot().unwrap();
    assert_eq!(state.read_grants(), READERS as u64);
    assert_eq!(state.write_grants(), 0);
}

#[test]
fn active_writer_blocks_new_reader() {
    init_env_logger_();

    let rwlock = RwLock::new(0usize);
    let (start_signal_send, start_signal_recv) = async_channel::bounded::<()>(1);
    let (acquired_send, acquired_recv) = async_channel::bounded::<usize>(1);
    thread::scope(|s| {
        let mut writer = rwlock.write().unwrap();
        let _ = s.spawn(|| {
            assert!(start_signal_send.send_blocking(()).is_ok());
            let reader = rwlock.read().unwrap();
            assert!(acquired_send.send_blocking(*reader).is_ok());
        });
        assert!(start_signal_recv.recv_blocking().is_ok());
        thread::sleep(Duration::from_millis(50));

        // The writer guard is alive, the reader SHOULD still be blocked.
        assert!(acquired_recv.try_recv().is_err());
        assert_eq!(rwlock.raw().phase().unwrap(), Phase::Writing);

        *writer = 42;
        drop(writer);
        assert_eq!(acquired_recv.recv_blocking().unwrap(), 42);
    });
    assert!(!rwlock.is_acquired());
}

#[test]
fn writer_waits_for_last_reader() {
    init_env_logger_();

    let rwlock = RwLock::new(1usize);
    let (acquired_send, acquired_recv) = async_channel::bounded::<()>(1);
    thread::scope(|s| {
        let r1 = rwlock.read().unwrap();
        let r2 = rwlock.read().unwrap();
        let _ = s.spawn(|| {
            let mut writer = rwlock.write().unwrap();
            *writer += 1;
            assert!(acquired_send.send_blocking(()).is_ok());
        });
        wait_until_(|| rwlock.raw().snapshot().unwrap().waiting_writers() == 1);
        assert!(rwlock.try_write().unwrap().is_none());

        drop(r1);
        thread::sleep(Duration::from_millis(20));
        // One reader remains, the writer SHOULD keep waiting.
        assert!(acquired_recv.try_recv().is_err());
        assert_eq!(rwlock.raw().phase().unwrap(), Phase::Reading(1));

        drop(r2);
        assert!(acquired_recv.recv_blocking().is_ok());
    });
    assert_eq!(rwlock.into_inner(), 2);
}

/// Under the default policy a reader overlapping an active read is admitted
/// even though a writer is already waiting; this is how writers starve.
#[test]
fn reader_preferring_admits_reader_past_waiting_writer() {
    init_env_logger_();

    let rwlock = RwLock::new(());
    assert_eq!(rwlock.policy(), Policy::ReaderPreferring);
    thread::scope(|s| {
        let r1 = rwlock.read().unwrap();
        let w = s.spawn(|| {
            let _writer = rwlock.write().unwrap();
        });
        wait_until_(|| rwlock.raw().snapshot().unwrap().waiting_writers() == 1);

        let r2 = rwlock.try_read().unwrap();
        assert!(r2.is_some());
        assert_eq!(rwlock.reader_count(), 2);

        drop(r1);
        thread::sleep(Duration::from_millis(20));
        let state = rwlock.raw().snapshot().unwrap();
        assert_eq!(state.waiting_writers(), 1);
        assert_eq!(state.phase(), Phase::Reading(1));

        drop(r2);
        assert!(w.join().is_ok());
    });
    let state = rwlock.raw().snapshot().unwrap();
    assert_eq!(state.write_grants(), 1);
    assert_eq!(state.phase(), Phase::Idle);
}

#[test]
fn writer_preferring_holds_back_new_readers() {
    init_env_logger_();

    let rwlock = RwLock::with_policy((), Policy::WriterPreferring);
    let (released_send, released_recv) = async_channel::bounded::<()>(1);
    thread::scope(|s| {
        let r1 = rwlock.read().unwrap();
        let w = s.spawn(|| {
            let writer = rwlock.write().unwrap();
            drop(writer);
            assert!(released_send.send_blocking(()).is_ok());
        });
        wait_until_(|| rwlock.raw().snapshot().unwrap().waiting_writers() == 1);

        // A writer is waiting, so no new reader may join.
        assert!(rwlock.try_read().unwrap().is_none());
        assert_eq!(rwlock.reader_count(), 1);

        drop(r1);
        assert!(released_recv.recv_blocking().is_ok());
        assert!(w.join().is_ok());
        assert!(rwlock.try_read().unwrap().is_some());
    });
    assert!(!rwlock.is_acquired());
}

fn stress_exclusion_(policy: Policy) {
    const READERS: usize = 6;
    const WRITERS: usize = 3;
    const OPS: usize = 200;

    let rwlock = RwLock::with_policy(0usize, policy);
    let readers_in = AtomicUsize::new(0);
    let writers_in = AtomicUsize::new(0);
    thread::scope(|s| {
        for _ in 0..READERS {
            let _ = s.spawn(|| {
                for _ in 0..OPS {
                    let reader = rwlock.read().unwrap();
                    let _ = readers_in.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(writers_in.load(Ordering::SeqCst), 0);
                    let state = rwlock.raw().snapshot().unwrap();
                    assert!(state.check().is_ok());
                    assert!(!state.writer_active());
                    assert!(state.active_readers() >= 1);
                    let _ = readers_in.fetch_sub(1, Ordering::SeqCst);
                    drop(reader);
                    thread::yield_now();
                }
            });
        }
        for _ in 0..WRITERS {
            let _ = s.spawn(|| {
                for _ in 0..OPS {
                    let mut writer = rwlock.write().unwrap();
                    assert_eq!(writers_in.fetch_add(1, Ordering::SeqCst), 0);
                    assert_eq!(readers_in.load(Ordering::SeqCst), 0);
                    assert_eq!(rwlock.raw().phase().unwrap(), Phase::Writing);
                    *writer += 1;
                    let _ = writers_in.fetch_sub(1, Ordering::SeqCst);
                    drop(writer);
                    thread::yield_now();
                }
            });
        }
    });

    let state = rwlock.raw().snapshot().unwrap();
    assert_eq!(state.phase(), Phase::Idle);
    assert_eq!(state.waiting_writers(), 0);
    assert_eq!(state.read_grants(), (READERS * OPS) as u64);
    assert_eq!(state.write_grants(), (WRITERS * OPS) as u64);
    assert_eq!(rwlock.into_inner(), WRITERS * OPS);
}

#[test]
fn reader_preferring_readers_and_writers_never_overlap() {
    init_env_logger_();
    stress_exclusion_(Policy::ReaderPreferring);
}

#[test]
fn writer_preferring_readers_and_writers_never_overlap() {
    init_env_logger_();
    stress_exclusion_(Policy::WriterPreferring);
}

#[tokio::test]
async fn scenario_completes_within_timeout() {
    init_env_logger_();

    let bench = Bench::new(0u64, bump_)
        .with_timing(short_timing_())
        .with_narrator(SilentNarrator);
    let config = ScenarioConfig::new(5, 2).with_ops(3, 3);
    let task = tokio::task::spawn_blocking(move || {
        let report = bench.run_scenario(&config);
        (report, bench)
    });
    let (report, bench) = tokio::time::timeout(Duration::from_secs(60), task)
        .await
        .expect("scenario deadlocked")
        .unwrap();
    let report = report.unwrap();
    assert_eq!(report.stats.reads_completed, 15);
    assert_eq!(report.stats.writes_completed, 6);
    assert_eq!(bench.into_inner(), 6);
}

#[test]
fn five_readers_two_writers_conserve_operations() {
    init_env_logger_();

    let narrator = Arc::new(RecordingNarrator::default());
    let bench = Bench::new(0u64, bump_)
        .with_timing(short_timing_())
        .with_narrator(narrator.clone());
    let before = bench.rwlock().raw().snapshot().unwrap();

    let config = ScenarioConfig::new(5, 2).with_ops(3, 3);
    let report = bench.run_scenario(&config).unwrap();
    assert_eq!(report.config, config);
    assert_eq!(report.stats.reads_completed, config.expected_reads());
    assert_eq!(report.stats.writes_completed, config.expected_writes());
    assert_eq!(report.stats.reads_completed, 15);
    assert_eq!(report.stats.writes_completed, 6);

    let avg_read = report.average_read_wait.unwrap();
    let avg_write = report.average_write_wait.unwrap();
    assert!(avg_read <= report.stats.total_read_wait);
    assert!(avg_write <= report.stats.total_write_wait);
    assert!(report.elapsed >= avg_write);

    let after = bench.rwlock().raw().snapshot().unwrap();
    assert_eq!(after.phase(), Phase::Idle);
    assert_eq!(after.read_grants() - before.read_grants(), 15);
    assert_eq!(after.write_grants() - before.write_grants(), 6);

    let lines = narrator.lines();
    assert_eq!(lines.len(), (15 + 6) * 2);
    let count = |prefix: &str, suffix: &str| {
        lines
            .iter()
            .filter(|l| l.starts_with(prefix) && l.ends_with(suffix))
            .count()
    };
    assert_eq!(count("Reader ", "now reading."), 15);
    assert_eq!(count("Reader ", "finished reading."), 15);
    assert_eq!(count("Writer ", "now writing."), 6);
    assert_eq!(count("Writer ", "finished writing."), 6);

    assert_eq!(bench.into_inner(), 6);
}

#[test]
fn readers_only_scenario_never_activates_a_writer() {
    init_env_logger_();

    let bench = Bench::new(0u64, bump_)
        .with_timing(short_timing_())
        .with_narrator(SilentNarrator);
    let config = ScenarioConfig::new(3, 0).with_ops(2, 3);
    let report = bench.run_scenario(&config).unwrap();

    assert_eq!(report.stats.reads_completed, 6);
    assert_eq!(report.stats.writes_completed, 0);
    assert!(report.average_read_wait.is_some());
    assert_eq!(report.average_write_wait, Option::None);
    assert!(report.to_string().ends_with("Average writer wait time: n/a"));

    let state = bench.rwlock().raw().snapshot().unwrap();
    assert_eq!(state.write_grants(), 0);
    assert_eq!(state.read_grants(), 6);
    assert_eq!(bench.into_inner(), 0);
}

#[test]
fn zero_read_ops_reports_undefined_read_average() {
    let bench = Bench::new(0u64, bump_)
        .with_timing(Timing::zero())
        .with_narrator(SilentNarrator);
    let report = bench
        .run_scenario(&ScenarioConfig::new(4, 1).with_ops(0, 2))
        .unwrap();
    assert_eq!(report.stats.reads_completed, 0);
    assert_eq!(report.average_read_wait, Option::None);
    assert!(report.average_write_wait.is_some());
}

#[test]
fn statistics_reset_between_scenarios() {
    init_env_logger_();

    let narrator = Arc::new(RecordingNarrator::default());
    let bench = Bench::new(0u64, bump_)
        .with_timing(Timing::zero())
        .with_narrator(narrator.clone());
    let reports = bench.run_all(&default_scenarios()).unwrap();
    assert_eq!(reports.len(), 3);

    let counts: Vec<_> = reports
        .iter()
        .map(|r| (r.stats.reads_completed, r.stats.writes_completed))
        .collect();
    assert_eq!(counts, vec![(15, 6), (9, 9), (6, 15)]);

    let lines = narrator.lines();
    assert!(lines.contains(&"Test case 1: More readers than writers".to_owned()));
    assert!(lines.contains(&"Test case 3: More writers than readers".to_owned()));
    assert!(lines.contains(&"Readers: 3, Writers: 3".to_owned()));

    let state = bench.rwlock().raw().snapshot().unwrap();
    assert_eq!(state.read_grants(), 15 + 9 + 6);
    assert_eq!(bench.into_inner(), 6 + 9 + 15);
}

#[test]
fn panicking_writer_releases_the_lock() {
    init_env_logger_();

    let bench = Bench::new(0u64, explode_)
        .with_timing(Timing::zero())
        .with_narrator(SilentNarrator);
    let r = bench.run_scenario(&ScenarioConfig::new(2, 1).with_ops(2, 1));
    let Result::Err(Error::WorkerPanicked(name)) = &r else {
        panic!("expected Error::WorkerPanicked, got {r:?}");
    };
    assert_eq!(name, "writer-1");

    // The guard was released while unwinding and the core is not poisoned.
    let rwlock = bench.rwlock();
    assert!(!rwlock.is_acquired());
    assert_eq!(rwlock.raw().phase().unwrap(), Phase::Idle);
    assert!(rwlock.try_write().unwrap().is_some());
    assert_eq!(bench.stats().snapshot().reads_completed, 4);
}

#[test]
fn resource_exhausted_exposes_spawn_error() {
    let e = Error::ResourceExhausted {
        worker: "reader-3".to_owned(),
        source: io::Error::other("no more threads"),
    };
    assert_eq!(
        e.to_string(),
        "failed to spawn worker `reader-3`: no more threads",
    );
    assert!(e.source().is_some());
    assert!(Error::PoisonedState.source().is_none());
}

#[test]
fn live_writer_guard_excludes_every_other_acquisition() {
    init_env_logger_();

    let rwlock = RwLock::new(0u64);
    let mut writer = rwlock.write().unwrap();
    *writer += 1;

    // Safe code has no way to release the core under a live guard, so every
    // further attempt is refused until the guard drops.
    assert!(rwlock.try_write().unwrap().is_none());
    assert!(rwlock.try_read().unwrap().is_none());
    let state = rwlock.raw().snapshot().unwrap();
    assert_eq!(state.phase(), Phase::Writing);
    assert_eq!(state.write_grants(), 1);

    *writer += 1;
    drop(writer);
    let second = rwlock.try_write().unwrap().expect("lock released by the guard");
    assert_eq!(*second, 2);
    drop(second);
    assert_eq!(rwlock.raw().snapshot().unwrap().write_grants(), 2);
}

#[test]
fn panicking_reader_releases_the_lock() {
    init_env_logger_();

    let rwlock = RwLock::new(5u64);
    thread::scope(|s| {
        let h = s.spawn(|| {
            let reader = rwlock.read().unwrap();
            assert_eq!(*reader, 5);
            panic!("reader failed while holding the lock");
        });
        assert!(h.join().is_err());
    });

    assert!(!rwlock.is_acquired());
    assert_eq!(rwlock.raw().phase().unwrap(), Phase::Idle);
    let mut writer = rwlock.try_write().unwrap().expect("reader was released");
    *writer += 1;
    drop(writer);
    assert_eq!(rwlock.into_inner(), 6);
}
