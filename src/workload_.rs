use std::{
    fmt,
    thread,
    time::{Duration, Instant},
};

use super::{
    error_::Error,
    impl_::RwLock,
    narrate_::Narrator,
    stats_::WaitStatistics,
};

const K_READ_HOLD_MS: u64 = 50;
const K_READ_PAUSE_MS: u64 = 10;
const K_WRITE_HOLD_MS: u64 = 100;
const K_WRITE_PAUSE_MS: u64 = 20;

/// Simulated durations of a worker loop. Writes are modeled as more expensive
/// than reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// How long a reader holds the lock per operation.
    pub read_hold: Duration,
    /// Delay between two read operations of the same reader.
    pub read_pause: Duration,
    pub write_hold: Duration,
    pub write_pause: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            read_hold: Duration::from_millis(K_READ_HOLD_MS),
            read_pause: Duration::from_millis(K_READ_PAUSE_MS),
            write_hold: Duration::from_millis(K_WRITE_HOLD_MS),
            write_pause: Duration::from_millis(K_WRITE_PAUSE_MS),
        }
    }
}

impl Timing {
    /// No holds and no pauses. Workers contend as fast as they can.
    pub const fn zero() -> Self {
        Timing {
            read_hold: Duration::ZERO,
            read_pause: Duration::ZERO,
            write_hold: Duration::ZERO,
            write_pause: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Reader,
    Writer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = match self {
            Role::Reader => "Reader",
            Role::Writer => "Writer",
        };
        write!(f, "{x}")
    }
}

/// The reader and writer loops of one benchmark scenario.
///
/// Each operation measures how long the acquisition blocked, records it in
/// the shared `WaitStatistics`, holds the lock for the simulated duration and
/// pauses before the next operation.
pub struct Workload<'a, T>
where
    T: ?Sized,
{
    rwlock_: &'a RwLock<T>,
    stats_: &'a WaitStatistics,
    narrator_: &'a dyn Narrator,
    timing_: Timing,
    update_: fn(&mut T),
}

impl<'a, T> Workload<'a, T>
where
    T: ?Sized,
{
    /// `update` is applied to the protected value once per write operation.
    pub fn new(
        rwlock: &'a RwLock<T>,
        stats: &'a WaitStatistics,
        narrator: &'a dyn Narrator,
        timing: Timing,
        update: fn(&mut T),
    ) -> Self {
        Workload {
            rwlock_: rwlock,
            stats_: stats,
            narrator_: narrator,
            timing_: timing,
            update_: update,
        }
    }

    pub fn run(&self, role: Role, id: usize, ops: usize) -> Result<(), Error> {
        match role {
            Role::Reader => self.run_reader(id, ops),
            Role::Writer => self.run_writer(id, ops),
        }
    }

    pub fn run_reader(&self, id: usize, ops: usize) -> Result<(), Error> {
        for _ in 0..ops {
            let start = Instant::now();
            let reader = self.rwlock_.read()?;
            let wait = start.elapsed();
            self.stats_.record_read(wait);

            self.narrator_.narrate(format_args!(
                "Reader {id} waited {} ms, now reading.",
                wait.as_millis(),
            ));
            pause_(self.timing_.read_hold);
            self.narrator_.narrate(format_args!("Reader {id} finished reading."));

            drop(reader);
            pause_(self.timing_.read_pause);
        }
        Result::Ok(())
    }

    pub fn run_writer(&self, id: usize, ops: usize) -> Result<(), Error> {
        for _ in 0..ops {
            let start = Instant::now();
            let mut writer = self.rwlock_.write()?;
            let wait = start.elapsed();
            self.stats_.record_write(wait);

            self.narrator_.narrate(format_args!(
                "Writer {id} waited {} ms, now writing.",
                wait.as_millis(),
            ));
            (self.update_)(&mut *writer);
            pause_(self.timing_.write_hold);
            self.narrator_.narrate(format_args!("Writer {id} finished writing."));

            drop(writer);
            pause_(self.timing_.write_pause);
        }
        Result::Ok(())
    }
}

fn pause_(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}
