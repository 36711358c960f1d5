use core::fmt;

use super::error_::Error;

/// Admission policy of the lock core.
///
/// Neither policy queues or tickets its waiters, so neither is fair.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// A reader is admitted whenever no writer is active. A continuous stream
    /// of overlapping readers can keep a waiting writer blocked indefinitely.
    #[default]
    ReaderPreferring,

    /// A reader is admitted only when no writer is active and none is
    /// waiting. A continuous stream of writers can starve readers instead.
    WriterPreferring,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = match self {
            Policy::ReaderPreferring => "ReaderPreferring",
            Policy::WriterPreferring => "WriterPreferring",
        };
        write!(f, "Policy::{x}")
    }
}

/// The observable phase of a lock: `Idle`, `Reading(n)` with `n >= 1`, or
/// `Writing`. Every transition passes through `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Reading(usize),
    Writing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Reading(n) => write!(f, "Reading({n})"),
            Phase::Writing => write!(f, "Writing"),
        }
    }
}

/// The state protected by the guarding mutex of `RawRwLock`.
///
/// `writer_active` implies `active_readers == 0`, and `active_readers > 0`
/// implies `!writer_active`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    active_readers_: usize,
    writer_active_: bool,
    waiting_writers_: usize,
    read_grants_: u64,
    write_grants_: u64,
}

impl LockState {
    pub const fn new() -> Self {
        LockState {
            active_readers_: 0,
            writer_active_: false,
            waiting_writers_: 0,
            read_grants_: 0,
            write_grants_: 0,
        }
    }

    #[inline]
    pub const fn active_readers(&self) -> usize {
        self.active_readers_
    }

    #[inline]
    pub const fn writer_active(&self) -> bool {
        self.writer_active_
    }

    /// Number of writers currently blocked in `begin_write`.
    #[inline]
    pub const fn waiting_writers(&self) -> usize {
        self.waiting_writers_
    }

    /// Total successful read acquisitions over the lifetime of the lock.
    #[inline]
    pub const fn read_grants(&self) -> u64 {
        self.read_grants_
    }

    /// Total successful write acquisitions over the lifetime of the lock.
    #[inline]
    pub const fn write_grants(&self) -> u64 {
        self.write_grants_
    }

    #[inline]
    pub const fn is_acquired(&self) -> bool {
        self.writer_active_ || self.active_readers_ > 0
    }

    pub fn phase(&self) -> Phase {
        if self.writer_active_ {
            Phase::Writing
        } else if self.active_readers_ > 0 {
            Phase::Reading(self.active_readers_)
        } else {
            Phase::Idle
        }
    }

    /// Verifies the exclusion invariants.
    pub fn check(&self) -> Result<(), Error> {
        if self.writer_active_ && self.active_readers_ > 0 {
            Result::Err(Error::Inconsistent {
                active_readers: self.active_readers_,
                writer_active: self.writer_active_,
            })
        } else {
            Result::Ok(())
        }
    }

    /// Whether a new reader may be admitted under `policy`.
    #[inline]
    pub const fn expect_read_admissible(&self, policy: Policy) -> bool {
        match policy {
            Policy::ReaderPreferring => !self.writer_active_,
            Policy::WriterPreferring => {
                !self.writer_active_ && self.waiting_writers_ == 0
            }
        }
    }

    /// Whether a writer may be admitted. Identical under both policies.
    #[inline]
    pub const fn expect_write_admissible(&self) -> bool {
        !self.writer_active_ && self.active_readers_ == 0
    }

    pub(super) fn desire_reader_incr(&mut self) {
        debug_assert!(!self.writer_active_);
        self.active_readers_ += 1;
        self.read_grants_ += 1;
        debug_assert!(self.check().is_ok());
    }

    /// Returns the remaining reader count, or `None` if no reader is active.
    pub(super) fn desire_reader_decr(&mut self) -> Option<usize> {
        let c = self.active_readers_.checked_sub(1)?;
        self.active_readers_ = c;
        debug_assert!(self.check().is_ok());
        Option::Some(c)
    }

    pub(super) fn desire_writer_waiting(&mut self) {
        self.waiting_writers_ += 1;
    }

    pub(super) fn desire_writer_not_waiting(&mut self) {
        debug_assert!(self.waiting_writers_ > 0);
        self.waiting_writers_ = self.waiting_writers_.saturating_sub(1);
    }

    pub(super) fn desire_writer_acquired(&mut self) {
        debug_assert!(self.expect_write_admissible());
        self.writer_active_ = true;
        self.write_grants_ += 1;
        debug_assert!(self.check().is_ok());
    }

    /// Returns `false` if no writer was active.
    pub(super) fn desire_writer_released(&mut self) -> bool {
        if !self.writer_active_ {
            return false;
        }
        self.writer_active_ = false;
        true
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[LockState:{}, waiting_writers({}), grants(r: {}, w: {})]",
            self.phase(),
            self.waiting_writers_,
            self.read_grants_,
            self.write_grants_,
        )
    }
}
