use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::{
    error_::Error,
    state_::{LockState, Phase, Policy},
};

/// The lock core: a monitor made of one guarding mutex over `LockState` and
/// one condition variable shared by blocked readers and writers.
///
/// Any number of readers may hold the lock at once, or exactly one writer.
/// Blocked contexts re-evaluate their admission predicate on every wake-up, so
/// spurious wake-ups and lost races are harmless. No queueing or ticketing is
/// performed; see [`Policy`] for the resulting starvation behaviour.
///
/// The `begin_*` / `end_*` operations must be paired by the caller, which is
/// why the releasing half is `unsafe`. Prefer
/// [`RwLock`](crate::RwLock), whose guards release on every exit path.
#[derive(Debug)]
pub struct RawRwLock {
    policy_: Policy,
    lock_stat_: Mutex<LockState>,
    wake_cond_: Condvar,
}

impl Default for RawRwLock {
    fn default() -> Self {
        RawRwLock::new()
    }
}

impl RawRwLock {
    /// Creates an idle lock with the default reader-preferring policy.
    pub const fn new() -> Self {
        RawRwLock::with_policy(Policy::ReaderPreferring)
    }

    pub const fn with_policy(policy: Policy) -> Self {
        RawRwLock {
            policy_: policy,
            lock_stat_: Mutex::new(LockState::new()),
            wake_cond_: Condvar::new(),
        }
    }

    #[inline]
    pub const fn policy(&self) -> Policy {
        self.policy_
    }

    /// Blocks until no writer is active (and, under
    /// `Policy::WriterPreferring`, none is waiting), then registers one more
    /// active reader.
    pub fn begin_read(&self) -> Result<(), Error> {
        let policy = self.policy_;
        let g = self.acquire_state_()?;
        let mut g = self
            .wake_cond_
            .wait_while(g, |s| !s.expect_read_admissible(policy))
            .map_err(|_| Error::PoisonedState)?;
        g.desire_reader_incr();
        log::trace!("[RawRwLock::begin_read] {}", *g);
        Result::Ok(())
    }

    /// Unregisters one active reader. The last reader out wakes every blocked
    /// context.
    ///
    /// Returns `Error::NotHeld` and leaves the state unchanged if no reader is
    /// registered.
    ///
    /// # Safety
    ///
    /// The caller must own a read acquisition made by a successful
    /// `begin_read` or `try_begin_read` on this lock, and nothing derived from
    /// that acquisition (such as a [`ReaderGuard`](crate::ReaderGuard)) may
    /// outlive this call.
    pub unsafe fn end_read(&self) -> Result<(), Error> {
        let mut g = self.recover_state_("end_read");
        let Option::Some(remaining) = g.desire_reader_decr() else {
            return Result::Err(Error::NotHeld("end_read"));
        };
        log::trace!("[RawRwLock::end_read] {}", *g);
        drop(g);
        if remaining == 0 {
            self.wake_cond_.notify_all();
        }
        Result::Ok(())
    }

    /// Blocks until no writer is active and no reader holds the lock, then
    /// marks the writer active.
    pub fn begin_write(&self) -> Result<(), Error> {
        let mut g = self.acquire_state_()?;
        g.desire_writer_waiting();
        let r = self
            .wake_cond_
            .wait_while(g, |s| !s.expect_write_admissible());
        let mut g = match r {
            Result::Ok(g) => g,
            Result::Err(poisoned) => {
                // Readers held back by this waiting writer must see it leave.
                let mut g = poisoned.into_inner();
                g.desire_writer_not_waiting();
                drop(g);
                self.wake_cond_.notify_all();
                return Result::Err(Error::PoisonedState);
            }
        };
        g.desire_writer_not_waiting();
        g.desire_writer_acquired();
        log::trace!("[RawRwLock::begin_write] {}", *g);
        Result::Ok(())
    }

    /// Clears the active writer and wakes every blocked context.
    ///
    /// Returns `Error::NotHeld` and leaves the state unchanged if no writer is
    /// active.
    ///
    /// # Safety
    ///
    /// The caller must own the write acquisition made by a successful
    /// `begin_write` or `try_begin_write` on this lock, and nothing derived
    /// from that acquisition (such as a [`WriterGuard`](crate::WriterGuard))
    /// may outlive this call. Releasing a writer that a live guard still
    /// holds lets a second writer in:
    ///
    /// ```compile_fail,E0133
    /// use rwlock_bench::RwLock;
    ///
    /// let lock = RwLock::new(0u64);
    /// let mut w = lock.write().unwrap();
    /// lock.raw().end_write().unwrap();
    /// *w += 1;
    /// ```
    pub unsafe fn end_write(&self) -> Result<(), Error> {
        let mut g = self.recover_state_("end_write");
        if !g.desire_writer_released() {
            return Result::Err(Error::NotHeld("end_write"));
        }
        log::trace!("[RawRwLock::end_write] {}", *g);
        drop(g);
        self.wake_cond_.notify_all();
        Result::Ok(())
    }

    /// Evaluates the read predicate once. Returns `true` if a reader was
    /// registered.
    pub fn try_begin_read(&self) -> Result<bool, Error> {
        let mut g = self.acquire_state_()?;
        if !g.expect_read_admissible(self.policy_) {
            return Result::Ok(false);
        }
        g.desire_reader_incr();
        Result::Ok(true)
    }

    /// Evaluates the write predicate once. Returns `true` if the writer was
    /// marked active.
    pub fn try_begin_write(&self) -> Result<bool, Error> {
        let mut g = self.acquire_state_()?;
        if !g.expect_write_admissible() {
            return Result::Ok(false);
        }
        g.desire_writer_acquired();
        Result::Ok(true)
    }

    /// Returns a copy of the protected state.
    pub fn snapshot(&self) -> Result<LockState, Error> {
        self.acquire_state_().map(|g| *g)
    }

    pub fn phase(&self) -> Result<Phase, Error> {
        self.snapshot().map(|s| s.phase())
    }

    /// Tests if the lock is held by any number of readers or by a writer.
    ///
    /// The result is out of date the instant it is returned. It must not be
    /// used for synchronization.
    pub fn is_acquired(&self) -> bool {
        self.recover_state_("is_acquired").is_acquired()
    }

    /// Returns the number of active readers. Like `is_acquired`, this is only
    /// a heuristic.
    pub fn reader_count(&self) -> usize {
        self.recover_state_("reader_count").active_readers()
    }

    /// Clears a poisoned guard after verifying that the protected state is
    /// still consistent.
    ///
    /// Until this is called, acquisitions on a poisoned lock report
    /// `Error::PoisonedState`. Releases always proceed.
    pub fn recover(&self) -> Result<LockState, Error> {
        let state = *self.recover_state_("recover");
        state.check()?;
        self.lock_stat_.clear_poison();
        Result::Ok(state)
    }

    fn acquire_state_(&self) -> Result<MutexGuard<'_, LockState>, Error> {
        self.lock_stat_.lock().map_err(|_| Error::PoisonedState)
    }

    fn recover_state_(&self, op: &str) -> MutexGuard<'_, LockState> {
        self.lock_stat_.lock().unwrap_or_else(|e| {
            log::warn!("[RawRwLock::{op}] proceeding on poisoned lock state");
            PoisonError::into_inner(e)
        })
    }
}
