use core::{fmt, ops::Deref};

use super::impl_::RwLock;

/// A guard that releases the read lock when dropped.
#[must_use = "if unused the read lock is released immediately"]
pub struct ReaderGuard<'a, T>(&'a RwLock<T>)
where
    T: ?Sized;

impl<'a, T> ReaderGuard<'a, T>
where
    T: ?Sized,
{
    /// The caller must have registered a reader on `rwlock`.
    pub(super) fn new(rwlock: &'a RwLock<T>) -> Self {
        ReaderGuard(rwlock)
    }

    #[inline]
    pub fn rwlock(&self) -> &'a RwLock<T> {
        self.0
    }
}

impl<T> Drop for ReaderGuard<'_, T>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::warn!("[ReaderGuard::drop] releasing while unwinding");
        }
        // SAFETY: this guard owns the read acquisition and is going away.
        if let Result::Err(e) = unsafe { self.0.raw().end_read() } {
            log::error!("[ReaderGuard::drop] {e}");
        }
    }
}

impl<T> Deref for ReaderGuard<'_, T>
where
    T: ?Sized,
{
    type Target = T;

    fn deref(&self) -> &T {
        // Readers and writers are mutually excluded while this guard lives.
        unsafe { &*self.0.data_cell().get() }
    }
}

impl<T> fmt::Debug for ReaderGuard<'_, T>
where
    T: fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReaderGuard(lock: {:p}, value: {:?})",
            self.rwlock(),
            self.deref(),
        )
    }
}

impl<T> fmt::Display for ReaderGuard<'_, T>
where
    T: fmt::Display + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReaderGuard(lock: {:p}, value: {})",
            self.rwlock(),
            self.deref(),
        )
    }
}
