use core::{
    fmt,
    ops::{Deref, DerefMut},
};

use super::impl_::RwLock;

/// A guard that releases the write lock when dropped.
#[must_use = "if unused the write lock is released immediately"]
pub struct WriterGuard<'a, T>(&'a RwLock<T>)
where
    T: ?Sized;

impl<'a, T> WriterGuard<'a, T>
where
    T: ?Sized,
{
    /// The caller must have marked the writer active on `rwlock`.
    pub(super) fn new(rwlock: &'a RwLock<T>) -> Self {
        WriterGuard(rwlock)
    }

    #[inline]
    pub fn rwlock(&self) -> &'a RwLock<T> {
        self.0
    }
}

impl<T> Drop for WriterGuard<'_, T>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::warn!("[WriterGuard::drop] releasing while unwinding");
        }
        // SAFETY: this guard owns the write acquisition and is going away.
        if let Result::Err(e) = unsafe { self.0.raw().end_write() } {
            log::error!("[WriterGuard::drop] {e}");
        }
    }
}

impl<T> Deref for WriterGuard<'_, T>
where
    T: ?Sized,
{
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.0.data_cell().get() }
    }
}

impl<T> DerefMut for WriterGuard<'_, T>
where
    T: ?Sized,
{
    fn deref_mut(&mut self) -> &mut T {
        // The active writer is exclusive.
        unsafe { &mut *self.0.data_cell().get() }
    }
}

impl<T> fmt::Debug for WriterGuard<'_, T>
where
    T: fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WriterGuard(lock: {:p}, value: {:?})",
            self.rwlock(),
            self.deref(),
        )
    }
}

impl<T> fmt::Display for WriterGuard<'_, T>
where
    T: fmt::Display + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WriterGuard(lock: {:p}, value: {})",
            self.rwlock(),
            self.deref(),
        )
    }
}
