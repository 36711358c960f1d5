use core::cell::UnsafeCell;

use super::{
    error_::Error,
    raw_::RawRwLock,
    reader_::ReaderGuard,
    state_::Policy,
    writer_::WriterGuard,
};

/// A reader-writer lock protecting a value of type `T`, built on the
/// condition variable monitor [`RawRwLock`].
///
/// Access is only handed out through guards, which release the lock when
/// dropped, including while unwinding from a panic.
pub struct RwLock<T>
where
    T: ?Sized,
{
    raw_lock_: RawRwLock,
    data_cell_: UnsafeCell<T>,
}

impl<T> RwLock<T>
where
    T: Sized,
{
    /// Creates a new reader-writer lock with the reader-preferring policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use rwlock_bench::RwLock;
    ///
    /// let lock = RwLock::new(42usize);
    /// assert!(!lock.is_acquired())
    /// ```
    pub const fn new(data: T) -> RwLock<T> {
        RwLock::with_policy(data, Policy::ReaderPreferring)
    }

    pub const fn with_policy(data: T, policy: Policy) -> RwLock<T> {
        RwLock {
            raw_lock_: RawRwLock::with_policy(policy),
            data_cell_: UnsafeCell::new(data),
        }
    }

    /// Unwraps the lock and returns the inner value.
    ///
    /// # Examples
    ///
    /// ```
    /// use rwlock_bench::RwLock;
    ///
    /// let lock = RwLock::new(5usize);
    /// assert_eq!(lock.into_inner(), 5);
    /// ```
    #[must_use]
    #[inline]
    pub fn into_inner(self) -> T {
        self.data_cell_.into_inner()
    }
}

impl<T> RwLock<T>
where
    T: ?Sized,
{
    /// Acquires shared read access, blocking while a writer holds the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use rwlock_bench::RwLock;
    ///
    /// let lock = RwLock::new(1usize);
    /// let r1 = lock.read().unwrap();
    /// let r2 = lock.read().unwrap();
    /// assert_eq!(*r1 + *r2, 2);
    /// assert_eq!(lock.reader_count(), 2);
    /// assert!(lock.try_write().unwrap().is_none());
    /// ```
    pub fn read(&self) -> Result<ReaderGuard<'_, T>, Error> {
        self.raw_lock_.begin_read()?;
        Result::Ok(ReaderGuard::new(self))
    }

    /// Acquires exclusive write access, blocking while any reader or writer
    /// holds the lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use rwlock_bench::RwLock;
    ///
    /// let lock = RwLock::new(1usize);
    /// {
    ///     let mut writer = lock.write().unwrap();
    ///     *writer += 1;
    ///     assert!(lock.try_read().unwrap().is_none());
    /// }
    /// assert_eq!(*lock.read().unwrap(), 2);
    /// ```
    pub fn write(&self) -> Result<WriterGuard<'_, T>, Error> {
        self.raw_lock_.begin_write()?;
        Result::Ok(WriterGuard::new(self))
    }

    pub fn try_read(&self) -> Result<Option<ReaderGuard<'_, T>>, Error> {
        let acquired = self.raw_lock_.try_begin_read()?;
        Result::Ok(acquired.then(|| ReaderGuard::new(self)))
    }

    pub fn try_write(&self) -> Result<Option<WriterGuard<'_, T>>, Error> {
        let acquired = self.raw_lock_.try_begin_write()?;
        Result::Ok(acquired.then(|| WriterGuard::new(self)))
    }

    /// Returns a mutable reference to the value. No locking is needed since
    /// the borrow is exclusive.
    pub fn get_mut(&mut self) -> &mut T {
        self.data_cell_.get_mut()
    }

    /// Tests if the lock is held by any number of readers or a writer.
    pub fn is_acquired(&self) -> bool {
        self.raw_lock_.is_acquired()
    }

    /// Return the number of readers that currently hold the lock.
    ///
    /// The result should be considered out of date the instant it is
    /// returned. Do not use it for synchronization purposes.
    #[inline(always)]
    pub fn reader_count(&self) -> usize {
        self.raw_lock_.reader_count()
    }

    #[inline(always)]
    pub fn policy(&self) -> Policy {
        self.raw_lock_.policy()
    }

    /// The underlying lock core, for inspection of its state. Releasing
    /// through it is `unsafe`; the guards are the owners of each acquisition.
    #[inline(always)]
    pub const fn raw(&self) -> &RawRwLock {
        &self.raw_lock_
    }

    pub(super) const fn data_cell(&self) -> &UnsafeCell<T> {
        &self.data_cell_
    }
}

impl<T> Default for RwLock<T>
where
    T: Default,
{
    fn default() -> Self {
        RwLock::new(T::default())
    }
}

impl<T> From<T> for RwLock<T> {
    fn from(data: T) -> Self {
        RwLock::new(data)
    }
}

impl<T> core::fmt::Debug for RwLock<T>
where
    T: ?Sized,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RwLock")
            .field("raw", &self.raw_lock_)
            .finish_non_exhaustive()
    }
}

unsafe impl<T> Send for RwLock<T>
where
    T: Send + ?Sized,
{}

unsafe impl<T> Sync for RwLock<T>
where
    T: Send + Sync + ?Sized,
{}
