use crate::core::detector;
use crate::core::types::{LockId, LockOpKind, new_lock_id};
use parking_lot::{Mutex as ParkingLotMutex, MutexGuard as ParkingLotMutexGuard};
use std::ops::{Deref, DerefMut};
use std::panic::Location;

/// A wrapper around a mutex that tracks lock operations for deadlock detection
///
/// The Mutex provides the same interface as a standard mutex but reports every
/// acquisition and release to the detector while detection is enabled. The
/// real lock is always taken exactly once per call, whatever the detector
/// finds.
///
/// # Example
///
/// ```rust
/// use lockwatch::Mutex;
/// use std::sync::Arc;
/// use std::thread;
///
/// let mutex = Arc::new(Mutex::new(42));
/// let mutex_clone = Arc::clone(&mutex);
///
/// thread::spawn(move || {
///     let mut data = mutex_clone.lock();
///     *data += 1;
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(*mutex.lock(), 43);
/// ```
pub struct Mutex<T> {
    /// Unique identifier for this mutex
    id: LockId,
    /// The wrapped mutex
    inner: ParkingLotMutex<T>,
}

/// Guard for a Mutex, reports lock release when dropped
pub struct MutexGuard<'a, T> {
    /// Lock that this guard is for
    lock_id: LockId,
    /// Where the lock was taken
    location: &'static Location<'static>,
    /// Whether the acquisition was recorded
    tracked: bool,
    /// The inner MutexGuard
    guard: ParkingLotMutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Create a new Mutex with an automatically assigned ID
    ///
    /// # Example
    ///
    /// ```rust
    /// use lockwatch::Mutex;
    ///
    /// let mutex = Mutex::new(42);
    /// ```
    pub fn new(value: T) -> Self {
        Mutex {
            id: new_lock_id(),
            inner: ParkingLotMutex::new(value),
        }
    }

    /// Get the ID of this mutex
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire the lock, recording the attempt first
    ///
    /// A self re-lock is reported before the underlying lock is attempted.
    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let location = Location::caller();
        let tracked =
            detector::is_enabled() && detector::record_op(self.id, LockOpKind::WriteLock, location);

        MutexGuard {
            lock_id: self.id,
            location,
            tracked,
            guard: self.inner.lock(),
        }
    }

    /// Try to acquire the lock without blocking
    ///
    /// Only a successful acquisition is recorded.
    #[track_caller]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let location = Location::caller();
        let guard = self.inner.try_lock()?;
        let tracked =
            detector::is_enabled() && detector::record_op(self.id, LockOpKind::WriteLock, location);

        Some(MutexGuard {
            lock_id: self.id,
            location,
            tracked,
            guard,
        })
    }

    /// Consumes this mutex, returning the underlying data
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Returns a mutable reference to the underlying data
    ///
    /// The mutable borrow statically guarantees no locks exist, so nothing is
    /// recorded.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Runs before `guard` is dropped, i.e. before the real unlock
        if self.tracked {
            detector::record_op(self.lock_id, LockOpKind::WriteUnlock, self.location);
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Mutex<T> {
        Mutex::new(Default::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(t: T) -> Self {
        Mutex::new(t)
    }
}
