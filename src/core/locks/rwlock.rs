//! A tracked reader-writer lock for deadlock detection
//!
//! Read and write acquisitions are both recorded as lock-order edges, so a
//! reader holding `A` then `B` and a writer taking `B` then `A` form a cycle.
//!
//! # Example
//!
//! ```rust
//! use lockwatch::RwLock;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let lock = Arc::new(RwLock::new(10));
//! let lock_clone = Arc::clone(&lock);
//!
//! thread::spawn(move || {
//!     let data = lock_clone.read();
//!     println!("Read: {}", *data);
//! })
//! .join()
//! .unwrap();
//!
//! let mut data = lock.write();
//! *data += 1;
//! ```

use crate::core::detector;
use crate::core::types::{LockId, LockOpKind, new_lock_id};
use parking_lot::{
    RwLock as ParkingLotRwLock, RwLockReadGuard as ParkingLotReadGuard,
    RwLockWriteGuard as ParkingLotWriteGuard,
};
use std::ops::{Deref, DerefMut};
use std::panic::Location;

/// A wrapper around a reader-writer lock that tracks operations for deadlock detection
pub struct RwLock<T> {
    /// Unique identifier for this lock
    id: LockId,
    /// The wrapped RwLock
    inner: ParkingLotRwLock<T>,
}

/// Guard for a shared (read) lock, reports release when dropped
pub struct RwLockReadGuard<'a, T> {
    lock_id: LockId,
    location: &'static Location<'static>,
    tracked: bool,
    guard: ParkingLotReadGuard<'a, T>,
}

/// Guard for an exclusive (write) lock, reports release when dropped
pub struct RwLockWriteGuard<'a, T> {
    lock_id: LockId,
    location: &'static Location<'static>,
    tracked: bool,
    guard: ParkingLotWriteGuard<'a, T>,
}

/// Record an acquisition if detection is on, returning whether it was tracked
///
/// A re-entrant read is reported but not tracked, so its release leaves the
/// outer hold in place.
fn track(lock_id: LockId, kind: LockOpKind, location: &'static Location<'static>) -> bool {
    detector::is_enabled() && detector::record_op(lock_id, kind, location)
}

impl<T> RwLock<T> {
    /// Create a new tracked RwLock with a unique ID
    ///
    /// # Example
    ///
    /// ```rust
    /// use lockwatch::RwLock;
    /// let lock = RwLock::new(42);
    /// ```
    pub fn new(value: T) -> Self {
        RwLock {
            id: new_lock_id(),
            inner: ParkingLotRwLock::new(value),
        }
    }

    /// Get the unique ID of this lock
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire a shared (read) lock, recording the attempt first
    #[track_caller]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let location = Location::caller();
        let tracked = track(self.id, LockOpKind::ReadLock, location);
        RwLockReadGuard {
            lock_id: self.id,
            location,
            tracked,
            guard: self.inner.read(),
        }
    }

    /// Acquire an exclusive (write) lock, recording the attempt first
    #[track_caller]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let location = Location::caller();
        let tracked = track(self.id, LockOpKind::WriteLock, location);
        RwLockWriteGuard {
            lock_id: self.id,
            location,
            tracked,
            guard: self.inner.write(),
        }
    }

    /// Try to acquire a shared (read) lock; only success is recorded
    #[track_caller]
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        let location = Location::caller();
        let guard = self.inner.try_read()?;
        Some(RwLockReadGuard {
            lock_id: self.id,
            location,
            tracked: track(self.id, LockOpKind::ReadLock, location),
            guard,
        })
    }

    /// Try to acquire an exclusive (write) lock; only success is recorded
    #[track_caller]
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        let location = Location::caller();
        let guard = self.inner.try_write()?;
        Some(RwLockWriteGuard {
            lock_id: self.id,
            location,
            tracked: track(self.id, LockOpKind::WriteLock, location),
            guard,
        })
    }

    /// Consumes this RwLock, returning the underlying data
    ///
    /// # Example
    ///
    /// ```rust
    /// use lockwatch::RwLock;
    ///
    /// let lock = RwLock::new(String::from("hello"));
    /// assert_eq!(lock.into_inner(), "hello");
    /// ```
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Returns a mutable reference to the underlying data
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

// --- Guard Implementations ---

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}
impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        if self.tracked {
            detector::record_op(self.lock_id, LockOpKind::ReadUnlock, self.location);
        }
    }
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}
impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}
impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        if self.tracked {
            detector::record_op(self.lock_id, LockOpKind::WriteUnlock, self.location);
        }
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> RwLock<T> {
        RwLock::new(Default::default())
    }
}

impl<T> From<T> for RwLock<T> {
    fn from(t: T) -> Self {
        RwLock::new(t)
    }
}
