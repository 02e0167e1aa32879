//! # Lockwatch
//!
//! A runtime lock-order deadlock detector.
//!
//! Lockwatch wraps `Mutex` and `RwLock` and records every acquisition and
//! release. Each thread's nested acquisitions become lock-order edges; once the
//! thread releases everything, its edges are merged into a global graph and a
//! cycle in that graph is reported as a potential deadlock, even if the run
//! never actually hung.
//!
//! ## Features
//!
//! - Self re-lock detection, reported before the thread blocks
//! - Cyclic lock-order detection across threads, with one lock path per thread
//! - Deduplication of repeated locking patterns
//! - Optional JSON lines event log and a replay tool (`logging` feature)
//!
//! ## Example
//!
//! ```rust,no_run
//! use lockwatch::{Lockwatch, Mutex, format_report};
//!
//! Lockwatch::new()
//!     .callback(|kind, infos| eprintln!("{}", format_report(kind, &infos)))
//!     .start()
//!     .expect("Failed to start lockwatch");
//!
//! let a = Mutex::new(0);
//! let b = Mutex::new(0);
//! {
//!     let _a = a.lock();
//!     let _b = b.lock();
//! }
//! {
//!     let _b = b.lock();
//!     let _a = a.lock(); // reported once this block releases both
//! }
//! ```

mod core;
pub use core::{
    DeadlockCallback, Detector, Lockwatch, default_callback, disable, format_report, is_enabled,
    locks::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
    record_op,
    types::{
        DeadlockInfo, DeadlockKind, LockId, LockOp, LockOpKind, ThreadId, get_current_thread_id,
        new_lock_id,
    },
};

#[cfg(feature = "logging")]
pub use core::logger::{EventLogger, LogEntry, flush_logs, get_current_log_file};
