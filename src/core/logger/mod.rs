//! Event log of lock operations and detection reports
//!
//! One process-wide logger can be installed with [`init_logger`]. The detector
//! forwards every operation and every report to it while it is installed.

mod event_logger;

pub use event_logger::{EventLogger, LogEntry, get_current_log_file};

use crate::core::types::{DeadlockInfo, DeadlockKind, LockOp, ThreadId};
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fast check for the hot path; set while a global logger is installed
pub static LOGGING_ENABLED: AtomicBool = AtomicBool::new(false);

lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: RwLock<Option<EventLogger>> = RwLock::new(None);
}

/// Install the global logger, replacing (and flushing) any previous one
pub fn init_logger(logger: EventLogger) {
    let previous = GLOBAL_LOGGER.write().replace(logger);
    LOGGING_ENABLED.store(true, Ordering::SeqCst);
    drop(previous);
}

/// Whether a global logger is installed
pub fn is_logging_enabled() -> bool {
    LOGGING_ENABLED.load(Ordering::Relaxed)
}

pub fn log_lock_op(thread_id: ThreadId, op: &LockOp) {
    if let Some(logger) = GLOBAL_LOGGER.read().as_ref() {
        logger.log_lock_op(thread_id, op);
    }
}

pub fn log_deadlock(kind: DeadlockKind, infos: &[DeadlockInfo]) {
    if let Some(logger) = GLOBAL_LOGGER.read().as_ref() {
        logger.log_deadlock(kind, infos);
    }
}

/// Flush the global logger, if any
///
/// # Errors
/// Returns an error if the writer thread does not confirm the flush
pub fn flush_logs() -> Result<()> {
    match GLOBAL_LOGGER.read().as_ref() {
        Some(logger) => logger.flush(),
        None => Ok(()),
    }
}
