//! Event logger for recording lock operations and detection reports
//!
//! Entries are written as JSON lines by a background writer thread, so the
//! threads being observed only pay for a channel send. The resulting file can
//! be replayed through a fresh detector with the `lockwatch` binary.

use crate::core::types::{DeadlockInfo, DeadlockKind, LockOp, ThreadId};
use anyhow::{Context, Result};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// A single line of the event log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    /// A lock operation as seen by the detector
    Op {
        thread_id: ThreadId,
        op: LockOp,
        /// Seconds since Unix Epoch
        timestamp: f64,
    },
    /// A violation handed to the callback
    Deadlock {
        kind: DeadlockKind,
        infos: Vec<DeadlockInfo>,
        timestamp: f64,
    },
}

/// Commands for controlling the logger thread
#[derive(Debug)]
enum LoggerCommand {
    /// Write a log entry to the file
    Entry(LogEntry),
    /// Flush all pending entries to disk and signal completion
    Flush(Sender<()>),
}

/// Event logger writing JSON lines through a background thread
pub struct EventLogger {
    /// Channel sender for communication with the writer thread
    sender: Sender<LoggerCommand>,
    /// Flag indicating if a flush operation is in progress
    flushing: Arc<AtomicBool>,
    /// File being written
    path: PathBuf,
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Warning: Failed to flush logs during EventLogger drop: {e:?}");
        }
    }
}

impl EventLogger {
    /// Create a logger that writes to the specified file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If it contains "{timestamp}", that is
    ///   replaced with the current timestamp. Missing parent directories are created.
    ///
    /// # Errors
    /// Returns an error if the directory or the file cannot be created
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = expand_timestamp(path.as_ref());

        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&file_path)
            .with_context(|| format!("Failed to open log file {}", file_path.display()))?;

        CURRENT_LOG_FILE.lock().replace(file_path.clone());

        let (tx, rx) = unbounded::<LoggerCommand>();
        thread::Builder::new()
            .name("lockwatch-logger".into())
            .spawn(move || logger_thread(file, rx))
            .context("Failed to spawn logger thread")?;

        Ok(EventLogger {
            sender: tx,
            flushing: Arc::new(AtomicBool::new(false)),
            path: file_path,
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue an entry; never blocks
    pub fn log(&self, entry: LogEntry) {
        if let Err(e) = self.sender.send(LoggerCommand::Entry(entry)) {
            eprintln!("Failed to send log entry: {e:?}");
        }
    }

    /// Log a lock operation
    pub fn log_lock_op(&self, thread_id: ThreadId, op: &LockOp) {
        self.log(LogEntry::Op {
            thread_id,
            op: op.clone(),
            timestamp: now(),
        });
    }

    /// Log a detected violation
    pub fn log_deadlock(&self, kind: DeadlockKind, infos: &[DeadlockInfo]) {
        self.log(LogEntry::Deadlock {
            kind,
            infos: infos.to_vec(),
            timestamp: now(),
        });
    }

    /// Force flush all pending log entries to disk
    ///
    /// Blocks until the writer thread confirms.
    ///
    /// # Errors
    /// Returns an error if the writer thread is gone or does not answer in time
    pub fn flush(&self) -> Result<()> {
        // Another thread is already flushing
        if self
            .flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let result = (|| {
            let (flush_tx, flush_rx) = crossbeam_channel::bounded(1);
            self.sender
                .send(LoggerCommand::Flush(flush_tx))
                .context("Logger thread is gone")?;
            flush_rx
                .recv_timeout(FLUSH_TIMEOUT)
                .context("Flush operation timed out")
        })();

        self.flushing.store(false, Ordering::SeqCst);
        result
    }
}

lazy_static::lazy_static! {
    static ref CURRENT_LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Path of the most recently opened log file
pub fn get_current_log_file() -> Option<PathBuf> {
    CURRENT_LOG_FILE.lock().clone()
}

/// Absolute timestamp: seconds since Unix Epoch with microsecond precision
fn now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0
}

#[allow(clippy::literal_string_with_formatting_args)]
fn expand_timestamp(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.contains("{timestamp}") {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(raw.replace("{timestamp}", &timestamp))
    } else {
        path.to_path_buf()
    }
}

/// Writer loop: one JSON object per line, flushed per entry
fn logger_thread(file: File, rx: Receiver<LoggerCommand>) {
    let mut writer = BufWriter::new(file);

    while let Ok(cmd) = rx.recv() {
        match cmd {
            LoggerCommand::Entry(entry) => {
                if let Ok(json) = serde_json::to_string(&entry)
                    && let Err(e) = writeln!(writer, "{json}").and_then(|_| writer.flush())
                {
                    eprintln!("Logger write error: {e:?}");
                }
            }
            LoggerCommand::Flush(responder) => {
                if let Err(e) = writer.flush() {
                    eprintln!("Logger flush error: {e:?}");
                }
                let _ = responder.send(());
            }
        }
    }

    if let Err(e) = writer.flush() {
        eprintln!("Logger final flush error: {e:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LockOpKind;
    use tempfile::TempDir;

    fn read_entries(path: &Path) -> Vec<LogEntry> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_basic_logging() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("basic.log");
        let logger = EventLogger::with_file(&log_path).unwrap();

        let op = LockOp::new(10, LockOpKind::WriteLock, "a.rs:1", "stack");
        logger.log_lock_op(1, &op);
        logger.log_lock_op(1, &LockOp::new(10, LockOpKind::WriteUnlock, "a.rs:1", ""));
        logger.flush().unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"op\""));
        assert!(lines[0].contains("\"thread_id\":1"));
        assert!(lines[0].contains("\"WriteLock\""));

        let entries = read_entries(&log_path);
        assert!(matches!(&entries[0], LogEntry::Op { op: logged, .. } if *logged == op));
    }

    #[test]
    fn test_deadlock_entry() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("deadlock.log");
        let logger = EventLogger::with_file(&log_path).unwrap();

        let info = DeadlockInfo {
            thread_id: 3,
            stack: String::new(),
            lock_path: vec!["a.rs:1".into(), "a.rs:1".into()],
        };
        logger.log_deadlock(DeadlockKind::SelfRelock, &[info.clone()]);
        logger.flush().unwrap();

        let entries = read_entries(&log_path);
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            LogEntry::Deadlock { kind, infos, .. } => {
                assert_eq!(*kind, DeadlockKind::SelfRelock);
                assert_eq!(infos, &vec![info]);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_flush_idempotence() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("flush_test.log");
        let logger = EventLogger::with_file(&log_path).unwrap();

        for i in 0..10 {
            logger.log_lock_op(i, &LockOp::new(i, LockOpKind::ReadLock, "r.rs:1", ""));
        }

        logger.flush().unwrap();
        logger.flush().unwrap();
        logger.flush().unwrap();

        assert_eq!(read_entries(&log_path).len(), 10);
    }

    #[test]
    fn test_creates_directories_and_expands_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested/dir/run_{timestamp}.log");
        let logger = EventLogger::with_file(&log_path).unwrap();

        let written = logger.path().to_path_buf();
        assert!(written.exists());
        assert!(!written.to_string_lossy().contains("{timestamp}"));
    }

    #[test]
    fn test_logger_drop_flushes() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("drop_test.log");

        {
            let logger = EventLogger::with_file(&log_path).unwrap();
            logger.log_lock_op(1, &LockOp::new(1, LockOpKind::WriteLock, "a.rs:1", ""));
        }

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("\"thread_id\":1"));
    }
}
