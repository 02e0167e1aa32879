use crate::core::types::{DeadlockInfo, DeadlockKind};
use parking_lot::RwLock;
use std::fmt::Write as _;
use std::sync::Arc;

/// Sink invoked once per detected violation
pub type DeadlockCallback = Arc<dyn Fn(DeadlockKind, Vec<DeadlockInfo>) + Send + Sync>;

/// Dispatches detection results to the configured callback
///
/// Delivery is synchronous on the detecting thread and happens outside of
/// every detector lock. Whether the process survives is up to the callback.
pub struct Reporter {
    callback: RwLock<DeadlockCallback>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(default_callback())
    }
}

impl Reporter {
    pub fn new(callback: DeadlockCallback) -> Self {
        Reporter {
            callback: RwLock::new(callback),
        }
    }

    pub fn set_callback(&self, callback: DeadlockCallback) {
        *self.callback.write() = callback;
    }

    /// Deliver one report
    pub fn report(&self, kind: DeadlockKind, infos: Vec<DeadlockInfo>) {
        let callback = Arc::clone(&self.callback.read());
        callback(kind, infos);
    }
}

/// The callback used when none is configured: print the report and exit
pub fn default_callback() -> DeadlockCallback {
    Arc::new(|kind: DeadlockKind, infos: Vec<DeadlockInfo>| {
        eprintln!("{}", format_report(kind, &infos));
        std::process::exit(1);
    })
}

/// Render a report as text
///
/// # Example
/// ```text
/// deadlockType:2
/// #################thread 0 info#################
/// lockPath:
/// src/a.rs:10
/// src/a.rs:11
/// stack:
/// ...
/// ```
pub fn format_report(kind: DeadlockKind, infos: &[DeadlockInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "deadlockType:{}", kind.code());
    for (i, info) in infos.iter().enumerate() {
        let _ = writeln!(out, "#################thread {i} info#################");
        let _ = writeln!(out, "lockPath:\n{}", info.lock_path.join("\n"));
        let _ = writeln!(out, "stack:\n{}", info.stack);
    }
    out
}
