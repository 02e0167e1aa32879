pub mod merger;
pub mod reporter;
pub mod session;

use crate::core::detector::merger::{GlobalGraph, MergeOutcome};
use crate::core::detector::reporter::{DeadlockCallback, Reporter};
use crate::core::detector::session::{SessionMap, SessionStep};
use crate::core::graph::LockGraph;
#[cfg(feature = "logging")]
use crate::core::logger::{self, EventLogger};
use crate::core::stack::{capture_stack, set_stack_capture};
use crate::core::types::{
    DeadlockInfo, DeadlockKind, LockId, LockOp, LockOpKind, ThreadId, get_current_thread_id,
};
use parking_lot::Mutex;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};

/// Configuration for the global deadlock detector
pub struct DetectorConfig {
    /// Callback function to invoke when a violation is detected
    pub callback: DeadlockCallback,
    /// Capture a call stack on every acquisition
    pub capture_stacks: bool,
    /// Logger for recording lock operations and reports
    #[cfg(feature = "logging")]
    pub logger: Option<EventLogger>,
}

/// Lock-order deadlock detector
///
/// Tracks, per thread, the stack of held locks and the lock-order edges that
/// stack implies. When a thread's stack drains, its subgraph is merged into
/// the global graph, which is then searched for cycles.
///
/// # How it works
///
/// 1. Each lock operation is applied to the calling thread's session
/// 2. Acquiring a lock already on the session stack is reported as a self re-lock
/// 3. Nested acquisitions add an edge from the previous top of the stack
/// 4. Once the stack is empty, the session's subgraph is merged (unless an
///    identical one was merged before) and the global graph is searched for cycles
/// 5. Every violation is handed to the callback
///
/// A `Detector` is self-contained. The lock wrappers drive one process-wide
/// instance, but independent instances can be fed operations directly.
pub struct Detector {
    /// In-flight sessions keyed by thread
    sessions: SessionMap,
    /// Merged graph; held across merge and cycle search
    graph: Mutex<GlobalGraph>,
    /// Where violations go
    reporter: Reporter,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Create a detector that prints reports and exits the process
    pub fn new() -> Self {
        Detector {
            sessions: SessionMap::new(),
            graph: Mutex::new(GlobalGraph::new()),
            reporter: Reporter::default(),
        }
    }

    /// Create a detector with a custom callback
    pub fn with_callback(callback: DeadlockCallback) -> Self {
        Detector {
            sessions: SessionMap::new(),
            graph: Mutex::new(GlobalGraph::new()),
            reporter: Reporter::new(callback),
        }
    }

    /// Set callback to be invoked when a violation is detected
    pub fn set_deadlock_callback(&self, callback: DeadlockCallback) {
        self.reporter.set_callback(callback);
    }

    /// Apply one lock operation performed by `thread_id`
    ///
    /// Self re-locks are reported before returning, so a wrapper calling this
    /// ahead of the real acquisition reports before it could block. A drained
    /// session is merged and checked for cycles before returning.
    ///
    /// # Arguments
    /// * `thread_id` - Thread that performed the operation
    /// * `op` - The operation
    ///
    /// # Returns
    /// `false` if the operation was a self re-lock and was not added to the
    /// session. Its release must then not be recorded either.
    pub fn record_op(&self, thread_id: ThreadId, op: LockOp) -> bool {
        #[cfg(feature = "logging")]
        if logger::is_logging_enabled() {
            logger::log_lock_op(thread_id, &op);
        }

        let session = self.sessions.get_or_create(thread_id);
        let step = session.lock().apply(op);

        match step {
            SessionStep::Continue => true,
            SessionStep::Relock(info) => {
                self.dispatch(DeadlockKind::SelfRelock, vec![info]);
                false
            }
            SessionStep::Drained(subgraph) => {
                if self.sessions.retire(thread_id, &session) {
                    self.merge(subgraph);
                }
                true
            }
        }
    }

    /// Merge a finished subgraph and report the cycle it closes, if any
    fn merge(&self, subgraph: LockGraph) {
        if subgraph.is_empty() {
            return;
        }
        let fingerprint = subgraph.fingerprint();

        let outcome = self.graph.lock().merge_fingerprinted(subgraph, fingerprint);

        if let MergeOutcome::Merged {
            cycle: Some(infos), ..
        } = outcome
        {
            self.dispatch(DeadlockKind::Cyclic, infos);
        }
    }

    fn dispatch(&self, kind: DeadlockKind, infos: Vec<DeadlockInfo>) {
        #[cfg(feature = "logging")]
        if logger::is_logging_enabled() {
            logger::log_deadlock(kind, &infos);
        }

        self.reporter.report(kind, infos);
    }

    /// Forget all in-flight sessions and everything merged so far
    pub fn reset(&self) {
        self.sessions.clear();
        self.graph.lock().reset();
    }

    /// Number of threads currently holding tracked locks
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Number of distinct subgraphs merged so far
    pub fn generation(&self) -> u64 {
        self.graph.lock().generation()
    }
}

// Global detector instance driven by the lock wrappers
lazy_static::lazy_static! {
    static ref GLOBAL_DETECTOR: Detector = Detector::new();
}

/// Global detection switch
static ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize the global detector with the provided configuration
///
/// Installs the callback, resets all session state and the merged graph, and
/// turns detection on.
///
/// # Arguments
/// * `config` - The configuration object for the detector
pub fn init_detector(config: DetectorConfig) {
    GLOBAL_DETECTOR.set_deadlock_callback(config.callback);
    set_stack_capture(config.capture_stacks);

    #[cfg(feature = "logging")]
    if let Some(logger) = config.logger {
        logger::init_logger(logger);
    }

    GLOBAL_DETECTOR.reset();
    ENABLED.store(true, Ordering::SeqCst);
}

/// Turn detection off
///
/// Locks acquired from now on are not tracked. Guards taken while detection
/// was on still report their release.
pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst);
}

/// Whether detection is currently on
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Record a lock operation of the current thread with the global detector
///
/// This is the hook the lock wrappers call right before touching the real
/// primitive. Custom primitives can call it too; they are expected to check
/// [`is_enabled`] first and to record the release of every acquisition that
/// was tracked.
///
/// # Arguments
/// * `lock_id` - Identity of the lock, see [`crate::new_lock_id`]
/// * `kind` - Operation performed
/// * `location` - Call site of the operation
///
/// # Returns
/// Whether the operation was tracked. A reported self re-lock is not, and
/// its release should be skipped.
pub fn record_op(lock_id: LockId, kind: LockOpKind, location: &Location<'_>) -> bool {
    let stack = if kind.is_lock() {
        capture_stack()
    } else {
        String::new()
    };
    let op = LockOp::new(
        lock_id,
        kind,
        format!("{}:{}", location.file(), location.line()),
        stack,
    );
    GLOBAL_DETECTOR.record_op(get_current_thread_id(), op)
}
