use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread identifier type
///
/// Uniquely identifies a thread in the application. Used as the session key.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.with(|&id| id)
}

/// Lock identifier type
///
/// Uniquely identifies a lock instance for its whole lifetime. It is the
/// vertex key of the lock-order graph.
pub type LockId = usize;

// Global counter for generating unique lock IDs
static NEXT_LOCK_ID: AtomicUsize = AtomicUsize::new(1);

/// Allocate a fresh lock identity
///
/// Identities are never reused, so a lock dropped and a new one allocated at
/// the same address still land on different graph vertices.
pub fn new_lock_id() -> LockId {
    NEXT_LOCK_ID.fetch_add(1, Ordering::SeqCst)
}

/// The kind of operation a thread performed on a lock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LockOpKind {
    WriteLock,
    WriteUnlock,
    ReadLock,
    ReadUnlock,
}

impl LockOpKind {
    /// Whether this is an acquisition (read or write)
    pub fn is_lock(self) -> bool {
        matches!(self, LockOpKind::WriteLock | LockOpKind::ReadLock)
    }

    /// Whether this is a release (read or write)
    pub fn is_unlock(self) -> bool {
        matches!(self, LockOpKind::WriteUnlock | LockOpKind::ReadUnlock)
    }
}

/// One observed lock event
///
/// Captured by the lock wrappers right before the real primitive is touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockOp {
    /// Identity of the lock operated on
    pub lock_id: LockId,
    /// What happened to it
    pub kind: LockOpKind,
    /// Call site as `file:line`
    pub location: String,
    /// Captured call stack, empty when capture is off or failed
    pub stack: String,
}

impl LockOp {
    pub fn new(
        lock_id: LockId,
        kind: LockOpKind,
        location: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        LockOp {
            lock_id,
            kind,
            location: location.into(),
            stack: stack.into(),
        }
    }

    /// Two ops refer to the same lock instance
    pub fn same_lock(&self, other: &LockOp) -> bool {
        self.lock_id == other.lock_id
    }
}

/// The class of violation being reported
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeadlockKind {
    /// A thread acquired a lock it already holds
    SelfRelock,
    /// The lock-order graph contains a cycle
    Cyclic,
}

impl DeadlockKind {
    /// Stable numeric code used in text reports
    pub fn code(self) -> u8 {
        match self {
            DeadlockKind::SelfRelock => 1,
            DeadlockKind::Cyclic => 2,
        }
    }
}

impl fmt::Display for DeadlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlockKind::SelfRelock => f.write_str("self re-lock"),
            DeadlockKind::Cyclic => f.write_str("cyclic lock order"),
        }
    }
}

/// Represents one contributing thread of a detected violation
///
/// A self re-lock produces exactly one of these. A cyclic report carries one
/// per session that contributed an edge to the cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadlockInfo {
    /// Thread whose session produced this lock path
    pub thread_id: ThreadId,

    /// Call stack captured at the last acquisition of `lock_path`
    pub stack: String,

    /// Call sites of the acquisitions, outermost first
    pub lock_path: Vec<String>,
}
