//! Per-thread lock sessions
//!
//! A session lives while its thread holds at least one tracked lock. It keeps
//! the stack of held operations and the subgraph built from that stack.

use crate::core::graph::LockGraph;
use crate::core::types::{DeadlockInfo, LockOp, ThreadId};
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// What the tracker has to do after applying one operation
#[derive(Debug)]
pub enum SessionStep {
    /// Nothing beyond the session itself changed
    Continue,
    /// The thread acquired a lock it already holds
    Relock(DeadlockInfo),
    /// The stack drained; the finished subgraph must be merged
    Drained(LockGraph),
}

/// Lock bookkeeping of one thread
#[derive(Debug)]
pub struct Session {
    thread_id: ThreadId,
    /// Currently held operations, oldest first
    active: Vec<LockOp>,
    graph: LockGraph,
}

impl Session {
    pub fn new(thread_id: ThreadId) -> Self {
        Session {
            thread_id,
            active: Vec::new(),
            graph: LockGraph::for_thread(thread_id),
        }
    }

    /// Operations currently held, oldest first
    pub fn held(&self) -> &[LockOp] {
        &self.active
    }

    /// Apply one lock or unlock operation
    ///
    /// An acquisition of a lock already on the stack is a self re-lock: it is
    /// reported with the whole stack plus the new op as lock path and leaves
    /// the session untouched. Releases remove the most recent matching entry,
    /// so non-LIFO release orders are fine.
    pub fn apply(&mut self, op: LockOp) -> SessionStep {
        if op.kind.is_lock() {
            if self.active.iter().any(|held| held.same_lock(&op)) {
                let mut lock_path: Vec<String> =
                    self.active.iter().map(|held| held.location.clone()).collect();
                lock_path.push(op.location.clone());
                return SessionStep::Relock(DeadlockInfo {
                    thread_id: self.thread_id,
                    stack: op.stack,
                    lock_path,
                });
            }

            match self.active.last() {
                None => self.graph.add_start_vertex(op.lock_id),
                Some(top) => self.graph.add_edge(top.clone(), op.clone()),
            }
            self.active.push(op);
            return SessionStep::Continue;
        }

        if let Some(index) = self.active.iter().rposition(|held| held.same_lock(&op)) {
            self.active.remove(index);
        }

        if self.active.is_empty() {
            SessionStep::Drained(std::mem::replace(
                &mut self.graph,
                LockGraph::for_thread(self.thread_id),
            ))
        } else {
            SessionStep::Continue
        }
    }
}

/// Shared session registry keyed by thread
///
/// Lookups take the read lock; only creating and retiring a session takes
/// the write lock. Each session is only ever driven by its own thread, so the
/// per-session mutex is uncontended outside of resets.
#[derive(Default)]
pub struct SessionMap {
    sessions: RwLock<FxHashMap<ThreadId, Arc<Mutex<Session>>>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session of `thread_id`, creating it on first use
    pub fn get_or_create(&self, thread_id: ThreadId) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().get(&thread_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write();
        Arc::clone(
            sessions
                .entry(thread_id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(thread_id)))),
        )
    }

    /// Retire `session` if it is still the one registered for `thread_id`
    ///
    /// # Returns
    /// `false` if the map was reset since the session was handed out
    pub fn retire(&self, thread_id: ThreadId, session: &Arc<Mutex<Session>>) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(&thread_id) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&thread_id);
                true
            }
            _ => false,
        }
    }

    /// Drop every in-flight session
    pub fn clear(&self) {
        self.sessions.write().clear();
    }

    /// Number of threads currently holding tracked locks
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
