//! Graph module for deadlock detection
//!
//! - Lock graph: lock-order edges collected per session and merged globally
//! - Cycle search: finds cyclic acquisition orders and rebuilds the lock paths
//!   of the sessions involved

mod cycle;
pub(crate) mod lock_graph;

pub use lock_graph::{EdgeId, Fingerprint, LockEdge, LockGraph};
