//! Lock-order graph shared by per-thread subgraphs and the merged global graph
//!
//! Vertices are lock identities. An edge `A -> B` records that a thread held
//! `A` (on top of its stack) when it acquired `B`. Edges are kept in an arena
//! and identified by their index, so two edges between the same pair of locks
//! coming from different sessions stay distinct objects.

use crate::core::types::{LockId, LockOp, ThreadId};
use fxhash::{FxHashMap, FxHashSet};
use sha1::{Digest, Sha1};
use std::ops::ControlFlow;

/// Index of an edge in its graph's arena
pub type EdgeId = usize;

/// A directed lock-order edge
#[derive(Debug, Clone)]
pub struct LockEdge {
    /// Operation that was on top of the stack
    pub from: LockOp,
    /// Operation acquired while `from` was held
    pub to: LockOp,
    /// Merge that introduced this edge, 0 while still in a session
    pub generation: u64,
    /// Thread whose session produced the edge
    pub thread_id: ThreadId,
}

/// Content fingerprint of a subgraph, used only for deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 20]);

/// Directed lock-order graph
///
/// Start vertices and outgoing edges keep their insertion order, which makes
/// every traversal, and therefore every report, deterministic.
#[derive(Debug, Default)]
pub struct LockGraph {
    /// Thread that owns this graph (0 for the merged graph)
    owner: ThreadId,
    start_vertices: Vec<LockId>,
    start_set: FxHashSet<LockId>,
    pub(crate) edges: Vec<LockEdge>,
    adjacency: FxHashMap<LockId, Vec<EdgeId>>,
}

impl LockGraph {
    /// Create an empty graph not owned by any thread
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty subgraph for a thread session
    pub fn for_thread(owner: ThreadId) -> Self {
        LockGraph {
            owner,
            ..Self::default()
        }
    }

    /// Register a vertex a session started from
    pub fn add_start_vertex(&mut self, vertex: LockId) {
        if self.start_set.insert(vertex) {
            self.start_vertices.push(vertex);
        }
    }

    /// Record that `held` was on top of the stack when `acquired` was taken
    pub fn add_edge(&mut self, held: LockOp, acquired: LockOp) {
        let edge = LockEdge {
            from: held,
            to: acquired,
            generation: 0,
            thread_id: self.owner,
        };
        self.push_edge(edge);
    }

    /// Append an already built edge
    pub(crate) fn push_edge(&mut self, edge: LockEdge) -> EdgeId {
        let id = self.edges.len();
        self.adjacency
            .entry(edge.from.lock_id)
            .or_default()
            .push(id);
        self.edges.push(edge);
        id
    }

    /// A graph without edges carries no ordering information
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, id: EdgeId) -> &LockEdge {
        &self.edges[id]
    }

    pub fn start_vertices(&self) -> &[LockId] {
        &self.start_vertices
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Outgoing edges of `vertex` in insertion order
    pub fn outgoing(&self, vertex: LockId) -> &[EdgeId] {
        self.adjacency.get(&vertex).map_or(&[], Vec::as_slice)
    }

    /// Split into start vertices and edges, consuming the graph
    pub(crate) fn into_parts(self) -> (Vec<LockId>, Vec<LockEdge>) {
        (self.start_vertices, self.edges)
    }

    /// Traversal roots: start vertices first, then every edge source
    ///
    /// Every edge is reachable from its session's start vertex, the trailing
    /// sources only guarantee that nothing is skipped.
    pub(crate) fn roots(&self) -> Vec<LockId> {
        let mut seen = self.start_set.clone();
        let mut roots = self.start_vertices.clone();
        for edge in &self.edges {
            if seen.insert(edge.from.lock_id) {
                roots.push(edge.from.lock_id);
            }
        }
        roots
    }

    /// Depth-first walk over edges from every root
    ///
    /// See [`LockGraph::walk_edges_from`].
    pub fn walk_edges<A, V>(&self, admit: A, visit: V)
    where
        A: FnMut(&LockEdge) -> bool,
        V: FnMut(&[EdgeId]) -> ControlFlow<()>,
    {
        self.walk_edges_from(self.roots(), admit, visit);
    }

    /// Depth-first walk over edges starting at `roots`
    ///
    /// Each edge is traversed at most once per walk. Edges rejected by `admit`
    /// are neither visited nor followed. `visit` receives the current branch,
    /// from the root down to the edge just entered, and can stop the walk.
    pub fn walk_edges_from<R, A, V>(&self, roots: R, mut admit: A, mut visit: V)
    where
        R: IntoIterator<Item = LockId>,
        A: FnMut(&LockEdge) -> bool,
        V: FnMut(&[EdgeId]) -> ControlFlow<()>,
    {
        let mut explored = vec![false; self.edges.len()];
        let mut path: Vec<EdgeId> = Vec::new();
        // One cursor per frame: the root frame plus one per edge on `path`
        let mut cursors: Vec<usize> = Vec::new();

        for root in roots {
            path.clear();
            cursors.clear();
            cursors.push(0);

            while let Some(&cursor) = cursors.last() {
                let vertex = path.last().map_or(root, |&e| self.edges[e].to.lock_id);
                let out = self.outgoing(vertex);
                if cursor >= out.len() {
                    cursors.pop();
                    path.pop();
                    continue;
                }

                let depth = cursors.len() - 1;
                cursors[depth] += 1;

                let edge = out[cursor];
                if explored[edge] || !admit(&self.edges[edge]) {
                    continue;
                }
                explored[edge] = true;
                path.push(edge);
                if visit(&path).is_break() {
                    return;
                }
                cursors.push(0);
            }
        }
    }

    /// Fingerprint of the edge set in canonical traversal order
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha1::new();
        self.walk_edges(
            |_| true,
            |path| {
                if let Some(&id) = path.last() {
                    let edge = &self.edges[id];
                    hasher.update(
                        format!(
                            "{}@{}=>{}@{}\n",
                            edge.from.location, edge.from.lock_id, edge.to.location, edge.to.lock_id
                        )
                        .as_bytes(),
                    );
                }
                ControlFlow::Continue(())
            },
        );
        Fingerprint(hasher.finalize().into())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::types::LockOpKind;

    pub(crate) fn op(lock_id: LockId, line: u32) -> LockOp {
        LockOp::new(
            lock_id,
            LockOpKind::WriteLock,
            format!("src/app.rs:{line}"),
            format!("stack@{line}"),
        )
    }

    /// Build a session subgraph from a nested acquisition chain
    pub(crate) fn chain(owner: ThreadId, ops: &[LockOp]) -> LockGraph {
        let mut graph = LockGraph::for_thread(owner);
        graph.add_start_vertex(ops[0].lock_id);
        for pair in ops.windows(2) {
            graph.add_edge(pair[0].clone(), pair[1].clone());
        }
        graph
    }

    #[test]
    fn test_start_vertices_are_deduplicated_in_order() {
        let mut graph = LockGraph::new();
        graph.add_start_vertex(3);
        graph.add_start_vertex(1);
        graph.add_start_vertex(3);
        assert_eq!(graph.start_vertices(), &[3, 1]);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_edges_keep_owner_and_order() {
        let graph = chain(7, &[op(1, 10), op(2, 11), op(3, 12)]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.outgoing(1), &[0]);
        assert_eq!(graph.outgoing(2), &[1]);
        assert!(graph.outgoing(3).is_empty());
        assert_eq!(graph.edge(1).thread_id, 7);
        assert_eq!(graph.edge(1).generation, 0);
    }

    #[test]
    fn test_walk_reports_branches() {
        // 1 -> 2 -> 3 and 1 -> 4
        let mut graph = chain(1, &[op(1, 10), op(2, 11), op(3, 12)]);
        graph.add_edge(op(1, 10), op(4, 13));

        let mut branches = Vec::new();
        graph.walk_edges(
            |_| true,
            |path| {
                branches.push(path.to_vec());
                ControlFlow::Continue(())
            },
        );
        assert_eq!(branches, vec![vec![0], vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_walk_can_stop_early() {
        let graph = chain(1, &[op(1, 10), op(2, 11), op(3, 12), op(4, 13)]);
        let mut visited = 0;
        graph.walk_edges(
            |_| true,
            |_| {
                visited += 1;
                if visited == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        );
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_fingerprint_matches_identical_patterns() {
        let a = chain(1, &[op(1, 10), op(2, 11)]);
        let b = chain(2, &[op(1, 10), op(2, 11)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_sites_and_locks() {
        let base = chain(1, &[op(1, 10), op(2, 11)]);
        let other_site = chain(1, &[op(1, 10), op(2, 99)]);
        let other_lock = chain(1, &[op(1, 10), op(5, 11)]);
        assert_ne!(base.fingerprint(), other_site.fingerprint());
        assert_ne!(base.fingerprint(), other_lock.fingerprint());
    }
}
