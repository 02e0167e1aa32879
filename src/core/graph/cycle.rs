//! Cycle search and lock-path reconstruction over a [`LockGraph`]

use crate::core::graph::lock_graph::{EdgeId, LockGraph};
use crate::core::types::{DeadlockInfo, LockId, LockOp};
use fxhash::FxHashSet;
use std::ops::ControlFlow;

impl LockGraph {
    /// Find a cycle that contains at least one edge of `since_generation` or newer
    ///
    /// Every cycle closed by a merge runs through one of the edges that merge
    /// brought in, so the search is anchored on those. For each such edge
    /// `u -> v`, in arena order, a depth-first walk from `v` looks for a way
    /// back to `u`. Cycles made only of older edges are never looked at.
    ///
    /// # Returns
    /// The edges of the first cycle found, rotated to start at the oldest
    /// edge, or `None`.
    pub fn find_cycle(&self, since_generation: u64) -> Option<Vec<EdgeId>> {
        for (id, edge) in self.edges.iter().enumerate() {
            if edge.generation < since_generation {
                continue;
            }
            let Some(back) = self.path_between(edge.to.lock_id, edge.from.lock_id) else {
                continue;
            };

            let mut cycle = Vec::with_capacity(back.len() + 1);
            cycle.push(id);
            cycle.extend(back);
            let oldest = cycle
                .iter()
                .enumerate()
                .min_by_key(|&(_, &e)| e)
                .map_or(0, |(i, _)| i);
            cycle.rotate_left(oldest);
            return Some(cycle);
        }

        None
    }

    /// Edges of a path from `source` to `target`, empty if they are the same vertex
    ///
    /// Iterative depth-first walk in adjacency order; each vertex is entered
    /// at most once, so the path is simple.
    fn path_between(&self, source: LockId, target: LockId) -> Option<Vec<EdgeId>> {
        if source == target {
            return Some(Vec::new());
        }

        let mut visited = FxHashSet::default();
        visited.insert(source);
        let mut path: Vec<EdgeId> = Vec::new();
        let mut cursors: Vec<usize> = vec![0];

        while let Some(&cursor) = cursors.last() {
            let vertex = path.last().map_or(source, |&e| self.edges[e].to.lock_id);
            let out = self.outgoing(vertex);
            if cursor >= out.len() {
                cursors.pop();
                path.pop();
                continue;
            }

            let depth = cursors.len() - 1;
            cursors[depth] += 1;

            let edge = out[cursor];
            let next = self.edges[edge].to.lock_id;
            if next == target {
                path.push(edge);
                return Some(path);
            }
            if visited.insert(next) {
                path.push(edge);
                cursors.push(0);
            }
        }

        None
    }

    /// Rebuild the acquisition sequence of the session that produced `edge`
    ///
    /// Only edges of the same generation are followed, starting from the
    /// vertex that session started with. The result runs from the session's
    /// first lock down to `edge.to`.
    pub fn contributing_path(&self, edge: EdgeId) -> Vec<&LockOp> {
        let generation = self.edges[edge].generation;
        let root = self
            .edges
            .iter()
            .find(|e| e.generation == generation)
            .map(|e| e.from.lock_id);

        let mut found = Vec::new();
        if let Some(root) = root {
            self.walk_edges_from(
                [root],
                |e| e.generation == generation,
                |path| {
                    if path.last() == Some(&edge) {
                        found = path.to_vec();
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            );
        }
        if found.is_empty() {
            found.push(edge);
        }

        let mut ops = Vec::with_capacity(found.len() + 1);
        ops.push(&self.edges[found[0]].from);
        ops.extend(found.iter().map(|&e| &self.edges[e].to));
        ops
    }

    /// Turn a cycle into one [`DeadlockInfo`] per contributing session
    ///
    /// Edges are grouped by generation. The first edge of each generation
    /// along the cycle represents it, and infos come out in that order.
    pub fn cycle_report(&self, cycle: &[EdgeId]) -> Vec<DeadlockInfo> {
        let mut seen = FxHashSet::default();
        cycle
            .iter()
            .copied()
            .filter(|&e| seen.insert(self.edges[e].generation))
            .map(|representative| {
                let edge = &self.edges[representative];
                DeadlockInfo {
                    thread_id: edge.thread_id,
                    stack: edge.to.stack.clone(),
                    lock_path: self
                        .contributing_path(representative)
                        .into_iter()
                        .map(|op| op.location.clone())
                        .collect(),
                }
            })
            .collect()
    }
}
