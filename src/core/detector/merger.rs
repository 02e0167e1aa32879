//! Global lock-order graph
//!
//! Finished session subgraphs are deduplicated by fingerprint and merged here.
//! Each merge gets a new generation number that tags the edges it brought in,
//! and is immediately followed by a cycle search over the updated graph.

use crate::core::graph::{Fingerprint, LockEdge, LockGraph};
use crate::core::types::DeadlockInfo;
use fxhash::FxHashSet;

/// Result of offering a subgraph to the global graph
#[derive(Debug)]
pub enum MergeOutcome {
    /// The subgraph had no edges
    Empty,
    /// An identical subgraph was merged before
    Duplicate,
    /// The subgraph was merged under `generation`
    Merged {
        generation: u64,
        /// Contributing sessions of a cycle closed by this merge
        cycle: Option<Vec<DeadlockInfo>>,
    },
}

/// Union of every distinct subgraph merged so far
#[derive(Debug, Default)]
pub struct GlobalGraph {
    /// Number of merges performed
    generation: u64,
    merged: LockGraph,
    history: FxHashSet<Fingerprint>,
}

impl GlobalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint and merge `subgraph`
    pub fn merge(&mut self, subgraph: LockGraph) -> MergeOutcome {
        if subgraph.is_empty() {
            return MergeOutcome::Empty;
        }
        let fingerprint = subgraph.fingerprint();
        self.merge_fingerprinted(subgraph, fingerprint)
    }

    /// Merge `subgraph` whose fingerprint was computed by the caller
    ///
    /// Lets the hashing happen before the global lock is taken.
    pub fn merge_fingerprinted(
        &mut self,
        subgraph: LockGraph,
        fingerprint: Fingerprint,
    ) -> MergeOutcome {
        if subgraph.is_empty() {
            return MergeOutcome::Empty;
        }
        if !self.history.insert(fingerprint) {
            return MergeOutcome::Duplicate;
        }

        self.generation += 1;
        let generation = self.generation;

        let (start_vertices, edges) = subgraph.into_parts();
        for vertex in start_vertices {
            self.merged.add_start_vertex(vertex);
        }
        for edge in edges {
            self.merged.push_edge(LockEdge { generation, ..edge });
        }

        let cycle = self
            .merged
            .find_cycle(generation)
            .map(|cycle| self.merged.cycle_report(&cycle));

        MergeOutcome::Merged { generation, cycle }
    }

    /// Number of merges performed so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn graph(&self) -> &LockGraph {
        &self.merged
    }

    /// Forget every merged subgraph and fingerprint
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
