//! Common Types
//!
//! Shared index types, numeric constants, solver options, the error taxonomy and
//! the statistics gathered by a solve.
//!

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// edge weights and dual variables are reals
pub type Weight = f64;

cfg_if::cfg_if! {
    if #[cfg(feature="u32_index")] {
        // use u32 to store indices, for less memory usage
        pub type VertexIndex = u32;
        pub type NodeIndex = u32;
        pub type EdgeIndex = u32;
        pub type TreeIndex = u32;
        pub type TreeEdgeIndex = u32;
    } else {
        pub type VertexIndex = usize;
        pub type NodeIndex = usize;
        pub type EdgeIndex = usize;
        pub type TreeIndex = usize;
        pub type TreeEdgeIndex = usize;
    }
}

/// tolerance of all floating-point comparisons; never compare slacks or duals
/// against exact zero
pub const EPS: Weight = 1e-9;

/// stands in for an unreachable slack or dual bound
pub const INFINITY: Weight = 1e100;

/// a dual update that wants to exceed this bound proves the graph has no
/// perfect matching; two orders of magnitude above any realistic slack
pub const NO_PERFECT_MATCHING_THRESHOLD: Weight = 1e10;

/// weight assumed by the plain graph when no weight overlay is attached
pub const DEFAULT_EDGE_WEIGHT: Weight = 1.0;

/// all failure surfaces of the crate; none of these are retried internally
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("the graph admits no perfect matching")]
    NoPerfectMatching,
    #[error("heap already melded into another heap")]
    HeapAlreadyMelded,
    #[error("invalid heap handle")]
    InvalidHeapHandle,
    #[error("new key is greater than the current key")]
    KeyNotDecreased,
    #[error("melding heaps with different comparators")]
    ComparatorMismatch,
}

/// whether the total matched weight is to be minimized or maximized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

/// warm-start strategy run before the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitializationType {
    /// one single-node tree per vertex, no matched edges
    None,
    /// greedy dual growth and matching of tight edges
    Greedy,
    /// greedy followed by a sequential fractional matching phase
    Fractional,
}

/// how the duals of all trees are advanced when a full primal sweep stalls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DualUpdateStrategy {
    MultipleTreeFixedDelta,
    MultipleTreeConnectedComponents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlossomOptions {
    #[serde(default = "default_initialization")]
    pub initialization: InitializationType,
    #[serde(default = "default_dual_update_strategy")]
    pub dual_update_strategy: DualUpdateStrategy,
    /// update the duals of a tree right before processing it
    #[serde(default = "default_true")]
    pub update_duals_before: bool,
    /// update the duals of a tree right after processing it
    #[serde(default = "default_false")]
    pub update_duals_after: bool,
}

fn default_initialization() -> InitializationType {
    InitializationType::Fractional
}

fn default_dual_update_strategy() -> DualUpdateStrategy {
    DualUpdateStrategy::MultipleTreeFixedDelta
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Default for BlossomOptions {
    fn default() -> Self {
        Self {
            initialization: default_initialization(),
            dual_update_strategy: default_dual_update_strategy(),
            update_duals_before: true,
            update_duals_after: false,
        }
    }
}

impl BlossomOptions {
    pub fn with_initialization(initialization: InitializationType) -> Self {
        Self {
            initialization,
            ..Self::default()
        }
    }
}

/// raw solver input: vertices are `0..vertex_num`, edges carry real weights;
/// the graph-trait entry points lower themselves into this form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverInput {
    pub vertex_num: VertexIndex,
    pub weighted_edges: Vec<(VertexIndex, VertexIndex, Weight)>,
}

impl SolverInput {
    pub fn new(vertex_num: VertexIndex, weighted_edges: Vec<(VertexIndex, VertexIndex, Weight)>) -> Self {
        Self {
            vertex_num,
            weighted_edges,
        }
    }

    pub fn sanity_check(&self) -> Result<(), MatchingError> {
        for &(u, v, _) in self.weighted_edges.iter() {
            if u >= self.vertex_num || v >= self.vertex_num {
                return Err(MatchingError::InvalidInput(format!(
                    "edge ({u}, {v}) references a vertex outside 0..{}",
                    self.vertex_num
                )));
            }
        }
        Ok(())
    }
}

/// a perfect matching on the input: indices into the input edge list plus the
/// total weight under the requested objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfectMatching {
    /// matched edges, by input edge index, sorted ascending
    pub edges: Vec<EdgeIndex>,
    /// sum of the original (unshifted, unnegated) weights of the matched edges
    pub weight: Weight,
}

/// dual solution: one value per odd-cardinality vertex set; singletons for
/// plain vertices, the full contracted set for each blossom with nonzero dual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualSolution {
    pub duals: BTreeMap<Vec<VertexIndex>, Weight>,
}

impl DualSolution {
    pub fn value(&self, set: &[VertexIndex]) -> Weight {
        self.duals.get(set).copied().unwrap_or(0.)
    }
}

/// counters and per-phase timings of a single solve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingStatistics {
    pub grow_num: usize,
    pub shrink_num: usize,
    pub expand_num: usize,
    pub augment_num: usize,
    /// nanoseconds spent in each phase
    pub grow_time: u128,
    pub augment_time: u128,
    pub shrink_time: u128,
    pub expand_time: u128,
    pub dual_update_time: u128,
}

impl MatchingStatistics {
    pub fn add_grow_time(&mut self, duration: Duration) {
        self.grow_time += duration.as_nanos();
    }
    pub fn add_augment_time(&mut self, duration: Duration) {
        self.augment_time += duration.as_nanos();
    }
    pub fn add_shrink_time(&mut self, duration: Duration) {
        self.shrink_time += duration.as_nanos();
    }
    pub fn add_expand_time(&mut self, duration: Duration) {
        self.expand_time += duration.as_nanos();
    }
    pub fn add_dual_update_time(&mut self, duration: Duration) {
        self.dual_update_time += duration.as_nanos();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        // cargo test options_defaults -- --nocapture
        let options = BlossomOptions::default();
        assert_eq!(options.initialization, InitializationType::Fractional);
        assert_eq!(options.dual_update_strategy, DualUpdateStrategy::MultipleTreeFixedDelta);
        assert!(options.update_duals_before);
        assert!(!options.update_duals_after);
        // missing fields deserialize to the defaults
        let options: BlossomOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.initialization, InitializationType::Fractional);
    }

    #[test]
    fn solver_input_sanity() {
        let input = SolverInput::new(3, vec![(0, 1, 1.), (1, 2, 2.)]);
        assert!(input.sanity_check().is_ok());
        let input = SolverInput::new(2, vec![(0, 2, 1.)]);
        assert!(matches!(input.sanity_check(), Err(MatchingError::InvalidInput(_))));
    }

    #[test]
    fn perfect_matching_serde_round_trip() {
        let matching = PerfectMatching {
            edges: vec![1, 3],
            weight: 10.,
        };
        let value = serde_json::to_string(&matching).unwrap();
        let loaded: PerfectMatching = serde_json::from_str(&value).unwrap();
        assert_eq!(loaded, matching);
    }
}
