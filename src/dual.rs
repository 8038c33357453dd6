//! Dual Updater
//!
//! Advances the lazy `eps` of the alternating trees as far as dual feasibility
//! allows. The in-tree bound of a tree is the minimum over its (+, infinity)
//! slack, its smallest minus-blossom dual and half its smallest in-tree (+, +)
//! slack; cross-tree edges couple the trees and are handled per strategy:
//! a single tree against fixed neighbors, one fixed delta for every tree, or
//! one delta per component of trees connected by tight (+, -) edges.
//!

use super::state::State;
use super::util::*;
use log::trace;
use std::time::Instant;

/// what a dual update pass achieved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DualOutcome {
    /// a cross-tree (+, +) edge became tight and was augmented along
    Augmented,
    /// duals advanced by a positive amount (the largest single increase)
    Progress(Weight),
    NoProgress,
}

impl DualOutcome {
    pub fn made_progress(&self) -> bool {
        !matches!(self, DualOutcome::NoProgress)
    }
}

impl State {
    /// largest admissible eps of `tree` respecting only in-tree constraints
    fn eps_max_in_tree(&mut self, tree: TreeIndex) -> Result<Weight, MatchingError> {
        let mut bound = INFINITY;
        if let Some(key) = self.heaps.min_key(self.trees[tree as usize].plus_infinity_edges)? {
            bound = bound.min(key);
        }
        if let Some(key) = self.heaps.min_key(self.trees[tree as usize].minus_blossoms)? {
            bound = bound.min(key);
        }
        if let Some(key) = self.heaps.min_key(self.trees[tree as usize].plus_plus_edges)? {
            bound = bound.min(key / 2.);
        }
        Ok(bound)
    }

    /// the cheapest (+, +) cross-tree edge over all tree edges of `tree`, as
    /// (true slack, edge)
    fn cheapest_cross_plus_plus(&mut self, tree: TreeIndex) -> Result<Option<(Weight, EdgeIndex)>, MatchingError> {
        let mut best: Option<(Weight, EdgeIndex)> = None;
        let eps = self.trees[tree as usize].eps;
        for (tree_edge, dir) in self.tree_edges_of(tree) {
            let other = self.tree_edge(tree_edge).head[dir];
            let other_eps = self.trees[other as usize].eps;
            let heap = self.tree_edge(tree_edge).plus_plus_edges;
            if let Some(handle) = self.heaps.find_min(heap)? {
                let slack = self.heaps.key(handle)? - eps - other_eps;
                let edge = self.heaps.payload(handle)?.expect_edge();
                if best.map(|(s, _)| slack < s).unwrap_or(true) {
                    best = Some((slack, edge));
                }
            }
        }
        Ok(best)
    }

    /// single-tree strategy: push this tree's eps as far as its own constraints
    /// and its fixed neighbors allow, augmenting if a (+, +) edge goes tight
    pub fn update_duals_single(&mut self, tree: TreeIndex) -> Result<DualOutcome, MatchingError> {
        let start = Instant::now();
        let eps = self.trees[tree as usize].eps;
        let mut bound = self.eps_max_in_tree(tree)?;
        for (tree_edge, dir) in self.tree_edges_of(tree) {
            let other = self.tree_edge(tree_edge).head[dir];
            let other_eps = self.trees[other as usize].eps;
            if let Some(key) = self.heaps.min_key(self.tree_edge(tree_edge).plus_plus_edges)? {
                // the other tree's eps is assumed fixed
                bound = bound.min(key - other_eps);
            }
            // (+, -) edges whose minus endpoint is in the other tree
            if let Some(key) = self.heaps.min_key(self.tree_edge(tree_edge).plus_minus_edges[dir])? {
                bound = bound.min(key + other_eps);
            }
        }
        if bound >= NO_PERFECT_MATCHING_THRESHOLD {
            return Err(MatchingError::NoPerfectMatching);
        }
        let advanced = bound > eps + EPS;
        if advanced {
            self.trees[tree as usize].eps = bound;
            trace!("tree {} eps {} -> {}", tree, eps, bound);
        }
        let outcome = if let Some((slack, edge)) = self.cheapest_cross_plus_plus(tree)? {
            if slack <= EPS {
                self.augment(edge)?;
                self.statistics.add_dual_update_time(start.elapsed());
                return Ok(DualOutcome::Augmented);
            }
            if advanced {
                DualOutcome::Progress(bound - eps)
            } else {
                DualOutcome::NoProgress
            }
        } else if advanced {
            DualOutcome::Progress(bound - eps)
        } else {
            DualOutcome::NoProgress
        };
        self.statistics.add_dual_update_time(start.elapsed());
        Ok(outcome)
    }

    /// global dual update with the strategy selected in the options
    pub fn update_duals_global(&mut self) -> Result<DualOutcome, MatchingError> {
        match self.options.dual_update_strategy {
            DualUpdateStrategy::MultipleTreeFixedDelta => self.update_duals_fixed_delta(),
            DualUpdateStrategy::MultipleTreeConnectedComponents => self.update_duals_connected_components(),
        }
    }

    fn live_trees(&self) -> Vec<TreeIndex> {
        let mut result = vec![];
        let mut cursor = self.first_tree_root();
        while let Some(root) = cursor {
            result.push(self.nodes[root as usize].tree.unwrap());
            cursor = self.nodes[root as usize].tree_sibling_next;
        }
        result
    }

    /// one common delta for every tree, bounded by all in-tree limits and half
    /// of every cross-tree (+, +) slack; (+, -) edges stay valid under a
    /// symmetric increase and are ignored
    pub fn update_duals_fixed_delta(&mut self) -> Result<DualOutcome, MatchingError> {
        let start = Instant::now();
        let trees = self.live_trees();
        let mut delta = INFINITY;
        for &tree in trees.iter() {
            let eps = self.trees[tree as usize].eps;
            delta = delta.min(self.eps_max_in_tree(tree)? - eps);
            for (tree_edge, dir) in self.tree_edges_of(tree) {
                if dir != 0 {
                    continue; // each tree edge is visited from its holder once
                }
                let other = self.tree_edge(tree_edge).head[dir];
                let other_eps = self.trees[other as usize].eps;
                if let Some(key) = self.heaps.min_key(self.tree_edge(tree_edge).plus_plus_edges)? {
                    delta = delta.min((key - eps - other_eps) / 2.);
                }
            }
        }
        if delta >= NO_PERFECT_MATCHING_THRESHOLD {
            return Err(MatchingError::NoPerfectMatching);
        }
        let delta = delta.max(0.);
        if delta > EPS {
            for &tree in trees.iter() {
                self.trees[tree as usize].eps += delta;
            }
            trace!("fixed-delta dual update by {}", delta);
        }
        let outcome = self.augment_tight_cross_edge(delta)?;
        self.statistics.add_dual_update_time(start.elapsed());
        Ok(outcome)
    }

    /// group the trees into components connected by tight (+, -) edges and give
    /// each component the largest delta its own constraints and the already
    /// fixed components allow
    pub fn update_duals_connected_components(&mut self) -> Result<DualOutcome, MatchingError> {
        let start = Instant::now();
        let trees = self.live_trees();
        let mut component_of: Vec<usize> = vec![usize::MAX; self.trees.len()];
        let mut best_progress: Weight = 0.;
        for (component, &seed) in trees.iter().enumerate() {
            if component_of[seed as usize] != usize::MAX {
                continue;
            }
            // gather the component, chained through the next_tree links
            component_of[seed as usize] = component;
            self.trees[seed as usize].next_tree = None;
            let mut last = seed;
            let mut cursor = Some(seed);
            while let Some(tree) = cursor {
                let eps = self.trees[tree as usize].eps;
                for (tree_edge, dir) in self.tree_edges_of(tree) {
                    let other = self.tree_edge(tree_edge).head[dir];
                    if component_of[other as usize] != usize::MAX {
                        continue;
                    }
                    let other_eps = self.trees[other as usize].eps;
                    let plus_here = self.heaps.min_key(self.tree_edge(tree_edge).plus_minus_edges[dir])?;
                    let minus_here = self.heaps.min_key(self.tree_edge(tree_edge).plus_minus_edges[1 - dir])?;
                    let tight = plus_here.map(|key| key - eps + other_eps <= EPS).unwrap_or(false)
                        || minus_here.map(|key| key + eps - other_eps <= EPS).unwrap_or(false);
                    if tight {
                        component_of[other as usize] = component;
                        self.trees[last as usize].next_tree = Some(other);
                        self.trees[other as usize].next_tree = None;
                        last = other;
                    }
                }
                cursor = self.trees[tree as usize].next_tree;
            }
            // bound the common delta of this component
            let mut delta = INFINITY;
            let mut cursor = Some(seed);
            while let Some(tree) = cursor {
                let eps = self.trees[tree as usize].eps;
                delta = delta.min(self.eps_max_in_tree(tree)? - eps);
                for (tree_edge, dir) in self.tree_edges_of(tree) {
                    let other = self.tree_edge(tree_edge).head[dir];
                    let other_eps = self.trees[other as usize].eps;
                    let same_component = component_of[other as usize] == component;
                    if let Some(key) = self.heaps.min_key(self.tree_edge(tree_edge).plus_plus_edges)? {
                        if same_component {
                            delta = delta.min((key - eps - other_eps) / 2.);
                        } else {
                            delta = delta.min(key - eps - other_eps);
                        }
                    }
                    if !same_component {
                        // (+, -) towards any other component, whether it took
                        // its (possibly smaller) delta already or not; a tight
                        // such edge would have merged the components
                        if let Some(key) = self.heaps.min_key(self.tree_edge(tree_edge).plus_minus_edges[dir])? {
                            delta = delta.min(key - eps + other_eps);
                        }
                    }
                }
                cursor = self.trees[tree as usize].next_tree;
            }
            if delta >= NO_PERFECT_MATCHING_THRESHOLD {
                return Err(MatchingError::NoPerfectMatching);
            }
            let delta = delta.max(0.);
            best_progress = best_progress.max(delta);
            if delta > EPS {
                let mut cursor = Some(seed);
                while let Some(tree) = cursor {
                    self.trees[tree as usize].eps += delta;
                    cursor = self.trees[tree as usize].next_tree;
                }
            }
            if delta > EPS {
                trace!("component {} dual update by {}", component, delta);
            }
        }
        let outcome = self.augment_tight_cross_edge(best_progress)?;
        self.statistics.add_dual_update_time(start.elapsed());
        Ok(outcome)
    }

    /// augment along one tight (+, +) cross-tree edge if the update produced
    /// any; otherwise report the progress that was made
    fn augment_tight_cross_edge(&mut self, progress: Weight) -> Result<DualOutcome, MatchingError> {
        for tree in self.live_trees() {
            if let Some((slack, edge)) = self.cheapest_cross_plus_plus(tree)? {
                if slack <= EPS {
                    self.augment(edge)?;
                    return Ok(DualOutcome::Augmented);
                }
            }
        }
        if progress > EPS {
            Ok(DualOutcome::Progress(progress))
        } else {
            Ok(DualOutcome::NoProgress)
        }
    }
}
