//! Matching Driver
//!
//! The top-level loop: process every tree in the root list, trying grow, shrink
//! and expand on its heap minima and letting a tight cross-tree edge augment;
//! when a full sweep augments nothing, advance the duals globally. Afterwards
//! the blossom interiors are alternated top-down to a plain matching, and the
//! dual solution is read off the node duals and the surviving blossoms.
//!

use super::dual::DualOutcome;
use super::graph::{EdgeId, WeightedGraph};
use super::initializer::initialize;
use super::state::State;
use super::util::*;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// everything a solve produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingOutcome {
    pub matching: PerfectMatching,
    pub dual_solution: DualSolution,
    pub statistics: MatchingStatistics,
}

/// compute a minimum or maximum weight perfect matching of the input
pub fn get_matching(
    input: &SolverInput,
    objective: ObjectiveSense,
    options: &BlossomOptions,
) -> Result<MatchingOutcome, MatchingError> {
    if input.vertex_num % 2 != 0 {
        return Err(MatchingError::InvalidInput(format!(
            "a graph with {} vertices has no perfect matching",
            input.vertex_num
        )));
    }
    if input.vertex_num == 0 {
        return Ok(MatchingOutcome {
            matching: PerfectMatching { edges: vec![], weight: 0. },
            dual_solution: DualSolution { duals: Default::default() },
            statistics: MatchingStatistics::default(),
        });
    }
    let mut state = initialize(input, objective, options)?;
    run_main_loop(&mut state)?;
    finish(&mut state);
    let matching = extract_matching(&state, input)?;
    let dual_solution = extract_dual_solution(&state);
    debug!(
        "matched {} edges with weight {} ({} grows, {} shrinks, {} expands, {} augments)",
        matching.edges.len(),
        matching.weight,
        state.statistics.grow_num,
        state.statistics.shrink_num,
        state.statistics.expand_num,
        state.statistics.augment_num,
    );
    Ok(MatchingOutcome {
        matching,
        dual_solution,
        statistics: state.statistics.clone(),
    })
}

fn run_main_loop(state: &mut State) -> Result<(), MatchingError> {
    while state.tree_num > 0 {
        let cycle_tree_num = state.tree_num;
        let primal_ops_before =
            state.statistics.grow_num + state.statistics.shrink_num + state.statistics.expand_num;
        let mut cursor = state.first_tree_root();
        while let Some(root) = cursor {
            let next = state.nodes[root as usize].tree_sibling_next;
            if state.nodes[root as usize].is_tree_root {
                process_tree(state, root)?;
            }
            // removed roots keep their links, so skipping over them is safe
            cursor = next;
            while let Some(node) = cursor {
                if state.nodes[node as usize].is_tree_root {
                    break;
                }
                cursor = state.nodes[node as usize].tree_sibling_next;
            }
        }
        if state.tree_num == 0 {
            break;
        }
        if cycle_tree_num == state.tree_num {
            // the whole sweep augmented nothing: move the duals globally
            let outcome = state.update_duals_global()?;
            if !outcome.made_progress() {
                let fallback = state.update_duals_connected_components()?;
                let primal_ops_after =
                    state.statistics.grow_num + state.statistics.shrink_num + state.statistics.expand_num;
                if !fallback.made_progress() && primal_ops_before == primal_ops_after {
                    // neither the primal nor the dual side can move
                    return Err(MatchingError::NoPerfectMatching);
                }
            }
        }
    }
    Ok(())
}

/// run grow / shrink / expand on one tree for as long as something applies or
/// until an augmentation removes the tree
fn process_tree(state: &mut State, root: NodeIndex) -> Result<(), MatchingError> {
    let tree = state.nodes[root as usize].tree.expect("a tree root belongs to a tree");
    let iteration_tree_num = state.tree_num;
    state.set_current_edges(tree);
    if let Some(edge) = tight_cross_edge(state, tree)? {
        state.augment(edge)?;
        return Ok(());
    }
    if state.options.update_duals_before && state.update_duals_single(tree)? == DualOutcome::Augmented {
        return Ok(());
    }
    while iteration_tree_num == state.tree_num {
        let eps = state.trees[tree as usize].eps;
        let heap = state.trees[tree as usize].plus_infinity_edges;
        if let Some(handle) = state.heaps.find_min(heap)? {
            if state.heaps.key(handle)? <= eps + EPS {
                let edge = state.heaps.payload(handle)?.expect_edge();
                state.grow(edge, true, true)?;
                continue;
            }
        }
        let heap = state.trees[tree as usize].plus_plus_edges;
        if let Some(handle) = state.heaps.find_min(heap)? {
            if state.heaps.key(handle)? <= 2. * eps + EPS {
                let edge = state.heaps.payload(handle)?.expect_edge();
                state.shrink(edge, true)?;
                continue;
            }
        }
        let heap = state.trees[tree as usize].minus_blossoms;
        if let Some(handle) = state.heaps.find_min(heap)? {
            if state.heaps.key(handle)? <= eps + EPS {
                let blossom = state.heaps.payload(handle)?.expect_node();
                state.expand(blossom, true)?;
                continue;
            }
        }
        break;
    }
    if iteration_tree_num == state.tree_num {
        if state.options.update_duals_after && state.update_duals_single(tree)? == DualOutcome::Augmented {
            return Ok(());
        }
        state.clear_current_edges(tree);
    }
    Ok(())
}

fn tight_cross_edge(state: &mut State, tree: TreeIndex) -> Result<Option<EdgeIndex>, MatchingError> {
    let eps = state.trees[tree as usize].eps;
    for (tree_edge, dir) in state.tree_edges_of(tree) {
        let other = state.tree_edge(tree_edge).head[dir];
        let other_eps = state.trees[other as usize].eps;
        let heap = state.tree_edge(tree_edge).plus_plus_edges;
        if let Some(handle) = state.heaps.find_min(heap)? {
            if state.heaps.key(handle)? - eps - other_eps <= EPS {
                return Ok(Some(state.heaps.payload(handle)?.expect_edge()));
            }
        }
    }
    Ok(None)
}

/// alternate every surviving blossom's circuit so its interior agrees with the
/// edge that matches the blossom from outside, outermost first
fn finish(state: &mut State) {
    let mut stack: Vec<NodeIndex> = vec![];
    for node in (state.node_num + 1)..state.nodes.len() {
        if state.nodes[node].is_blossom && state.nodes[node].is_outer {
            stack.push(node as NodeIndex);
        }
    }
    while let Some(pseudonode) = stack.pop() {
        let matched_edge = state.nodes[pseudonode as usize]
            .matched
            .expect("a surface pseudonode is matched when the loop ends");
        let entry = state.current_original(matched_edge, pseudonode);
        state.nodes[entry as usize].matched = Some(matched_edge);
        if state.nodes[entry as usize].is_blossom {
            stack.push(entry);
        }
        // pair the remaining circuit nodes off along the ring
        let first = state.nodes[entry as usize].blossom_sibling.unwrap();
        let mut current = state.opposite(first, entry);
        while current != entry {
            let pair_edge = state.nodes[current as usize].blossom_sibling.unwrap();
            let partner = state.opposite(pair_edge, current);
            state.nodes[current as usize].matched = Some(pair_edge);
            state.nodes[partner as usize].matched = Some(pair_edge);
            for &node in [current, partner].iter() {
                if state.nodes[node as usize].is_blossom {
                    stack.push(node);
                }
            }
            let next = state.nodes[partner as usize].blossom_sibling.unwrap();
            current = state.opposite(next, partner);
        }
    }
}

/// read the matching off the original vertices and price it with the original
/// input weights
fn extract_matching(state: &State, input: &SolverInput) -> Result<PerfectMatching, MatchingError> {
    let mut edges = vec![];
    for node in 0..state.node_num {
        let Some(edge) = state.nodes[node].matched else {
            return Err(MatchingError::NoPerfectMatching);
        };
        let [u, v] = state.edges[edge as usize].head_original;
        if node == u.min(v) as usize {
            edges.push(state.input_edge_of[edge as usize]);
        }
    }
    edges.sort_unstable();
    let weight = edges
        .iter()
        .map(|&edge| input.weighted_edges[edge as usize].2)
        .sum();
    Ok(PerfectMatching { edges, weight })
}

/// one dual value per original vertex plus one per surviving blossom with a
/// nonzero dual, keyed by the sorted contracted vertex set
fn extract_dual_solution(state: &State) -> DualSolution {
    let sign = match state.objective {
        ObjectiveSense::Minimize => 1.,
        ObjectiveSense::Maximize => -1.,
    };
    let shift = state.min_edge_weight / 2.;
    let mut duals = std::collections::BTreeMap::new();
    let mut members: HashMap<NodeIndex, Vec<VertexIndex>> = HashMap::new();
    for node in 0..state.node_num {
        duals.insert(vec![node as VertexIndex], sign * (state.nodes[node].dual + shift));
        let mut ancestor = state.nodes[node].blossom_parent;
        while let Some(blossom) = ancestor {
            members.entry(blossom).or_default().push(node as VertexIndex);
            ancestor = state.nodes[blossom as usize].blossom_parent;
        }
    }
    for (blossom, mut vertices) in members {
        let dual = sign * state.nodes[blossom as usize].dual;
        if dual.abs() > EPS {
            vertices.sort_unstable();
            duals.insert(vertices, dual);
        }
    }
    DualSolution { duals }
}

/// total complementary-slackness violation of a matching and a dual solution;
/// zero (within tolerance) exactly when both are optimal
pub fn dual_error(
    input: &SolverInput,
    objective: ObjectiveSense,
    matching: &PerfectMatching,
    duals: &DualSolution,
) -> Weight {
    let sign = match objective {
        ObjectiveSense::Minimize => 1.,
        ObjectiveSense::Maximize => -1.,
    };
    let mut error = 0.;
    for (set, &value) in duals.duals.iter() {
        // blossom duals must be non-negative in the minimization form
        if set.len() > 1 && sign * value < 0. {
            error += -(sign * value);
        }
    }
    let matched: std::collections::HashSet<EdgeIndex> = matching.edges.iter().copied().collect();
    for (index, &(u, v, weight)) in input.weighted_edges.iter().enumerate() {
        if u == v {
            continue;
        }
        let mut slack = sign * weight;
        for (set, &value) in duals.duals.iter() {
            let covers_u = set.binary_search(&u).is_ok();
            let covers_v = set.binary_search(&v).is_ok();
            if covers_u != covers_v {
                slack -= sign * value;
            }
        }
        if slack < 0. {
            error += -slack;
        }
        if matched.contains(&(index as EdgeIndex)) {
            error += slack.abs();
        }
    }
    error
}

/// whether a matching together with a dual solution passes the optimality check
pub fn test_optimality(
    input: &SolverInput,
    objective: ObjectiveSense,
    matching: &PerfectMatching,
    duals: &DualSolution,
) -> bool {
    dual_error(input, objective, matching, duals) < EPS
}

/// a matching expressed in the vocabulary of a wrapped graph
#[derive(Debug, Clone)]
pub struct GraphMatching<V> {
    pub edges: Vec<EdgeId>,
    pub pairs: Vec<(V, V)>,
    pub weight: Weight,
    pub outcome: MatchingOutcome,
}

/// solve on any graph implementing the weighted-graph capability set
pub fn get_graph_matching<G: WeightedGraph>(
    graph: &G,
    objective: ObjectiveSense,
    options: &BlossomOptions,
) -> Result<GraphMatching<G::Vertex>, MatchingError> {
    let vertices: Vec<G::Vertex> = graph.iter_vertices().collect();
    let index: HashMap<G::Vertex, usize> = vertices
        .iter()
        .cloned()
        .enumerate()
        .map(|(position, vertex)| (vertex, position))
        .collect();
    let edge_ids: Vec<EdgeId> = graph.iter_edges().collect();
    let weighted_edges = edge_ids
        .iter()
        .map(|&edge| {
            let (source, target) = graph.endpoints(edge).expect("enumerated edge has endpoints");
            (
                index[&source] as VertexIndex,
                index[&target] as VertexIndex,
                graph.weight(edge),
            )
        })
        .collect();
    let input = SolverInput::new(vertices.len() as VertexIndex, weighted_edges);
    let outcome = get_matching(&input, objective, options)?;
    let edges: Vec<EdgeId> = outcome.matching.edges.iter().map(|&edge| edge_ids[edge as usize]).collect();
    let pairs = edges
        .iter()
        .map(|&edge| graph.endpoints(edge).expect("matched edge has endpoints"))
        .collect();
    Ok(GraphMatching {
        edges,
        pairs,
        weight: outcome.matching.weight,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::super::graph::UndirectedSimpleGraph;
    use super::*;
    use rand::prelude::*;
    use rand_xoshiro::Xoshiro256StarStar;

    fn all_option_combinations() -> Vec<BlossomOptions> {
        let mut result = vec![];
        for initialization in [
            InitializationType::None,
            InitializationType::Greedy,
            InitializationType::Fractional,
        ] {
            for dual_update_strategy in [
                DualUpdateStrategy::MultipleTreeFixedDelta,
                DualUpdateStrategy::MultipleTreeConnectedComponents,
            ] {
                result.push(BlossomOptions {
                    initialization,
                    dual_update_strategy,
                    update_duals_before: true,
                    update_duals_after: false,
                });
            }
        }
        result
    }

    fn four_cycle() -> SolverInput {
        SolverInput::new(4, vec![(0, 1, 7.), (1, 2, 4.), (2, 3, 3.), (3, 0, 4.)])
    }

    fn triangulation() -> SolverInput {
        SolverInput::new(
            8,
            vec![
                (0, 1, 8.),
                (0, 2, 10.),
                (1, 2, 8.),
                (0, 3, 11.),
                (1, 3, 5.),
                (2, 5, 3.),
                (1, 5, 6.),
                (2, 4, 3.),
                (4, 5, 1.),
                (1, 6, 5.),
                (3, 6, 4.),
                (3, 7, 5.),
                (6, 7, 2.),
                (5, 7, 6.),
                (4, 7, 7.),
                (1, 7, 5.),
            ],
        )
    }

    fn assert_perfect(input: &SolverInput, matching: &PerfectMatching) {
        let mut covered = vec![false; input.vertex_num];
        for &edge in matching.edges.iter() {
            let (u, v, _) = input.weighted_edges[edge as usize];
            assert!(!covered[u as usize] && !covered[v as usize], "vertex covered twice");
            covered[u as usize] = true;
            covered[v as usize] = true;
        }
        assert!(covered.into_iter().all(|c| c), "not all vertices covered");
    }

    #[test]
    fn four_cycle_minimize_and_maximize() {
        // cargo test four_cycle_minimize_and_maximize -- --nocapture
        let input = four_cycle();
        for options in all_option_combinations() {
            let outcome = get_matching(&input, ObjectiveSense::Minimize, &options).unwrap();
            assert_eq!(outcome.matching.weight, 8., "options {options:?}");
            assert_eq!(outcome.matching.edges, vec![1, 3]);
            let outcome = get_matching(&input, ObjectiveSense::Maximize, &options).unwrap();
            assert_eq!(outcome.matching.weight, 10., "options {options:?}");
            assert_eq!(outcome.matching.edges, vec![0, 2]);
        }
    }

    #[test]
    fn triangulation_all_strategies_agree() {
        let input = triangulation();
        for options in all_option_combinations() {
            let outcome = get_matching(&input, ObjectiveSense::Minimize, &options).unwrap();
            assert_perfect(&input, &outcome.matching);
            assert_eq!(outcome.matching.weight, 18., "options {options:?}");
            let outcome = get_matching(&input, ObjectiveSense::Maximize, &options).unwrap();
            assert_perfect(&input, &outcome.matching);
            assert_eq!(outcome.matching.weight, 27., "options {options:?}");
        }
    }

    #[test]
    fn empty_graph_yields_empty_matching() {
        let input = SolverInput::new(0, vec![]);
        let outcome = get_matching(&input, ObjectiveSense::Minimize, &BlossomOptions::default()).unwrap();
        assert!(outcome.matching.edges.is_empty());
        assert_eq!(outcome.matching.weight, 0.);
        let outcome = get_matching(&input, ObjectiveSense::Maximize, &BlossomOptions::default()).unwrap();
        assert_eq!(outcome.matching.weight, 0.);
    }

    #[test]
    fn parallel_edges_are_tolerated() {
        // two edges between the same endpoints; the cheaper one is chosen
        let input = SolverInput::new(2, vec![(0, 1, 5.), (0, 1, 3.)]);
        let outcome = get_matching(&input, ObjectiveSense::Minimize, &BlossomOptions::default()).unwrap();
        assert_eq!(outcome.matching.edges, vec![1]);
        assert_eq!(outcome.matching.weight, 3.);
        let outcome = get_matching(&input, ObjectiveSense::Maximize, &BlossomOptions::default()).unwrap();
        assert_eq!(outcome.matching.edges, vec![0]);
        assert_eq!(outcome.matching.weight, 5.);
    }

    #[test]
    fn odd_vertex_count_is_invalid_input() {
        let input = SolverInput::new(3, vec![(0, 1, 1.), (1, 2, 1.)]);
        let result = get_matching(&input, ObjectiveSense::Minimize, &BlossomOptions::default());
        assert!(matches!(result, Err(MatchingError::InvalidInput(_))));
    }

    #[test]
    fn odd_component_has_no_perfect_matching() {
        // a triangle and a single vertex: even order, but no perfect matching
        let input = SolverInput::new(4, vec![(0, 1, 1.), (1, 2, 1.), (2, 0, 1.)]);
        for options in all_option_combinations() {
            let result = get_matching(&input, ObjectiveSense::Minimize, &options);
            assert_eq!(result.unwrap_err(), MatchingError::NoPerfectMatching, "options {options:?}");
        }
    }

    #[test]
    fn dual_solution_certifies_optimality() {
        for input in [four_cycle(), triangulation()] {
            for objective in [ObjectiveSense::Minimize, ObjectiveSense::Maximize] {
                for options in all_option_combinations() {
                    let outcome = get_matching(&input, objective, &options).unwrap();
                    let error = dual_error(&input, objective, &outcome.matching, &outcome.dual_solution);
                    assert!(error < EPS, "error {error} for {objective:?} {options:?}");
                }
            }
        }
    }

    #[test]
    fn perturbed_dual_fails_optimality() {
        let input = four_cycle();
        let outcome = get_matching(&input, ObjectiveSense::Minimize, &BlossomOptions::default()).unwrap();
        assert!(test_optimality(&input, ObjectiveSense::Minimize, &outcome.matching, &outcome.dual_solution));
        let mut perturbed = outcome.dual_solution.clone();
        *perturbed.duals.get_mut(&vec![2]).unwrap() += 1.;
        assert!(!test_optimality(&input, ObjectiveSense::Minimize, &outcome.matching, &perturbed));
    }

    #[test]
    fn minimize_equals_negated_maximize() {
        let input = triangulation();
        let negated = SolverInput::new(
            input.vertex_num,
            input.weighted_edges.iter().map(|&(u, v, w)| (u, v, -w)).collect(),
        );
        let minimized = get_matching(&input, ObjectiveSense::Minimize, &BlossomOptions::default()).unwrap();
        let maximized = get_matching(&negated, ObjectiveSense::Maximize, &BlossomOptions::default()).unwrap();
        assert_eq!(minimized.matching.edges, maximized.matching.edges);
        assert_eq!(minimized.matching.weight, -maximized.matching.weight);
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let input = triangulation();
        let options = BlossomOptions::default();
        let first = get_matching(&input, ObjectiveSense::Minimize, &options).unwrap();
        for _ in 0..3 {
            let again = get_matching(&input, ObjectiveSense::Minimize, &options).unwrap();
            assert_eq!(again.matching.edges, first.matching.edges);
            assert_eq!(again.matching.weight, first.matching.weight);
        }
    }

    #[test]
    fn matching_survives_serialization() {
        let outcome = get_matching(&triangulation(), ObjectiveSense::Minimize, &BlossomOptions::default()).unwrap();
        let encoded = serde_json::to_string(&outcome.matching).unwrap();
        let decoded: PerfectMatching = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, outcome.matching);
    }

    #[test]
    fn graph_level_matching() {
        let mut graph = UndirectedSimpleGraph::new();
        for vertex in ["a", "b", "c", "d"] {
            graph.add_vertex(vertex);
        }
        let mut view = super::super::graph::WeightedView::new(graph);
        let pairs = [("a", "b", 7.), ("b", "c", 4.), ("c", "d", 3.), ("d", "a", 4.)];
        for (u, v, w) in pairs {
            let edge = view.inner_mut().add_edge(&u, &v).unwrap();
            view.set_weight(edge, w);
        }
        let matching = get_graph_matching(&view, ObjectiveSense::Minimize, &BlossomOptions::default()).unwrap();
        assert_eq!(matching.weight, 8.);
        assert_eq!(matching.pairs.len(), 2);
        let mut matched: Vec<_> = matching.pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
        matched.sort_unstable();
        assert_eq!(matched, vec!["a", "b", "c", "d"]);
    }

    /// brute force minimum weight perfect matching by recursion over the first
    /// uncovered vertex
    fn brute_force(vertex_num: usize, weights: &[Vec<Option<Weight>>], covered: &mut Vec<bool>) -> Option<Weight> {
        let Some(first) = (0..vertex_num).find(|&v| !covered[v]) else {
            return Some(0.);
        };
        covered[first] = true;
        let mut best = None;
        for partner in first + 1..vertex_num {
            if covered[partner] {
                continue;
            }
            let Some(weight) = weights[first][partner] else {
                continue;
            };
            covered[partner] = true;
            if let Some(rest) = brute_force(vertex_num, weights, covered) {
                let total = weight + rest;
                if best.map(|b| total < b).unwrap_or(true) {
                    best = Some(total);
                }
            }
            covered[partner] = false;
        }
        covered[first] = false;
        best
    }

    #[test]
    fn random_graphs_match_brute_force() {
        // cargo test random_graphs_match_brute_force -- --nocapture
        let mut rng = Xoshiro256StarStar::seed_from_u64(2023);
        for round in 0..60 {
            let vertex_num = 2 * (1 + (rng.next_u32() as usize % 5));
            let mut weights = vec![vec![None; vertex_num]; vertex_num];
            let mut weighted_edges = vec![];
            for u in 0..vertex_num {
                for v in u + 1..vertex_num {
                    // leave some pairs unconnected to exercise sparse graphs
                    if rng.next_u32() % 5 == 0 {
                        continue;
                    }
                    let weight = (rng.next_u32() % 1000) as Weight / 10.;
                    weights[u][v] = Some(weight);
                    weighted_edges.push((u as VertexIndex, v as VertexIndex, weight));
                }
            }
            let input = SolverInput::new(vertex_num as VertexIndex, weighted_edges);
            let expected = brute_force(vertex_num, &weights, &mut vec![false; vertex_num]);
            for options in all_option_combinations() {
                let result = get_matching(&input, ObjectiveSense::Minimize, &options);
                match expected {
                    None => {
                        assert_eq!(
                            result.clone().unwrap_err(),
                            MatchingError::NoPerfectMatching,
                            "round {round} options {options:?}"
                        );
                    }
                    Some(weight) => {
                        let outcome = result.unwrap();
                        assert_perfect(&input, &outcome.matching);
                        assert!(
                            (outcome.matching.weight - weight).abs() < 1e-6,
                            "round {round}: got {} expected {} with {options:?}",
                            outcome.matching.weight,
                            weight
                        );
                        let error = dual_error(&input, ObjectiveSense::Minimize, &outcome.matching, &outcome.dual_solution);
                        assert!(error < 1e-6, "round {round}: dual error {error}");
                    }
                }
            }
        }
    }
}
