//! Initializer
//!
//! Translates the input into solver state and runs the selected warm start:
//! `None` roots a tree at every vertex, `Greedy` grows vertex duals and matches
//! tight edges, `Fractional` additionally solves the fractional relaxation by
//! growing one alternating tree per remaining unmatched vertex, recording
//! half-valued odd circuits and expanding them at the end. All three finish by
//! wiring the auxiliary graph: every boundary and cross-tree edge of each tree
//! root enters the heap matching its classification.
//!

use super::state::{HeapItem, Label, State};
use super::util::*;
use log::debug;

/// translate the input and run the warm start selected by the options
pub fn initialize(
    input: &SolverInput,
    objective: ObjectiveSense,
    options: &BlossomOptions,
) -> Result<State, MatchingError> {
    input.sanity_check()?;
    let mut state = build_state(input, objective, options.clone());
    match options.initialization {
        InitializationType::None => {
            for node in 0..state.node_num {
                state.create_tree(node as NodeIndex);
            }
        }
        InitializationType::Greedy => {
            init_greedy(&mut state);
            allocate_trees(&mut state);
        }
        InitializationType::Fractional => {
            init_greedy(&mut state);
            init_fractional(&mut state)?;
            allocate_trees(&mut state);
        }
    }
    debug!(
        "initialized {} vertices, {} edges, {} trees ({:?})",
        state.node_num,
        state.edges.len(),
        state.tree_num,
        options.initialization
    );
    wire_auxiliary_graph(&mut state)?;
    Ok(state)
}

/// allocate nodes and edges; negates weights for maximization and shifts all
/// weights by the minimum so every slack starts non-negative
fn build_state(input: &SolverInput, objective: ObjectiveSense, options: BlossomOptions) -> State {
    let mut state = State::new(input.vertex_num as usize, objective, options);
    let translated: Vec<(usize, VertexIndex, VertexIndex, Weight)> = input
        .weighted_edges
        .iter()
        .enumerate()
        .filter(|(_, edge)| edge.0 != edge.1) // self-loops can never be matched
        .map(|(index, &(u, v, w))| {
            let weight = match objective {
                ObjectiveSense::Minimize => w,
                ObjectiveSense::Maximize => -w,
            };
            (index, u, v, weight)
        })
        .collect();
    let min_edge_weight = translated
        .iter()
        .map(|&(.., weight)| weight)
        .fold(Weight::INFINITY, Weight::min);
    let min_edge_weight = if translated.is_empty() { 0. } else { min_edge_weight };
    state.min_edge_weight = min_edge_weight;
    for (input_index, u, v, weight) in translated {
        state.add_edge(u as NodeIndex, v as NodeIndex, weight - min_edge_weight);
        state.input_edge_of.push(input_index as EdgeIndex);
    }
    state
}

/// root a tree at every node the warm start left unmatched
fn allocate_trees(state: &mut State) {
    for node in 0..state.node_num {
        if state.nodes[node].matched.is_none() {
            state.create_tree(node as NodeIndex);
        }
    }
}

/// greedy warm start: every node pulls half of its cheapest incident slack into
/// its dual, then unmatched nodes raise their dual until an incident edge is
/// tight and match along it when the other endpoint is free as well
fn init_greedy(state: &mut State) {
    // duals start at the full minimum incident slack
    for node in 0..state.node_num {
        let min_slack = state
            .incident_edges(node as NodeIndex)
            .into_iter()
            .map(|(edge, _)| state.edges[edge as usize].slack)
            .fold(INFINITY, Weight::min);
        state.nodes[node].dual = min_slack / 2.;
    }
    // each edge loses both halved endpoint duals
    for edge in 0..state.edges.len() {
        let [u, v] = state.edges[edge].head;
        state.edges[edge].slack -= state.nodes[u as usize].dual + state.nodes[v as usize].dual;
    }
    for node in 0..state.node_num {
        if state.nodes[node].matched.is_some() {
            continue;
        }
        let incident = state.incident_edges(node as NodeIndex);
        let min_slack = incident
            .iter()
            .map(|&(edge, _)| state.edges[edge as usize].slack)
            .fold(INFINITY, Weight::min);
        if min_slack > 0. && min_slack < INFINITY {
            state.nodes[node].dual += min_slack;
            for &(edge, _) in incident.iter() {
                state.edges[edge as usize].slack -= min_slack;
            }
        }
        for &(edge, dir) in incident.iter() {
            let opposite = state.edges[edge as usize].head[1 - dir];
            if state.edges[edge as usize].slack <= EPS && state.nodes[opposite as usize].matched.is_none() {
                state.nodes[node].matched = Some(edge);
                state.nodes[opposite as usize].matched = Some(edge);
                break;
            }
        }
    }
}

/// what ended the growth of one fractional tree
enum BranchEvent {
    /// tight edge to a free node or into a half-valued circuit
    Augment { edge: EdgeIndex, target: NodeIndex },
    /// tight (+, +) edge within the tree closes an odd circuit
    Shrink { edge: EdgeIndex },
}

/// fractional warm start, run after the greedy phase: grow one alternating tree
/// per unmatched node, with a heap of best boundary edges driving the choice of
/// the next dual change
fn init_fractional(state: &mut State) -> Result<(), MatchingError> {
    let mut cycle_id: Vec<Option<usize>> = vec![None; state.node_num];
    let mut cycle_rep: Vec<NodeIndex> = vec![];
    let mut cycle_alive: Vec<bool> = vec![];
    let best_edges = state.heaps.new_heap();
    for root in 0..state.node_num {
        let root = root as NodeIndex;
        if state.nodes[root as usize].matched.is_some() || cycle_id[root as usize].is_some() {
            continue;
        }
        // grow an alternating tree rooted here; branch_eps is the lazy dual
        // increment shared by the whole branch
        let mut tree_nodes = vec![root];
        let mut critical_eps = INFINITY;
        let mut critical_edge = None;
        state.nodes[root as usize].label = Label::Plus;
        state.nodes[root as usize].parent_edge = None;
        attach_plus_node(state, best_edges, root, 0., &mut critical_eps, &mut critical_edge)?;
        let (branch_eps, event) = loop {
            let grow_eps = state.heaps.min_key(best_edges)?.unwrap_or(INFINITY);
            if critical_eps <= grow_eps {
                if critical_eps >= NO_PERFECT_MATCHING_THRESHOLD {
                    return Err(MatchingError::NoPerfectMatching);
                }
                break (critical_eps, BranchEvent::Shrink { edge: critical_edge.unwrap() });
            }
            if grow_eps >= NO_PERFECT_MATCHING_THRESHOLD {
                return Err(MatchingError::NoPerfectMatching);
            }
            let (eps, item) = state.heaps.delete_min(best_edges)?.unwrap();
            let target = item.expect_node();
            state.nodes[target as usize].handle = None;
            let edge = state.nodes[target as usize].best_edge.take().unwrap();
            if state.nodes[target as usize].matched.is_none() || cycle_id[target as usize].is_some() {
                break (eps, BranchEvent::Augment { edge, target });
            }
            // grow: the matched pair joins the tree as a minus and a plus node
            let minus = target;
            let matched_edge = state.nodes[minus as usize].matched.unwrap();
            let plus = state.opposite(matched_edge, minus);
            state.nodes[minus as usize].label = Label::Minus;
            state.nodes[minus as usize].parent_edge = Some(edge);
            state.nodes[minus as usize].dual += eps;
            for (incident, _) in state.incident_edges(minus) {
                state.edges[incident as usize].slack -= eps;
            }
            tree_nodes.push(minus);
            // the partner may itself be queued as someone's best boundary node
            if let Some(handle) = state.nodes[plus as usize].handle.take() {
                state.heaps.delete(handle)?;
                state.nodes[plus as usize].best_edge = None;
            }
            state.nodes[plus as usize].label = Label::Plus;
            state.nodes[plus as usize].parent_edge = Some(matched_edge);
            attach_plus_node(state, best_edges, plus, eps, &mut critical_eps, &mut critical_edge)?;
            tree_nodes.push(plus);
        };
        match event {
            BranchEvent::Augment { edge, target } => {
                let in_tree = state.opposite(edge, target);
                state.flip_matching_path(in_tree, edge);
                state.nodes[target as usize].matched = Some(edge);
                if let Some(id) = cycle_id[target as usize] {
                    // augmenting into a half-valued circuit dissolves it into
                    // an integral matching rooted at the entry node
                    alternate_cycle(state, target, &mut cycle_id);
                    cycle_alive[id] = false;
                }
            }
            BranchEvent::Shrink { edge } => {
                let circuit = collect_fractional_circuit(state, edge);
                // the path above the circuit flips back to matched pairs
                let top = circuit[0];
                if let Some(parent_edge) = state.nodes[top as usize].parent_edge {
                    let minus = state.opposite(parent_edge, top);
                    let grow_edge = state.nodes[minus as usize].parent_edge.unwrap();
                    state.nodes[minus as usize].matched = Some(grow_edge);
                    let plus = state.opposite(grow_edge, minus);
                    state.flip_matching_path(plus, grow_edge);
                }
                // link the circuit into a ring and record it as half-valued
                let id = cycle_rep.len();
                cycle_rep.push(top);
                cycle_alive.push(true);
                let [closing_x, closing_y] = state.edges[edge as usize].head;
                for (position, &node) in circuit.iter().enumerate() {
                    let next = circuit[(position + 1) % circuit.len()];
                    let ring_edge = if node == closing_x && next == closing_y {
                        edge
                    } else if state.nodes[next as usize].parent_edge
                        .map(|pe| state.opposite(pe, next) == node)
                        .unwrap_or(false)
                    {
                        // next entered the tree as a child of node
                        state.nodes[next as usize].parent_edge.unwrap()
                    } else {
                        state.nodes[node as usize].parent_edge.unwrap()
                    };
                    state.nodes[node as usize].blossom_sibling = Some(ring_edge);
                    state.nodes[node as usize].matched = None;
                    cycle_id[node as usize] = Some(id);
                }
            }
        }
        // spread the final branch_eps into the duals and slacks of every tree
        // node, then return them to the unlabeled surface
        for &node in tree_nodes.iter() {
            match state.nodes[node as usize].label {
                Label::Plus => {
                    state.nodes[node as usize].dual += branch_eps;
                    for (incident, _) in state.incident_edges(node) {
                        state.edges[incident as usize].slack -= branch_eps;
                    }
                }
                Label::Minus => {
                    state.nodes[node as usize].dual -= branch_eps;
                    for (incident, _) in state.incident_edges(node) {
                        state.edges[incident as usize].slack += branch_eps;
                    }
                }
                Label::Infinity => unreachable!("tree nodes carry a +/- label"),
            }
            state.nodes[node as usize].label = Label::Infinity;
            state.nodes[node as usize].parent_edge = None;
        }
        // boundary nodes still queued keep nothing from this tree
        while let Some((_, item)) = state.heaps.delete_min(best_edges)? {
            let node = item.expect_node();
            state.nodes[node as usize].handle = None;
            state.nodes[node as usize].best_edge = None;
        }
    }
    state.heaps.release(best_edges);
    // expand the surviving half-valued circuits: one node of each stays
    // unmatched and roots a tree of the main phase
    for (id, &rep) in cycle_rep.iter().enumerate() {
        if cycle_alive[id] {
            alternate_cycle(state, rep, &mut cycle_id);
        }
    }
    Ok(())
}

/// apply the lazy delta of a node joining the current fractional tree as `+`
/// and derive the grow/augment/shrink candidates from its incident edges
fn attach_plus_node(
    state: &mut State,
    best_edges: super::pairing_heap::HeapId,
    node: NodeIndex,
    eps: Weight,
    critical_eps: &mut Weight,
    critical_edge: &mut Option<EdgeIndex>,
) -> Result<(), MatchingError> {
    state.nodes[node as usize].dual -= eps;
    for (edge, dir) in state.incident_edges(node) {
        state.edges[edge as usize].slack += eps;
        let slack = state.edges[edge as usize].slack;
        let opposite = state.edges[edge as usize].head[1 - dir];
        match state.nodes[opposite as usize].label {
            Label::Infinity => {
                // free, matched and half-circuit nodes all queue on their
                // cheapest boundary edge
                match state.nodes[opposite as usize].handle {
                    None => {
                        state.nodes[opposite as usize].best_edge = Some(edge);
                        state.nodes[opposite as usize].handle =
                            Some(state.heaps.insert(best_edges, slack, HeapItem::Node(opposite))?);
                    }
                    Some(handle) => {
                        if slack < state.heaps.key(handle)? {
                            state.heaps.decrease_key(handle, slack)?;
                            state.nodes[opposite as usize].best_edge = Some(edge);
                        }
                    }
                }
            }
            Label::Plus => {
                // odd circuit closes once half of this slack is reached
                if slack / 2. < *critical_eps {
                    *critical_eps = slack / 2.;
                    *critical_edge = Some(edge);
                }
            }
            Label::Minus => {}
        }
    }
    Ok(())
}

/// the odd circuit closed by a tight (+, +) edge of the current fractional
/// tree, listed from the topmost node
fn collect_fractional_circuit(state: &mut State, edge: EdgeIndex) -> Vec<NodeIndex> {
    let [x, y] = state.edges[edge as usize].head;
    let mut path = vec![x];
    let mut current = x;
    while let Some(parent_edge) = state.nodes[current as usize].parent_edge {
        current = state.opposite(parent_edge, current);
        path.push(current);
        state.nodes[current as usize].is_marked = true;
    }
    state.nodes[x as usize].is_marked = true;
    let mut other_branch = vec![];
    let mut current = y;
    while !state.nodes[current as usize].is_marked {
        other_branch.push(current);
        let parent_edge = state.nodes[current as usize].parent_edge.unwrap();
        current = state.opposite(parent_edge, current);
    }
    let top = current;
    for &node in path.iter() {
        state.nodes[node as usize].is_marked = false;
    }
    // ring order: top -> ... -> x -> (closing edge) -> y -> ... -> back to top
    let mut circuit = vec![top];
    let top_position = path.iter().position(|&node| node == top).unwrap();
    circuit.extend(path[..top_position].iter().rev().copied());
    circuit.extend(other_branch);
    circuit
}

/// re-alternate a half-valued circuit so `entry` is the node matched (or left
/// unmatched) towards the outside, and clear the circuit bookkeeping
fn alternate_cycle(state: &mut State, entry: NodeIndex, cycle_id: &mut [Option<usize>]) {
    cycle_id[entry as usize] = None;
    let first_edge = state.nodes[entry as usize].blossom_sibling.take().unwrap();
    let mut current = state.opposite(first_edge, entry);
    while current != entry {
        let pair_edge = state.nodes[current as usize].blossom_sibling.take().unwrap();
        let partner = state.opposite(pair_edge, current);
        state.nodes[current as usize].matched = Some(pair_edge);
        state.nodes[partner as usize].matched = Some(pair_edge);
        cycle_id[current as usize] = None;
        cycle_id[partner as usize] = None;
        let next_edge = state.nodes[partner as usize].blossom_sibling.take().unwrap();
        current = state.opposite(next_edge, partner);
    }
}

/// hook every tree root's boundary and cross-tree edges into the heaps their
/// classification calls for
fn wire_auxiliary_graph(state: &mut State) -> Result<(), MatchingError> {
    let mut cursor = state.first_tree_root();
    while let Some(root) = cursor {
        let tree = state.nodes[root as usize].tree.unwrap();
        state.set_current_edges(tree);
        for (edge, dir) in state.incident_edges(root) {
            let opposite = state.edges[edge as usize].head[1 - dir];
            if state.nodes[opposite as usize].is_infinity() {
                state.add_plus_infinity_edge(tree, edge)?;
            } else if !state.nodes[opposite as usize].is_processed {
                let other = state.nodes[opposite as usize].tree.unwrap();
                let (tree_edge, _) = state.ensure_tree_edge(tree, other);
                state.add_cross_plus_plus_edge(tree_edge, edge)?;
            }
        }
        state.nodes[root as usize].is_processed = true;
        state.clear_current_edges(tree);
        cursor = state.nodes[root as usize].tree_sibling_next;
    }
    let mut cursor = state.first_tree_root();
    while let Some(root) = cursor {
        state.nodes[root as usize].is_processed = false;
        cursor = state.nodes[root as usize].tree_sibling_next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_cycle() -> SolverInput {
        SolverInput::new(4, vec![(0, 1, 7.), (1, 2, 4.), (2, 3, 3.), (3, 0, 4.)])
    }

    fn assert_feasible_start(state: &State) {
        for edge in 0..state.edges.len() {
            assert!(
                state.true_slack(edge as EdgeIndex) >= -EPS,
                "edge {} has negative slack {}",
                edge,
                state.true_slack(edge as EdgeIndex)
            );
        }
        for node in 0..state.node_num {
            if let Some(edge) = state.nodes[node].matched {
                assert!(state.true_slack(edge).abs() < EPS, "matched edge {edge} is not tight");
                let opposite = state.opposite(edge, node as NodeIndex);
                assert_eq!(state.nodes[opposite as usize].matched, Some(edge));
            }
        }
    }

    #[test]
    fn init_none_roots_every_vertex() {
        // cargo test init_none_roots_every_vertex -- --nocapture
        let options = BlossomOptions::with_initialization(InitializationType::None);
        let state = initialize(&four_cycle(), ObjectiveSense::Minimize, &options).unwrap();
        assert_eq!(state.tree_num, 4);
        assert_feasible_start(&state);
        // all weights were shifted by the minimum weight 3
        assert_eq!(state.min_edge_weight, 3.);
        assert_eq!(state.edges[0].slack, 4.);
        assert_eq!(state.edges[2].slack, 0.);
        // every edge of the 4-cycle connects two roots, so all of them are
        // cross-tree (+, +) edges
        for edge in 0..state.edges.len() {
            assert!(state.edges[edge].handle.is_some());
        }
    }

    #[test]
    fn init_greedy_matches_tight_edges() {
        let options = BlossomOptions::with_initialization(InitializationType::Greedy);
        let state = initialize(&four_cycle(), ObjectiveSense::Minimize, &options).unwrap();
        assert_feasible_start(&state);
        // greedy pairs (0, 3) and (1, 2) along the two tight edges
        assert_eq!(state.tree_num, 0);
        assert_eq!(state.nodes[0].matched, state.nodes[3].matched);
        assert_eq!(state.nodes[1].matched, state.nodes[2].matched);
        assert!(state.nodes[0].matched.is_some());
    }

    #[test]
    fn init_fractional_completes_even_paths() {
        // a path of four vertices has a unique perfect matching, which the
        // fractional phase finds without leaving residual trees
        let input = SolverInput::new(4, vec![(0, 1, 1.), (1, 2, 1.), (2, 3, 1.)]);
        let options = BlossomOptions::with_initialization(InitializationType::Fractional);
        let state = initialize(&input, ObjectiveSense::Minimize, &options).unwrap();
        assert_feasible_start(&state);
        assert_eq!(state.tree_num, 0);
        assert_eq!(state.nodes[0].matched, state.nodes[1].matched);
        assert_eq!(state.nodes[2].matched, state.nodes[3].matched);
    }

    #[test]
    fn init_fractional_records_odd_circuits() {
        // a triangle with a pendant: the triangle closes as a half circuit and
        // is expanded; everything is matched in the end
        let input = SolverInput::new(4, vec![(0, 1, 2.), (1, 2, 2.), (2, 0, 2.), (0, 3, 5.)]);
        let options = BlossomOptions::with_initialization(InitializationType::Fractional);
        let state = initialize(&input, ObjectiveSense::Minimize, &options).unwrap();
        assert_feasible_start(&state);
        // at most one residual tree can remain from the odd circuit
        assert!(state.tree_num <= 2);
        for node in 0..4 {
            assert!(state.nodes[node].blossom_sibling.is_none());
        }
    }

    #[test]
    fn init_skips_self_loops() {
        let input = SolverInput::new(2, vec![(0, 0, 1.), (0, 1, 2.)]);
        let options = BlossomOptions::with_initialization(InitializationType::None);
        let state = initialize(&input, ObjectiveSense::Minimize, &options).unwrap();
        assert_eq!(state.edges.len(), 1);
        assert_eq!(state.input_edge_of, vec![1]);
    }

    #[test]
    fn init_fractional_detects_isolated_vertices() {
        let input = SolverInput::new(4, vec![(0, 1, 1.), (1, 2, 1.), (2, 0, 1.)]);
        let options = BlossomOptions::with_initialization(InitializationType::Fractional);
        let result = initialize(&input, ObjectiveSense::Minimize, &options);
        assert_eq!(result.unwrap_err(), MatchingError::NoPerfectMatching);
    }
}
