//! Primal Updater
//!
//! The four primal operations of the main loop. Grow attaches a matched pair to
//! a tree through a tight (+, infinity) edge, augment flips the matching along
//! two tree paths and dissolves both trees, shrink contracts a tight in-tree
//! (+, +) circuit into a blossom pseudonode, and expand dissolves a minus
//! blossom whose dual reached zero.
//!
//! Every operation applies the lazy `tree.eps` to the nodes it relabels and
//! moves each touched edge into the heap its new classification calls for, so
//! heap contents always mirror the surface exactly.
//!

use super::state::{Label, State};
use super::util::*;
use log::trace;
use std::time::Instant;

impl State {
    /// true when `edge` is a (+, +) edge between two distinct trees whose true
    /// slack is within tolerance of zero
    fn is_tight_cross_plus_plus(&self, edge: EdgeIndex) -> bool {
        let [u, v] = self.edges[edge as usize].head;
        self.nodes[u as usize].is_plus()
            && self.nodes[v as usize].is_plus()
            && self.nodes[u as usize].tree != self.nodes[v as usize].tree
            && self.true_slack(edge) <= EPS
    }

    /// grow the tree along a tight (+, infinity) edge, attaching the matched
    /// pair behind it; recursively follows further tight boundary edges and
    /// augments right away when a tight cross-tree (+, +) edge appears
    pub fn grow(&mut self, edge: EdgeIndex, recursive: bool, immediate_augment: bool) -> Result<(), MatchingError> {
        let start = Instant::now();
        let mut augment_candidate = None;
        let mut stack = vec![edge];
        while let Some(edge) = stack.pop() {
            let [u, v] = self.edges[edge as usize].head;
            let (in_tree, minus) = if self.nodes[u as usize].is_infinity() {
                (v, u)
            } else {
                (u, v)
            };
            if !self.nodes[minus as usize].is_infinity() {
                continue; // a previous grow already labeled this node
            }
            self.grow_step(edge, in_tree, minus, recursive.then_some(&mut stack), &mut augment_candidate)?;
            self.statistics.grow_num += 1;
            if augment_candidate.is_some() && immediate_augment {
                break;
            }
        }
        let elapsed = start.elapsed();
        self.statistics.add_grow_time(elapsed);
        if immediate_augment {
            if let Some(candidate) = augment_candidate {
                if self.is_tight_cross_plus_plus(candidate) {
                    self.augment(candidate)?;
                }
            }
        }
        Ok(())
    }

    fn grow_step(
        &mut self,
        edge: EdgeIndex,
        in_tree: NodeIndex,
        minus: NodeIndex,
        mut recurse: Option<&mut Vec<EdgeIndex>>,
        augment_candidate: &mut Option<EdgeIndex>,
    ) -> Result<(), MatchingError> {
        let tree = self.nodes[in_tree as usize].tree.expect("grow starts inside a tree");
        let eps = self.trees[tree as usize].eps;
        self.remove_edge_from_heap(edge)?;
        let matched_edge = self.nodes[minus as usize]
            .matched
            .expect("an infinity node of the surface is always matched");
        let plus = self.opposite(matched_edge, minus);
        self.add_child(in_tree, minus, edge);
        self.add_child(minus, plus, matched_edge);
        trace!("grow {} -> ({}, {})", in_tree, minus, plus);

        // the minus node: dual grows with the tree from now on
        self.nodes[minus as usize].label = Label::Minus;
        self.nodes[minus as usize].dual += eps;
        for (incident, dir) in self.incident_edges(minus) {
            self.edges[incident as usize].slack -= eps;
            let opposite = self.edges[incident as usize].head[1 - dir];
            let opposite_tree = self.nodes[opposite as usize].tree;
            if self.nodes[opposite as usize].is_plus() {
                if opposite_tree == Some(tree) {
                    // (+, infinity) turned into an in-tree (+, -) edge
                    self.remove_edge_from_heap(incident)?;
                } else {
                    let other = opposite_tree.unwrap();
                    self.remove_edge_from_heap(incident)?;
                    let (tree_edge, dir_of_other) = self.ensure_tree_edge(tree, other);
                    // the minus endpoint lives in this tree
                    self.add_cross_plus_minus_edge(tree_edge, 1 - dir_of_other, incident)?;
                }
            }
        }
        if self.nodes[minus as usize].is_blossom {
            self.add_minus_blossom(tree, minus)?;
        }

        // the plus node: every incident edge reclassifies around it
        self.nodes[plus as usize].label = Label::Plus;
        self.nodes[plus as usize].dual -= eps;
        for (incident, dir) in self.incident_edges(plus) {
            self.edges[incident as usize].slack += eps;
            let slack = self.edges[incident as usize].slack;
            let opposite = self.edges[incident as usize].head[1 - dir];
            match self.nodes[opposite as usize].label {
                Label::Infinity => {
                    self.add_plus_infinity_edge(tree, incident)?;
                    if let Some(stack) = recurse.as_mut() {
                        if slack <= eps + EPS {
                            stack.push(incident);
                        }
                    }
                }
                Label::Plus => {
                    if self.nodes[opposite as usize].tree == Some(tree) {
                        self.remove_edge_from_heap(incident)?;
                        self.add_plus_plus_edge(tree, incident)?;
                    } else {
                        let other = self.nodes[opposite as usize].tree.unwrap();
                        self.remove_edge_from_heap(incident)?;
                        let (tree_edge, _) = self.ensure_tree_edge(tree, other);
                        self.add_cross_plus_plus_edge(tree_edge, incident)?;
                        if self.true_slack(incident) <= EPS {
                            *augment_candidate = Some(incident);
                        }
                    }
                }
                Label::Minus => {
                    if self.nodes[opposite as usize].tree != Some(tree) {
                        let other = self.nodes[opposite as usize].tree.unwrap();
                        let (tree_edge, dir_of_other) = self.ensure_tree_edge(tree, other);
                        // the minus endpoint lives in the other tree
                        self.add_cross_plus_minus_edge(tree_edge, dir_of_other, incident)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// augment the matching along a tight (+, +) cross-tree edge; both trees
    /// vanish and all their nodes return to the unlabeled surface
    pub fn augment(&mut self, edge: EdgeIndex) -> Result<(), MatchingError> {
        let start = Instant::now();
        trace!("augment along edge {}", edge);
        for side in 0..2 {
            let first = self.edges[edge as usize].head[side];
            self.augment_branch(first, edge)?;
        }
        self.statistics.augment_num += 1;
        self.statistics.add_augment_time(start.elapsed());
        Ok(())
    }

    fn augment_branch(&mut self, first: NodeIndex, augment_edge: EdgeIndex) -> Result<(), MatchingError> {
        let tree = self.nodes[first as usize].tree.expect("augment endpoint is in a tree");
        let eps = self.trees[tree as usize].eps;
        let root = self.trees[tree as usize].root;
        self.flip_matching_path(first, augment_edge);
        for node in self.tree_nodes(root) {
            let label = self.nodes[node as usize].label;
            let delta = match label {
                Label::Plus => -eps,
                Label::Minus => eps,
                Label::Infinity => unreachable!("tree nodes carry a +/- label"),
            };
            // bake the tree eps into the node and its incident slacks
            self.nodes[node as usize].dual -= delta;
            for (incident, dir) in self.incident_edges(node) {
                self.edges[incident as usize].slack += delta;
                let opposite = self.edges[incident as usize].head[1 - dir];
                let Some(opposite_tree) = self.nodes[opposite as usize].tree else {
                    continue;
                };
                if opposite_tree == tree || self.nodes[opposite as usize].is_infinity() {
                    continue;
                }
                // cross-tree edge: it collapses into a (+, infinity) edge of
                // the surviving tree, or into no heap at all
                match (label, self.nodes[opposite as usize].label) {
                    (Label::Plus, Label::Plus) | (Label::Minus, Label::Plus) => {
                        self.remove_edge_from_heap(incident)?;
                        self.add_plus_infinity_edge(opposite_tree, incident)?;
                    }
                    (Label::Plus, Label::Minus) => {
                        self.remove_edge_from_heap(incident)?;
                    }
                    _ => {}
                }
            }
            let node_data = &mut self.nodes[node as usize];
            node_data.label = Label::Infinity;
            node_data.tree = None;
            node_data.parent_edge = None;
            node_data.first_tree_child = None;
            node_data.is_tree_root = false;
        }
        for (tree_edge, dir) in self.tree_edges_of(tree) {
            let opposite_tree = self.tree_edge(tree_edge).head[dir];
            self.trees[opposite_tree as usize].current_edge = None;
            self.remove_tree_edge(tree_edge);
        }
        self.release_tree_heaps(tree);
        self.remove_tree_root_from_list(root);
        self.tree_num -= 1;
        Ok(())
    }

    /// nearest common tree ancestor of the two endpoints of a tight in-tree
    /// (+, +) edge; marches both branches upward alternately two levels at a
    /// time and cleans every mark it set
    fn find_blossom_root(&mut self, edge: EdgeIndex) -> NodeIndex {
        let mut branches = self.edges[edge as usize].head;
        let mut marked = vec![];
        let mut side = 0;
        let root;
        loop {
            let current = branches[side];
            if self.nodes[current as usize].is_marked {
                root = current;
                break;
            }
            self.nodes[current as usize].is_marked = true;
            marked.push(current);
            if self.nodes[current as usize].is_tree_root {
                // walk the other branch until it meets the marked root path
                let mut other = branches[1 - side];
                while !self.nodes[other as usize].is_marked {
                    self.nodes[other as usize].is_marked = true;
                    marked.push(other);
                    other = self.tree_grandparent(other);
                }
                root = other;
                break;
            }
            branches[side] = self.tree_grandparent(current);
            side = 1 - side;
        }
        for node in marked {
            self.nodes[node as usize].is_marked = false;
        }
        root
    }

    /// the + node two levels up from a + node
    fn tree_grandparent(&self, node: NodeIndex) -> NodeIndex {
        let parent_edge = self.nodes[node as usize].parent_edge.unwrap();
        let parent = self.opposite(parent_edge, node);
        let grandparent_edge = self.nodes[parent as usize].parent_edge.unwrap();
        self.opposite(grandparent_edge, parent)
    }

    /// circuit closed by a tight in-tree (+, +) edge, listed in ring order from
    /// the nearest common ancestor
    fn collect_circuit(&mut self, edge: EdgeIndex, blossom_root: NodeIndex) -> Vec<NodeIndex> {
        let [x, y] = self.edges[edge as usize].head;
        let mut branch_x = vec![];
        let mut current = x;
        while current != blossom_root {
            branch_x.push(current);
            let parent_edge = self.nodes[current as usize].parent_edge.unwrap();
            current = self.opposite(parent_edge, current);
        }
        let mut circuit = vec![blossom_root];
        circuit.extend(branch_x.into_iter().rev());
        let mut current = y;
        while current != blossom_root {
            circuit.push(current);
            let parent_edge = self.nodes[current as usize].parent_edge.unwrap();
            current = self.opposite(parent_edge, current);
        }
        circuit
    }

    /// contract the circuit closed by a tight in-tree (+, +) edge into a fresh
    /// blossom pseudonode, which takes the circuit's place in the tree
    pub fn shrink(&mut self, edge: EdgeIndex, immediate_augment: bool) -> Result<NodeIndex, MatchingError> {
        let start = Instant::now();
        let tree = {
            let [u, _] = self.edges[edge as usize].head;
            self.nodes[u as usize].tree.expect("shrink edge lies inside a tree")
        };
        let eps = self.trees[tree as usize].eps;
        let blossom_root = self.find_blossom_root(edge);
        let circuit = self.collect_circuit(edge, blossom_root);
        let blossom = self.new_blossom_node();
        trace!("shrink circuit {:?} into blossom {}", circuit, blossom);
        {
            let node = &mut self.nodes[blossom as usize];
            node.label = Label::Plus;
            node.tree = Some(tree);
            node.dual = -eps;
        }
        for &node in circuit.iter() {
            self.nodes[node as usize].is_marked = true;
        }
        let mut augment_candidate = None;
        for &node in circuit.iter() {
            let is_plus = self.nodes[node as usize].is_plus();
            if is_plus {
                self.nodes[node as usize].dual += eps;
            } else {
                self.nodes[node as usize].dual -= eps;
                if let Some(handle) = self.nodes[node as usize].handle.take() {
                    // minus blossoms of the circuit leave the expand heap
                    self.heaps.delete(handle)?;
                }
            }
            let bake = if is_plus { -eps } else { eps };
            for (incident, dir) in self.incident_edges(node) {
                let opposite = self.edges[incident as usize].head[1 - dir];
                if self.nodes[opposite as usize].is_marked {
                    // inner edge: adjusted once per endpoint, dropped from its
                    // heap on whichever visit still sees the handle
                    self.edges[incident as usize].slack += bake;
                    self.remove_edge_from_heap(incident)?;
                    continue;
                }
                // boundary edge: the bake cancels (plus) or combines (minus)
                // with the new blossom's dual of -eps
                self.edges[incident as usize].slack += bake + eps;
                self.move_edge_tail(incident, node, blossom);
                if !is_plus {
                    // a (-, x) boundary edge turns into a (+, x) edge
                    match self.nodes[opposite as usize].label {
                        Label::Infinity => self.add_plus_infinity_edge(tree, incident)?,
                        Label::Plus => {
                            if self.nodes[opposite as usize].tree == Some(tree) {
                                self.add_plus_plus_edge(tree, incident)?;
                            } else {
                                let other = self.nodes[opposite as usize].tree.unwrap();
                                self.remove_edge_from_heap(incident)?;
                                let (tree_edge, _) = self.ensure_tree_edge(tree, other);
                                self.add_cross_plus_plus_edge(tree_edge, incident)?;
                                if self.true_slack(incident) <= EPS {
                                    augment_candidate = Some(incident);
                                }
                            }
                        }
                        Label::Minus => {
                            if self.nodes[opposite as usize].tree != Some(tree) {
                                let other = self.nodes[opposite as usize].tree.unwrap();
                                let (tree_edge, dir_of_other) = self.ensure_tree_edge(tree, other);
                                self.add_cross_plus_minus_edge(tree_edge, dir_of_other, incident)?;
                            }
                        }
                    }
                }
            }
            self.move_children_to(node, blossom);
        }
        // close the sibling ring along the circuit; the connecting edge is the
        // parent edge of whichever of the two nodes entered through the other
        let [closing_x, closing_y] = self.edges[edge as usize].head;
        for (position, &node) in circuit.iter().enumerate() {
            let next = circuit[(position + 1) % circuit.len()];
            let ring_edge = if node == closing_x && next == closing_y {
                edge
            } else {
                let next_parent = self.nodes[next as usize].parent_edge;
                let connects = |pe: EdgeIndex| {
                    let heads = self.edges[pe as usize].head;
                    heads[0] == node || heads[1] == node
                };
                match next_parent {
                    Some(pe) if connects(pe) => pe,
                    _ => self.nodes[node as usize].parent_edge.unwrap(),
                }
            };
            self.nodes[node as usize].blossom_sibling = Some(ring_edge);
        }
        // the blossom replaces the circuit root in the surface tree
        if self.nodes[blossom_root as usize].is_tree_root {
            self.nodes[blossom_root as usize].is_tree_root = false;
            let node = &mut self.nodes[blossom as usize];
            node.is_tree_root = true;
            node.matched = None;
            node.parent_edge = None;
            self.trees[tree as usize].root = blossom;
            let prev = self.nodes[blossom_root as usize].tree_sibling_prev.unwrap();
            let next = self.nodes[blossom_root as usize].tree_sibling_next;
            self.nodes[blossom as usize].tree_sibling_prev = Some(prev);
            self.nodes[blossom as usize].tree_sibling_next = next;
            self.nodes[prev as usize].tree_sibling_next = Some(blossom);
            if let Some(next) = next {
                self.nodes[next as usize].tree_sibling_prev = Some(blossom);
            }
        } else {
            let parent_edge = self.nodes[blossom_root as usize].parent_edge.unwrap();
            let parent = self.opposite(parent_edge, blossom);
            self.remove_from_child_list(parent, blossom_root);
            self.add_child(parent, blossom, parent_edge);
            self.nodes[blossom as usize].matched = self.nodes[blossom_root as usize].matched;
        }
        for &node in circuit.iter() {
            let data = &mut self.nodes[node as usize];
            data.is_marked = false;
            data.is_outer = false;
            data.blossom_parent = Some(blossom);
            data.blossom_grandparent = Some(blossom);
        }
        self.blossom_num += 1;
        self.statistics.shrink_num += 1;
        self.statistics.add_shrink_time(start.elapsed());
        if immediate_augment {
            if let Some(candidate) = augment_candidate {
                if self.is_tight_cross_plus_plus(candidate) {
                    self.augment(candidate)?;
                }
            }
        }
        Ok(blossom)
    }

    /// dissolve a minus blossom whose dual dropped to zero: the even branch of
    /// its circuit joins the tree alternating "-", "+", the odd branch returns
    /// to the unlabeled surface matched along the ring
    pub fn expand(&mut self, blossom: NodeIndex, immediate_augment: bool) -> Result<(), MatchingError> {
        let start = Instant::now();
        let tree = self.nodes[blossom as usize].tree.expect("expand blossom is in a tree");
        let eps = self.trees[tree as usize].eps;
        debug_assert!(self.nodes[blossom as usize].is_minus());
        self.remove_blossom_from_heap(blossom)?;
        let parent_edge = self.nodes[blossom as usize].parent_edge.expect("minus node has a parent");
        let matched_edge = self.nodes[blossom as usize].matched.expect("minus node is matched");
        let branches_endpoint = self.current_original(parent_edge, blossom);
        let blossom_root = self.current_original(matched_edge, blossom);
        trace!("expand blossom {} (root {}, endpoint {})", blossom, blossom_root, branches_endpoint);

        // every boundary edge returns to its circuit node
        let mut boundary = vec![];
        for (incident, _) in self.incident_edges(blossom) {
            let below = self.current_original(incident, blossom);
            self.move_edge_tail(incident, blossom, below);
            boundary.push(incident);
        }

        // ring in order, starting at the node matched towards the outside
        let mut ring = vec![blossom_root];
        let mut current = blossom_root;
        loop {
            let sibling = self.nodes[current as usize].blossom_sibling.unwrap();
            current = self.opposite(sibling, current);
            if current == blossom_root {
                break;
            }
            ring.push(current);
        }
        let endpoint_position = ring
            .iter()
            .position(|&node| node == branches_endpoint)
            .expect("branches endpoint lies on the ring");
        // the even branch runs root -> endpoint with an even number of edges
        let even_branch: Vec<NodeIndex> = if endpoint_position % 2 == 0 {
            ring[..=endpoint_position].to_vec()
        } else {
            let mut branch = vec![blossom_root];
            branch.extend(ring[endpoint_position..].iter().rev().copied());
            branch
        };
        let odd_branch: Vec<NodeIndex> = if endpoint_position % 2 == 0 {
            ring[endpoint_position + 1..].to_vec()
        } else {
            ring[1..endpoint_position].to_vec()
        };

        // pass 1: labels, tree links and matched edges
        for &node in ring.iter() {
            self.nodes[node as usize].is_marked = true;
            self.nodes[node as usize].is_outer = true;
        }
        let parent = self.opposite(parent_edge, branches_endpoint);
        self.remove_from_child_list(parent, blossom);
        // walk the even branch from the endpoint down towards the root
        let path: Vec<NodeIndex> = even_branch.iter().rev().copied().collect();
        let mut above = parent;
        let mut connecting = parent_edge;
        let mut index = 0;
        while index < path.len() {
            let minus = path[index];
            self.add_child(above, minus, connecting);
            self.nodes[minus as usize].label = Label::Minus;
            if index + 1 == path.len() {
                // the blossom root keeps the outside matched edge
                debug_assert_eq!(minus, blossom_root);
                self.nodes[minus as usize].matched = Some(matched_edge);
                break;
            }
            let plus = path[index + 1];
            let pair_edge = self.ring_edge_between(minus, plus);
            self.add_child(minus, plus, pair_edge);
            self.nodes[minus as usize].matched = Some(pair_edge);
            self.nodes[plus as usize].matched = Some(pair_edge);
            self.nodes[plus as usize].label = Label::Plus;
            connecting = self.ring_edge_between(plus, path[index + 2]);
            above = plus;
            index += 2;
        }
        self.move_children_to(blossom, blossom_root);
        // odd branch nodes leave the surface tree and pair up along the ring
        for pair in odd_branch.chunks(2) {
            let first = pair[0];
            let second = pair[1];
            let pair_edge = self.ring_edge_between(first, second);
            for &node in pair {
                let data = &mut self.nodes[node as usize];
                data.label = Label::Infinity;
                data.tree = None;
                data.parent_edge = None;
                data.matched = Some(pair_edge);
            }
        }

        // pass 2: spread the lazy delta into duals, slacks and heaps
        for &node in ring.iter() {
            let delta = match self.nodes[node as usize].label {
                Label::Plus => eps,
                Label::Minus => -eps,
                Label::Infinity => 0.,
            };
            self.nodes[node as usize].dual -= delta;
            for (incident, _) in self.incident_edges(node) {
                self.edges[incident as usize].slack += delta;
            }
        }
        for &incident in boundary.iter() {
            // the dissolved blossom's dual leaves every boundary slack
            self.edges[incident as usize].slack += eps;
        }
        for &node in even_branch.iter() {
            if self.nodes[node as usize].is_minus() && self.nodes[node as usize].is_blossom {
                self.add_minus_blossom(tree, node)?;
            }
        }
        let mut augment_candidate = None;
        for &node in ring.iter() {
            let label = self.nodes[node as usize].label;
            for (incident, dir) in self.incident_edges(node) {
                let opposite = self.edges[incident as usize].head[1 - dir];
                if self.nodes[opposite as usize].is_marked {
                    // inner edge: classified once, from its first visited end
                    if self.nodes[opposite as usize].is_processed {
                        continue;
                    }
                    match (label, self.nodes[opposite as usize].label) {
                        (Label::Plus, Label::Plus) => self.add_plus_plus_edge(tree, incident)?,
                        (Label::Plus, Label::Infinity) | (Label::Infinity, Label::Plus) => {
                            self.add_plus_infinity_edge(tree, incident)?
                        }
                        _ => {}
                    }
                    continue;
                }
                match label {
                    Label::Minus => {
                        // still a (-, x) edge, in the very heap it occupied
                    }
                    Label::Plus => match self.nodes[opposite as usize].label {
                        Label::Infinity => self.add_plus_infinity_edge(tree, incident)?,
                        Label::Plus => {
                            if self.nodes[opposite as usize].tree == Some(tree) {
                                self.add_plus_plus_edge(tree, incident)?;
                            } else {
                                let other = self.nodes[opposite as usize].tree.unwrap();
                                self.remove_edge_from_heap(incident)?;
                                let (tree_edge, _) = self.ensure_tree_edge(tree, other);
                                self.add_cross_plus_plus_edge(tree_edge, incident)?;
                                if self.true_slack(incident) <= EPS {
                                    augment_candidate = Some(incident);
                                }
                            }
                        }
                        Label::Minus => {
                            if self.nodes[opposite as usize].tree != Some(tree) {
                                let other = self.nodes[opposite as usize].tree.unwrap();
                                let (tree_edge, dir_of_other) = self.ensure_tree_edge(tree, other);
                                self.add_cross_plus_minus_edge(tree_edge, dir_of_other, incident)?;
                            }
                        }
                    },
                    Label::Infinity => match self.nodes[opposite as usize].label {
                        Label::Plus => {
                            if self.nodes[opposite as usize].tree == Some(tree) {
                                self.add_plus_infinity_edge(tree, incident)?;
                            } else {
                                let other = self.nodes[opposite as usize].tree.unwrap();
                                self.remove_edge_from_heap(incident)?;
                                self.add_plus_infinity_edge(other, incident)?;
                            }
                        }
                        _ => {}
                    },
                }
            }
            self.nodes[node as usize].is_processed = true;
        }

        // scratch flags off, blossom off the surface
        for &node in ring.iter() {
            let data = &mut self.nodes[node as usize];
            data.is_marked = false;
            data.is_processed = false;
            data.blossom_parent = None;
            data.blossom_grandparent = None;
            data.blossom_sibling = None;
        }
        {
            let data = &mut self.nodes[blossom as usize];
            data.is_outer = false;
            data.tree = None;
            data.matched = None;
            data.parent_edge = None;
            data.first_tree_child = None;
            data.label = Label::Infinity;
        }
        self.removed_num += 1;
        self.statistics.expand_num += 1;
        self.statistics.add_expand_time(start.elapsed());
        if immediate_augment {
            if let Some(candidate) = augment_candidate {
                if self.is_tight_cross_plus_plus(candidate) {
                    self.augment(candidate)?;
                }
            }
        }
        Ok(())
    }

    /// the ring edge connecting two adjacent circuit nodes
    fn ring_edge_between(&self, a: NodeIndex, b: NodeIndex) -> EdgeIndex {
        let sibling = self.nodes[a as usize].blossom_sibling.unwrap();
        if self.opposite(sibling, a) == b {
            return sibling;
        }
        let sibling = self.nodes[b as usize].blossom_sibling.unwrap();
        debug_assert_eq!(self.opposite(sibling, b), a, "nodes are not ring neighbors");
        sibling
    }
}
