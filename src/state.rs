//! Solver State
//!
//! Flat containers for everything the solver mutates: surface nodes and blossom
//! pseudonodes, edges with migrating endpoints, alternating trees, tree edges and
//! the heap arena. Nodes and edges never move once allocated; every link between
//! them is an index into these arrays.
//!
//! Incident edges hang off each node in two circular doubly-linked lists, one per
//! edge direction; direction-0 edges are visited before direction-1 edges and
//! each list keeps insertion order. The global list of tree roots is anchored at
//! a sentinel node stored at index `node_num`.
//!

use super::pairing_heap::{HeapHandle, PairingHeaps};
use super::tree::{Tree, TreeEdge};
use super::util::*;

/// label of an outer node; only meaningful while the node is on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Plus,
    Minus,
    Infinity,
}

/// what a heap element points back to
#[derive(Debug, Clone, Copy)]
pub enum HeapItem {
    Edge(EdgeIndex),
    Node(NodeIndex),
}

impl HeapItem {
    pub fn expect_edge(self) -> EdgeIndex {
        match self {
            HeapItem::Edge(edge) => edge,
            HeapItem::Node(_) => panic!("heap element is a node, not an edge"),
        }
    }

    pub fn expect_node(self) -> NodeIndex {
        match self {
            HeapItem::Node(node) => node,
            HeapItem::Edge(_) => panic!("heap element is an edge, not a node"),
        }
    }
}

/// a surface vertex or a blossom pseudonode
#[derive(Debug, Clone)]
pub struct Node {
    pub label: Label,
    pub is_tree_root: bool,
    pub is_blossom: bool,
    pub is_outer: bool,
    /// scratch flags; whoever sets them clears them on every exit path
    pub is_processed: bool,
    pub is_marked: bool,
    /// lazy: the true dual of an outer +/- node is `dual +/- tree.eps`
    pub dual: Weight,
    /// heads of the two circular incident edge lists
    pub first: [Option<EdgeIndex>; 2],
    pub matched: Option<EdgeIndex>,
    /// cheapest known boundary edge while this node is unlabeled; fractional
    /// initialization only
    pub best_edge: Option<EdgeIndex>,
    pub tree: Option<TreeIndex>,
    pub parent_edge: Option<EdgeIndex>,
    pub first_tree_child: Option<NodeIndex>,
    /// sibling links double as the tree-root list links while this node roots a
    /// tree; `next` is null-terminated, `prev` of the first child points at the
    /// last child so appends stay O(1)
    pub tree_sibling_next: Option<NodeIndex>,
    pub tree_sibling_prev: Option<NodeIndex>,
    pub blossom_parent: Option<NodeIndex>,
    /// cached ancestor used to jump towards the penultimate blossom; lazily
    /// compressed on access
    pub blossom_grandparent: Option<NodeIndex>,
    /// edge to the next node on the blossom circuit this node belongs to
    pub blossom_sibling: Option<EdgeIndex>,
    /// position in the minus-blossom heap of the owning tree, or in the
    /// best-edge heap during fractional initialization
    pub handle: Option<HeapHandle>,
    pub pos: NodeIndex,
}

impl Node {
    fn new(pos: NodeIndex) -> Self {
        Self {
            label: Label::Infinity,
            is_tree_root: false,
            is_blossom: false,
            is_outer: true,
            is_processed: false,
            is_marked: false,
            dual: 0.,
            first: [None, None],
            matched: None,
            best_edge: None,
            tree: None,
            parent_edge: None,
            first_tree_child: None,
            tree_sibling_next: None,
            tree_sibling_prev: None,
            blossom_parent: None,
            blossom_grandparent: None,
            blossom_sibling: None,
            handle: None,
            pos,
        }
    }

    pub fn is_plus(&self) -> bool {
        self.label == Label::Plus
    }

    pub fn is_minus(&self) -> bool {
        self.label == Label::Minus
    }

    pub fn is_infinity(&self) -> bool {
        self.label == Label::Infinity
    }
}

/// an edge of the surface graph; `head` migrates under shrink and expand while
/// `head_original` never changes
#[derive(Debug, Clone)]
pub struct Edge {
    /// lazy: subtract `tree.eps` for every outer `+` endpoint and add it for
    /// every outer `-` endpoint to obtain the true slack
    pub slack: Weight,
    pub head: [NodeIndex; 2],
    pub head_original: [NodeIndex; 2],
    /// sibling links within the circular incident list of `head[dir]`
    pub prev: [EdgeIndex; 2],
    pub next: [EdgeIndex; 2],
    pub handle: Option<HeapHandle>,
    pub pos: EdgeIndex,
}

/// the single owning container of a solve
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct State {
    #[derivative(Debug = "ignore")]
    pub nodes: Vec<Node>,
    #[derivative(Debug = "ignore")]
    pub edges: Vec<Edge>,
    #[derivative(Debug = "ignore")]
    pub trees: Vec<Tree>,
    #[derivative(Debug = "ignore")]
    pub tree_edges: Vec<Option<TreeEdge>>,
    pub free_tree_edges: Vec<TreeEdgeIndex>,
    #[derivative(Debug = "ignore")]
    pub heaps: PairingHeaps<HeapItem>,
    /// number of original vertices; the sentinel lives at this index and
    /// blossoms are appended beyond it
    pub node_num: usize,
    pub tree_num: usize,
    pub blossom_num: usize,
    pub removed_num: usize,
    /// input edge index of every solver edge (self-loops are never translated)
    pub input_edge_of: Vec<EdgeIndex>,
    /// uniform shift applied to all internal weights so slacks start at >= 0
    pub min_edge_weight: Weight,
    pub objective: ObjectiveSense,
    pub options: BlossomOptions,
    pub statistics: MatchingStatistics,
}

impl State {
    /// allocate the node array for `vertex_num` vertices plus the sentinel
    pub fn new(vertex_num: usize, objective: ObjectiveSense, options: BlossomOptions) -> Self {
        let nodes = (0..=vertex_num).map(|pos| Node::new(pos as NodeIndex)).collect();
        Self {
            nodes,
            edges: vec![],
            trees: vec![],
            tree_edges: vec![],
            free_tree_edges: vec![],
            heaps: PairingHeaps::new(),
            node_num: vertex_num,
            tree_num: 0,
            blossom_num: 0,
            removed_num: 0,
            input_edge_of: vec![],
            min_edge_weight: 0.,
            objective,
            options,
            statistics: MatchingStatistics::default(),
        }
    }

    pub fn sentinel(&self) -> NodeIndex {
        self.node_num as NodeIndex
    }

    /// append a fresh blossom pseudonode
    pub fn new_blossom_node(&mut self) -> NodeIndex {
        let pos = self.nodes.len() as NodeIndex;
        let mut node = Node::new(pos);
        node.is_blossom = true;
        self.nodes.push(node);
        pos
    }

    // ------------------------------------------------------------------
    // incident edge lists
    // ------------------------------------------------------------------

    /// link `edge` into the direction-`dir` incident list of its `head[dir]`
    pub fn add_incident_edge(&mut self, edge: EdgeIndex, dir: usize) {
        let node = self.edges[edge as usize].head[dir];
        match self.nodes[node as usize].first[dir] {
            None => {
                self.nodes[node as usize].first[dir] = Some(edge);
                self.edges[edge as usize].next[dir] = edge;
                self.edges[edge as usize].prev[dir] = edge;
            }
            Some(first) => {
                // insert before `first`, i.e. at the tail of the circular list
                let last = self.edges[first as usize].prev[dir];
                self.edges[last as usize].next[dir] = edge;
                self.edges[edge as usize].prev[dir] = last;
                self.edges[edge as usize].next[dir] = first;
                self.edges[first as usize].prev[dir] = edge;
            }
        }
    }

    pub fn remove_incident_edge(&mut self, edge: EdgeIndex, dir: usize) {
        let node = self.edges[edge as usize].head[dir];
        let next = self.edges[edge as usize].next[dir];
        let prev = self.edges[edge as usize].prev[dir];
        if next == edge {
            self.nodes[node as usize].first[dir] = None;
        } else {
            self.edges[prev as usize].next[dir] = next;
            self.edges[next as usize].prev[dir] = prev;
            if self.nodes[node as usize].first[dir] == Some(edge) {
                self.nodes[node as usize].first[dir] = Some(next);
            }
        }
    }

    /// every incident edge of `node` with the direction it is linked under;
    /// collected up front so callers may relink while visiting
    pub fn incident_edges(&self, node: NodeIndex) -> Vec<(EdgeIndex, usize)> {
        let mut result = vec![];
        for dir in 0..2 {
            if let Some(first) = self.nodes[node as usize].first[dir] {
                let mut edge = first;
                loop {
                    result.push((edge, dir));
                    edge = self.edges[edge as usize].next[dir];
                    if edge == first {
                        break;
                    }
                }
            }
        }
        result
    }

    /// create an edge between two surface nodes with the given initial slack
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, slack: Weight) -> EdgeIndex {
        let pos = self.edges.len() as EdgeIndex;
        self.edges.push(Edge {
            slack,
            head: [from, to],
            head_original: [from, to],
            prev: [pos, pos],
            next: [pos, pos],
            handle: None,
            pos,
        });
        self.add_incident_edge(pos, 0);
        self.add_incident_edge(pos, 1);
        pos
    }

    pub fn opposite(&self, edge: EdgeIndex, node: NodeIndex) -> NodeIndex {
        let heads = self.edges[edge as usize].head;
        if heads[0] == node {
            heads[1]
        } else {
            debug_assert_eq!(heads[1], node, "node is not an endpoint of the edge");
            heads[0]
        }
    }

    /// direction under which `node` holds this edge
    pub fn dir_from(&self, edge: EdgeIndex, node: NodeIndex) -> usize {
        if self.edges[edge as usize].head[0] == node {
            0
        } else {
            debug_assert_eq!(self.edges[edge as usize].head[1], node);
            1
        }
    }

    /// relink one end of an edge from one surface node onto another; used when
    /// blossoms swallow or release their circuit nodes
    pub fn move_edge_tail(&mut self, edge: EdgeIndex, from: NodeIndex, to: NodeIndex) {
        let dir = self.dir_from(edge, from);
        self.remove_incident_edge(edge, dir);
        self.edges[edge as usize].head[dir] = to;
        self.add_incident_edge(edge, dir);
    }

    // ------------------------------------------------------------------
    // lazy values
    // ------------------------------------------------------------------

    fn lazy_eps(&self, node: NodeIndex) -> Weight {
        let node = &self.nodes[node as usize];
        if !node.is_outer {
            return 0.;
        }
        match (node.label, node.tree) {
            (Label::Plus, Some(tree)) => self.trees[tree as usize].eps,
            (Label::Minus, Some(tree)) => -self.trees[tree as usize].eps,
            _ => 0.,
        }
    }

    pub fn true_slack(&self, edge: EdgeIndex) -> Weight {
        let data = &self.edges[edge as usize];
        data.slack - self.lazy_eps(data.head[0]) - self.lazy_eps(data.head[1])
    }

    pub fn true_dual(&self, node: NodeIndex) -> Weight {
        self.nodes[node as usize].dual + self.lazy_eps(node)
    }

    // ------------------------------------------------------------------
    // blossom hierarchy
    // ------------------------------------------------------------------

    /// ancestor of `node` directly below the outer node, compressing the
    /// `blossom_grandparent` chain along the way; `node` must not be outer
    pub fn get_penultimate_blossom(&mut self, node: NodeIndex) -> NodeIndex {
        let mut path = vec![];
        let mut current = node;
        loop {
            let parent = self.nodes[current as usize]
                .blossom_parent
                .expect("penultimate lookup on an outer node");
            if self.nodes[parent as usize].blossom_parent.is_none() {
                break;
            }
            path.push(current);
            // jump through the cached ancestor when it has not become stale
            let grandparent = self.nodes[current as usize].blossom_grandparent.unwrap();
            current = if self.nodes[grandparent as usize].blossom_parent.is_some() {
                grandparent
            } else {
                parent
            };
        }
        for visited in path {
            self.nodes[visited as usize].blossom_grandparent = Some(current);
        }
        current
    }

    /// like [`Self::get_penultimate_blossom`] but compresses towards the node
    /// directly below the penultimate one, so caches survive the penultimate
    /// blossom being expanded right after
    pub fn get_penultimate_blossom_and_fix_grandparent(&mut self, node: NodeIndex) -> NodeIndex {
        let mut chain = vec![node];
        loop {
            let current = *chain.last().unwrap();
            let parent = self.nodes[current as usize]
                .blossom_parent
                .expect("penultimate lookup on an outer node");
            if self.nodes[parent as usize].blossom_parent.is_none() {
                break;
            }
            chain.push(parent);
        }
        let penultimate = *chain.last().unwrap();
        if chain.len() >= 2 {
            let below = chain[chain.len() - 2];
            for &walked in &chain[..chain.len() - 2] {
                self.nodes[walked as usize].blossom_grandparent = Some(below);
            }
            self.nodes[below as usize].blossom_grandparent = Some(penultimate);
        }
        penultimate
    }

    /// the original endpoint of `edge` contained in `pseudonode`, lifted to the
    /// circuit node directly below it
    pub fn current_original(&self, edge: EdgeIndex, pseudonode: NodeIndex) -> NodeIndex {
        for side in 0..2 {
            let mut current = self.edges[edge as usize].head_original[side];
            loop {
                match self.nodes[current as usize].blossom_parent {
                    Some(parent) if parent == pseudonode => return current,
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }
        panic!("edge {edge} has no endpoint inside pseudonode {pseudonode}");
    }

    // ------------------------------------------------------------------
    // tree child lists and the root list
    // ------------------------------------------------------------------

    /// append `child` to the child list of `parent`, entering the tree through
    /// `parent_edge`
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex, parent_edge: EdgeIndex) {
        let tree = self.nodes[parent as usize].tree;
        let child_data = &mut self.nodes[child as usize];
        child_data.parent_edge = Some(parent_edge);
        child_data.tree = tree;
        child_data.tree_sibling_next = None;
        match self.nodes[parent as usize].first_tree_child {
            None => {
                self.nodes[child as usize].tree_sibling_prev = Some(child);
                self.nodes[parent as usize].first_tree_child = Some(child);
            }
            Some(first) => {
                let last = self.nodes[first as usize].tree_sibling_prev.unwrap();
                self.nodes[child as usize].tree_sibling_prev = Some(last);
                self.nodes[last as usize].tree_sibling_next = Some(child);
                self.nodes[first as usize].tree_sibling_prev = Some(child);
            }
        }
    }

    /// unlink `child` from the child list of `parent`
    pub fn remove_from_child_list(&mut self, parent: NodeIndex, child: NodeIndex) {
        let next = self.nodes[child as usize].tree_sibling_next;
        let prev = self.nodes[child as usize].tree_sibling_prev.unwrap();
        if self.nodes[parent as usize].first_tree_child == Some(child) {
            self.nodes[parent as usize].first_tree_child = next;
            if let Some(next) = next {
                self.nodes[next as usize].tree_sibling_prev = Some(prev);
            }
        } else {
            self.nodes[prev as usize].tree_sibling_next = next;
            match next {
                Some(next) => self.nodes[next as usize].tree_sibling_prev = Some(prev),
                None => {
                    // the first child's prev caches the last child
                    if let Some(first) = self.nodes[parent as usize].first_tree_child {
                        self.nodes[first as usize].tree_sibling_prev = Some(prev);
                    }
                }
            }
        }
    }

    /// concatenate the whole child list of `from` onto `to`
    pub fn move_children_to(&mut self, from: NodeIndex, to: NodeIndex) {
        let Some(from_first) = self.nodes[from as usize].first_tree_child.take() else {
            return;
        };
        let from_last = self.nodes[from_first as usize].tree_sibling_prev.unwrap();
        match self.nodes[to as usize].first_tree_child {
            None => {
                self.nodes[to as usize].first_tree_child = Some(from_first);
            }
            Some(to_first) => {
                let to_last = self.nodes[to_first as usize].tree_sibling_prev.unwrap();
                self.nodes[to_last as usize].tree_sibling_next = Some(from_first);
                self.nodes[from_first as usize].tree_sibling_prev = Some(to_last);
                self.nodes[to_first as usize].tree_sibling_prev = Some(from_last);
            }
        }
    }

    /// insert a tree root right behind the sentinel
    pub fn add_tree_root_to_list(&mut self, root: NodeIndex) {
        let sentinel = self.sentinel();
        let first = self.nodes[sentinel as usize].tree_sibling_next;
        self.nodes[root as usize].tree_sibling_prev = Some(sentinel);
        self.nodes[root as usize].tree_sibling_next = first;
        if let Some(first) = first {
            self.nodes[first as usize].tree_sibling_prev = Some(root);
        }
        self.nodes[sentinel as usize].tree_sibling_next = Some(root);
    }

    /// unlink a root; its own sibling links are deliberately left behind so an
    /// iterator that captured this node can still step over it
    pub fn remove_tree_root_from_list(&mut self, root: NodeIndex) {
        let prev = self.nodes[root as usize].tree_sibling_prev.unwrap();
        let next = self.nodes[root as usize].tree_sibling_next;
        self.nodes[prev as usize].tree_sibling_next = next;
        if let Some(next) = next {
            self.nodes[next as usize].tree_sibling_prev = Some(prev);
        }
    }

    pub fn first_tree_root(&self) -> Option<NodeIndex> {
        self.nodes[self.sentinel() as usize].tree_sibling_next
    }

    /// flip the matching along the alternating path from the `+` node `plus` up
    /// to its tree root; `new_matched` becomes the matched edge of `plus`
    pub fn flip_matching_path(&mut self, plus: NodeIndex, new_matched: EdgeIndex) {
        let mut plus = plus;
        let mut matched_edge = new_matched;
        loop {
            self.nodes[plus as usize].matched = Some(matched_edge);
            // a non-root + node entered the tree through its old matched edge
            let Some(parent_edge) = self.nodes[plus as usize].parent_edge else {
                break;
            };
            let minus = self.opposite(parent_edge, plus);
            let grow_edge = self.nodes[minus as usize]
                .parent_edge
                .expect("a minus node always has a parent edge");
            self.nodes[minus as usize].matched = Some(grow_edge);
            plus = self.opposite(grow_edge, minus);
            matched_edge = grow_edge;
        }
    }

    /// all nodes of the alternating tree rooted at `root`, depth first
    pub fn tree_nodes(&self, root: NodeIndex) -> Vec<NodeIndex> {
        let mut result = vec![];
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            result.push(node);
            let mut child = self.nodes[node as usize].first_tree_child;
            while let Some(current) = child {
                stack.push(current);
                child = self.nodes[current as usize].tree_sibling_next;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_state(vertex_num: usize) -> State {
        State::new(vertex_num, ObjectiveSense::Minimize, BlossomOptions::default())
    }

    #[test]
    fn incident_lists_stay_circular() {
        // cargo test incident_lists_stay_circular -- --nocapture
        let mut state = empty_state(4);
        let ab = state.add_edge(0, 1, 1.);
        let ac = state.add_edge(0, 2, 2.);
        let ad = state.add_edge(0, 3, 3.);
        let cb = state.add_edge(2, 1, 4.);
        // direction 0 before direction 1, insertion order within each
        let incident: Vec<_> = state.incident_edges(0).into_iter().collect();
        assert_eq!(incident, vec![(ab, 0), (ac, 0), (ad, 0)]);
        let incident: Vec<_> = state.incident_edges(1).into_iter().collect();
        assert_eq!(incident, vec![(ab, 1), (cb, 1)]);
        // moving a tail relinks exactly one of the two lists
        state.move_edge_tail(cb, 2, 3);
        assert_eq!(state.incident_edges(2), vec![(ac, 1)]);
        assert_eq!(state.incident_edges(3), vec![(cb, 0), (ad, 1)]);
        assert_eq!(state.opposite(cb, 3), 1);
        assert_eq!(state.dir_from(cb, 3), 0);
    }

    #[test]
    fn child_list_append_and_remove() {
        let mut state = empty_state(6);
        let e1 = state.add_edge(0, 1, 0.);
        let e2 = state.add_edge(0, 2, 0.);
        let e3 = state.add_edge(0, 3, 0.);
        state.add_child(0, 1, e1);
        state.add_child(0, 2, e2);
        state.add_child(0, 3, e3);
        let children = |state: &State| {
            let mut result = vec![];
            let mut child = state.nodes[0].first_tree_child;
            while let Some(current) = child {
                result.push(current);
                child = state.nodes[current as usize].tree_sibling_next;
            }
            result
        };
        assert_eq!(children(&state), vec![1, 2, 3]);
        state.remove_from_child_list(0, 2);
        assert_eq!(children(&state), vec![1, 3]);
        // append still lands at the tail after a removal
        let e4 = state.add_edge(0, 4, 0.);
        state.add_child(0, 4, e4);
        assert_eq!(children(&state), vec![1, 3, 4]);
        state.remove_from_child_list(0, 1);
        state.remove_from_child_list(0, 3);
        state.remove_from_child_list(0, 4);
        assert_eq!(children(&state), Vec::<usize>::new());
    }

    #[test]
    fn root_list_is_anchored_at_sentinel() {
        let mut state = empty_state(3);
        for node in 0..3 {
            state.add_tree_root_to_list(node);
        }
        assert_eq!(state.first_tree_root(), Some(2));
        state.remove_tree_root_from_list(1);
        assert_eq!(state.nodes[2].tree_sibling_next, Some(0));
        // the removed root keeps its own links for iterators in flight
        assert_eq!(state.nodes[1].tree_sibling_next, Some(0));
        state.remove_tree_root_from_list(2);
        assert_eq!(state.first_tree_root(), Some(0));
    }

    #[test]
    fn penultimate_blossom_compression() {
        let mut state = empty_state(2);
        // chain: 0 inside b1 inside b2 inside b3 (outer)
        let b1 = state.new_blossom_node();
        let b2 = state.new_blossom_node();
        let b3 = state.new_blossom_node();
        state.nodes[0].blossom_parent = Some(b1);
        state.nodes[0].blossom_grandparent = Some(b1);
        state.nodes[0].is_outer = false;
        state.nodes[b1 as usize].blossom_parent = Some(b2);
        state.nodes[b1 as usize].blossom_grandparent = Some(b2);
        state.nodes[b1 as usize].is_outer = false;
        state.nodes[b2 as usize].blossom_parent = Some(b3);
        state.nodes[b2 as usize].blossom_grandparent = Some(b3);
        state.nodes[b2 as usize].is_outer = false;
        assert_eq!(state.get_penultimate_blossom(0), b2);
        // the walk compressed the cache
        assert_eq!(state.nodes[0].blossom_grandparent, Some(b2));
        assert_eq!(state.get_penultimate_blossom(b1), b2);
        // the fixing variant points below the penultimate instead
        state.nodes[0].blossom_grandparent = Some(b1);
        assert_eq!(state.get_penultimate_blossom_and_fix_grandparent(0), b2);
        assert_eq!(state.nodes[0].blossom_grandparent, Some(b1));
        assert_eq!(state.nodes[b1 as usize].blossom_grandparent, Some(b2));
    }
}
