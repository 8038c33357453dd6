//! Alternating Trees
//!
//! A [`Tree`] is one alternating tree of the surface graph: a single unmatched
//! root, a lazy dual increment `eps`, and three heaps selecting the cheapest
//! applicable primal operation. A [`TreeEdge`] connects two trees and carries
//! the cross-tree edges between them in direction-aware heaps.
//!
//! A tree edge between `from` and `to` sits in `from`'s direction-0 tree-edge
//! list and `to`'s direction-1 list, with `head[d]` naming the opposite tree as
//! seen from the list-`d` holder. `plus_minus_edges[d]` holds the cross edges
//! whose minus endpoint lies in `head[d]`.
//!

use super::pairing_heap::HeapId;
use super::state::{HeapItem, State};
use super::util::*;

#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NodeIndex,
    /// lazy dual increment shared by every node of this tree
    pub eps: Weight,
    /// scratch of the connected-component dual update
    pub accumulated_eps: Weight,
    /// tree edge towards the tree currently being processed, if any
    pub current_edge: Option<TreeEdgeIndex>,
    /// list direction under which the processed tree holds `current_edge`
    pub current_direction: usize,
    /// tight candidates for shrink: (+, +) edges within this tree
    pub plus_plus_edges: HeapId,
    /// tight candidates for grow: (+, infinity) boundary edges
    pub plus_infinity_edges: HeapId,
    /// tight candidates for expand: "-" blossoms keyed by dual
    pub minus_blossoms: HeapId,
    pub first_tree_edge: [Option<TreeEdgeIndex>; 2],
    /// chains trees of one component during the connected-component update
    pub next_tree: Option<TreeIndex>,
}

#[derive(Debug, Clone)]
pub struct TreeEdge {
    /// `head[d]` is the opposite tree for the tree holding this edge in list `d`
    pub head: [TreeIndex; 2],
    pub prev: [Option<TreeEdgeIndex>; 2],
    pub next: [Option<TreeEdgeIndex>; 2],
    /// (+, +) cross-tree edges, candidates for augment
    pub plus_plus_edges: HeapId,
    /// (+, -) cross-tree edges keyed by the side their minus endpoint is on
    pub plus_minus_edges: [HeapId; 2],
}

impl State {
    /// make `root` the root of a fresh alternating tree and hook it into the
    /// global root list
    pub fn create_tree(&mut self, root: NodeIndex) -> TreeIndex {
        debug_assert!(self.nodes[root as usize].is_outer);
        let tree = self.trees.len() as TreeIndex;
        self.trees.push(Tree {
            root,
            eps: 0.,
            accumulated_eps: 0.,
            current_edge: None,
            current_direction: 0,
            plus_plus_edges: self.heaps.new_heap(),
            plus_infinity_edges: self.heaps.new_heap(),
            minus_blossoms: self.heaps.new_heap(),
            first_tree_edge: [None, None],
            next_tree: None,
        });
        let node = &mut self.nodes[root as usize];
        node.is_tree_root = true;
        node.label = super::state::Label::Plus;
        node.tree = Some(tree);
        node.parent_edge = None;
        node.first_tree_child = None;
        self.add_tree_root_to_list(root);
        self.tree_num += 1;
        tree
    }

    /// connect two trees with a fresh tree edge (direction 0 outgoing from
    /// `from`) and leave it as `to`'s current edge
    pub fn add_tree_edge(&mut self, from: TreeIndex, to: TreeIndex) -> TreeEdgeIndex {
        debug_assert_ne!(from, to, "a tree edge must connect two distinct trees");
        let tree_edge = TreeEdge {
            head: [to, from],
            prev: [None, None],
            next: [
                self.trees[from as usize].first_tree_edge[0],
                self.trees[to as usize].first_tree_edge[1],
            ],
            plus_plus_edges: self.heaps.new_heap(),
            plus_minus_edges: [self.heaps.new_heap(), self.heaps.new_heap()],
        };
        let index = if let Some(index) = self.free_tree_edges.pop() {
            self.tree_edges[index as usize] = Some(tree_edge);
            index
        } else {
            self.tree_edges.push(Some(tree_edge));
            (self.tree_edges.len() - 1) as TreeEdgeIndex
        };
        if let Some(next) = self.tree_edge(index).next[0] {
            self.tree_edge_mut(next).prev[0] = Some(index);
        }
        if let Some(next) = self.tree_edge(index).next[1] {
            self.tree_edge_mut(next).prev[1] = Some(index);
        }
        self.trees[from as usize].first_tree_edge[0] = Some(index);
        self.trees[to as usize].first_tree_edge[1] = Some(index);
        self.trees[to as usize].current_edge = Some(index);
        self.trees[to as usize].current_direction = 0;
        index
    }

    pub fn tree_edge(&self, index: TreeEdgeIndex) -> &TreeEdge {
        self.tree_edges[index as usize].as_ref().expect("tree edge was removed")
    }

    pub fn tree_edge_mut(&mut self, index: TreeEdgeIndex) -> &mut TreeEdge {
        self.tree_edges[index as usize].as_mut().expect("tree edge was removed")
    }

    /// every tree edge of `tree` with the list direction it is held under
    pub fn tree_edges_of(&self, tree: TreeIndex) -> Vec<(TreeEdgeIndex, usize)> {
        let mut result = vec![];
        for dir in 0..2 {
            let mut cursor = self.trees[tree as usize].first_tree_edge[dir];
            while let Some(index) = cursor {
                result.push((index, dir));
                cursor = self.tree_edge(index).next[dir];
            }
        }
        result
    }

    /// point every adjacent tree at the tree edge it shares with `tree`
    pub fn set_current_edges(&mut self, tree: TreeIndex) {
        for (index, dir) in self.tree_edges_of(tree) {
            let opposite = self.tree_edge(index).head[dir];
            self.trees[opposite as usize].current_edge = Some(index);
            self.trees[opposite as usize].current_direction = dir;
        }
    }

    pub fn clear_current_edges(&mut self, tree: TreeIndex) {
        for (index, dir) in self.tree_edges_of(tree) {
            let opposite = self.tree_edge(index).head[dir];
            self.trees[opposite as usize].current_edge = None;
        }
    }

    /// the tree edge between the tree being processed and `other`, creating it
    /// on first use; returns the edge together with the processing tree's list
    /// direction
    pub fn ensure_tree_edge(&mut self, processing: TreeIndex, other: TreeIndex) -> (TreeEdgeIndex, usize) {
        if let Some(index) = self.trees[other as usize].current_edge {
            (index, self.trees[other as usize].current_direction)
        } else {
            (self.add_tree_edge(processing, other), 0)
        }
    }

    /// unlink a tree edge from both trees and drop its heaps; any remaining
    /// heap elements lose their handles
    pub fn remove_tree_edge(&mut self, index: TreeEdgeIndex) {
        let tree_edge = self.tree_edges[index as usize].take().expect("tree edge was removed");
        for dir in 0..2 {
            // head[dir] is the opposite as seen from the holder of list dir, so
            // the holder itself is head[1 - dir]
            let holder = tree_edge.head[1 - dir];
            match tree_edge.prev[dir] {
                Some(prev) => self.tree_edge_mut(prev).next[dir] = tree_edge.next[dir],
                None => self.trees[holder as usize].first_tree_edge[dir] = tree_edge.next[dir],
            }
            if let Some(next) = tree_edge.next[dir] {
                self.tree_edge_mut(next).prev[dir] = tree_edge.prev[dir];
            }
        }
        for heap in [
            tree_edge.plus_plus_edges,
            tree_edge.plus_minus_edges[0],
            tree_edge.plus_minus_edges[1],
        ] {
            self.forget_heap_handles(heap);
            self.heaps.release(heap);
        }
        self.free_tree_edges.push(index);
    }

    // ------------------------------------------------------------------
    // heap insertion and removal
    // ------------------------------------------------------------------

    pub fn add_plus_infinity_edge(&mut self, tree: TreeIndex, edge: EdgeIndex) -> Result<(), MatchingError> {
        let heap = self.trees[tree as usize].plus_infinity_edges;
        let key = self.edges[edge as usize].slack;
        self.edges[edge as usize].handle = Some(self.heaps.insert(heap, key, HeapItem::Edge(edge))?);
        Ok(())
    }

    pub fn add_plus_plus_edge(&mut self, tree: TreeIndex, edge: EdgeIndex) -> Result<(), MatchingError> {
        let heap = self.trees[tree as usize].plus_plus_edges;
        let key = self.edges[edge as usize].slack;
        self.edges[edge as usize].handle = Some(self.heaps.insert(heap, key, HeapItem::Edge(edge))?);
        Ok(())
    }

    pub fn add_minus_blossom(&mut self, tree: TreeIndex, blossom: NodeIndex) -> Result<(), MatchingError> {
        let heap = self.trees[tree as usize].minus_blossoms;
        let key = self.nodes[blossom as usize].dual;
        self.nodes[blossom as usize].handle = Some(self.heaps.insert(heap, key, HeapItem::Node(blossom))?);
        Ok(())
    }

    pub fn add_cross_plus_plus_edge(&mut self, tree_edge: TreeEdgeIndex, edge: EdgeIndex) -> Result<(), MatchingError> {
        let heap = self.tree_edge(tree_edge).plus_plus_edges;
        let key = self.edges[edge as usize].slack;
        self.edges[edge as usize].handle = Some(self.heaps.insert(heap, key, HeapItem::Edge(edge))?);
        Ok(())
    }

    /// insert a cross (+, -) edge; `minus_side` is the direction whose head
    /// tree contains the minus endpoint
    pub fn add_cross_plus_minus_edge(
        &mut self,
        tree_edge: TreeEdgeIndex,
        minus_side: usize,
        edge: EdgeIndex,
    ) -> Result<(), MatchingError> {
        let heap = self.tree_edge(tree_edge).plus_minus_edges[minus_side];
        let key = self.edges[edge as usize].slack;
        self.edges[edge as usize].handle = Some(self.heaps.insert(heap, key, HeapItem::Edge(edge))?);
        Ok(())
    }

    /// drop an edge from whatever heap currently holds it, clearing the handle
    pub fn remove_edge_from_heap(&mut self, edge: EdgeIndex) -> Result<(), MatchingError> {
        if let Some(handle) = self.edges[edge as usize].handle.take() {
            self.heaps.delete(handle)?;
        }
        Ok(())
    }

    pub fn remove_blossom_from_heap(&mut self, blossom: NodeIndex) -> Result<(), MatchingError> {
        if let Some(handle) = self.nodes[blossom as usize].handle.take() {
            self.heaps.delete(handle)?;
        }
        Ok(())
    }

    /// null the back references of everything still sitting in `heap`; used
    /// right before a heap is dropped wholesale
    pub fn forget_heap_handles(&mut self, heap: HeapId) {
        let mut items = vec![];
        while let Ok(Some((_, item))) = self.heaps.delete_min(heap) {
            items.push(item);
        }
        for item in items {
            match item {
                HeapItem::Edge(edge) => self.edges[edge as usize].handle = None,
                HeapItem::Node(node) => self.nodes[node as usize].handle = None,
            }
        }
    }

    /// release the three heaps of a tree that is about to disappear
    pub fn release_tree_heaps(&mut self, tree: TreeIndex) {
        for heap in [
            self.trees[tree as usize].plus_plus_edges,
            self.trees[tree as usize].plus_infinity_edges,
            self.trees[tree as usize].minus_blossoms,
        ] {
            self.forget_heap_handles(heap);
            self.heaps.release(heap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::Label;
    use super::*;

    fn state_with_roots(vertex_num: usize) -> State {
        let mut state = State::new(vertex_num, ObjectiveSense::Minimize, BlossomOptions::default());
        for node in 0..vertex_num {
            state.create_tree(node as NodeIndex);
        }
        state
    }

    #[test]
    fn create_tree_links_roots() {
        // cargo test create_tree_links_roots -- --nocapture
        let state = state_with_roots(3);
        assert_eq!(state.tree_num, 3);
        assert_eq!(state.first_tree_root(), Some(2));
        for node in 0..3 {
            assert!(state.nodes[node].is_tree_root);
            assert_eq!(state.nodes[node].label, Label::Plus);
        }
    }

    #[test]
    fn tree_edge_lists_and_current_edges() {
        let mut state = state_with_roots(4);
        let t0 = state.nodes[0].tree.unwrap();
        let t1 = state.nodes[1].tree.unwrap();
        let t2 = state.nodes[2].tree.unwrap();
        let e01 = state.add_tree_edge(t0, t1);
        let e02 = state.add_tree_edge(t0, t2);
        let e21 = state.add_tree_edge(t2, t1);
        assert_eq!(state.tree_edges_of(t0), vec![(e02, 0), (e01, 0)]);
        assert_eq!(state.tree_edges_of(t1), vec![(e21, 1), (e01, 1)]);
        assert_eq!(state.tree_edges_of(t2), vec![(e21, 0), (e02, 1)]);
        state.set_current_edges(t0);
        assert_eq!(state.trees[t1 as usize].current_edge, Some(e01));
        assert_eq!(state.trees[t1 as usize].current_direction, 0);
        assert_eq!(state.trees[t2 as usize].current_edge, Some(e02));
        // an existing connection is reused instead of duplicated
        assert_eq!(state.ensure_tree_edge(t0, t1), (e01, 0));
        state.clear_current_edges(t0);
        assert_eq!(state.trees[t1 as usize].current_edge, None);
        state.remove_tree_edge(e01);
        assert_eq!(state.tree_edges_of(t0), vec![(e02, 0)]);
        assert_eq!(state.tree_edges_of(t1), vec![(e21, 1)]);
    }

    #[test]
    fn heap_membership_round_trip() {
        let mut state = state_with_roots(2);
        let t0 = state.nodes[0].tree.unwrap();
        let edge = state.add_edge(0, 1, 3.5);
        state.add_plus_infinity_edge(t0, edge).unwrap();
        assert!(state.edges[edge as usize].handle.is_some());
        let heap = state.trees[t0 as usize].plus_infinity_edges;
        assert_eq!(state.heaps.min_key(heap).unwrap(), Some(3.5));
        state.remove_edge_from_heap(edge).unwrap();
        assert!(state.edges[edge as usize].handle.is_none());
        assert!(state.heaps.is_empty(heap).unwrap());
        // dropping a populated heap wholesale also clears the back references
        state.add_plus_infinity_edge(t0, edge).unwrap();
        state.release_tree_heaps(t0);
        assert!(state.edges[edge as usize].handle.is_none());
    }
}
