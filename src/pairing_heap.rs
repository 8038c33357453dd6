//! Pairing Heap
//!
//! An addressable, mergeable priority queue used for every best-edge selection in
//! the solver. Multi-pass pairing on `delete_min` (left-to-right pairing followed
//! by a right-to-left fold), O(1) `find_min` and `meld`, amortized O(log n)
//! `insert`, `delete`, `delete_min` and `decrease_key`.
//!
//! All heaps of a solve live in one arena so that handles stay plain indices.
//! Melding absorbs one heap into another: the absorbed heap records its survivor
//! in its `other` field and becomes unusable, while every handle pointing at it
//! keeps working by walking (and compressing) the `other` chain, a tiny
//! union-find over heaps.
//!

use super::util::*;

/// handle to an element; stays valid across `meld` and is invalidated by
/// `delete`/`delete_min`/`clear`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapHandle(usize);

/// identifies one heap within the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapId(usize);

/// direction of the comparator; heaps may only meld with an equal one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeapOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
struct HeapNode<P> {
    key: Weight,
    payload: P,
    /// first child, or None for a leaf
    child: Option<usize>,
    /// next sibling in the child list
    next: Option<usize>,
    /// previous sibling, or the parent for the first child; None for a root
    prev: Option<usize>,
    /// the heap this element was inserted into; resolve through `other` chains
    heap: usize,
    occupied: bool,
}

#[derive(Debug, Clone)]
struct HeapCell {
    root: Option<usize>,
    size: usize,
    /// self while alive; the absorbing heap once melded away
    other: usize,
    order: HeapOrder,
    released: bool,
}

/// arena holding every heap and every element of a solve
#[derive(Debug, Clone, Default)]
pub struct PairingHeaps<P> {
    nodes: Vec<HeapNode<P>>,
    free_nodes: Vec<usize>,
    heaps: Vec<HeapCell>,
    free_heaps: Vec<usize>,
}

impl<P: Copy> PairingHeaps<P> {
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            free_nodes: vec![],
            heaps: vec![],
            free_heaps: vec![],
        }
    }

    pub fn new_heap(&mut self) -> HeapId {
        self.new_heap_with_order(HeapOrder::Ascending)
    }

    pub fn new_heap_with_order(&mut self, order: HeapOrder) -> HeapId {
        let cell = HeapCell {
            root: None,
            size: 0,
            other: usize::MAX, // fixed up below to point at itself
            order,
            released: false,
        };
        let index = if let Some(index) = self.free_heaps.pop() {
            self.heaps[index] = cell;
            index
        } else {
            self.heaps.push(cell);
            self.heaps.len() - 1
        };
        self.heaps[index].other = index;
        HeapId(index)
    }

    /// whether `a` should be above `b`
    fn above(&self, order: HeapOrder, a: Weight, b: Weight) -> bool {
        match order {
            HeapOrder::Ascending => a <= b,
            HeapOrder::Descending => a >= b,
        }
    }

    /// resolve a heap to its current owner, compressing the `other` chain;
    /// fails if the heap has been absorbed (it is no longer usable directly)
    fn resolve(&mut self, heap: HeapId) -> Result<usize, MatchingError> {
        let index = self.find_owner(heap.0);
        if index != heap.0 || self.heaps[index].released {
            return Err(MatchingError::HeapAlreadyMelded);
        }
        Ok(index)
    }

    fn find_owner(&mut self, mut index: usize) -> usize {
        while self.heaps[index].other != index {
            let parent = self.heaps[index].other;
            let grandparent = self.heaps[parent].other;
            self.heaps[index].other = grandparent; // path compression
            index = grandparent;
        }
        index
    }

    fn check_handle(&self, handle: HeapHandle) -> Result<(), MatchingError> {
        if handle.0 >= self.nodes.len() || !self.nodes[handle.0].occupied {
            return Err(MatchingError::InvalidHeapHandle);
        }
        Ok(())
    }

    /// link two root subtrees, returning the one that stays on top
    fn link(&mut self, order: HeapOrder, a: usize, b: usize) -> usize {
        let (upper, lower) = if self.above(order, self.nodes[a].key, self.nodes[b].key) {
            (a, b)
        } else {
            (b, a)
        };
        let first = self.nodes[upper].child;
        self.nodes[lower].next = first;
        self.nodes[lower].prev = Some(upper);
        if let Some(first) = first {
            self.nodes[first].prev = Some(lower);
        }
        self.nodes[upper].child = Some(lower);
        self.nodes[upper].next = None;
        self.nodes[upper].prev = None;
        upper
    }

    /// multi-pass combine of a child list into a single subtree
    fn combine(&mut self, order: HeapOrder, first: Option<usize>) -> Option<usize> {
        let mut roots = vec![];
        let mut cursor = first;
        while let Some(index) = cursor {
            cursor = self.nodes[index].next;
            self.nodes[index].next = None;
            self.nodes[index].prev = None;
            roots.push(index);
        }
        if roots.is_empty() {
            return None;
        }
        // left-to-right pairing pass
        let mut paired = vec![];
        let mut iter = roots.chunks_exact(2);
        for pair in iter.by_ref() {
            paired.push(self.link(order, pair[0], pair[1]));
        }
        if let Some(&last) = iter.remainder().first() {
            paired.push(last);
        }
        // right-to-left fold
        let mut root = paired.pop().unwrap();
        while let Some(next) = paired.pop() {
            root = self.link(order, next, root);
        }
        Some(root)
    }

    /// detach an element from its parent's child list; no-op for the root
    fn detach(&mut self, index: usize) {
        let prev = self.nodes[index].prev;
        let next = self.nodes[index].next;
        if let Some(prev) = prev {
            if self.nodes[prev].child == Some(index) {
                self.nodes[prev].child = next;
            } else {
                self.nodes[prev].next = next;
            }
        }
        if let Some(next) = next {
            self.nodes[next].prev = prev;
        }
        self.nodes[index].prev = None;
        self.nodes[index].next = None;
    }

    pub fn insert(&mut self, heap: HeapId, key: Weight, payload: P) -> Result<HeapHandle, MatchingError> {
        let owner = self.resolve(heap)?;
        let node = HeapNode {
            key,
            payload,
            child: None,
            next: None,
            prev: None,
            heap: owner,
            occupied: true,
        };
        let index = if let Some(index) = self.free_nodes.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        };
        let order = self.heaps[owner].order;
        self.heaps[owner].root = match self.heaps[owner].root {
            Some(root) => Some(self.link(order, root, index)),
            None => Some(index),
        };
        self.heaps[owner].size += 1;
        Ok(HeapHandle(index))
    }

    pub fn find_min(&mut self, heap: HeapId) -> Result<Option<HeapHandle>, MatchingError> {
        let owner = self.resolve(heap)?;
        Ok(self.heaps[owner].root.map(HeapHandle))
    }

    /// minimum key without popping, None when empty
    pub fn min_key(&mut self, heap: HeapId) -> Result<Option<Weight>, MatchingError> {
        let owner = self.resolve(heap)?;
        Ok(self.heaps[owner].root.map(|root| self.nodes[root].key))
    }

    pub fn delete_min(&mut self, heap: HeapId) -> Result<Option<(Weight, P)>, MatchingError> {
        let owner = self.resolve(heap)?;
        let Some(root) = self.heaps[owner].root else {
            return Ok(None);
        };
        self.delete(HeapHandle(root)).map(Some)
    }

    /// remove an arbitrary element by handle; the handle becomes invalid
    pub fn delete(&mut self, handle: HeapHandle) -> Result<(Weight, P), MatchingError> {
        self.check_handle(handle)?;
        let index = handle.0;
        let owner = self.find_owner(self.nodes[index].heap);
        let order = self.heaps[owner].order;
        let subtree = self.combine(order, self.nodes[index].child);
        if self.heaps[owner].root == Some(index) {
            self.heaps[owner].root = subtree;
        } else {
            self.detach(index);
            if let Some(subtree) = subtree {
                let root = self.heaps[owner].root.unwrap();
                self.heaps[owner].root = Some(self.link(order, root, subtree));
            }
        }
        self.heaps[owner].size -= 1;
        let node = &mut self.nodes[index];
        node.occupied = false;
        node.child = None;
        let entry = (node.key, node.payload);
        self.free_nodes.push(index);
        Ok(entry)
    }

    /// move an element towards the top; fails if `new_key` would move it away
    pub fn decrease_key(&mut self, handle: HeapHandle, new_key: Weight) -> Result<(), MatchingError> {
        self.check_handle(handle)?;
        let index = handle.0;
        let owner = self.find_owner(self.nodes[index].heap);
        let order = self.heaps[owner].order;
        if !self.above(order, new_key, self.nodes[index].key) {
            return Err(MatchingError::KeyNotDecreased);
        }
        self.nodes[index].key = new_key;
        if self.heaps[owner].root == Some(index) {
            return Ok(());
        }
        self.detach(index);
        let root = self.heaps[owner].root.unwrap();
        self.heaps[owner].root = Some(self.link(order, root, index));
        Ok(())
    }

    /// absorb `other` into `target`: `other` becomes unusable, its handles keep
    /// addressing the surviving heap
    pub fn meld(&mut self, target: HeapId, other: HeapId) -> Result<(), MatchingError> {
        let target = self.resolve(target)?;
        let other = self.resolve(other)?;
        if target == other {
            return Ok(());
        }
        if self.heaps[target].order != self.heaps[other].order {
            return Err(MatchingError::ComparatorMismatch);
        }
        let order = self.heaps[target].order;
        self.heaps[target].root = match (self.heaps[target].root, self.heaps[other].root) {
            (Some(a), Some(b)) => Some(self.link(order, a, b)),
            (root, None) | (None, root) => root,
        };
        self.heaps[target].size += self.heaps[other].size;
        self.heaps[other].root = None;
        self.heaps[other].size = 0;
        self.heaps[other].other = target;
        Ok(())
    }

    pub fn is_empty(&mut self, heap: HeapId) -> Result<bool, MatchingError> {
        let owner = self.resolve(heap)?;
        Ok(self.heaps[owner].size == 0)
    }

    pub fn count(&mut self, heap: HeapId) -> Result<usize, MatchingError> {
        let owner = self.resolve(heap)?;
        Ok(self.heaps[owner].size)
    }

    /// drop every element; their handles become invalid
    pub fn clear(&mut self, heap: HeapId) -> Result<(), MatchingError> {
        let owner = self.resolve(heap)?;
        let mut stack = vec![];
        if let Some(root) = self.heaps[owner].root.take() {
            stack.push(root);
        }
        while let Some(index) = stack.pop() {
            if let Some(child) = self.nodes[index].child {
                stack.push(child);
            }
            if let Some(next) = self.nodes[index].next {
                stack.push(next);
            }
            let node = &mut self.nodes[index];
            node.occupied = false;
            node.child = None;
            node.next = None;
            node.prev = None;
            self.free_nodes.push(index);
        }
        self.heaps[owner].size = 0;
        Ok(())
    }

    /// clear a heap and return its cell to the arena; absorbed heaps are
    /// released implicitly with their survivor
    pub fn release(&mut self, heap: HeapId) {
        if self.resolve(heap).is_err() {
            return;
        }
        self.clear(heap).unwrap();
        self.heaps[heap.0].released = true;
        self.free_heaps.push(heap.0);
    }

    pub fn key(&self, handle: HeapHandle) -> Result<Weight, MatchingError> {
        self.check_handle(handle)?;
        Ok(self.nodes[handle.0].key)
    }

    pub fn payload(&self, handle: HeapHandle) -> Result<P, MatchingError> {
        self.check_handle(handle)?;
        Ok(self.nodes[handle.0].payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn pairing_heap_basic_ordering() {
        // cargo test pairing_heap_basic_ordering -- --nocapture
        let mut heaps = PairingHeaps::<usize>::new();
        let heap = heaps.new_heap();
        assert!(heaps.is_empty(heap).unwrap());
        for (index, key) in [5., 1., 4., 2., 3.].into_iter().enumerate() {
            heaps.insert(heap, key, index).unwrap();
        }
        assert_eq!(heaps.count(heap).unwrap(), 5);
        let mut popped = vec![];
        while let Some((key, _)) = heaps.delete_min(heap).unwrap() {
            popped.push(key);
        }
        assert_eq!(popped, vec![1., 2., 3., 4., 5.]);
        assert!(heaps.is_empty(heap).unwrap());
    }

    #[test]
    fn pairing_heap_decrease_key() {
        let mut heaps = PairingHeaps::<usize>::new();
        let heap = heaps.new_heap();
        let _a = heaps.insert(heap, 10., 0).unwrap();
        let b = heaps.insert(heap, 20., 1).unwrap();
        heaps.decrease_key(b, 5.).unwrap();
        assert_eq!(heaps.min_key(heap).unwrap(), Some(5.));
        let min_handle = heaps.find_min(heap).unwrap().unwrap();
        assert_eq!(heaps.payload(min_handle).unwrap(), 1);
        // increasing is rejected and the heap is untouched
        assert_eq!(heaps.decrease_key(b, 7.), Err(MatchingError::KeyNotDecreased));
        assert_eq!(heaps.min_key(heap).unwrap(), Some(5.));
    }

    #[test]
    fn pairing_heap_delete_arbitrary() {
        let mut heaps = PairingHeaps::<usize>::new();
        let heap = heaps.new_heap();
        let handles: Vec<_> = (0..10)
            .map(|index| heaps.insert(heap, index as Weight, index).unwrap())
            .collect();
        let (key, payload) = heaps.delete(handles[3]).unwrap();
        assert_eq!((key, payload), (3., 3));
        // deleted handles are dead
        assert_eq!(heaps.delete(handles[3]), Err(MatchingError::InvalidHeapHandle));
        let mut popped = vec![];
        while let Some((_, payload)) = heaps.delete_min(heap).unwrap() {
            popped.push(payload);
        }
        assert_eq!(popped, vec![0, 1, 2, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn pairing_heap_meld_semantics() {
        let mut heaps = PairingHeaps::<usize>::new();
        let alpha = heaps.new_heap();
        let beta = heaps.new_heap();
        let in_alpha = heaps.insert(alpha, 4., 0).unwrap();
        let in_beta = heaps.insert(beta, 2., 1).unwrap();
        heaps.meld(alpha, beta).unwrap();
        assert_eq!(heaps.count(alpha).unwrap(), 2);
        // the absorbed heap is unusable for direct operations
        assert_eq!(heaps.insert(beta, 1., 2), Err(MatchingError::HeapAlreadyMelded));
        assert_eq!(heaps.find_min(beta), Err(MatchingError::HeapAlreadyMelded));
        // but its handles keep addressing the surviving heap without iteration
        heaps.decrease_key(in_beta, 1.).unwrap();
        assert_eq!(heaps.min_key(alpha).unwrap(), Some(1.));
        heaps.delete(in_beta).unwrap();
        assert_eq!(heaps.min_key(alpha).unwrap(), Some(4.));
        heaps.delete(in_alpha).unwrap();
        assert!(heaps.is_empty(alpha).unwrap());
    }

    #[test]
    fn pairing_heap_meld_chain_compresses() {
        let mut heaps = PairingHeaps::<usize>::new();
        let ids: Vec<_> = (0..6).map(|_| heaps.new_heap()).collect();
        let handles: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(index, &id)| heaps.insert(id, index as Weight, index).unwrap())
            .collect();
        // chain of melds: everything survives in ids[0]
        for window in (0..6).rev().collect::<Vec<_>>().windows(2) {
            heaps.meld(ids[window[1]], ids[window[0]]).unwrap();
        }
        assert_eq!(heaps.count(ids[0]).unwrap(), 6);
        for (index, &handle) in handles.iter().enumerate() {
            assert_eq!(heaps.payload(handle).unwrap(), index);
        }
        // deleting through the deepest handle still fixes up the survivor
        heaps.delete(handles[5]).unwrap();
        assert_eq!(heaps.count(ids[0]).unwrap(), 5);
    }

    #[test]
    fn pairing_heap_comparator_mismatch() {
        let mut heaps = PairingHeaps::<usize>::new();
        let ascending = heaps.new_heap();
        let descending = heaps.new_heap_with_order(HeapOrder::Descending);
        assert_eq!(heaps.meld(ascending, descending), Err(MatchingError::ComparatorMismatch));
        heaps.insert(descending, 1., 0).unwrap();
        heaps.insert(descending, 9., 1).unwrap();
        assert_eq!(heaps.min_key(descending).unwrap(), Some(9.));
    }

    #[test]
    fn pairing_heap_random_against_reference() {
        // cargo test pairing_heap_random_against_reference -- --nocapture
        let mut rng = Xoshiro256StarStar::seed_from_u64(42);
        for _ in 0..20 {
            let mut heaps = PairingHeaps::<usize>::new();
            let heap = heaps.new_heap();
            let mut reference: Vec<(Weight, usize)> = vec![];
            let mut handles = vec![];
            for payload in 0..200 {
                let key = (rng.next_u32() % 10000) as Weight / 10.;
                handles.push(Some(heaps.insert(heap, key, payload).unwrap()));
                reference.push((key, payload));
            }
            // interleave decrease-key, delete and delete-min
            for _ in 0..300 {
                match rng.next_u32() % 3 {
                    0 => {
                        let payload = rng.next_u32() as usize % handles.len();
                        if let Some(handle) = handles[payload] {
                            let new_key = heaps.key(handle).unwrap() - (rng.next_u32() % 100) as Weight;
                            heaps.decrease_key(handle, new_key).unwrap();
                            reference.iter_mut().find(|entry| entry.1 == payload).unwrap().0 = new_key;
                        }
                    }
                    1 => {
                        let payload = rng.next_u32() as usize % handles.len();
                        if let Some(handle) = handles[payload].take() {
                            heaps.delete(handle).unwrap();
                            reference.retain(|entry| entry.1 != payload);
                        }
                    }
                    _ => {
                        if let Some((key, payload)) = heaps.delete_min(heap).unwrap() {
                            let min = reference.iter().cloned().fold(Weight::MAX, |acc, entry| acc.min(entry.0));
                            assert_eq!(key, min);
                            handles[payload] = None;
                            reference.retain(|entry| entry.1 != payload);
                        }
                    }
                }
                assert_eq!(heaps.count(heap).unwrap(), reference.len());
            }
        }
    }
}
