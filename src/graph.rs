//! Graph Abstraction
//!
//! An undirected simple graph over opaque hashable vertex ids, and a weighted
//! view that overlays an edge-to-weight mapping and/or a weight function on any
//! graph. The matching solver only ever reads vertex enumeration, incident
//! edges, endpoints, weights and the edge count.
//!

use super::util::{MatchingError, Weight, DEFAULT_EDGE_WEIGHT};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

/// identifies an edge within one graph; stable until the edge is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// the capability set the matching client depends on; implementations must keep
/// these constant or linear in the returned set
pub trait WeightedGraph {
    type Vertex: Clone + Eq + Hash;

    fn vertex_count(&self) -> usize;
    fn edge_count(&self) -> usize;
    fn iter_vertices(&self) -> Box<dyn Iterator<Item = Self::Vertex> + '_>;
    fn iter_edges(&self) -> Box<dyn Iterator<Item = EdgeId> + '_>;
    fn iter_incident(&self, vertex: &Self::Vertex) -> Box<dyn Iterator<Item = EdgeId> + '_>;
    fn source(&self, edge: EdgeId) -> Option<Self::Vertex>;
    fn target(&self, edge: EdgeId) -> Option<Self::Vertex>;

    fn weight(&self, _edge: EdgeId) -> Weight {
        DEFAULT_EDGE_WEIGHT
    }

    /// plain graphs ignore weight writes; decorators override
    fn set_weight(&mut self, _edge: EdgeId, _weight: Weight) {}

    fn endpoints(&self, edge: EdgeId) -> Option<(Self::Vertex, Self::Vertex)> {
        Some((self.source(edge)?, self.target(edge)?))
    }
}

#[derive(Debug, Clone)]
struct EdgeSlot {
    source: usize,
    target: usize,
}

/// undirected simple graph: at most one edge per unordered vertex pair, stored
/// as the ordered pair it was first added with
#[derive(Debug, Clone, Default)]
pub struct UndirectedSimpleGraph<V: Clone + Eq + Hash> {
    vertex_slots: Vec<Option<V>>,
    vertex_index: HashMap<V, usize>,
    free_vertices: Vec<usize>,
    edge_slots: Vec<Option<EdgeSlot>>,
    free_edges: Vec<usize>,
    /// incident edge ids per vertex slot, insertion order
    adjacency: Vec<Vec<EdgeId>>,
    /// normalized (min, max) vertex slot pair to edge id
    pair_index: HashMap<(usize, usize), EdgeId>,
    vertex_num: usize,
    edge_num: usize,
}

impl<V: Clone + Eq + Hash> UndirectedSimpleGraph<V> {
    pub fn new() -> Self {
        Self {
            vertex_slots: vec![],
            vertex_index: HashMap::new(),
            free_vertices: vec![],
            edge_slots: vec![],
            free_edges: vec![],
            adjacency: vec![],
            pair_index: HashMap::new(),
            vertex_num: 0,
            edge_num: 0,
        }
    }

    /// false if the vertex is already present
    pub fn add_vertex(&mut self, vertex: V) -> bool {
        if self.vertex_index.contains_key(&vertex) {
            return false;
        }
        let slot = if let Some(slot) = self.free_vertices.pop() {
            self.vertex_slots[slot] = Some(vertex.clone());
            self.adjacency[slot].clear();
            slot
        } else {
            self.vertex_slots.push(Some(vertex.clone()));
            self.adjacency.push(vec![]);
            self.vertex_slots.len() - 1
        };
        self.vertex_index.insert(vertex, slot);
        self.vertex_num += 1;
        true
    }

    pub fn contains_vertex(&self, vertex: &V) -> bool {
        self.vertex_index.contains_key(vertex)
    }

    fn normalized(a: usize, b: usize) -> (usize, usize) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// adds an edge between two existing vertices, returning the existing edge
    /// if the pair is already connected
    pub fn add_edge(&mut self, source: &V, target: &V) -> Result<EdgeId, MatchingError> {
        let source_slot = *self
            .vertex_index
            .get(source)
            .ok_or_else(|| MatchingError::InvalidInput("edge source is not a vertex of the graph".to_string()))?;
        let target_slot = *self
            .vertex_index
            .get(target)
            .ok_or_else(|| MatchingError::InvalidInput("edge target is not a vertex of the graph".to_string()))?;
        let pair = Self::normalized(source_slot, target_slot);
        if let Some(&existing) = self.pair_index.get(&pair) {
            return Ok(existing);
        }
        let slot = EdgeSlot {
            source: source_slot,
            target: target_slot,
        };
        let edge = if let Some(index) = self.free_edges.pop() {
            self.edge_slots[index] = Some(slot);
            EdgeId(index)
        } else {
            self.edge_slots.push(Some(slot));
            EdgeId(self.edge_slots.len() - 1)
        };
        self.adjacency[source_slot].push(edge);
        if target_slot != source_slot {
            self.adjacency[target_slot].push(edge);
        }
        self.pair_index.insert(pair, edge);
        self.edge_num += 1;
        Ok(edge)
    }

    /// looks up the edge between two vertices, in either endpoint order
    pub fn edge_between(&self, a: &V, b: &V) -> Option<EdgeId> {
        let a = *self.vertex_index.get(a)?;
        let b = *self.vertex_index.get(b)?;
        self.pair_index.get(&Self::normalized(a, b)).copied()
    }

    pub fn remove_edge(&mut self, edge: EdgeId) -> Option<(V, V)> {
        let slot = self.edge_slots.get_mut(edge.0)?.take()?;
        self.adjacency[slot.source].retain(|&e| e != edge);
        if slot.target != slot.source {
            self.adjacency[slot.target].retain(|&e| e != edge);
        }
        self.pair_index.remove(&Self::normalized(slot.source, slot.target));
        self.free_edges.push(edge.0);
        self.edge_num -= 1;
        let source = self.vertex_slots[slot.source].clone()?;
        let target = self.vertex_slots[slot.target].clone()?;
        Some((source, target))
    }

    /// removes a vertex together with all incident edges
    pub fn remove_vertex(&mut self, vertex: &V) -> bool {
        let Some(slot) = self.vertex_index.remove(vertex) else {
            return false;
        };
        for edge in std::mem::take(&mut self.adjacency[slot]) {
            if let Some(data) = self.edge_slots[edge.0].take() {
                let opposite = if data.source == slot { data.target } else { data.source };
                if opposite != slot {
                    self.adjacency[opposite].retain(|&e| e != edge);
                }
                self.pair_index.remove(&Self::normalized(data.source, data.target));
                self.free_edges.push(edge.0);
                self.edge_num -= 1;
            }
        }
        self.vertex_slots[slot] = None;
        self.free_vertices.push(slot);
        self.vertex_num -= 1;
        true
    }

    pub fn vertex_set(&self) -> Vec<V> {
        self.iter_vertices().collect()
    }

    pub fn edge_set(&self) -> Vec<EdgeId> {
        self.iter_edges().collect()
    }
}

impl<V: Clone + Eq + Hash> WeightedGraph for UndirectedSimpleGraph<V> {
    type Vertex = V;

    fn vertex_count(&self) -> usize {
        self.vertex_num
    }

    fn edge_count(&self) -> usize {
        self.edge_num
    }

    fn iter_vertices(&self) -> Box<dyn Iterator<Item = V> + '_> {
        Box::new(self.vertex_slots.iter().filter_map(|slot| slot.clone()))
    }

    fn iter_edges(&self) -> Box<dyn Iterator<Item = EdgeId> + '_> {
        Box::new(
            self.edge_slots
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| slot.as_ref().map(|_| EdgeId(index))),
        )
    }

    fn iter_incident(&self, vertex: &V) -> Box<dyn Iterator<Item = EdgeId> + '_> {
        match self.vertex_index.get(vertex) {
            Some(&slot) => Box::new(self.adjacency[slot].iter().copied()),
            None => Box::new(std::iter::empty()),
        }
    }

    fn source(&self, edge: EdgeId) -> Option<V> {
        let slot = self.edge_slots.get(edge.0)?.as_ref()?;
        self.vertex_slots[slot.source].clone()
    }

    fn target(&self, edge: EdgeId) -> Option<V> {
        let slot = self.edge_slots.get(edge.0)?.as_ref()?;
        self.vertex_slots[slot.target].clone()
    }
}

/// weight function used by [`WeightedView`]
pub type WeightFunction<V> = Box<dyn Fn(&V, &V) -> Weight>;

/// decorator that answers weight queries from an explicit mapping first, then a
/// weight function (optionally cached), then the wrapped graph
pub struct WeightedView<G: WeightedGraph> {
    graph: G,
    weights: HashMap<EdgeId, Weight>,
    function: Option<WeightFunction<G::Vertex>>,
    cache_enabled: bool,
    cache: RefCell<HashMap<EdgeId, Weight>>,
    /// forward `set_weight` into the wrapped graph as well
    propagate_writes: bool,
}

impl<G: WeightedGraph> WeightedView<G> {
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            weights: HashMap::new(),
            function: None,
            cache_enabled: false,
            cache: RefCell::new(HashMap::new()),
            propagate_writes: false,
        }
    }

    pub fn with_function(graph: G, function: WeightFunction<G::Vertex>, cache_enabled: bool) -> Self {
        Self {
            graph,
            weights: HashMap::new(),
            function: Some(function),
            cache_enabled,
            cache: RefCell::new(HashMap::new()),
            propagate_writes: false,
        }
    }

    pub fn propagate_writes(mut self, propagate: bool) -> Self {
        self.propagate_writes = propagate;
        self
    }

    pub fn inner(&self) -> &G {
        &self.graph
    }

    pub fn inner_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    pub fn into_inner(self) -> G {
        self.graph
    }
}

impl<G: WeightedGraph> WeightedGraph for WeightedView<G> {
    type Vertex = G::Vertex;

    fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn iter_vertices(&self) -> Box<dyn Iterator<Item = Self::Vertex> + '_> {
        self.graph.iter_vertices()
    }

    fn iter_edges(&self) -> Box<dyn Iterator<Item = EdgeId> + '_> {
        self.graph.iter_edges()
    }

    fn iter_incident(&self, vertex: &Self::Vertex) -> Box<dyn Iterator<Item = EdgeId> + '_> {
        self.graph.iter_incident(vertex)
    }

    fn source(&self, edge: EdgeId) -> Option<Self::Vertex> {
        self.graph.source(edge)
    }

    fn target(&self, edge: EdgeId) -> Option<Self::Vertex> {
        self.graph.target(edge)
    }

    fn weight(&self, edge: EdgeId) -> Weight {
        if let Some(&weight) = self.weights.get(&edge) {
            return weight;
        }
        if let Some(function) = self.function.as_ref() {
            if self.cache_enabled {
                if let Some(&weight) = self.cache.borrow().get(&edge) {
                    return weight;
                }
            }
            if let Some((source, target)) = self.endpoints(edge) {
                let weight = function(&source, &target);
                if self.cache_enabled {
                    self.cache.borrow_mut().insert(edge, weight);
                }
                return weight;
            }
        }
        self.graph.weight(edge)
    }

    fn set_weight(&mut self, edge: EdgeId, weight: Weight) {
        self.weights.insert(edge, weight);
        self.cache.borrow_mut().remove(&edge);
        if self.propagate_writes {
            self.graph.set_weight(edge, weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> UndirectedSimpleGraph<u32> {
        let mut graph = UndirectedSimpleGraph::new();
        for vertex in 1..=4 {
            assert!(graph.add_vertex(vertex));
        }
        graph.add_edge(&1, &2).unwrap();
        graph.add_edge(&2, &3).unwrap();
        graph.add_edge(&3, &4).unwrap();
        graph.add_edge(&4, &1).unwrap();
        graph
    }

    #[test]
    fn simple_graph_construction() {
        // cargo test simple_graph_construction -- --nocapture
        let mut graph = diamond();
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(!graph.add_vertex(2));
        // an edge is equal regardless of endpoint order
        let ab = graph.add_edge(&1, &2).unwrap();
        let ba = graph.add_edge(&2, &1).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.weight(ab), DEFAULT_EDGE_WEIGHT);
        // writes to the plain graph are ignored
        graph.set_weight(ab, 7.);
        assert_eq!(graph.weight(ab), DEFAULT_EDGE_WEIGHT);
        assert!(graph.add_edge(&1, &9).is_err());
    }

    #[test]
    fn simple_graph_removal() {
        let mut graph = diamond();
        let edge = graph.edge_between(&2, &3).unwrap();
        assert_eq!(graph.remove_edge(edge), Some((2, 3)));
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge_between(&2, &3), None);
        assert!(graph.remove_vertex(&1));
        assert_eq!(graph.vertex_count(), 3);
        // both edges at vertex 1 went with it
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.iter_incident(&2).count(), 0);
        assert_eq!(graph.iter_incident(&4).count(), 1);
        // slots are reused without disturbing the surviving edges
        assert!(graph.add_vertex(5));
        graph.add_edge(&5, &2).unwrap();
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn weighted_view_mapping_and_function() {
        let graph = diamond();
        let mut view = WeightedView::with_function(graph, Box::new(|a: &u32, b: &u32| (a + b) as Weight), true);
        let edge = view.inner().edge_between(&1, &2).unwrap();
        assert_eq!(view.weight(edge), 3.);
        // the explicit mapping shadows the function
        view.set_weight(edge, 10.);
        assert_eq!(view.weight(edge), 10.);
        let other = view.inner().edge_between(&3, &4).unwrap();
        assert_eq!(view.weight(other), 7.);
    }

    #[test]
    fn weighted_view_propagation() {
        let graph = diamond();
        let inner_view = WeightedView::new(graph);
        let mut outer = WeightedView::new(inner_view).propagate_writes(true);
        let edge = outer.inner().inner().edge_between(&4, &1).unwrap();
        outer.set_weight(edge, 2.5);
        assert_eq!(outer.weight(edge), 2.5);
        // the write reached the wrapped view as well
        assert_eq!(outer.inner().weight(edge), 2.5);
    }
}
