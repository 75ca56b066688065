//! # Weighted Undirected Graph
//!
//! The graph abstraction the exploration graph is built on.
//!
//! This module defines the `WeightedGraph` (read) and `MutableWeightedGraph`
//! (write) traits and the volatile `InMemoryGraph` realization.
//! The durable realization lives in [`crate::storage`].
//!
//! ## Contract
//!
//! - Edges are undirected: `(u, v, w)` is always stored together with `(v, u, w)`.
//! - No vertex ever holds more than `max_degree` edges.
//! - A missing edge is reported as `None`, a missing vertex as
//!   [`DegError::VertexNotFound`].
//! - All adjacency maps are `BTreeMap`s, so neighbour order is deterministic.

use crate::DegError;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Iterator over the vertices of a graph. Each call to
/// [`WeightedGraph::vertices`] starts a fresh, finite iteration.
pub type VertexIter<'a, V> = Box<dyn Iterator<Item = Result<V, DegError>> + 'a>;

// =============================================================================
// GRAPH TRAITS
// =============================================================================

/// Read half of the weighted, undirected graph contract.
///
/// All fallible operations return `Result<T, DegError>` to support both
/// in-memory and persistent storage backends uniformly.
pub trait WeightedGraph<V> {
    /// Number of vertices.
    fn size(&self) -> Result<usize, DegError>;

    /// Maximum number of edges any single vertex may hold.
    fn max_degree(&self) -> usize;

    /// Check if a vertex exists.
    fn contains_vertex(&self, v: &V) -> Result<bool, DegError>;

    /// Weight of the edge between `from` and `to`, or `None` if there is no edge.
    ///
    /// Fails only if `from` does not exist.
    fn weight(&self, from: &V, to: &V) -> Result<Option<f32>, DegError>;

    /// Check if there is an edge between `from` and `to`.
    fn has_edge(&self, from: &V, to: &V) -> Result<bool, DegError> {
        Ok(self.weight(from, to)?.is_some())
    }

    /// All neighbours of `from` with their edge weights.
    fn edges(&self, from: &V) -> Result<BTreeMap<V, f32>, DegError>;

    /// All vertices, in unspecified order.
    fn vertices(&self) -> Result<VertexIter<'_, V>, DegError>;
}

/// Write half of the weighted, undirected graph contract.
pub trait MutableWeightedGraph<V>: WeightedGraph<V> {
    /// Add a vertex without edges. Returns `false` if it already exists.
    fn add_vertex(&mut self, v: V) -> Result<bool, DegError>;

    /// Remove a vertex and every edge incident to it.
    /// Returns `false` if it does not exist.
    fn remove_vertex(&mut self, v: &V) -> Result<bool, DegError>;

    /// Add an undirected edge.
    ///
    /// Returns `false` if the edge already exists or if either endpoint is
    /// already at `max_degree`. Both directions are inserted or neither is.
    fn add_edge(&mut self, from: &V, to: &V, weight: f32) -> Result<bool, DegError>;

    /// Remove an undirected edge. Returns `false` if there is no such edge.
    fn remove_edge(&mut self, from: &V, to: &V) -> Result<bool, DegError>;
}

impl<V, G: WeightedGraph<V> + ?Sized> WeightedGraph<V> for &G {
    fn size(&self) -> Result<usize, DegError> {
        (**self).size()
    }

    fn max_degree(&self) -> usize {
        (**self).max_degree()
    }

    fn contains_vertex(&self, v: &V) -> Result<bool, DegError> {
        (**self).contains_vertex(v)
    }

    fn weight(&self, from: &V, to: &V) -> Result<Option<f32>, DegError> {
        (**self).weight(from, to)
    }

    fn edges(&self, from: &V) -> Result<BTreeMap<V, f32>, DegError> {
        (**self).edges(from)
    }

    fn vertices(&self) -> Result<VertexIter<'_, V>, DegError> {
        (**self).vertices()
    }
}

impl<V, G: WeightedGraph<V> + ?Sized> WeightedGraph<V> for &mut G {
    fn size(&self) -> Result<usize, DegError> {
        (**self).size()
    }

    fn max_degree(&self) -> usize {
        (**self).max_degree()
    }

    fn contains_vertex(&self, v: &V) -> Result<bool, DegError> {
        (**self).contains_vertex(v)
    }

    fn weight(&self, from: &V, to: &V) -> Result<Option<f32>, DegError> {
        (**self).weight(from, to)
    }

    fn edges(&self, from: &V) -> Result<BTreeMap<V, f32>, DegError> {
        (**self).edges(from)
    }

    fn vertices(&self) -> Result<VertexIter<'_, V>, DegError> {
        (**self).vertices()
    }
}

impl<V, G: MutableWeightedGraph<V> + ?Sized> MutableWeightedGraph<V> for &mut G {
    fn add_vertex(&mut self, v: V) -> Result<bool, DegError> {
        (**self).add_vertex(v)
    }

    fn remove_vertex(&mut self, v: &V) -> Result<bool, DegError> {
        (**self).remove_vertex(v)
    }

    fn add_edge(&mut self, from: &V, to: &V, weight: f32) -> Result<bool, DegError> {
        (**self).add_edge(from, to, weight)
    }

    fn remove_edge(&mut self, from: &V, to: &V) -> Result<bool, DegError> {
        (**self).remove_edge(from, to)
    }
}

/// Copy every vertex and edge of `source` into `target`.
///
/// Each undirected edge is written once. Vertices already present in
/// `target` are kept; conflicting edges are reported as corruption.
pub fn copy_graph<V, S, T>(source: &S, target: &mut T) -> Result<(), DegError>
where
    V: Ord + Clone + Debug,
    S: WeightedGraph<V> + ?Sized,
    T: MutableWeightedGraph<V> + ?Sized,
{
    let vertices = source.vertices()?.collect::<Result<Vec<_>, _>>()?;
    for vertex in &vertices {
        target.add_vertex(vertex.clone())?;
    }
    for vertex in &vertices {
        for (neighbour, weight) in source.edges(vertex)? {
            if *vertex < neighbour
                && !target.has_edge(vertex, &neighbour)?
                && !target.add_edge(vertex, &neighbour, weight)?
            {
                return Err(DegError::GraphCorrupted(format!(
                    "copying edge {vertex:?} -> {neighbour:?} exceeded the degree bound"
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// IN-MEMORY IMPLEMENTATION
// =============================================================================

/// A volatile adjacency-list graph.
///
/// Adjacency list: vertex -> (neighbour -> weight). Uses `BTreeMap`
/// exclusively for deterministic ordering.
#[derive(Debug, Clone)]
pub struct InMemoryGraph<V> {
    adjacency: BTreeMap<V, BTreeMap<V, f32>>,
    max_degree: usize,
}

impl<V: Ord + Clone + Debug> InMemoryGraph<V> {
    /// Create a new empty graph whose vertices hold at most `max_degree` edges.
    #[must_use]
    pub fn new(max_degree: usize) -> Self {
        Self {
            adjacency: BTreeMap::new(),
            max_degree,
        }
    }

    /// Build an in-memory copy of any other graph.
    pub fn from_graph<G: WeightedGraph<V> + ?Sized>(source: &G) -> Result<Self, DegError> {
        let mut graph = Self::new(source.max_degree());
        copy_graph(source, &mut graph)?;
        Ok(graph)
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    /// Check if the graph has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Neighbours of a vertex (iterator version for algorithms and tests).
    pub fn neighbours(&self, v: &V) -> impl Iterator<Item = (&V, f32)> + '_ {
        self.adjacency
            .get(v)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(n, w)| (n, *w)))
    }

    fn adjacency_of(&self, v: &V) -> Result<&BTreeMap<V, f32>, DegError> {
        self.adjacency
            .get(v)
            .ok_or_else(|| DegError::vertex_not_found(v))
    }
}

impl<V: Ord + Clone + Debug> WeightedGraph<V> for InMemoryGraph<V> {
    fn size(&self) -> Result<usize, DegError> {
        Ok(self.adjacency.len())
    }

    fn max_degree(&self) -> usize {
        self.max_degree
    }

    fn contains_vertex(&self, v: &V) -> Result<bool, DegError> {
        Ok(self.adjacency.contains_key(v))
    }

    fn weight(&self, from: &V, to: &V) -> Result<Option<f32>, DegError> {
        Ok(self.adjacency_of(from)?.get(to).copied())
    }

    fn edges(&self, from: &V) -> Result<BTreeMap<V, f32>, DegError> {
        self.adjacency_of(from).cloned()
    }

    fn vertices(&self) -> Result<VertexIter<'_, V>, DegError> {
        Ok(Box::new(self.adjacency.keys().cloned().map(Ok)))
    }
}

impl<V: Ord + Clone + Debug> MutableWeightedGraph<V> for InMemoryGraph<V> {
    fn add_vertex(&mut self, v: V) -> Result<bool, DegError> {
        if self.adjacency.contains_key(&v) {
            return Ok(false);
        }
        self.adjacency.insert(v, BTreeMap::new());
        Ok(true)
    }

    fn remove_vertex(&mut self, v: &V) -> Result<bool, DegError> {
        let Some(edges) = self.adjacency.remove(v) else {
            return Ok(false);
        };
        for neighbour in edges.keys() {
            if let Some(reverse) = self.adjacency.get_mut(neighbour) {
                reverse.remove(v);
            }
        }
        Ok(true)
    }

    fn add_edge(&mut self, from: &V, to: &V, weight: f32) -> Result<bool, DegError> {
        if from == to {
            return Err(DegError::SelfLoop(format!("{from:?}")));
        }
        let from_edges = self.adjacency_of(from)?;
        let to_edges = self.adjacency_of(to)?;

        if from_edges.contains_key(to) || to_edges.contains_key(from) {
            return Ok(false);
        }
        if from_edges.len() >= self.max_degree || to_edges.len() >= self.max_degree {
            return Ok(false);
        }

        // Both endpoints were checked above.
        if let Some(edges) = self.adjacency.get_mut(from) {
            edges.insert(to.clone(), weight);
        }
        if let Some(edges) = self.adjacency.get_mut(to) {
            edges.insert(from.clone(), weight);
        }
        Ok(true)
    }

    fn remove_edge(&mut self, from: &V, to: &V) -> Result<bool, DegError> {
        let forward = self.adjacency_of(from)?.contains_key(to);
        let backward = self.adjacency_of(to)?.contains_key(from);

        match (forward, backward) {
            (false, false) => Ok(false),
            (true, true) => {
                if let Some(edges) = self.adjacency.get_mut(from) {
                    edges.remove(to);
                }
                if let Some(edges) = self.adjacency.get_mut(to) {
                    edges.remove(from);
                }
                Ok(true)
            }
            _ => Err(DegError::GraphCorrupted(format!(
                "edge {from:?} <-> {to:?} is only stored in one direction"
            ))),
        }
    }
}

// =============================================================================
// CONTRACT CHECKS (shared by every backend's tests)
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================
