//! # Dynamic Exploration Graph
//!
//! The insertion and search algorithms of the index.
//!
//! The engine owns three injected collaborators:
//! - a graph realizing [`WeightedGraph`] / [`MutableWeightedGraph`]
//! - a vector store realizing [`VectorSource`] / [`VectorStore`]
//! - a [`DistanceFunction`] over the stored vectors
//!
//! It keeps no state of its own besides the configuration and the random
//! generator used to pick seed vertices.
//!
//! ## Insertion
//!
//! While the graph has at most `degree` vertices, every new vertex is
//! connected to all existing ones. Afterwards a new vertex is woven in by
//! edge swaps: for a candidate `c` near the new vertex, the longest edge
//! `(c, d)` is replaced by `(new, c)` and `(new, d)`. Every swap keeps the
//! degree of `c` and `d` and gives the new vertex two edges, so the graph
//! stays `degree`-regular.
//!
//! During the first [`MRNG_PHASES`] passes over the candidates, candidates
//! whose edge to the new vertex would be redundant under the monotonic
//! relative neighbourhood rule are skipped.

use crate::config::DegConfig;
use crate::distance::DistanceFunction;
use crate::graph::{MutableWeightedGraph, WeightedGraph};
use crate::primitives::{BRUTE_FORCE_THRESHOLD, DEFAULT_SEED_COUNT, INSERT_SEED_COUNT, MRNG_PHASES};
use crate::vectors::{VectorSource, VectorStore};
use crate::{DegError, Distance, Node};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// A Dynamic Exploration Graph over identifiers `I` and vectors `V`.
pub struct DynamicExplorationGraph<I, V, G, S, D> {
    config: DegConfig,
    graph: G,
    values: S,
    distance: D,
    rng: StdRng,
    _types: PhantomData<fn(I) -> V>,
}

impl<I, V, G: Debug, S: Debug, D> Debug for DynamicExplorationGraph<I, V, G, S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicExplorationGraph")
            .field("config", &self.config)
            .field("graph", &self.graph)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CONSTRUCTION & ACCESS
// =============================================================================

impl<I, V, G, S, D> DynamicExplorationGraph<I, V, G, S, D>
where
    G: WeightedGraph<Node<I>>,
{
    /// Create an engine over the given collaborators, seeding the sampler
    /// from the operating system.
    pub fn new(config: DegConfig, graph: G, values: S, distance: D) -> Result<Self, DegError> {
        Self::with_rng(config, graph, values, distance, StdRng::from_entropy())
    }

    /// Create an engine whose seed sampling is reproducible.
    pub fn with_seed(
        config: DegConfig,
        graph: G,
        values: S,
        distance: D,
        seed: u64,
    ) -> Result<Self, DegError> {
        Self::with_rng(config, graph, values, distance, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: DegConfig,
        graph: G,
        values: S,
        distance: D,
        rng: StdRng,
    ) -> Result<Self, DegError> {
        config.validate()?;
        if graph.max_degree() < config.degree {
            return Err(DegError::InvalidConfig(format!(
                "graph degree bound {} is below the configured degree {}",
                graph.max_degree(),
                config.degree
            )));
        }
        Ok(Self {
            config,
            graph,
            values,
            distance,
            rng,
            _types: PhantomData,
        })
    }

    /// The configuration fixed at construction.
    #[must_use]
    pub fn config(&self) -> &DegConfig {
        &self.config
    }

    /// Number of indexed vertices.
    pub fn size(&self) -> Result<usize, DegError> {
        self.graph.size()
    }

    /// The backing graph.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// The backing graph, mutably. Edits must keep the graph contract.
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// The backing vector store.
    pub fn values(&self) -> &S {
        &self.values
    }

    /// Take the collaborators back.
    pub fn into_parts(self) -> (G, S, D) {
        (self.graph, self.values, self.distance)
    }
}

// =============================================================================
// SEARCH
// =============================================================================

impl<I, V, G, S, D> DynamicExplorationGraph<I, V, G, S, D>
where
    I: Ord + Clone + Debug,
    G: WeightedGraph<Node<I>>,
    S: VectorSource<I, V>,
    D: DistanceFunction<V>,
{
    /// Approximate `k` nearest neighbours of `query`, starting the
    /// exploration from `seeds`.
    ///
    /// Results are ascending by distance and hold each identifier at most
    /// once. Graphs below [`BRUTE_FORCE_THRESHOLD`] vertices are scanned
    /// exhaustively and the seeds are ignored. Larger graphs are explored
    /// best-first; a popped vertex farther than `radius * (1 + epsilon)`
    /// ends the search, where `radius` is the distance of the current k-th
    /// result.
    pub fn search(
        &self,
        query: &V,
        k: usize,
        epsilon: f32,
        seeds: &[Node<I>],
    ) -> Result<Vec<Distance<I>>, DegError> {
        let size = self.graph.size()?;
        if k == 0 || size == 0 {
            return Ok(Vec::new());
        }

        let mut computations = 0usize;
        let results = if size < BRUTE_FORCE_THRESHOLD {
            self.scan(query, k, &mut computations)?
        } else {
            self.explore(query, k, epsilon, seeds, &mut computations)?
        };

        tracing::debug!(
            k,
            epsilon,
            size,
            computations,
            found = results.len(),
            "search finished"
        );
        Ok(results)
    }

    /// [`Self::search`] from `min(10, size)` randomly sampled seeds.
    ///
    /// Takes `&mut self` because sampling advances the engine's generator.
    pub fn search_default(
        &mut self,
        query: &V,
        k: usize,
        epsilon: f32,
    ) -> Result<Vec<Distance<I>>, DegError> {
        let size = self.graph.size()?;
        let seeds = self.random_seeds(DEFAULT_SEED_COUNT.min(size))?;
        self.search(query, k, epsilon, &seeds)
    }

    /// Pick `count` distinct vertices uniformly at random.
    ///
    /// Fails with [`DegError::SampleSizeExceeded`] if the graph has fewer
    /// vertices than requested.
    pub fn random_seeds(&mut self, count: usize) -> Result<Vec<Node<I>>, DegError> {
        let size = self.graph.size()?;
        if count > size {
            return Err(DegError::SampleSizeExceeded {
                requested: count,
                available: size,
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut positions = rand::seq::index::sample(&mut self.rng, size, count).into_vec();
        positions.sort_unstable();

        let mut seeds = Vec::with_capacity(count);
        let mut wanted = positions.into_iter().peekable();
        for (position, vertex) in self.graph.vertices()?.enumerate() {
            let Some(&next) = wanted.peek() else {
                break;
            };
            let vertex = vertex?;
            if position == next {
                seeds.push(vertex);
                wanted.next();
            }
        }

        if seeds.len() != count {
            return Err(DegError::GraphCorrupted(format!(
                "vertex iteration yielded fewer than the {size} counted vertices"
            )));
        }
        Ok(seeds)
    }

    /// Whether the edge `(v1, v2)` with weight `target` would be redundant
    /// under the monotonic relative neighbourhood rule.
    ///
    /// Returns `false` as soon as some neighbour `n` of `v1` that is also
    /// adjacent to `v2` satisfies `target > max(w(v1, n), w(n, v2))`.
    pub fn check_mrng(&self, v1: &Node<I>, v2: &Node<I>, target: f32) -> Result<bool, DegError> {
        for (neighbour, neighbour_weight) in self.graph.edges(v1)? {
            let Some(neighbour_target) = self.graph.weight(&neighbour, v2)? else {
                continue;
            };
            if target > neighbour_weight.max(neighbour_target) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn distance_to(
        &self,
        query: &V,
        node: &Node<I>,
        computations: &mut usize,
    ) -> Result<f32, DegError> {
        let value = self.values.get_value(node)?;
        *computations += 1;
        Ok(self.distance.distance(query, &value))
    }

    fn scan(
        &self,
        query: &V,
        k: usize,
        computations: &mut usize,
    ) -> Result<Vec<Distance<I>>, DegError> {
        let mut results = BTreeSet::new();
        for vertex in self.graph.vertices()? {
            let vertex = vertex?;
            let distance = self.distance_to(query, &vertex, computations)?;
            results.insert(Distance::new(vertex.into_label(), distance));
            if results.len() > k {
                results.pop_last();
            }
        }
        Ok(results.into_iter().collect())
    }

    fn explore(
        &self,
        query: &V,
        k: usize,
        epsilon: f32,
        seeds: &[Node<I>],
        computations: &mut usize,
    ) -> Result<Vec<Distance<I>>, DegError> {
        let mut checked = BTreeSet::new();
        let mut results = Results::new(k);
        let mut frontier = BinaryHeap::new();

        for seed in seeds {
            if !checked.insert(seed.clone()) {
                continue;
            }
            let distance = self.distance_to(query, seed, computations)?;
            let candidate = Distance::new(seed.label.clone(), distance);
            frontier.push(Reverse(candidate.clone()));
            results.admit(candidate);
        }

        while let Some(Reverse(next)) = frontier.pop() {
            if next.distance > results.bound(epsilon) {
                break;
            }
            for neighbour in self.graph.edges(&next.as_node())?.into_keys() {
                if !checked.insert(neighbour.clone()) {
                    continue;
                }
                let distance = self.distance_to(query, &neighbour, computations)?;
                if distance <= results.bound(epsilon) {
                    let candidate = Distance::new(neighbour.into_label(), distance);
                    frontier.push(Reverse(candidate.clone()));
                    results.admit(candidate);
                }
            }
        }

        Ok(results.into_vec())
    }
}

/// Bounded result set of the graph exploration.
struct Results<I> {
    entries: BTreeSet<Distance<I>>,
    k: usize,
    radius: f32,
}

impl<I: Ord> Results<I> {
    fn new(k: usize) -> Self {
        Self {
            entries: BTreeSet::new(),
            k,
            radius: f32::INFINITY,
        }
    }

    /// Distance beyond which vertices are no longer explored.
    fn bound(&self, epsilon: f32) -> f32 {
        self.radius * (1.0 + epsilon)
    }

    /// Keep `candidate` if it is closer than the current k-th result.
    fn admit(&mut self, candidate: Distance<I>) {
        if candidate.distance >= self.radius {
            return;
        }
        self.entries.insert(candidate);
        if self.entries.len() > self.k {
            self.entries.pop_last();
        }
        if self.entries.len() == self.k {
            if let Some(worst) = self.entries.last() {
                self.radius = worst.distance;
            }
        }
    }

    fn into_vec(self) -> Vec<Distance<I>> {
        self.entries.into_iter().collect()
    }
}

// =============================================================================
// INSERTION
// =============================================================================

impl<I, V, G, S, D> DynamicExplorationGraph<I, V, G, S, D>
where
    I: Ord + Clone + Debug,
    G: MutableWeightedGraph<Node<I>>,
    S: VectorStore<I, V>,
    D: DistanceFunction<V>,
{
    /// Insert `identifier` with its vector `value`.
    ///
    /// Fails with [`DegError::DuplicateIdentifier`] before touching anything
    /// if the identifier is already indexed. Other errors may leave the graph
    /// partially updated; durable callers abort their transaction.
    pub fn index(&mut self, identifier: I, value: V) -> Result<(), DegError> {
        let node = Node::new(identifier);
        if self.graph.contains_vertex(&node)? {
            return Err(DegError::DuplicateIdentifier(format!("{:?}", node.label)));
        }

        let value = Arc::new(value);
        self.values.store_value(&node, Arc::clone(&value))?;

        if self.graph.size()? <= self.config.degree {
            self.connect_to_all(node, &value)
        } else {
            self.weave_in(node, &value)
        }
    }

    /// Bootstrap: connect the new vertex to every existing one.
    fn connect_to_all(&mut self, node: Node<I>, value: &V) -> Result<(), DegError> {
        let existing = self.graph.vertices()?.collect::<Result<Vec<_>, _>>()?;
        self.graph.add_vertex(node.clone())?;
        for other in &existing {
            let other_value = self.values.get_value(other)?;
            let weight = self.distance.distance(value, &other_value);
            if !self.graph.add_edge(other, &node, weight)? {
                return Err(DegError::GraphCorrupted(format!(
                    "bootstrap edge {other:?} <-> {node:?} was refused"
                )));
            }
        }
        tracing::trace!(vertex = ?node.label, edges = existing.len(), "bootstrap insert");
        Ok(())
    }

    /// Steady state: gain `degree` edges through edge swaps.
    fn weave_in(&mut self, node: Node<I>, value: &V) -> Result<(), DegError> {
        let size = self.graph.size()?;
        let seeds = self.random_seeds(INSERT_SEED_COUNT)?;
        let candidates = self.search(value, self.config.k_ext, self.config.epsilon_ext, &seeds)?;
        let expected = size.min(self.config.k_ext);
        if candidates.len() != expected {
            return Err(DegError::CandidateShortfall {
                expected,
                actual: candidates.len(),
            });
        }

        self.graph.add_vertex(node.clone())?;
        let degree = self.config.degree;
        let mut neighbours = BTreeMap::new();
        let mut phase = 0usize;

        while neighbours.len() < degree {
            let before = neighbours.len();
            for candidate in &candidates {
                if neighbours.len() >= degree {
                    break;
                }
                let candidate_node = candidate.as_node();
                if neighbours.contains_key(&candidate_node) {
                    continue;
                }
                if phase < MRNG_PHASES
                    && self.check_mrng(&candidate_node, &node, candidate.distance)?
                {
                    continue;
                }
                let Some(dropped) = self.farthest_outside(&candidate_node, &neighbours)? else {
                    continue;
                };

                let dropped_value = self.values.get_value(&dropped)?;
                let dropped_weight = self.distance.distance(value, &dropped_value);
                self.swap_edge(&node, &candidate_node, candidate.distance, &dropped, dropped_weight)?;
                neighbours = self.graph.edges(&node)?;
            }

            tracing::trace!(phase, edges = neighbours.len(), "insertion phase finished");
            if phase >= MRNG_PHASES && neighbours.len() == before {
                return Err(DegError::InsertionStalled {
                    degree,
                    reached: neighbours.len(),
                });
            }
            phase += 1;
        }

        tracing::trace!(vertex = ?node.label, phases = phase, "steady-state insert");
        Ok(())
    }

    /// The neighbour of `vertex` with the largest weight that is not in `exclude`.
    fn farthest_outside(
        &self,
        vertex: &Node<I>,
        exclude: &BTreeMap<Node<I>, f32>,
    ) -> Result<Option<Node<I>>, DegError> {
        let mut farthest: Option<(Node<I>, f32)> = None;
        for (neighbour, weight) in self.graph.edges(vertex)? {
            if exclude.contains_key(&neighbour) {
                continue;
            }
            if farthest.as_ref().is_none_or(|(_, best)| weight > *best) {
                farthest = Some((neighbour, weight));
            }
        }
        Ok(farthest.map(|(neighbour, _)| neighbour))
    }

    /// Replace `(candidate, dropped)` by `(node, candidate)` and `(node, dropped)`.
    fn swap_edge(
        &mut self,
        node: &Node<I>,
        candidate: &Node<I>,
        candidate_weight: f32,
        dropped: &Node<I>,
        dropped_weight: f32,
    ) -> Result<(), DegError> {
        if !self.graph.remove_edge(candidate, dropped)? {
            return Err(DegError::GraphCorrupted(format!(
                "edge {candidate:?} <-> {dropped:?} vanished during insertion"
            )));
        }
        for (other, weight) in [(candidate, candidate_weight), (dropped, dropped_weight)] {
            if !self.graph.add_edge(node, other, weight)? {
                return Err(DegError::GraphCorrupted(format!(
                    "edge {node:?} <-> {other:?} was refused during insertion"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::distance::Metric;
    use crate::graph::InMemoryGraph;
    use crate::vectors::InMemoryVectorStore;

    type TestDeg = DynamicExplorationGraph<
        u64,
        Vec<f32>,
        InMemoryGraph<Node<u64>>,
        InMemoryVectorStore<u64, Vec<f32>>,
        Metric,
    >;

    fn engine(degree: usize, k_ext: usize, epsilon_ext: f32) -> TestDeg {
        DynamicExplorationGraph::with_seed(
            DegConfig {
                degree,
                k_ext,
                epsilon_ext,
            },
            InMemoryGraph::new(degree),
            InMemoryVectorStore::new(),
            Metric::Euclidean,
            42,
        )
        .expect("engine")
    }

    fn assert_graph_invariants(deg: &TestDeg) {
        let graph = deg.graph();
        for vertex in graph.vertices().unwrap() {
            let vertex = vertex.unwrap();
            let edges = graph.edges(&vertex).unwrap();
            assert!(edges.len() <= deg.config().degree, "{vertex:?} over degree");
            for (neighbour, weight) in edges {
                assert_eq!(graph.weight(&neighbour, &vertex).unwrap(), Some(weight));
            }
        }
    }

    fn exact(deg: &TestDeg, points: &[(u64, Vec<f32>)], query: &[f32], k: usize) -> Vec<u64> {
        let mut all: Vec<_> = points
            .iter()
            .map(|(id, v)| Distance::new(*id, Metric::Euclidean.calculate(query, v)))
            .collect();
        all.sort();
        assert!(deg.size().unwrap() >= k);
        all.into_iter().take(k).map(|d| d.label).collect()
    }

    #[test]
    fn invalid_config_rejected() {
        let result = TestDeg::new(
            DegConfig::with_degree(3),
            InMemoryGraph::new(3),
            InMemoryVectorStore::new(),
            Metric::Euclidean,
        );
        assert!(matches!(result, Err(DegError::InvalidConfig(_))));

        let result = TestDeg::new(
            DegConfig::with_degree(4),
            InMemoryGraph::new(2),
            InMemoryVectorStore::new(),
            Metric::Euclidean,
        );
        assert!(matches!(result, Err(DegError::InvalidConfig(_))));
    }

    #[test]
    fn bootstrap_builds_complete_graph() {
        let mut deg = engine(4, 4, 0.1);
        let square = [
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![0.5, 0.5],
        ];
        for (id, point) in square.iter().enumerate() {
            deg.index(id as u64, point.clone()).unwrap();
        }

        assert_eq!(deg.size().unwrap(), 5);
        assert_eq!(deg.graph().edge_count(), 10);
        for id in 0..5u64 {
            assert_eq!(deg.graph().edges(&Node::new(id)).unwrap().len(), 4);
        }
        // Weights are the distances at creation time
        let w = deg
            .graph()
            .weight(&Node::new(0), &Node::new(3))
            .unwrap()
            .unwrap();
        assert!((w - 2.0f32.sqrt()).abs() < 1e-6);
        assert_graph_invariants(&deg);
    }

    #[test]
    fn steady_state_insert_reaches_degree() {
        let mut deg = engine(4, 4, 0.1);
        let points = [
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![0.5, 0.5],
        ];
        for (id, point) in points.iter().enumerate() {
            deg.index(id as u64, point.clone()).unwrap();
        }

        deg.index(5, vec![0.9, 0.2]).unwrap();

        let edges = deg.graph().edges(&Node::new(5)).unwrap();
        assert_eq!(edges.len(), 4);
        // True nearest neighbour is (1, 0)
        assert!(edges.contains_key(&Node::new(1)));
        for vertex in deg.graph().vertices().unwrap() {
            let vertex = vertex.unwrap();
            assert_eq!(deg.graph().edges(&vertex).unwrap().len(), 4);
        }
        assert_graph_invariants(&deg);
    }

    #[test]
    fn graph_stays_regular_while_growing() {
        let mut deg = engine(6, 12, 0.2);
        for id in 0..200u64 {
            let x = (id % 20) as f32;
            let y = (id / 20) as f32;
            deg.index(id, vec![x, y * 1.5]).unwrap();
        }
        for vertex in deg.graph().vertices().unwrap() {
            let vertex = vertex.unwrap();
            assert_eq!(deg.graph().edges(&vertex).unwrap().len(), 6);
        }
        assert_graph_invariants(&deg);
    }

    #[test]
    fn duplicate_identifier_rejected() {
        let mut deg = engine(4, 8, 0.1);
        deg.index(1, vec![0.0]).unwrap();
        deg.index(2, vec![1.0]).unwrap();

        let result = deg.index(1, vec![5.0]);
        assert!(matches!(result, Err(DegError::DuplicateIdentifier(_))));
        assert_eq!(deg.size().unwrap(), 2);
        assert_eq!(*deg.values().get_value(&Node::new(1)).unwrap(), vec![0.0]);
    }

    #[test]
    fn brute_force_search_is_exact() {
        let mut deg = engine(4, 8, 0.2);
        let points: Vec<(u64, Vec<f32>)> = (0..60u64)
            .map(|id| (id, vec![(id * 7 % 13) as f32, (id * 3 % 11) as f32]))
            .collect();
        for (id, point) in &points {
            deg.index(*id, point.clone()).unwrap();
        }

        let query = [4.2, 5.1];
        let found: Vec<u64> = deg
            .search(&query.to_vec(), 5, 0.0, &[])
            .unwrap()
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(found, exact(&deg, &points, &query, 5));
    }

    #[test]
    fn results_sorted_and_unique() {
        let mut deg = engine(4, 8, 0.2);
        for id in 0..30u64 {
            deg.index(id, vec![(id % 5) as f32, 0.0]).unwrap();
        }
        let results = deg.search_default(&vec![2.0, 0.0], 12, 0.1).unwrap();
        assert_eq!(results.len(), 12);
        assert!(results.windows(2).all(|w| w[0] <= w[1]));
        let unique: BTreeSet<_> = results.iter().map(|d| d.label).collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn repeated_search_is_identical() {
        let mut deg = engine(4, 8, 0.2);
        for id in 0..40u64 {
            deg.index(id, vec![id as f32, (id % 3) as f32]).unwrap();
        }
        let seeds = vec![Node::new(3), Node::new(17)];
        let first = deg.search(&vec![10.0, 1.0], 6, 0.2, &seeds).unwrap();
        let second = deg.search(&vec![10.0, 1.0], 6, 0.2, &seeds).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_and_zero_k_searches() {
        let mut deg = engine(4, 8, 0.2);
        assert!(deg.search_default(&vec![0.0], 5, 0.1).unwrap().is_empty());
        deg.index(1, vec![0.0]).unwrap();
        assert!(deg.search(&vec![0.0], 0, 0.1, &[Node::new(1)]).unwrap().is_empty());
        assert_eq!(deg.search(&vec![0.0], 10, 0.1, &[]).unwrap().len(), 1);
    }

    #[test]
    fn sample_size_exceeded() {
        let mut deg = engine(4, 8, 0.2);
        deg.index(1, vec![0.0]).unwrap();
        deg.index(2, vec![1.0]).unwrap();

        let result = deg.random_seeds(3);
        assert!(matches!(
            result,
            Err(DegError::SampleSizeExceeded {
                requested: 3,
                available: 2
            })
        ));
        let seeds = deg.random_seeds(2).unwrap();
        assert_eq!(seeds, vec![Node::new(1), Node::new(2)]);
    }

    #[test]
    fn seeds_are_distinct_vertices() {
        let mut deg = engine(4, 8, 0.2);
        for id in 0..50u64 {
            deg.index(id, vec![id as f32]).unwrap();
        }
        let seeds = deg.random_seeds(10).unwrap();
        let unique: BTreeSet<_> = seeds.iter().collect();
        assert_eq!(unique.len(), 10);
        assert!(seeds.iter().all(|s| s.label < 50));
    }

    #[test]
    fn mrng_check() {
        let mut graph = InMemoryGraph::new(4);
        for id in 1..=3u64 {
            graph.add_vertex(Node::new(id)).unwrap();
        }
        // 1 - 2 - 3, with 1 and 3 far apart
        graph.add_edge(&Node::new(1), &Node::new(2), 1.0).unwrap();
        graph.add_edge(&Node::new(2), &Node::new(3), 1.0).unwrap();
        let deg: TestDeg = DynamicExplorationGraph::with_seed(
            DegConfig::with_degree(4),
            graph,
            InMemoryVectorStore::new(),
            Metric::Euclidean,
            1,
        )
        .unwrap();

        // A long edge 1-3 is bridged by 2
        assert!(!deg.check_mrng(&Node::new(1), &Node::new(3), 2.0).unwrap());
        // A short one is not
        assert!(deg.check_mrng(&Node::new(1), &Node::new(3), 0.5).unwrap());
        // Equal weights never count as shorter
        assert!(deg.check_mrng(&Node::new(1), &Node::new(3), 1.0).unwrap());
    }

    #[test]
    fn traversal_on_line_graph_finds_nearest() {
        // 1200 points on a line, each linked to the two neighbours on either side
        let count = 1200u64;
        let mut graph = InMemoryGraph::new(4);
        let mut values = InMemoryVectorStore::new();
        for id in 0..count {
            graph.add_vertex(Node::new(id)).unwrap();
            values
                .store_value(&Node::new(id), Arc::new(vec![id as f32]))
                .unwrap();
        }
        for id in 0..count {
            for step in 1..=2 {
                if id + step < count {
                    graph
                        .add_edge(&Node::new(id), &Node::new(id + step), step as f32)
                        .unwrap();
                }
            }
        }
        let deg: TestDeg = DynamicExplorationGraph::with_seed(
            DegConfig::with_degree(4),
            graph,
            values,
            Metric::Euclidean,
            7,
        )
        .unwrap();

        let found = deg.search(&vec![873.3], 1, 0.0, &[Node::new(0)]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, 873);

        let found = deg
            .search(&vec![400.0], 3, 0.0, &[Node::new(1199)])
            .unwrap();
        let labels: Vec<u64> = found.iter().map(|d| d.label).collect();
        assert_eq!(labels, vec![400, 399, 401]);
    }

    #[test]
    fn disconnected_graph_fails_candidate_search() {
        // 201 disjoint 5-cliques: no seed can reach k_ext = 8 candidates
        let cliques = 201u64;
        let mut graph = InMemoryGraph::new(4);
        let mut values = InMemoryVectorStore::new();
        for id in 0..cliques * 5 {
            let x = (id / 5) as f32 * 100.0 + (id % 5) as f32;
            graph.add_vertex(Node::new(id)).unwrap();
            values.store_value(&Node::new(id), Arc::new(vec![x])).unwrap();
        }
        for clique in 0..cliques {
            let base = clique * 5;
            for a in base..base + 5 {
                for b in a + 1..base + 5 {
                    graph
                        .add_edge(&Node::new(a), &Node::new(b), (b - a) as f32)
                        .unwrap();
                }
            }
        }
        let mut deg: TestDeg = DynamicExplorationGraph::with_seed(
            DegConfig {
                degree: 4,
                k_ext: 8,
                epsilon_ext: 0.2,
            },
            graph,
            values,
            Metric::Euclidean,
            3,
        )
        .unwrap();

        let err = deg.index(5000, vec![250.5]).unwrap_err();
        assert!(
            matches!(err, DegError::CandidateShortfall { expected: 8, actual } if actual <= 5),
            "{err:?}"
        );
        assert!(err.is_fatal());
        assert!(!deg.graph().contains_vertex(&Node::new(5000)).unwrap());
        assert_eq!(deg.size().unwrap(), 1005);
    }

    #[test]
    fn insertion_without_swappable_edges_stalls() {
        // Six vertices and no edges: no candidate has an edge to give up
        let mut graph = InMemoryGraph::new(4);
        let mut values = InMemoryVectorStore::new();
        for id in 0..6u64 {
            graph.add_vertex(Node::new(id)).unwrap();
            values
                .store_value(&Node::new(id), Arc::new(vec![id as f32]))
                .unwrap();
        }
        let mut deg: TestDeg = DynamicExplorationGraph::with_seed(
            DegConfig::with_degree(4),
            graph,
            values,
            Metric::Euclidean,
            5,
        )
        .unwrap();

        let err = deg.index(6, vec![2.5]).unwrap_err();
        assert!(
            matches!(
                err,
                DegError::InsertionStalled {
                    degree: 4,
                    reached: 0
                }
            ),
            "{err:?}"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn into_parts_returns_collaborators() {
        let mut deg = engine(4, 8, 0.2);
        deg.index(9, vec![1.0, 2.0]).unwrap();
        let (graph, values, metric) = deg.into_parts();
        assert_eq!(graph.size().unwrap(), 1);
        assert_eq!(values.len(), 1);
        assert_eq!(metric, Metric::Euclidean);
    }
}
