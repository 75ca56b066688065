//! # Search Quality Tiers (Q0-Q2)
//!
//! End-to-end checks of the index through the public API.
//!
//! ## Tiers
//! - Q0: Exact small-graph behaviour
//! - Q1: Graph traversal quality above the brute-force threshold
//! - Q2: Durable index round trips

use degraph_core::primitives::BRUTE_FORCE_THRESHOLD;
use degraph_core::{
    DegConfig, DegError, DegIndex, Distance, DynamicExplorationGraph, GraphBacking,
    InMemoryGraph, InMemoryVectorStore, IndexSettings, Metric, Node, RedbGraphSnapshot,
    WeightedGraph,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

type Engine = DynamicExplorationGraph<
    u64,
    Vec<f32>,
    InMemoryGraph<Node<u64>>,
    InMemoryVectorStore<u64, Vec<f32>>,
    Metric,
>;

/// Points scattered around a few cluster centres.
fn clustered(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let centres: Vec<Vec<f32>> = (0..10)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-10.0..10.0)).collect())
        .collect();
    (0..count)
        .map(|i| {
            centres[i % centres.len()]
                .iter()
                .map(|c| c + rng.gen_range(-1.0..1.0))
                .collect()
        })
        .collect()
}

fn engine(degree: usize) -> Engine {
    DynamicExplorationGraph::with_seed(
        DegConfig {
            degree,
            k_ext: degree * 2,
            epsilon_ext: 0.2,
        },
        InMemoryGraph::new(degree),
        InMemoryVectorStore::new(),
        Metric::Euclidean,
        2024,
    )
    .expect("engine")
}

fn true_top_k(points: &[Vec<f32>], query: &[f32], k: usize) -> BTreeSet<u64> {
    let mut all: Vec<_> = points
        .iter()
        .enumerate()
        .map(|(id, p)| Distance::new(id as u64, Metric::Euclidean.calculate(query, p)))
        .collect();
    all.sort();
    all.into_iter().take(k).map(|d| d.label).collect()
}

fn recall(found: &[Distance<u64>], truth: &BTreeSet<u64>) -> f64 {
    let hits = found.iter().filter(|d| truth.contains(&d.label)).count();
    hits as f64 / truth.len() as f64
}

// =============================================================================
// TIER Q0: EXACT SMALL-GRAPH BEHAVIOUR
// =============================================================================

mod q0_small_graph {
    use super::*;

    /// Q0.1: Every returned list is sorted and free of duplicates.
    #[test]
    fn results_sorted_without_duplicates() {
        let points = clustered(300, 4, 1);
        let mut deg = engine(8);
        for (id, p) in points.iter().enumerate() {
            deg.index(id as u64, p.clone()).expect("index");
        }

        let results = deg.search_default(&points[17], 25, 0.1).expect("search");
        assert_eq!(results.len(), 25);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        let labels: BTreeSet<_> = results.iter().map(|d| d.label).collect();
        assert_eq!(labels.len(), 25);
        assert_eq!(results[0].label, 17);
    }

    /// Q0.2: Asking for more results than vectors returns all of them.
    #[test]
    fn k_larger_than_graph() {
        let mut deg = engine(4);
        for id in 0..7u64 {
            deg.index(id, vec![id as f32]).expect("index");
        }
        assert_eq!(deg.search(&vec![0.0], 50, 0.0, &[]).expect("search").len(), 7);
    }
}

// =============================================================================
// TIER Q1: TRAVERSAL QUALITY
// =============================================================================

mod q1_traversal {
    use super::*;

    /// Q1.1: Recall@10 of the graph walk stays well above chance.
    #[test]
    fn recall_above_threshold() {
        let points = clustered(1500, 8, 7);
        assert!(points.len() >= BRUTE_FORCE_THRESHOLD);

        let mut deg = engine(8);
        for (id, p) in points.iter().enumerate() {
            deg.index(id as u64, p.clone()).expect("index");
        }
        assert_eq!(deg.size().expect("size"), 1500);

        let queries = clustered(40, 8, 99);
        let mut total = 0.0;
        for query in &queries {
            let found = deg.search_default(query, 10, 0.2).expect("search");
            assert_eq!(found.len(), 10);
            total += recall(&found, &true_top_k(&points, query, 10));
        }
        let mean = total / queries.len() as f64;
        assert!(mean >= 0.6, "mean recall {mean} too low");
    }

    /// Q1.2: Indexed vectors find themselves.
    #[test]
    fn indexed_vectors_are_found() {
        let points = clustered(1200, 6, 3);
        let mut deg = engine(8);
        for (id, p) in points.iter().enumerate() {
            deg.index(id as u64, p.clone()).expect("index");
        }

        let mut hits = 0;
        for id in (0..1200).step_by(60) {
            let found = deg.search_default(&points[id], 1, 0.2).expect("search");
            if found.first().map(|d| d.label) == Some(id as u64) {
                hits += 1;
            }
        }
        assert!(hits >= 15, "only {hits} of 20 vectors found themselves");
    }

    /// Q1.3: The graph stays regular across the brute-force threshold.
    #[test]
    fn regular_after_threshold() {
        let points = clustered(1100, 4, 11);
        let mut deg = engine(6);
        for (id, p) in points.iter().enumerate() {
            deg.index(id as u64, p.clone()).expect("index");
        }
        for vertex in deg.graph().vertices().expect("vertices") {
            let vertex = vertex.expect("vertex");
            assert_eq!(deg.graph().edges(&vertex).expect("edges").len(), 6);
        }
    }
}

// =============================================================================
// TIER Q2: DURABLE INDEX
// =============================================================================

mod q2_durable {
    use super::*;
    use tempfile::tempdir;

    fn settings(backing: GraphBacking) -> IndexSettings {
        IndexSettings {
            deg: DegConfig::with_degree(6),
            metric: Metric::Euclidean,
            backing,
            cache_capacity: 256,
        }
    }

    /// Q2.1: Both backings produce searchable, persistent indexes.
    #[test]
    fn persists_across_reopen() {
        for backing in [GraphBacking::Durable, GraphBacking::InMemory] {
            let temp = tempdir().expect("temp dir");
            let path = temp.path().join("index.redb");
            let points = clustered(200, 3, 5);

            {
                let mut index = DegIndex::open(&path, settings(backing)).expect("open");
                let batch: Vec<_> = points
                    .iter()
                    .enumerate()
                    .map(|(id, p)| (id as u64, p.clone()))
                    .collect();
                assert_eq!(index.insert_batch(batch).expect("insert"), 200);
            }

            let index = DegIndex::open(&path, settings(backing)).expect("reopen");
            assert_eq!(index.count().expect("count"), 200);
            assert_eq!(index.dimension(), Some(3));

            let found = index.search(&points[42], 5, 0.1).expect("search");
            let labels: BTreeSet<u64> = found.iter().map(|d| d.label).collect();
            assert_eq!(labels, true_top_k(&points, &points[42], 5));
        }
    }

    /// Q2.2: The redb graph stays regular and searchable past the
    /// brute-force threshold.
    #[test]
    fn durable_graph_above_threshold() {
        use redb::{Database, ReadableDatabase};

        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("index.redb");
        let points = clustered(BRUTE_FORCE_THRESHOLD + 60, 3, 11);
        let (bulk, tail) = points.split_at(BRUTE_FORCE_THRESHOLD + 50);

        {
            let mut index =
                DegIndex::open(&path, settings(GraphBacking::Durable)).expect("open");
            let batch: Vec<_> = bulk
                .iter()
                .enumerate()
                .map(|(id, p)| (id as u64, p.clone()))
                .collect();
            index.insert_batch(batch).expect("insert");
            // Separate transactions, each inserting through graph traversal
            for (offset, p) in tail.iter().enumerate() {
                index
                    .insert((bulk.len() + offset) as u64, p.clone())
                    .expect("insert");
            }
            assert_eq!(index.count().expect("count"), points.len());

            let mut found_self = 0;
            for id in (0..points.len()).step_by(points.len() / 20).take(20) {
                let results = index.search(&points[id], 10, 0.2).expect("search");
                assert!(!results.is_empty());
                assert!(results.windows(2).all(|w| w[0] <= w[1]));
                if results.iter().any(|d| d.label == id as u64) {
                    found_self += 1;
                }
            }
            assert!(found_self >= 15, "only {found_self} of 20 found themselves");
        }

        let db = Database::open(&path).expect("open db");
        let txn = db.begin_read().expect("begin read");
        let graph = RedbGraphSnapshot::open(&txn, 6).expect("snapshot");
        assert_eq!(graph.size().expect("size"), points.len());
        for vertex in graph.vertices().expect("vertices") {
            let vertex = vertex.expect("vertex");
            let edges = graph.edges(&vertex).expect("edges");
            assert_eq!(edges.len(), 6, "{vertex:?} is not regular");
            for (neighbour, weight) in edges {
                assert_eq!(
                    graph.weight(&neighbour, &vertex).expect("weight"),
                    Some(weight)
                );
            }
        }
    }

    /// Q2.3: A rejected batch leaves no trace.
    #[test]
    fn rejected_batch_leaves_no_trace() {
        let temp = tempdir().expect("temp dir");
        let mut index =
            DegIndex::open(temp.path().join("index.redb"), settings(GraphBacking::Durable))
                .expect("open");
        index.insert(0, vec![0.0, 0.0]).expect("insert");

        let result = index.insert_batch(vec![(1, vec![1.0, 1.0]), (2, vec![1.0])]);
        assert!(matches!(result, Err(DegError::DimensionMismatch { .. })));
        assert_eq!(index.count().expect("count"), 1);
        assert!(index.search(&[1.0, 1.0], 3, 0.0).expect("search").len() == 1);
    }
}
