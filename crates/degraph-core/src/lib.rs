//! # degraph-core
//!
//! The Dynamic Exploration Graph (DEG) index for approximate nearest
//! neighbour search - THE INDEX.
//!
//! A DEG is an undirected, weighted, degree-regular graph over the indexed
//! vectors. New vectors are woven in through edge swaps that keep every
//! vertex at exactly `degree` edges; queries walk the graph best-first from
//! a handful of random seeds.
//!
//! ## Layers
//!
//! - `types` / `primitives`: identity, ranking, errors, constants
//! - `graph`: the weighted graph contract and the in-memory graph
//! - `vectors` / `distance`: vector stores, caching, metrics
//! - `deg`: the insertion and search algorithms
//! - `storage`: redb-backed graph and vector stores
//! - `index`: a DEG in a single redb file
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Storage is injected: the engine only talks to the graph and vector traits
//! - Deterministic iteration: adjacency in `BTreeMap`s, seedable sampler
//! - Durable writes happen inside caller-owned redb transactions

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod deg;
pub mod distance;
pub mod graph;
pub mod index;
pub mod primitives;
pub mod storage;
pub mod types;
pub mod vectors;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{DegError, Distance, Node, TupleId};

// =============================================================================
// RE-EXPORTS: Graph Contract
// =============================================================================

pub use graph::{InMemoryGraph, MutableWeightedGraph, VertexIter, WeightedGraph, copy_graph};

// =============================================================================
// RE-EXPORTS: Engine & Index
// =============================================================================

pub use config::{DegConfig, GraphBacking, IndexSettings};
pub use deg::DynamicExplorationGraph;
pub use distance::{DistanceFunction, Metric};
pub use index::DegIndex;
pub use storage::{RedbGraph, RedbGraphSnapshot, RedbVectorSnapshot, RedbVectorStore};
pub use vectors::{CachedVectorStore, InMemoryVectorStore, VectorCache, VectorSource, VectorStore};
