//! # Index Primitives
//!
//! Hardcoded constants of the Dynamic Exploration Graph.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Per-index tunables (`degree`, `k_ext`, `epsilon_ext`) live in
//! [`crate::config::DegConfig`] instead.

/// Graphs with fewer vertices than this are searched exhaustively.
///
/// Below this size a linear scan is exact and cheaper than graph traversal.
pub const BRUTE_FORCE_THRESHOLD: usize = 1000;

/// Number of random seed vertices used by [`crate::DynamicExplorationGraph::search_default`].
pub const DEFAULT_SEED_COUNT: usize = 10;

/// Number of random seed vertices used for the candidate search of an insert.
pub const INSERT_SEED_COUNT: usize = 1;

/// Insertion phases (starting at 0) during which the MRNG guard is enforced.
///
/// From this phase on every candidate may be connected, which guarantees the
/// new vertex converges on the configured degree.
pub const MRNG_PHASES: usize = 2;

/// Default out-degree of every vertex once the graph has left the bootstrap phase.
pub const DEFAULT_DEGREE: usize = 16;

/// Default relative search-radius slack for candidate search during insertion.
pub const DEFAULT_EPSILON_EXT: f32 = 0.2;

/// Default capacity (in vectors) of the LRU vector cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

/// Size in bytes of one encoded edge entry in the durable graph
/// (8 byte neighbour id + 4 byte weight).
pub const EDGE_ENTRY_SIZE: usize = 12;

/// Current on-disk format version, stored in the metadata table.
///
/// Increment this when making breaking changes to the table layout.
pub const FORMAT_VERSION: u64 = 1;
