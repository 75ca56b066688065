//! # Core Type Definitions
//!
//! This module contains the value types shared by every part of the index:
//! - Vertex identity (`Node`, `TupleId`)
//! - Candidate ranking (`Distance`)
//! - Error types (`DegError`)
//!
//! ## Ordering Guarantees
//!
//! All types in this module implement `Ord`, so they can live in
//! `BTreeMap`/`BTreeSet` and iterate in a reproducible order.
//! `Distance` orders by the IEEE total order of its distance first and by
//! its label second, which keeps sorted-set semantics well defined when two
//! candidates are equally far away.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Debug;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a stored tuple (row id). Durable backends key on this type.
pub type TupleId = u64;

// =============================================================================
// NODE
// =============================================================================

/// A vertex of the exploration graph.
///
/// A Node contains only the externally meaningful identifier it stands for.
/// Equality, ordering and hashing derive from that identifier alone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Node<I> {
    /// The identifier this node represents.
    pub label: I,
}

impl<I> Node<I> {
    /// Create a new node.
    #[must_use]
    pub const fn new(label: I) -> Self {
        Self { label }
    }

    /// Consume the node and return its identifier.
    #[must_use]
    pub fn into_label(self) -> I {
        self.label
    }
}

impl<I> From<I> for Node<I> {
    fn from(label: I) -> Self {
        Self::new(label)
    }
}

// =============================================================================
// DISTANCE
// =============================================================================

/// A ranked search candidate: an identifier and its distance to a query.
///
/// Transient; never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Distance<I> {
    /// The identifier of the candidate.
    pub label: I,
    /// The distance between the candidate and the query.
    pub distance: f32,
}

impl<I> Distance<I> {
    /// Create a new distance record.
    #[must_use]
    pub const fn new(label: I, distance: f32) -> Self {
        Self { label, distance }
    }
}

impl<I: Clone> Distance<I> {
    /// The node this candidate refers to.
    #[must_use]
    pub fn as_node(&self) -> Node<I> {
        Node::new(self.label.clone())
    }
}

impl<I: Ord> PartialEq for Distance<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<I: Ord> Eq for Distance<I> {}

impl<I: Ord> PartialOrd for Distance<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: Ord> Ord for Distance<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.label.cmp(&other.label))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the degraph index.
///
/// - No silent failures
/// - Use `Result<T, DegError>` for fallible operations
/// - Fatal variants (see [`DegError::is_fatal`]) indicate a broken invariant
///   or corrupted storage and must not be retried
#[derive(Debug, Error)]
pub enum DegError {
    /// An edge from a vertex to itself was requested.
    #[error("Edge endpoints are the same vertex: {0}")]
    SelfLoop(String),

    /// The requested vertex does not exist in the graph.
    #[error("Vertex not found: {0}")]
    VertexNotFound(String),

    /// No vector is stored for a vertex that is part of the graph.
    #[error("Value not found for vertex {0}")]
    ValueNotFound(String),

    /// The identifier is already indexed.
    #[error("Identifier already indexed: {0}")]
    DuplicateIdentifier(String),

    /// More seed vertices were requested than the graph holds.
    #[error("Sample size {requested} exceeds graph size {available}")]
    SampleSizeExceeded { requested: usize, available: usize },

    /// Candidate search during insertion returned an unexpected number of results.
    #[error("Candidate search returned {actual} results, expected {expected}")]
    CandidateShortfall { expected: usize, actual: usize },

    /// Insertion could not bring the new vertex to the configured degree.
    #[error("Insertion stalled at {reached} of {degree} edges")]
    InsertionStalled { degree: usize, reached: usize },

    /// A graph operation violated the undirected, degree-bounded contract.
    #[error("Graph corrupted: {0}")]
    GraphCorrupted(String),

    /// The index configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The persisted configuration differs from the requested one.
    #[error("Configuration mismatch for '{key}': stored {stored}, requested {requested}")]
    ConfigMismatch {
        key: String,
        stored: String,
        requested: String,
    },

    /// A vector does not have the dimension of the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector holds a component that is NaN or infinite.
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// A storage error occurred in the backing key-value store.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl DegError {
    /// Shorthand for [`DegError::VertexNotFound`] from any debuggable vertex.
    pub fn vertex_not_found(vertex: &impl Debug) -> Self {
        Self::VertexNotFound(format!("{vertex:?}"))
    }

    /// Shorthand for [`DegError::ValueNotFound`] from any debuggable vertex.
    pub fn value_not_found(vertex: &impl Debug) -> Self {
        Self::ValueNotFound(format!("{vertex:?}"))
    }

    /// Whether this error signals a broken invariant rather than bad input.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::GraphCorrupted(_)
                | Self::CandidateShortfall { .. }
                | Self::ValueNotFound(_)
                | Self::InsertionStalled { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn node_identity_is_label() {
        assert_eq!(Node::new(7u64), Node::from(7u64));
        assert_ne!(Node::new(7u64), Node::new(8u64));
        assert_eq!(Node::new(7u64).into_label(), 7);
    }

    #[test]
    fn distance_orders_by_distance_first() {
        let near = Distance::new(9u64, 0.5);
        let far = Distance::new(1u64, 2.0);
        assert!(near < far);
    }

    #[test]
    fn distance_ties_break_on_label() {
        let a = Distance::new(1u64, 1.0);
        let b = Distance::new(2u64, 1.0);
        assert!(a < b);

        let set: BTreeSet<_> = [b, a, Distance::new(1u64, 1.0)].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.first().map(|d| d.label), Some(1));
    }

    #[test]
    fn distance_total_order_handles_infinity() {
        let finite = Distance::new(1u64, f32::MAX);
        let infinite = Distance::new(0u64, f32::INFINITY);
        assert!(finite < infinite);
    }

    #[test]
    fn fatal_classification() {
        assert!(DegError::GraphCorrupted("x".into()).is_fatal());
        assert!(
            DegError::CandidateShortfall {
                expected: 4,
                actual: 3
            }
            .is_fatal()
        );
        assert!(!DegError::SelfLoop("1".into()).is_fatal());
        assert!(!DegError::InvalidVector("component 0 is NaN".into()).is_fatal());
        assert!(
            !DegError::SampleSizeExceeded {
                requested: 10,
                available: 2
            }
            .is_fatal()
        );
    }
}
