//! Distance functions for vector similarity
//!
//! All distance functions return a value where lower = more similar, and
//! are symmetric and non-negative, which the radius arithmetic of the
//! exploration graph relies on.

use crate::DegError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A symmetric, non-negative distance between two values.
pub trait DistanceFunction<V: ?Sized> {
    /// Distance between `a` and `b`.
    fn distance(&self, a: &V, b: &V) -> f32;
}

impl<V: ?Sized, F> DistanceFunction<V> for F
where
    F: Fn(&V, &V) -> f32,
{
    fn distance(&self, a: &V, b: &V) -> f32 {
        self(a, b)
    }
}

/// The built-in distance metrics over `f32` vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// L2 distance.
    #[default]
    Euclidean,
    /// Squared L2 distance. Same ranking as `Euclidean`, no square root.
    SquaredEuclidean,
    /// L1 distance.
    Manhattan,
    /// `1 - cos(a, b)`, in `[0, 2]`.
    Cosine,
}

impl Metric {
    /// Every metric, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Euclidean,
        Self::SquaredEuclidean,
        Self::Manhattan,
        Self::Cosine,
    ];

    /// The canonical name of the metric.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::SquaredEuclidean => "squared_euclidean",
            Self::Manhattan => "manhattan",
            Self::Cosine => "cosine",
        }
    }

    /// Calculate the distance between two vectors.
    #[inline]
    #[must_use]
    pub fn calculate(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimension mismatch");

        match self {
            Self::Euclidean => squared_euclidean(a, b).sqrt(),
            Self::SquaredEuclidean => squared_euclidean(a, b),
            Self::Manhattan => manhattan(a, b),
            Self::Cosine => cosine(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = DegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "squared_euclidean" | "squaredeuclidean" | "l2sq" => Ok(Self::SquaredEuclidean),
            "manhattan" | "l1" => Ok(Self::Manhattan),
            "cosine" => Ok(Self::Cosine),
            _ => Err(DegError::InvalidConfig(format!("unknown metric '{s}'"))),
        }
    }
}

impl DistanceFunction<[f32]> for Metric {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.calculate(a, b)
    }
}

impl DistanceFunction<Vec<f32>> for Metric {
    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> f32 {
        self.calculate(a, b)
    }
}

// ============================================================================
// Scalar implementations
// ============================================================================

#[inline]
fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;

    // Unroll by 4 for better auto-vectorization
    let chunks = a.len() / 4;
    let remainder = a.len() % 4;

    for i in 0..chunks {
        let base = i * 4;
        let d0 = a[base] - b[base];
        let d1 = a[base + 1] - b[base + 1];
        let d2 = a[base + 2] - b[base + 2];
        let d3 = a[base + 3] - b[base + 3];

        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
    }

    for i in 0..remainder {
        let idx = chunks * 4 + i;
        let diff = a[idx] - b[idx];
        sum += diff * diff;
    }

    sum
}

#[inline]
fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

#[inline]
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_product = (norm_a * norm_b).sqrt();
    if norm_product == 0.0 {
        return 1.0;
    }

    // Rounding can push |cos| slightly above 1
    (1.0 - dot / norm_product).max(0.0)
}
