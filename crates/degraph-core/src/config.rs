//! # Index Configuration
//!
//! [`DegConfig`] carries the tunables of the exploration graph itself and is
//! fixed for the lifetime of an index. [`IndexSettings`] adds the choices a
//! [`crate::DegIndex`] makes around it: metric, graph backing, and the
//! size of the vector cache.
//!
//! Both derive `serde` so they can be read from a TOML settings file.

use crate::distance::Metric;
use crate::primitives::{DEFAULT_CACHE_CAPACITY, DEFAULT_DEGREE, DEFAULT_EPSILON_EXT};
use crate::DegError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// GRAPH CONFIGURATION
// =============================================================================

/// Tunables of the Dynamic Exploration Graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegConfig {
    /// Target number of edges per vertex. Must be even and at least 2.
    pub degree: usize,
    /// Number of candidates searched for when inserting. At least `degree`.
    pub k_ext: usize,
    /// Relative search-radius slack of the candidate search.
    pub epsilon_ext: f32,
}

impl Default for DegConfig {
    fn default() -> Self {
        Self::with_degree(DEFAULT_DEGREE)
    }
}

impl DegConfig {
    /// Configuration with the given degree and default `k_ext`/`epsilon_ext`.
    #[must_use]
    pub const fn with_degree(degree: usize) -> Self {
        Self {
            degree,
            k_ext: degree.saturating_mul(2),
            epsilon_ext: DEFAULT_EPSILON_EXT,
        }
    }

    /// Check every parameter, returning the first violation.
    pub fn validate(&self) -> Result<(), DegError> {
        if self.degree < 2 || self.degree % 2 != 0 {
            return Err(DegError::InvalidConfig(format!(
                "degree must be even and at least 2, got {}",
                self.degree
            )));
        }
        if self.k_ext < self.degree {
            return Err(DegError::InvalidConfig(format!(
                "k_ext ({}) must be at least the degree ({})",
                self.k_ext, self.degree
            )));
        }
        if !self.epsilon_ext.is_finite() || self.epsilon_ext < 0.0 {
            return Err(DegError::InvalidConfig(format!(
                "epsilon_ext must be finite and non-negative, got {}",
                self.epsilon_ext
            )));
        }
        Ok(())
    }
}

// =============================================================================
// GRAPH BACKING
// =============================================================================

/// Where a [`crate::DegIndex`] keeps the graph while inserting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GraphBacking {
    /// Mutate the redb tables directly.
    #[default]
    Durable,
    /// Load the graph into memory, mutate it there and write it back on commit.
    InMemory,
}

impl fmt::Display for GraphBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable => write!(f, "durable"),
            Self::InMemory => write!(f, "in_memory"),
        }
    }
}

impl FromStr for GraphBacking {
    type Err = DegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "durable" | "redb" => Ok(Self::Durable),
            "in_memory" | "memory" => Ok(Self::InMemory),
            _ => Err(DegError::InvalidConfig(format!("unknown graph backing '{s}'"))),
        }
    }
}

// =============================================================================
// INDEX SETTINGS
// =============================================================================

/// Everything needed to open a [`crate::DegIndex`].
///
/// `deg` and `metric` are persisted with the index and must match on reopen;
/// `backing` and `cache_capacity` are chosen per process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Graph tunables.
    pub deg: DegConfig,
    /// Distance metric between vectors.
    pub metric: Metric,
    /// Graph backing used while inserting.
    pub backing: GraphBacking,
    /// Capacity of the vector cache used by search, in vectors.
    pub cache_capacity: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            deg: DegConfig::default(),
            metric: Metric::default(),
            backing: GraphBacking::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl IndexSettings {
    /// Validate the graph tunables and the cache capacity.
    pub fn validate(&self) -> Result<(), DegError> {
        self.deg.validate()?;
        if self.cache_capacity == 0 {
            return Err(DegError::InvalidConfig(
                "cache_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
