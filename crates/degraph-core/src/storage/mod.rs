//! # Storage Module
//!
//! Durable realizations of the graph and vector-store contracts on top of
//! the redb embedded database.
//!
//! Every type in here borrows a caller-owned redb transaction. Writers get
//! the transaction's isolation and atomicity; commit or abort stays with the
//! caller, so an index insert and its vector land in the same commit.
//!
//! ## Layout
//!
//! | table          | kind     | key          | value                          |
//! |----------------|----------|--------------|--------------------------------|
//! | `deg_edges`    | multimap | vertex id    | 12 byte edge entry or sentinel |
//! | `deg_vectors`  | table    | vertex id    | postcard `Vec<f32>`            |
//! | `deg_metadata` | table    | `&str`       | `u64`                          |

mod redb_graph;
mod redb_vectors;

pub use redb_graph::{RedbGraph, RedbGraphSnapshot};
pub use redb_vectors::{RedbVectorSnapshot, RedbVectorStore};

use crate::DegError;
use redb::{MultimapTableDefinition, TableDefinition, WriteTransaction};

/// Adjacency lists: vertex id -> edge entries.
pub(crate) const EDGES: MultimapTableDefinition<u64, &[u8]> =
    MultimapTableDefinition::new("deg_edges");

/// Vectors: vertex id -> postcard-encoded `Vec<f32>`.
pub(crate) const VECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("deg_vectors");

/// Metadata: key string -> value u64.
pub(crate) const METADATA: TableDefinition<&str, u64> = TableDefinition::new("deg_metadata");

/// Metadata key holding the number of vertices in `deg_edges`.
pub(crate) const VERTEX_COUNT_KEY: &str = "vertex_count";

/// Create every degraph table that does not exist yet.
///
/// Read transactions fail on missing tables, so a fresh file has to pass
/// through one committed write transaction that calls this first.
pub fn create_tables(txn: &WriteTransaction) -> Result<(), DegError> {
    txn.open_multimap_table(EDGES).map_err(storage_error)?;
    txn.open_table(VECTORS).map_err(storage_error)?;
    txn.open_table(METADATA).map_err(storage_error)?;
    Ok(())
}

/// Map any redb error into [`DegError::Storage`].
pub(crate) fn storage_error(e: impl std::fmt::Display) -> DegError {
    DegError::Storage(e.to_string())
}
