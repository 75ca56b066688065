//! # redb-backed Graph Storage
//!
//! The durable realization of the weighted graph contract.
//!
//! Each vertex owns the run of multimap values under its id. A value is
//! either a 12 byte edge entry (big-endian neighbour id followed by the
//! little-endian bits of the `f32` weight) or, for a vertex without any
//! edges, a single empty sentinel that keeps the key present. The sentinel
//! is removed when the first edge arrives and restored when the last edge
//! leaves.
//!
//! Because neighbour ids are stored big-endian, redb's byte order on the
//! values is the numeric order of neighbours.

use super::{EDGES, METADATA, VERTEX_COUNT_KEY, storage_error};
use crate::graph::{MutableWeightedGraph, VertexIter, WeightedGraph, copy_graph};
use crate::primitives::EDGE_ENTRY_SIZE;
use crate::{DegError, Node, TupleId};
use redb::{
    MultimapTable, ReadOnlyMultimapTable, ReadTransaction, ReadableMultimapTable, ReadableTable,
    Table, WriteTransaction,
};
use std::collections::BTreeMap;

/// Marker value of a vertex that has no edges.
const SENTINEL: &[u8] = &[];

type Adjacency = BTreeMap<Node<TupleId>, f32>;

// =============================================================================
// EDGE ENCODING
// =============================================================================

fn encode_edge(to: TupleId, weight: f32) -> [u8; EDGE_ENTRY_SIZE] {
    let mut entry = [0u8; EDGE_ENTRY_SIZE];
    entry[..8].copy_from_slice(&to.to_be_bytes());
    entry[8..].copy_from_slice(&weight.to_bits().to_le_bytes());
    entry
}

fn decode_edge(vertex: TupleId, bytes: &[u8]) -> Result<(TupleId, f32), DegError> {
    let entry: &[u8; EDGE_ENTRY_SIZE] = bytes.try_into().map_err(|_| {
        DegError::GraphCorrupted(format!(
            "edge entry of vertex {vertex} has {} bytes, expected {EDGE_ENTRY_SIZE}",
            bytes.len()
        ))
    })?;
    let mut to = [0u8; 8];
    to.copy_from_slice(&entry[..8]);
    let mut bits = [0u8; 4];
    bits.copy_from_slice(&entry[8..]);
    Ok((
        TupleId::from_be_bytes(to),
        f32::from_bits(u32::from_le_bytes(bits)),
    ))
}

// =============================================================================
// SHARED READ PATH
// =============================================================================

/// Adjacency of `vertex`, or `None` if the vertex has no key at all.
fn read_adjacency<T>(table: &T, vertex: TupleId) -> Result<Option<Adjacency>, DegError>
where
    T: ReadableMultimapTable<u64, &'static [u8]>,
{
    let mut present = false;
    let mut adjacency = Adjacency::new();
    for entry in table.get(vertex).map_err(storage_error)? {
        let entry = entry.map_err(storage_error)?;
        present = true;
        let bytes = entry.value();
        if bytes.is_empty() {
            continue;
        }
        let (to, weight) = decode_edge(vertex, bytes)?;
        adjacency.insert(Node::new(to), weight);
    }
    Ok(present.then_some(adjacency))
}

fn require_adjacency<T>(table: &T, vertex: &Node<TupleId>) -> Result<Adjacency, DegError>
where
    T: ReadableMultimapTable<u64, &'static [u8]>,
{
    read_adjacency(table, vertex.label)?.ok_or_else(|| DegError::vertex_not_found(vertex))
}

fn read_vertices<T>(table: &T) -> Result<VertexIter<'_, Node<TupleId>>, DegError>
where
    T: ReadableMultimapTable<u64, &'static [u8]>,
{
    let range = table.iter().map_err(storage_error)?;
    Ok(Box::new(range.map(|entry| {
        entry
            .map(|(key, _)| Node::new(key.value()))
            .map_err(storage_error)
    })))
}

fn read_vertex_count<T>(table: &T) -> Result<usize, DegError>
where
    T: ReadableTable<&'static str, u64>,
{
    let count = table
        .get(VERTEX_COUNT_KEY)
        .map_err(storage_error)?
        .map(|v| v.value())
        .unwrap_or(0);
    usize::try_from(count)
        .map_err(|_| DegError::GraphCorrupted(format!("vertex count {count} overflows usize")))
}

// =============================================================================
// WRITABLE GRAPH
// =============================================================================

/// A durable graph living inside a redb write transaction.
///
/// All mutations become visible to other transactions when the caller
/// commits; dropping the transaction uncommitted discards them.
pub struct RedbGraph<'txn> {
    edges: MultimapTable<'txn, u64, &'static [u8]>,
    metadata: Table<'txn, &'static str, u64>,
    vertex_count: usize,
    max_degree: usize,
}

impl std::fmt::Debug for RedbGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph")
            .field("vertex_count", &self.vertex_count)
            .field("max_degree", &self.max_degree)
            .finish_non_exhaustive()
    }
}

impl<'txn> RedbGraph<'txn> {
    /// Open the graph tables inside `txn`, creating them if needed.
    pub fn open(txn: &'txn WriteTransaction, max_degree: usize) -> Result<Self, DegError> {
        let edges = txn.open_multimap_table(EDGES).map_err(storage_error)?;
        let metadata = txn.open_table(METADATA).map_err(storage_error)?;
        let vertex_count = read_vertex_count(&metadata)?;
        Ok(Self {
            edges,
            metadata,
            vertex_count,
            max_degree,
        })
    }

    /// Remove every vertex and edge.
    pub fn clear(&mut self) -> Result<(), DegError> {
        let keys = self
            .edges
            .iter()
            .map_err(storage_error)?
            .map(|entry| entry.map(|(key, _)| key.value()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_error)?;
        for key in keys {
            self.edges.remove_all(key).map_err(storage_error)?;
        }
        self.set_vertex_count(0)
    }

    /// Replace the whole stored graph with a copy of `source`.
    pub fn replace_with<G>(&mut self, source: &G) -> Result<(), DegError>
    where
        G: WeightedGraph<Node<TupleId>> + ?Sized,
    {
        self.clear()?;
        copy_graph(source, self)
    }

    fn set_vertex_count(&mut self, count: usize) -> Result<(), DegError> {
        self.metadata
            .insert(VERTEX_COUNT_KEY, count as u64)
            .map_err(storage_error)?;
        self.vertex_count = count;
        Ok(())
    }

    /// Store the entry `vertex -> neighbour`; `first` drops the sentinel.
    fn insert_entry(
        &mut self,
        vertex: TupleId,
        neighbour: TupleId,
        weight: f32,
        first: bool,
    ) -> Result<(), DegError> {
        if first {
            self.edges.remove(vertex, SENTINEL).map_err(storage_error)?;
        }
        let entry = encode_edge(neighbour, weight);
        self.edges
            .insert(vertex, entry.as_slice())
            .map_err(storage_error)?;
        Ok(())
    }

    /// Drop the entry `vertex -> neighbour`; `last` restores the sentinel.
    fn remove_entry(
        &mut self,
        vertex: TupleId,
        neighbour: TupleId,
        weight: f32,
        last: bool,
    ) -> Result<(), DegError> {
        let entry = encode_edge(neighbour, weight);
        self.edges
            .remove(vertex, entry.as_slice())
            .map_err(storage_error)?;
        if last {
            self.edges.insert(vertex, SENTINEL).map_err(storage_error)?;
        }
        Ok(())
    }
}

impl WeightedGraph<Node<TupleId>> for RedbGraph<'_> {
    fn size(&self) -> Result<usize, DegError> {
        Ok(self.vertex_count)
    }

    fn max_degree(&self) -> usize {
        self.max_degree
    }

    fn contains_vertex(&self, v: &Node<TupleId>) -> Result<bool, DegError> {
        Ok(read_adjacency(&self.edges, v.label)?.is_some())
    }

    fn weight(&self, from: &Node<TupleId>, to: &Node<TupleId>) -> Result<Option<f32>, DegError> {
        Ok(require_adjacency(&self.edges, from)?.get(to).copied())
    }

    fn edges(&self, from: &Node<TupleId>) -> Result<Adjacency, DegError> {
        require_adjacency(&self.edges, from)
    }

    fn vertices(&self) -> Result<VertexIter<'_, Node<TupleId>>, DegError> {
        read_vertices(&self.edges)
    }
}

impl MutableWeightedGraph<Node<TupleId>> for RedbGraph<'_> {
    fn add_vertex(&mut self, v: Node<TupleId>) -> Result<bool, DegError> {
        if read_adjacency(&self.edges, v.label)?.is_some() {
            return Ok(false);
        }
        self.edges
            .insert(v.label, SENTINEL)
            .map_err(storage_error)?;
        self.set_vertex_count(self.vertex_count + 1)?;
        Ok(true)
    }

    fn remove_vertex(&mut self, v: &Node<TupleId>) -> Result<bool, DegError> {
        let Some(adjacency) = read_adjacency(&self.edges, v.label)? else {
            return Ok(false);
        };
        for neighbour in adjacency.keys() {
            let reverse = require_adjacency(&self.edges, neighbour)?;
            if let Some(&weight) = reverse.get(v) {
                self.remove_entry(neighbour.label, v.label, weight, reverse.len() == 1)?;
            }
        }
        self.edges.remove_all(v.label).map_err(storage_error)?;
        self.set_vertex_count(self.vertex_count.saturating_sub(1))?;
        Ok(true)
    }

    fn add_edge(
        &mut self,
        from: &Node<TupleId>,
        to: &Node<TupleId>,
        weight: f32,
    ) -> Result<bool, DegError> {
        if from == to {
            return Err(DegError::SelfLoop(format!("{from:?}")));
        }
        let from_edges = require_adjacency(&self.edges, from)?;
        let to_edges = require_adjacency(&self.edges, to)?;

        if from_edges.contains_key(to) || to_edges.contains_key(from) {
            return Ok(false);
        }
        if from_edges.len() >= self.max_degree || to_edges.len() >= self.max_degree {
            return Ok(false);
        }

        self.insert_entry(from.label, to.label, weight, from_edges.is_empty())?;
        self.insert_entry(to.label, from.label, weight, to_edges.is_empty())?;
        Ok(true)
    }

    fn remove_edge(&mut self, from: &Node<TupleId>, to: &Node<TupleId>) -> Result<bool, DegError> {
        let from_edges = require_adjacency(&self.edges, from)?;
        let to_edges = require_adjacency(&self.edges, to)?;

        match (from_edges.get(to), to_edges.get(from)) {
            (None, None) => Ok(false),
            (Some(&forward), Some(&backward)) => {
                self.remove_entry(from.label, to.label, forward, from_edges.len() == 1)?;
                self.remove_entry(to.label, from.label, backward, to_edges.len() == 1)?;
                Ok(true)
            }
            _ => Err(DegError::GraphCorrupted(format!(
                "edge {from:?} <-> {to:?} is only stored in one direction"
            ))),
        }
    }
}

// =============================================================================
// READ-ONLY SNAPSHOT
// =============================================================================

/// A read-only view of the durable graph as of a read transaction.
///
/// Any number of snapshots may be open next to one writer.
pub struct RedbGraphSnapshot {
    edges: ReadOnlyMultimapTable<u64, &'static [u8]>,
    vertex_count: usize,
    max_degree: usize,
}

impl std::fmt::Debug for RedbGraphSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraphSnapshot")
            .field("vertex_count", &self.vertex_count)
            .field("max_degree", &self.max_degree)
            .finish_non_exhaustive()
    }
}

impl RedbGraphSnapshot {
    /// Open the graph tables of `txn`. The tables must already exist.
    pub fn open(txn: &ReadTransaction, max_degree: usize) -> Result<Self, DegError> {
        let edges = txn.open_multimap_table(EDGES).map_err(storage_error)?;
        let metadata = txn.open_table(METADATA).map_err(storage_error)?;
        let vertex_count = read_vertex_count(&metadata)?;
        Ok(Self {
            edges,
            vertex_count,
            max_degree,
        })
    }
}

impl WeightedGraph<Node<TupleId>> for RedbGraphSnapshot {
    fn size(&self) -> Result<usize, DegError> {
        Ok(self.vertex_count)
    }

    fn max_degree(&self) -> usize {
        self.max_degree
    }

    fn contains_vertex(&self, v: &Node<TupleId>) -> Result<bool, DegError> {
        Ok(read_adjacency(&self.edges, v.label)?.is_some())
    }

    fn weight(&self, from: &Node<TupleId>, to: &Node<TupleId>) -> Result<Option<f32>, DegError> {
        Ok(require_adjacency(&self.edges, from)?.get(to).copied())
    }

    fn edges(&self, from: &Node<TupleId>) -> Result<Adjacency, DegError> {
        require_adjacency(&self.edges, from)
    }

    fn vertices(&self) -> Result<VertexIter<'_, Node<TupleId>>, DegError> {
        read_vertices(&self.edges)
    }
}

// =============================================================================
// TESTS
// =============================================================================
