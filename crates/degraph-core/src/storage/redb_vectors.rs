//! # redb-backed Vector Storage
//!
//! Vectors are stored postcard-encoded under their vertex id in
//! `deg_vectors`.

use super::{VECTORS, storage_error};
use crate::vectors::{VectorSource, VectorStore};
use crate::{DegError, Node, TupleId};
use redb::{
    ReadOnlyTable, ReadTransaction, ReadableTable, ReadableTableMetadata, Table, WriteTransaction,
};
use std::sync::Arc;

fn read_vector<T>(table: &T, node: &Node<TupleId>) -> Result<Arc<Vec<f32>>, DegError>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    let guard = table
        .get(node.label)
        .map_err(storage_error)?
        .ok_or_else(|| DegError::value_not_found(node))?;
    let vector: Vec<f32> =
        postcard::from_bytes(guard.value()).map_err(|e| DegError::Serialization(e.to_string()))?;
    Ok(Arc::new(vector))
}

fn count_vectors<T>(table: &T) -> Result<usize, DegError>
where
    T: ReadableTableMetadata,
{
    Ok(table.len().map_err(storage_error)? as usize)
}

/// Vector store living inside a redb write transaction.
pub struct RedbVectorStore<'txn> {
    table: Table<'txn, u64, &'static [u8]>,
}

impl std::fmt::Debug for RedbVectorStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbVectorStore").finish_non_exhaustive()
    }
}

impl<'txn> RedbVectorStore<'txn> {
    /// Open the vector table inside `txn`, creating it if needed.
    pub fn open(txn: &'txn WriteTransaction) -> Result<Self, DegError> {
        let table = txn.open_table(VECTORS).map_err(storage_error)?;
        Ok(Self { table })
    }

    /// Number of stored vectors.
    pub fn len(&self) -> Result<usize, DegError> {
        count_vectors(&self.table)
    }

    /// Check if no vector is stored.
    pub fn is_empty(&self) -> Result<bool, DegError> {
        Ok(self.len()? == 0)
    }
}

impl VectorSource<TupleId, Vec<f32>> for RedbVectorStore<'_> {
    fn get_value(&self, node: &Node<TupleId>) -> Result<Arc<Vec<f32>>, DegError> {
        read_vector(&self.table, node)
    }
}

impl VectorStore<TupleId, Vec<f32>> for RedbVectorStore<'_> {
    fn store_value(&mut self, node: &Node<TupleId>, value: Arc<Vec<f32>>) -> Result<(), DegError> {
        let bytes = postcard::to_allocvec(value.as_ref())
            .map_err(|e| DegError::Serialization(e.to_string()))?;
        self.table
            .insert(node.label, bytes.as_slice())
            .map_err(storage_error)?;
        Ok(())
    }
}

/// Read-only vector access as of a read transaction.
pub struct RedbVectorSnapshot {
    table: ReadOnlyTable<u64, &'static [u8]>,
}

impl std::fmt::Debug for RedbVectorSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbVectorSnapshot").finish_non_exhaustive()
    }
}

impl RedbVectorSnapshot {
    /// Open the vector table of `txn`. The table must already exist.
    pub fn open(txn: &ReadTransaction) -> Result<Self, DegError> {
        let table = txn.open_table(VECTORS).map_err(storage_error)?;
        Ok(Self { table })
    }

    /// Number of stored vectors.
    pub fn len(&self) -> Result<usize, DegError> {
        count_vectors(&self.table)
    }

    /// Check if no vector is stored.
    pub fn is_empty(&self) -> Result<bool, DegError> {
        Ok(self.len()? == 0)
    }
}

impl VectorSource<TupleId, Vec<f32>> for RedbVectorSnapshot {
    fn get_value(&self, node: &Node<TupleId>) -> Result<Arc<Vec<f32>>, DegError> {
        read_vector(&self.table, node)
    }
}
