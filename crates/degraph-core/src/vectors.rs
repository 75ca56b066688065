//! # Vector Stores
//!
//! The value-store side of the index: where the vector behind each vertex lives.
//!
//! - [`VectorSource`]: read access (`get_value`), enough for search
//! - [`VectorStore`]: adds `store_value`, needed for insertion
//! - [`InMemoryVectorStore`]: volatile `BTreeMap` store
//! - [`VectorCache`]: bounded LRU map of vectors
//! - [`CachedVectorStore`]: a source that reads through a [`VectorCache`]
//!
//! Values are handed out as `Arc<V>` so that caches and the engine can share
//! a vector without copying it.

use crate::{DegError, Node};
use lru::LruCache;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// =============================================================================
// TRAITS
// =============================================================================

/// Read access to the vectors of indexed vertices.
pub trait VectorSource<I, V> {
    /// The vector stored for `node`.
    ///
    /// Fails with [`DegError::ValueNotFound`] if nothing is stored, which for
    /// an indexed vertex means the store is corrupted.
    fn get_value(&self, node: &Node<I>) -> Result<Arc<V>, DegError>;
}

/// Read and write access to the vectors of indexed vertices.
pub trait VectorStore<I, V>: VectorSource<I, V> {
    /// Store the vector for `node`, replacing any previous value.
    fn store_value(&mut self, node: &Node<I>, value: Arc<V>) -> Result<(), DegError>;
}

impl<I, V, S: VectorSource<I, V> + ?Sized> VectorSource<I, V> for &S {
    fn get_value(&self, node: &Node<I>) -> Result<Arc<V>, DegError> {
        (**self).get_value(node)
    }
}

impl<I, V, S: VectorSource<I, V> + ?Sized> VectorSource<I, V> for &mut S {
    fn get_value(&self, node: &Node<I>) -> Result<Arc<V>, DegError> {
        (**self).get_value(node)
    }
}

impl<I, V, S: VectorStore<I, V> + ?Sized> VectorStore<I, V> for &mut S {
    fn store_value(&mut self, node: &Node<I>, value: Arc<V>) -> Result<(), DegError> {
        (**self).store_value(node, value)
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// A volatile vector store.
#[derive(Debug, Clone)]
pub struct InMemoryVectorStore<I, V> {
    values: BTreeMap<I, Arc<V>>,
}

impl<I: Ord, V> Default for InMemoryVectorStore<I, V> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<I: Ord, V> InMemoryVectorStore<I, V> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<I: Ord + Debug, V> VectorSource<I, V> for InMemoryVectorStore<I, V> {
    fn get_value(&self, node: &Node<I>) -> Result<Arc<V>, DegError> {
        self.values
            .get(&node.label)
            .cloned()
            .ok_or_else(|| DegError::value_not_found(node))
    }
}

impl<I: Ord + Clone + Debug, V> VectorStore<I, V> for InMemoryVectorStore<I, V> {
    fn store_value(&mut self, node: &Node<I>, value: Arc<V>) -> Result<(), DegError> {
        self.values.insert(node.label.clone(), value);
        Ok(())
    }
}

// =============================================================================
// LRU CACHE
// =============================================================================

/// A bounded least-recently-used map from identifiers to vectors.
///
/// Holds at most `capacity` vectors and evicts the least recently used one
/// when full. Shareable between threads; a [`CachedVectorStore`] borrows it
/// so that the cache can outlive the store it fronts.
pub struct VectorCache<I: Hash + Eq, V> {
    entries: Mutex<LruCache<I, Arc<V>>>,
}

impl<I: Hash + Eq, V> std::fmt::Debug for VectorCache<I, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock();
        f.debug_struct("VectorCache")
            .field("cached", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

impl<I: Hash + Eq, V> VectorCache<I, V> {
    /// Create a cache holding at most `capacity` vectors.
    pub fn new(capacity: usize) -> Result<Self, DegError> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            DegError::InvalidConfig("vector cache capacity must be positive".to_string())
        })?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Number of vectors currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of cached vectors.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Drop every cached vector.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn get(&self, label: &I) -> Option<Arc<V>> {
        self.lock().get(label).cloned()
    }

    fn put(&self, label: I, value: Arc<V>) {
        self.lock().put(label, value);
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<I, Arc<V>>> {
        // A poisoned cache only holds immutable vectors and stays usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A vector source that consults a [`VectorCache`] before its inner source.
///
/// Lookups that miss load from the inner source and populate the cache.
/// Writes go to the inner store first and then into the cache.
pub struct CachedVectorStore<'c, S, I: Hash + Eq, V> {
    inner: S,
    cache: &'c VectorCache<I, V>,
}

impl<S: std::fmt::Debug, I: Hash + Eq, V> std::fmt::Debug for CachedVectorStore<'_, S, I, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedVectorStore")
            .field("inner", &self.inner)
            .field("cache", self.cache)
            .finish()
    }
}

impl<'c, S, I: Hash + Eq, V> CachedVectorStore<'c, S, I, V> {
    /// Front `inner` with `cache`.
    pub fn new(inner: S, cache: &'c VectorCache<I, V>) -> Self {
        Self { inner, cache }
    }

    /// Unwrap the inner store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, I, V> VectorSource<I, V> for CachedVectorStore<'_, S, I, V>
where
    S: VectorSource<I, V>,
    I: Hash + Eq + Clone,
{
    fn get_value(&self, node: &Node<I>) -> Result<Arc<V>, DegError> {
        if let Some(value) = self.cache.get(&node.label) {
            return Ok(value);
        }
        let value = self.inner.get_value(node)?;
        self.cache.put(node.label.clone(), Arc::clone(&value));
        Ok(value)
    }
}

impl<S, I, V> VectorStore<I, V> for CachedVectorStore<'_, S, I, V>
where
    S: VectorStore<I, V>,
    I: Hash + Eq + Clone,
{
    fn store_value(&mut self, node: &Node<I>, value: Arc<V>) -> Result<(), DegError> {
        self.inner.store_value(node, Arc::clone(&value))?;
        self.cache.put(node.label.clone(), value);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
