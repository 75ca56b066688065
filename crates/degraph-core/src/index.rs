//! # DegIndex
//!
//! A Dynamic Exploration Graph stored in a single redb file.
//!
//! The index ties the engine to durable storage:
//! - every `insert`/`insert_batch` runs in one write transaction, so a
//!   failing batch leaves the file untouched
//! - every `search` runs on a read snapshot; any number of searches may run
//!   next to one writer
//! - the graph tunables and metric are persisted on creation and checked on
//!   every reopen
//! - the vector dimension is fixed by the first insert

use crate::config::{DegConfig, GraphBacking, IndexSettings};
use crate::deg::DynamicExplorationGraph;
use crate::distance::Metric;
use crate::graph::{InMemoryGraph, MutableWeightedGraph, WeightedGraph};
use crate::primitives::FORMAT_VERSION;
use crate::storage::{
    METADATA, RedbGraph, RedbGraphSnapshot, RedbVectorSnapshot, RedbVectorStore, create_tables,
    storage_error,
};
use crate::vectors::{CachedVectorStore, VectorCache, VectorStore};
use crate::{DegError, Distance, Node, TupleId};
use redb::{Database, ReadableDatabase, ReadableTable, Table, TableError, WriteTransaction};
use std::path::Path;

const FORMAT_VERSION_KEY: &str = "format_version";
const DEGREE_KEY: &str = "degree";
const K_EXT_KEY: &str = "k_ext";
const EPSILON_EXT_KEY: &str = "epsilon_ext_bits";
const METRIC_KEY: &str = "metric";
const DIMENSION_KEY: &str = "dimension";

/// A persistent approximate nearest neighbour index over `f32` vectors.
pub struct DegIndex {
    db: Database,
    settings: IndexSettings,
    dimension: Option<usize>,
    cache: VectorCache<TupleId, Vec<f32>>,
}

impl std::fmt::Debug for DegIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DegIndex")
            .field("settings", &self.settings)
            .field("dimension", &self.dimension)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl DegIndex {
    /// Open or create an index file at `path`.
    ///
    /// A new file records `settings.deg` and `settings.metric`. An existing
    /// file must have been created with the same values, otherwise this fails
    /// with [`DegError::ConfigMismatch`].
    pub fn open(path: impl AsRef<Path>, settings: IndexSettings) -> Result<Self, DegError> {
        settings.validate()?;
        let db = Database::create(path.as_ref()).map_err(storage_error)?;

        let txn = db.begin_write().map_err(storage_error)?;
        create_tables(&txn)?;
        let dimension = {
            let mut metadata = txn.open_table(METADATA).map_err(storage_error)?;
            if read_u64(&metadata, FORMAT_VERSION_KEY)?.is_none() {
                write_settings(&mut metadata, &settings)?;
                None
            } else {
                verify_settings(&metadata, &settings)?;
                read_u64(&metadata, DIMENSION_KEY)?.map(|d| d as usize)
            }
        };
        txn.commit().map_err(storage_error)?;

        tracing::info!(
            path = %path.as_ref().display(),
            degree = settings.deg.degree,
            k_ext = settings.deg.k_ext,
            epsilon_ext = settings.deg.epsilon_ext,
            metric = %settings.metric,
            backing = %settings.backing,
            "opened index"
        );

        Ok(Self {
            db,
            cache: VectorCache::new(settings.cache_capacity)?,
            settings,
            dimension,
        })
    }

    /// The settings this index was opened with.
    #[must_use]
    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// The vector dimension, once the first vector has been inserted.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Number of indexed vectors.
    pub fn count(&self) -> Result<usize, DegError> {
        let txn = self.db.begin_read().map_err(storage_error)?;
        RedbGraphSnapshot::open(&txn, self.settings.deg.degree)?.size()
    }

    /// Insert a single vector.
    pub fn insert(&mut self, id: TupleId, vector: Vec<f32>) -> Result<(), DegError> {
        self.insert_batch(std::iter::once((id, vector)))?;
        Ok(())
    }

    /// Insert vectors in one transaction. Either all of them are committed
    /// or, on the first error, none.
    ///
    /// Returns the number of inserted vectors.
    pub fn insert_batch<T>(&mut self, items: T) -> Result<usize, DegError>
    where
        T: IntoIterator<Item = (TupleId, Vec<f32>)>,
    {
        let txn = self.db.begin_write().map_err(storage_error)?;
        let mut dimension = self.dimension;
        let inserted = self.insert_in(&txn, items, &mut dimension)?;

        if dimension != self.dimension {
            if let Some(dimension) = dimension {
                let mut metadata = txn.open_table(METADATA).map_err(storage_error)?;
                metadata
                    .insert(DIMENSION_KEY, dimension as u64)
                    .map_err(storage_error)?;
            }
        }
        txn.commit().map_err(storage_error)?;
        self.dimension = dimension;

        tracing::debug!(inserted, "insert batch committed");
        Ok(inserted)
    }

    /// Approximate `k` nearest neighbours of `query`.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        epsilon: f32,
    ) -> Result<Vec<Distance<TupleId>>, DegError> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(DegError::InvalidConfig(format!(
                "epsilon must be finite and non-negative, got {epsilon}"
            )));
        }
        check_finite(query)?;
        match self.dimension {
            Some(expected) if expected != query.len() => {
                return Err(DegError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
            None => return Ok(Vec::new()),
            Some(_) => {}
        }

        let txn = self.db.begin_read().map_err(storage_error)?;
        let graph = RedbGraphSnapshot::open(&txn, self.settings.deg.degree)?;
        let values = CachedVectorStore::new(RedbVectorSnapshot::open(&txn)?, &self.cache);
        let mut deg =
            DynamicExplorationGraph::new(self.settings.deg, graph, values, self.settings.metric)?;
        deg.search_default(&query.to_vec(), k, epsilon)
    }

    /// Compact the database file.
    ///
    /// Returns `true` if any space was reclaimed.
    pub fn compact(&mut self) -> Result<bool, DegError> {
        self.db.compact().map_err(storage_error)
    }

    /// Graph tunables and metric recorded in the index file at `path`.
    ///
    /// Returns `None` for a file that [`DegIndex::open`] never initialised.
    pub fn stored_config(path: impl AsRef<Path>) -> Result<Option<(DegConfig, Metric)>, DegError> {
        let db = Database::open(path.as_ref()).map_err(storage_error)?;
        let txn = db.begin_read().map_err(storage_error)?;
        let metadata = match txn.open_table(METADATA) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };
        if read_u64(&metadata, FORMAT_VERSION_KEY)?.is_none() {
            return Ok(None);
        }

        let require = |key: &str| -> Result<u64, DegError> {
            read_u64(&metadata, key)?.ok_or_else(|| missing_key(key))
        };
        let config = DegConfig {
            degree: require(DEGREE_KEY)? as usize,
            k_ext: require(K_EXT_KEY)? as usize,
            epsilon_ext: f32::from_bits(require(EPSILON_EXT_KEY)? as u32),
        };
        let code = require(METRIC_KEY)?;
        let metric = Metric::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| DegError::Storage(format!("unknown metric code {code}")))?;
        Ok(Some((config, metric)))
    }

    fn insert_in<T>(
        &self,
        txn: &WriteTransaction,
        items: T,
        dimension: &mut Option<usize>,
    ) -> Result<usize, DegError>
    where
        T: IntoIterator<Item = (TupleId, Vec<f32>)>,
    {
        let config = self.settings.deg;
        let metric = self.settings.metric;
        let values = RedbVectorStore::open(txn)?;
        let graph = RedbGraph::open(txn, config.degree)?;

        match self.settings.backing {
            GraphBacking::Durable => {
                let mut deg = DynamicExplorationGraph::new(config, graph, values, metric)?;
                index_all(&mut deg, items, dimension)
            }
            GraphBacking::InMemory => {
                let mut durable = graph;
                let memory = InMemoryGraph::from_graph(&durable)?;
                let mut deg = DynamicExplorationGraph::new(config, memory, values, metric)?;
                let inserted = index_all(&mut deg, items, dimension)?;
                // Only a changed graph is written back
                if inserted > 0 {
                    let (memory, _, _) = deg.into_parts();
                    durable.replace_with(&memory)?;
                }
                Ok(inserted)
            }
        }
    }
}

fn index_all<G, S, T>(
    deg: &mut DynamicExplorationGraph<TupleId, Vec<f32>, G, S, Metric>,
    items: T,
    dimension: &mut Option<usize>,
) -> Result<usize, DegError>
where
    G: MutableWeightedGraph<Node<TupleId>>,
    S: VectorStore<TupleId, Vec<f32>>,
    T: IntoIterator<Item = (TupleId, Vec<f32>)>,
{
    let mut inserted = 0;
    for (id, vector) in items {
        check_finite(&vector)?;
        match *dimension {
            Some(expected) if expected != vector.len() => {
                return Err(DegError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => *dimension = Some(vector.len()),
        }
        deg.index(id, vector)?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Distances of non-finite vectors are NaN or infinite, which breaks the
/// search radius.
fn check_finite(vector: &[f32]) -> Result<(), DegError> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(position) => Err(DegError::InvalidVector(format!(
            "component {position} is {}",
            vector[position]
        ))),
        None => Ok(()),
    }
}

// =============================================================================
// PERSISTED SETTINGS
// =============================================================================

fn read_u64<T>(table: &T, key: &str) -> Result<Option<u64>, DegError>
where
    T: ReadableTable<&'static str, u64>,
{
    Ok(table.get(key).map_err(storage_error)?.map(|v| v.value()))
}

fn missing_key(key: &str) -> DegError {
    DegError::Storage(format!("metadata key '{key}' is missing"))
}

fn metric_code(metric: Metric) -> u64 {
    Metric::ALL
        .iter()
        .position(|m| *m == metric)
        .unwrap_or_default() as u64
}

fn metric_name(code: u64) -> String {
    Metric::ALL
        .get(code as usize)
        .map_or_else(|| format!("unknown ({code})"), |m| m.name().to_string())
}

fn write_settings(
    metadata: &mut Table<'_, &'static str, u64>,
    settings: &IndexSettings,
) -> Result<(), DegError> {
    let DegConfig {
        degree,
        k_ext,
        epsilon_ext,
    } = settings.deg;
    let entries = [
        (FORMAT_VERSION_KEY, FORMAT_VERSION),
        (DEGREE_KEY, degree as u64),
        (K_EXT_KEY, k_ext as u64),
        (EPSILON_EXT_KEY, u64::from(epsilon_ext.to_bits())),
        (METRIC_KEY, metric_code(settings.metric)),
    ];
    for (key, value) in entries {
        metadata.insert(key, value).map_err(storage_error)?;
    }
    Ok(())
}

fn verify_settings<T>(metadata: &T, settings: &IndexSettings) -> Result<(), DegError>
where
    T: ReadableTable<&'static str, u64>,
{
    let DegConfig {
        degree,
        k_ext,
        epsilon_ext,
    } = settings.deg;
    let render_epsilon = |bits: u64| f32::from_bits(bits as u32).to_string();
    let checks: [(&str, u64, &dyn Fn(u64) -> String); 5] = [
        (FORMAT_VERSION_KEY, FORMAT_VERSION, &|v| v.to_string()),
        (DEGREE_KEY, degree as u64, &|v| v.to_string()),
        (K_EXT_KEY, k_ext as u64, &|v| v.to_string()),
        (EPSILON_EXT_KEY, u64::from(epsilon_ext.to_bits()), &render_epsilon),
        (METRIC_KEY, metric_code(settings.metric), &metric_name),
    ];
    for (key, requested, render) in checks {
        let stored = read_u64(metadata, key)?.ok_or_else(|| missing_key(key))?;
        if stored != requested {
            return Err(DegError::ConfigMismatch {
                key: key.to_string(),
                stored: render(stored),
                requested: render(requested),
            });
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
