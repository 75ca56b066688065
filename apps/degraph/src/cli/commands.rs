//! # CLI Command Implementations

use crate::input::{VectorFormat, parse_query, read_vectors};
use crate::settings::{SettingsOverrides, resolve_settings};
use degraph_core::{DegError, DegIndex, GraphBacking, IndexSettings};
use std::path::{Path, PathBuf};

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub database: PathBuf,
    pub config: Option<PathBuf>,
    pub backing: Option<GraphBacking>,
    pub cache_capacity: Option<usize>,
    pub json_mode: bool,
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create a new index.
pub fn cmd_init(
    options: &GlobalOptions,
    overrides: &SettingsOverrides,
    force: bool,
) -> Result<(), DegError> {
    let db_path = &options.database;
    if db_path.exists() {
        if !force {
            return Err(DegError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| DegError::Io(format!("Remove {}: {}", db_path.display(), e)))?;
    }

    let settings = resolve_settings(
        options.config.as_deref(),
        overrides,
        options.backing,
        options.cache_capacity,
    )?;
    let index = DegIndex::open(db_path, settings)?;

    if options.json_mode {
        print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "settings": settings_json(index.settings()),
        }));
        return Ok(());
    }

    println!("Initialized new index at {:?}", db_path);
    print_settings(index.settings());
    Ok(())
}

// =============================================================================
// INSERT COMMAND
// =============================================================================

/// Insert every vector of `file` in one transaction.
pub fn cmd_insert(
    options: &GlobalOptions,
    file: &Path,
    format: VectorFormat,
    start_id: u64,
) -> Result<(), DegError> {
    tracing::info!("Inserting from {:?} (format: {:?})", file, format);

    let vectors = read_vectors(file, format, start_id)?;
    let mut index = open_existing(options)?;
    let inserted = index.insert_batch(vectors)?;
    let count = index.count()?;

    if options.json_mode {
        print_json(&serde_json::json!({
            "inserted": inserted,
            "count": count,
            "dimension": index.dimension(),
        }));
        return Ok(());
    }

    println!("Inserted {} vectors", inserted);
    println!("Index now holds {} vectors", count);
    Ok(())
}

// =============================================================================
// SEARCH COMMAND
// =============================================================================

/// Print the `k` approximate nearest neighbours of `query`.
pub fn cmd_search(
    options: &GlobalOptions,
    query: &str,
    k: usize,
    epsilon: f32,
) -> Result<(), DegError> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(DegError::InvalidConfig(format!(
            "epsilon must be finite and non-negative, got {}",
            epsilon
        )));
    }

    let query = parse_query(query)?;
    let index = open_existing(options)?;
    let results = index.search(&query, k, epsilon)?;

    if options.json_mode {
        let neighbours: Vec<_> = results
            .iter()
            .map(|d| serde_json::json!({ "id": d.label, "distance": d.distance }))
            .collect();
        print_json(&serde_json::json!({ "k": k, "results": neighbours }));
        return Ok(());
    }

    if results.is_empty() {
        println!("No results");
        return Ok(());
    }
    println!("{:>4}  {:>20}  {:>12}", "rank", "id", "distance");
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>4}  {:>20}  {:>12.6}",
            rank + 1,
            result.label,
            result.distance
        );
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show index settings and size.
pub fn cmd_status(options: &GlobalOptions) -> Result<(), DegError> {
    let index = open_existing(options)?;
    let count = index.count()?;
    let file_size = std::fs::metadata(&options.database)
        .map(|m| m.len())
        .unwrap_or_default();

    if options.json_mode {
        print_json(&serde_json::json!({
            "database": options.database.to_string_lossy(),
            "count": count,
            "dimension": index.dimension(),
            "file_size": file_size,
            "settings": settings_json(index.settings()),
        }));
        return Ok(());
    }

    println!("degraph Index Status");
    println!("====================");
    println!("Database:  {:?}", options.database);
    println!("File size: {} bytes", file_size);
    println!();
    println!("Vectors:   {}", count);
    match index.dimension() {
        Some(dimension) => println!("Dimension: {}", dimension),
        None => println!("Dimension: (not set)"),
    }
    print_settings(index.settings());
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open an index created by `init`, using the settings stored in the file.
///
/// The backing and cache capacity still come from the settings file and
/// flags, since they are not part of the stored format.
pub fn open_existing(options: &GlobalOptions) -> Result<DegIndex, DegError> {
    let db_path = &options.database;
    if !db_path.is_file() {
        return Err(DegError::Io(format!(
            "Database {:?} not found. Run `degraph init` first.",
            db_path
        )));
    }

    let (deg, metric) = DegIndex::stored_config(db_path)?.ok_or_else(|| {
        DegError::InvalidConfig(format!("{:?} is not a degraph index", db_path))
    })?;
    let mut settings = resolve_settings(
        options.config.as_deref(),
        &SettingsOverrides::default(),
        options.backing,
        options.cache_capacity,
    )?;
    settings.deg = deg;
    settings.metric = metric;

    DegIndex::open(db_path, settings)
}

fn settings_json(settings: &IndexSettings) -> serde_json::Value {
    serde_json::to_value(settings).unwrap_or_default()
}

fn print_settings(settings: &IndexSettings) {
    println!();
    println!("Degree:      {}", settings.deg.degree);
    println!("k_ext:       {}", settings.deg.k_ext);
    println!("epsilon_ext: {}", settings.deg.epsilon_ext);
    println!("Metric:      {}", settings.metric);
    println!("Backing:     {}", settings.backing);
}
