//! # Settings Loading
//!
//! Index settings come from three layers, later ones winning:
//! built-in defaults, an optional TOML file, then command line flags.
//!
//! ```toml
//! metric = "cosine"
//! backing = "in_memory"
//! cache_capacity = 8192
//!
//! [deg]
//! degree = 30
//! k_ext = 60
//! epsilon_ext = 0.2
//! ```

use clap::Args;
use degraph_core::{DegError, GraphBacking, IndexSettings, Metric};
use std::path::Path;

/// Maximum settings file size (1 MB).
const MAX_SETTINGS_FILE_SIZE: u64 = 1024 * 1024;

/// Flags that override the settings file.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Edges per vertex (even, at least 2)
    #[arg(long)]
    pub degree: Option<usize>,

    /// Candidates considered per insertion (at least `degree`)
    #[arg(long)]
    pub k_ext: Option<usize>,

    /// Search slack used while inserting
    #[arg(long)]
    pub epsilon_ext: Option<f32>,

    /// Distance metric (euclidean, squared_euclidean, manhattan, cosine)
    #[arg(long)]
    pub metric: Option<Metric>,
}

impl SettingsOverrides {
    /// Apply every flag that was given.
    ///
    /// A new `degree` without `k_ext` resets `k_ext` to twice the degree.
    pub fn apply(&self, settings: &mut IndexSettings) {
        if let Some(degree) = self.degree {
            settings.deg.degree = degree;
            settings.deg.k_ext = degree.saturating_mul(2);
        }
        if let Some(k_ext) = self.k_ext {
            settings.deg.k_ext = k_ext;
        }
        if let Some(epsilon_ext) = self.epsilon_ext {
            settings.deg.epsilon_ext = epsilon_ext;
        }
        if let Some(metric) = self.metric {
            settings.metric = metric;
        }
    }
}

/// Read settings from a TOML file. Missing keys take their defaults.
pub fn load_settings_file(path: &Path) -> Result<IndexSettings, DegError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DegError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    if metadata.len() > MAX_SETTINGS_FILE_SIZE {
        return Err(DegError::InvalidConfig(format!(
            "Settings file {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SETTINGS_FILE_SIZE
        )));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| DegError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    parse_settings(&text)
}

/// Parse TOML settings text.
pub fn parse_settings(text: &str) -> Result<IndexSettings, DegError> {
    toml::from_str(text).map_err(|e| DegError::InvalidConfig(e.to_string()))
}

/// Resolve the effective settings: defaults, then `file`, then flags.
pub fn resolve_settings(
    file: Option<&Path>,
    overrides: &SettingsOverrides,
    backing: Option<GraphBacking>,
    cache_capacity: Option<usize>,
) -> Result<IndexSettings, DegError> {
    let mut settings = match file {
        Some(path) => load_settings_file(path)?,
        None => IndexSettings::default(),
    };
    overrides.apply(&mut settings);
    if let Some(backing) = backing {
        settings.backing = backing;
    }
    if let Some(capacity) = cache_capacity {
        settings.cache_capacity = capacity;
    }
    settings.validate()?;
    Ok(settings)
}
