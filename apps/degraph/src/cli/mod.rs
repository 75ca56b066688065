//! # degraph CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Create a new index file
//! - `insert` - Insert vectors from a JSON or fvecs file
//! - `search` - Find the nearest neighbours of a query vector
//! - `status` - Show index settings and size

mod commands;

use crate::input::VectorFormat;
use crate::settings::SettingsOverrides;
use clap::{Parser, Subcommand};
use degraph_core::{DegError, GraphBacking};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// degraph - approximate nearest neighbour search over a Dynamic Exploration Graph
#[derive(Parser, Debug)]
#[command(name = "degraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the index database
    #[arg(short = 'D', long, global = true, default_value = "degraph.redb")]
    pub database: PathBuf,

    /// TOML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Graph backing while inserting: "durable" or "in_memory"
    #[arg(short = 'B', long, global = true)]
    pub backing: Option<GraphBacking>,

    /// Number of vectors kept in the search cache
    #[arg(long, global = true)]
    pub cache_capacity: Option<usize>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new empty index
    Init {
        #[command(flatten)]
        overrides: SettingsOverrides,

        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Insert vectors from a file
    Insert {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,

        /// Input format
        #[arg(short = 't', long, value_enum, default_value_t = VectorFormat::Json)]
        format: VectorFormat,

        /// Id of the first vector without an explicit id
        #[arg(short, long, default_value = "0")]
        start_id: u64,
    },

    /// Search for the nearest neighbours of a vector
    Search {
        /// Query vector as comma separated numbers
        #[arg(long, allow_hyphen_values = true)]
        query: String,

        /// Number of neighbours to return
        #[arg(short, default_value = "10")]
        k: usize,

        /// Search slack; larger values explore more of the graph
        #[arg(short, long, default_value = "0.1")]
        epsilon: f32,
    },

    /// Show index status
    Status,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), DegError> {
    let options = GlobalOptions {
        database: cli.database,
        config: cli.config,
        backing: cli.backing,
        cache_capacity: cli.cache_capacity,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Init { overrides, force }) => cmd_init(&options, &overrides, force),
        Some(Commands::Insert {
            file,
            format,
            start_id,
        }) => cmd_insert(&options, &file, format, start_id),
        Some(Commands::Search { query, k, epsilon }) => cmd_search(&options, &query, k, epsilon),
        Some(Commands::Status) | None => cmd_status(&options),
    }
}
