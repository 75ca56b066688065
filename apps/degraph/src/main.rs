//! # degraph
//!
//! Command line interface for degraph indexes.
//!
//! ## Usage
//!
//! ```bash
//! # Create an index with 32 edges per vertex
//! degraph -D vectors.redb init --degree 32 --metric cosine
//!
//! # Insert vectors and query them
//! degraph -D vectors.redb insert -f base.fvecs -t fvecs
//! degraph -D vectors.redb search --query "0.1,0.5,0.2" -k 5
//! degraph -D vectors.redb status
//! ```

use clap::Parser;
use degraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Logs go to stderr; DEGRAPH_LOG_FORMAT=json makes them machine-parseable.
    let log_format = std::env::var("DEGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_env("DEGRAPH_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "degraph=info,degraph_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!("degraph v{} - Dynamic Exploration Graph index", env!("CARGO_PKG_VERSION"));
    println!();
}
