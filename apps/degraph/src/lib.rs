//! # degraph
//!
//! Command line front end for degraph indexes.
//!
//! - `cli`: argument parsing and command dispatch
//! - `settings`: TOML settings file and flag overrides
//! - `input`: vector file readers (JSON, fvecs)

pub mod cli;
pub mod input;
pub mod settings;
