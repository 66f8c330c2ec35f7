//! CLI module
//!
//! Command-line interface for the manifest builder.
//!
//! # Commands
//!
//! - `read` - Answer a builder request (`test_read` or `resolve_manifest`)
//! - `validate` - Load and validate a manifest file

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
