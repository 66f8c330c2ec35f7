//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Solidafy manifest builder CLI
#[derive(Parser, Debug)]
#[command(name = "solidafy-builder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a builder request (`__command` in the config)
    Read {
        /// Configuration file (JSON) carrying the injected manifest
        #[arg(short = 'C', long)]
        config: PathBuf,

        /// Configured catalog file (JSON); its first stream is read
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Stream to read, overriding the catalog
        #[arg(long)]
        stream: Option<String>,

        /// Initial stream state file (JSON object)
        #[arg(short, long)]
        state: Option<PathBuf>,
    },

    /// Validate a manifest file (YAML)
    Validate {
        /// Manifest file
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON message per line
    Json,
    /// Indented JSON
    Pretty,
}
