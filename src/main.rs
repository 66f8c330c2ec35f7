//! Solidafy Builder CLI
//!
//! Answers builder requests; the JSON result goes to stdout, logs to stderr

use clap::Parser;
use solidafy_builder::cli::{Cli, Runner};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let runner = Runner::new(cli);

    if let Err(e) = runner.run().await {
        eprintln!("Error: {}", runner.secrets().filter(&e.to_string()));
        std::process::exit(1);
    }
}
