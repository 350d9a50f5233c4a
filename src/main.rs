use anyhow::Result;
use clap::Parser;

use mfgains::cli::{Cli, Commands};
use mfgains::dispatcher;

fn main() -> Result<()> {
    // Initialize logging (RUST_LOG controls verbosity)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Gains { fy, recalculate } => {
            dispatcher::dispatch_gains(fy, recalculate, cli.json)
        }
        Commands::Overrides { action } => dispatcher::dispatch_overrides(action, cli.json),
        Commands::Cache { action } => dispatcher::dispatch_cache(action, cli.json),
    }
}
