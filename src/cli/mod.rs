use clap::{Parser, Subcommand};

pub mod formatters;

#[derive(Parser)]
#[command(name = "mfgains")]
#[command(
    version,
    about = "Mutual fund FIFO capital gains engine for ITR filing"
)]
#[command(
    long_about = "Compute FIFO capital gains from mutual fund transaction history, classified by fund type (equity/debt) and holding-period term, with cached results and manual fund type overrides."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute and display FIFO capital gains (cached)
    Gains {
        /// Filter rows by financial year (e.g. 2024-25)
        #[arg(long)]
        fy: Option<String>,

        /// Ignore the cache and recompute from scratch
        #[arg(long)]
        recalculate: bool,
    },

    /// Manual fund type overrides
    Overrides {
        #[command(subcommand)]
        action: OverrideCommands,
    },

    /// Gains cache management
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand)]
pub enum OverrideCommands {
    /// List current overrides
    List,

    /// Set the fund type for a ticker (wins over the reference data)
    Set {
        /// Fund ticker symbol
        ticker: String,

        /// Fund classification: equity or debt
        fund_type: String,
    },

    /// Remove an override, falling back to the reference classification
    Remove {
        /// Fund ticker symbol
        ticker: String,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Delete all cached gains results
    Clear,
}
