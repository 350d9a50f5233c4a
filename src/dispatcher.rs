//! CLI command handlers
//!
//! Wires the file stores, cache manager, and engine together for each
//! subcommand. All user-visible printing happens here and in
//! `cli::formatters`.

use anyhow::Result;
use colored::Colorize;
use std::str::FromStr;

use crate::cache::CacheManager;
use crate::classify::Itr2024Rules;
use crate::cli::formatters;
use crate::cli::{CacheCommands, OverrideCommands};
use crate::config::load_config;
use crate::error::EngineError;
use crate::models::FundType;
use crate::store::{FileCacheStore, FundReferenceStore, OverrideStore, TransactionStore};

/// Compute (or fetch cached) gains and print them.
pub fn dispatch_gains(fy: Option<String>, recalculate: bool, json_output: bool) -> Result<()> {
    let config = load_config()?;

    let batch = TransactionStore::new(config.transactions_dir()).load_all()?;
    if batch.transactions.is_empty() && batch.skipped.is_empty() {
        if json_output {
            println!("{}", serde_json::json!({ "gain_rows": [], "summary": null }));
        } else {
            print!("{}", formatters::format_empty_gains());
        }
        return Ok(());
    }

    let overrides = OverrideStore::new(config.overrides_file()).load()?;
    let reference = FundReferenceStore::new(config.fund_reference_file()).load()?;

    let manager = CacheManager::new(FileCacheStore::new(config.cache_dir()));
    let report = manager.get_or_compute(
        &batch.transactions,
        &overrides,
        &reference,
        &Itr2024Rules::default(),
        recalculate,
    )?;

    if json_output {
        println!("{}", formatters::format_gains_json(&report, &batch.skipped));
    } else {
        print!("{}", formatters::format_gains_table(&report, fy.as_deref()));
        print!("{}", formatters::format_warnings(&report, &batch.skipped));
    }

    Ok(())
}

/// Handle override list/set/remove.
pub fn dispatch_overrides(action: OverrideCommands, json_output: bool) -> Result<()> {
    let config = load_config()?;
    let store = OverrideStore::new(config.overrides_file());

    match action {
        OverrideCommands::List => {
            let overrides = store.load()?;
            if json_output {
                let as_strings: std::collections::BTreeMap<String, &str> = overrides
                    .iter()
                    .map(|(t, f)| (t.clone(), f.as_str()))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&as_strings)?);
            } else if overrides.is_empty() {
                println!("{} No overrides set", "ℹ".blue().bold());
            } else {
                let mut entries: Vec<_> = overrides.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (ticker, fund_type) in entries {
                    println!("{:<30} {}", ticker, fund_type);
                }
            }
            Ok(())
        }

        OverrideCommands::Set { ticker, fund_type } => {
            let parsed = FundType::from_str(&fund_type).map_err(|_| {
                EngineError::InvalidOverride(format!(
                    "{}: must be 'equity' or 'debt'",
                    fund_type
                ))
            })?;
            store.set(&ticker, parsed)?;
            if json_output {
                println!(
                    "{}",
                    serde_json::json!({ "ticker": ticker, "fund_type": parsed.as_str() })
                );
            } else {
                println!(
                    "{} Override saved: {} → {}\nNext gains run will recompute.",
                    "✓".green().bold(),
                    ticker.bold(),
                    parsed
                );
            }
            Ok(())
        }

        OverrideCommands::Remove { ticker } => {
            let removed = store.remove(&ticker)?;
            if json_output {
                println!("{}", serde_json::json!({ "ticker": ticker, "removed": removed }));
            } else if removed {
                println!("{} Override removed for {}", "✓".green().bold(), ticker.bold());
            } else {
                println!("{} No override set for {}", "ℹ".blue().bold(), ticker.bold());
            }
            Ok(())
        }
    }
}

/// Handle cache subcommands.
pub fn dispatch_cache(action: CacheCommands, json_output: bool) -> Result<()> {
    let config = load_config()?;

    match action {
        CacheCommands::Clear => {
            use crate::cache::CacheStore;
            FileCacheStore::new(config.cache_dir()).clear()?;
            if json_output {
                println!("{}", serde_json::json!({ "cleared": true }));
            } else {
                println!("{} Gains cache cleared", "✓".green().bold());
            }
            Ok(())
        }
    }
}
