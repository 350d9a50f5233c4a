//! File-backed stores for transactions, overrides, reference data, and
//! the gains cache
//!
//! The engine itself only sees snapshots; these stores own the JSON files
//! under the data directory. Transaction files are whatever the ingestion
//! pipeline dropped there (`transactions_*.json`, possibly nested one
//! level in per-date directories).

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::classify::{classify_fund_type, CapPercentages};
use crate::error::{EngineError, Result};
use crate::ledger::{validate_raw, RawTransaction, ValidatedBatch};
use crate::models::FundType;

/// Loads transaction JSON files produced by the ingestion pipeline
pub struct TransactionStore {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TransactionFile {
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

impl TransactionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load and validate every transaction file.
    ///
    /// A file that fails to parse is logged and skipped; only an
    /// unreadable directory is fatal. Row-level problems come back as
    /// skipped-row diagnostics on the batch.
    pub fn load_all(&self) -> Result<ValidatedBatch> {
        let mut raw_rows: Vec<RawTransaction> = Vec::new();

        if !self.dir.exists() {
            warn!(dir = %self.dir.display(), "transactions directory not found");
            return Ok(ValidatedBatch::default());
        }

        let mut files = Vec::new();
        collect_transaction_files(&self.dir, &mut files)?;
        files.sort();

        for path in &files {
            debug!(file = %path.display(), "loading transactions");
            let contents = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "unreadable transaction file, skipping");
                    continue;
                }
            };
            match serde_json::from_str::<TransactionFile>(&contents) {
                Ok(file) => raw_rows.extend(file.transactions),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "invalid transaction JSON, skipping");
                }
            }
        }

        let batch = validate_raw(&raw_rows);
        info!(
            transactions = batch.transactions.len(),
            skipped = batch.skipped.len(),
            files = files.len(),
            "loaded transactions"
        );
        Ok(batch)
    }
}

fn collect_transaction_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read transactions directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            // One level of per-date directories, as the ingestion
            // pipeline lays them out
            if let Ok(nested) = fs::read_dir(&path) {
                for nested_entry in nested.flatten() {
                    let nested_path = nested_entry.path();
                    if is_transaction_file(&nested_path) {
                        out.push(nested_path);
                    }
                }
            }
        } else if is_transaction_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_transaction_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("transactions_") && n.ends_with(".json"))
        .unwrap_or(false)
}

/// Persists the manual fund-type override map.
///
/// Writes are last-write-wins; cache invalidation follows from the
/// fingerprint covering the override map, no explicit invalidate needed.
pub struct OverrideStore {
    path: PathBuf,
}

impl OverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<HashMap<String, FundType>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read overrides file {}", self.path.display()))?;
        let raw: HashMap<String, String> = serde_json::from_str(&contents)
            .map_err(|e| EngineError::ParseError(format!("overrides file: {}", e)))?;

        let mut overrides = HashMap::new();
        for (ticker, value) in raw {
            match FundType::from_str(&value) {
                Ok(fund_type @ (FundType::Equity | FundType::Debt)) => {
                    overrides.insert(ticker, fund_type);
                }
                _ => warn!(ticker = %ticker, value = %value, "ignoring invalid override entry"),
            }
        }
        debug!(count = overrides.len(), "loaded fund type overrides");
        Ok(overrides)
    }

    /// Set one override. Only equity/debt are valid: an override exists to
    /// resolve an unknown, never to create one.
    pub fn set(&self, ticker: &str, fund_type: FundType) -> Result<()> {
        if fund_type == FundType::Unknown {
            return Err(EngineError::InvalidOverride(format!(
                "cannot override {} to unknown",
                ticker
            ))
            .into());
        }

        let mut overrides = self.load()?;
        overrides.insert(ticker.to_string(), fund_type);
        self.save(&overrides)?;
        info!(ticker = %ticker, fund_type = %fund_type, "saved fund type override");
        Ok(())
    }

    /// Set several overrides at once; all entries validated before any write.
    pub fn set_batch(&self, updates: &HashMap<String, FundType>) -> Result<()> {
        for (ticker, fund_type) in updates {
            if *fund_type == FundType::Unknown {
                return Err(EngineError::InvalidOverride(format!(
                    "cannot override {} to unknown",
                    ticker
                ))
                .into());
            }
        }

        let mut overrides = self.load()?;
        for (ticker, fund_type) in updates {
            overrides.insert(ticker.clone(), *fund_type);
        }
        self.save(&overrides)?;
        info!(count = updates.len(), "saved fund type overrides");
        Ok(())
    }

    pub fn remove(&self, ticker: &str) -> Result<bool> {
        let mut overrides = self.load()?;
        let removed = overrides.remove(ticker).is_some();
        if removed {
            self.save(&overrides)?;
            info!(ticker = %ticker, "removed fund type override");
        }
        Ok(removed)
    }

    fn save(&self, overrides: &HashMap<String, FundType>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let as_strings: HashMap<&String, &'static str> = overrides
            .iter()
            .map(|(ticker, fund_type)| (ticker, fund_type.as_str()))
            .collect();
        let json = serde_json::to_string_pretty(&as_strings)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write overrides file {}", self.path.display()))?;
        Ok(())
    }
}

/// Loads the market-cap reference database and classifies each ticker
pub struct FundReferenceStore {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ReferenceRow {
    #[serde(default, rename = "Ticker")]
    ticker: String,
    #[serde(flatten)]
    caps: CapPercentages,
}

impl FundReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<HashMap<String, FundType>> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "fund reference database not found");
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read fund reference {}", self.path.display()))?;
        let rows: Vec<ReferenceRow> = serde_json::from_str(&contents)
            .map_err(|e| EngineError::ParseError(format!("fund reference file: {}", e)))?;

        let mut reference = HashMap::new();
        for row in rows {
            let ticker = row.ticker.trim();
            if ticker.is_empty() {
                continue;
            }
            reference.insert(ticker.to_string(), classify_fund_type(ticker, &row.caps));
        }
        info!(tickers = reference.len(), "loaded fund reference database");
        Ok(reference)
    }
}

/// JSON-file cache store, one file per fingerprint
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("gains_{}.json", fingerprint))
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(fingerprint);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read cache entry {}", path.display()))?;
        let entry: CacheEntry = serde_json::from_str(&contents)
            .map_err(|e| EngineError::StoreError(format!("corrupt cache entry: {}", e)))?;
        Ok(Some(entry))
    }

    fn store(&self, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create cache directory {}", self.dir.display()))?;
        let json = serde_json::to_string(entry)?;
        fs::write(self.entry_path(&entry.fingerprint), json)
            .context("failed to write cache entry")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("gains_") && n.ends_with(".json"))
                .unwrap_or(false)
            {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
        }
        info!("gains cache cleared");
        Ok(())
    }
}
