//! Fingerprint-keyed result cache
//!
//! The whole pipeline is memoized behind a deterministic digest of its
//! inputs: the full transaction set plus the full override map. Any change
//! to either produces a new fingerprint and a full recomputation; there is
//! no partial invalidation. Concurrent callers racing on the same
//! fingerprint are serialized so at most one recomputation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::classify::{FundTypeResolver, TermRules};
use crate::error::Result;
use crate::matcher::OversoldPosition;
use crate::models::{FundType, GainRow, Transaction};
use crate::report::{compute_gains, GainReport};

/// A cached computation result, keyed by input fingerprint.
/// The summary is not persisted; it is re-derived from the rows on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub gain_rows: Vec<GainRow>,
    /// Oversold diagnostics travel with the rows so a cache hit still
    /// surfaces tickers needing attention
    #[serde(default)]
    pub oversold: Vec<OversoldPosition>,
    pub computed_at: DateTime<Utc>,
}

/// Opaque key-value storage for cache entries.
/// Load failures are reported as errors so the manager can decide to
/// treat them as a cold start.
pub trait CacheStore: Send + Sync {
    fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>>;
    fn store(&self, entry: &CacheEntry) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// In-memory cache store, used in tests and embedding scenarios
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let entries = lock_unpoisoned(&self.entries);
        Ok(entries.get(fingerprint).cloned())
    }

    fn store(&self, entry: &CacheEntry) -> Result<()> {
        let mut entries = lock_unpoisoned(&self.entries);
        entries.insert(entry.fingerprint.clone(), entry.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = lock_unpoisoned(&self.entries);
        entries.clear();
        Ok(())
    }
}

/// Deterministic, order-independent digest over the full transaction set
/// and override map. Two inputs with identical contents in any order hash
/// identically (the ledger builder re-sorts anyway).
pub fn fingerprint(
    transactions: &[Transaction],
    overrides: &HashMap<String, FundType>,
) -> String {
    let mut lines: Vec<String> = transactions
        .iter()
        .map(|tx| {
            format!(
                "tx|{}|{}|{}|{}|{}|{}|{}",
                tx.date,
                tx.ticker,
                tx.folio,
                tx.side.as_str(),
                tx.units,
                tx.nav,
                tx.amount
            )
        })
        .collect();
    lines.extend(
        overrides
            .iter()
            .map(|(ticker, fund_type)| format!("ov|{}|{}", ticker, fund_type.as_str())),
    );
    lines.sort();

    let mut hasher = blake3::Hasher::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

// Recover the inner value from a poisoned lock; the guarded state is
// plain bookkeeping with no torn invariants.
fn lock_unpoisoned<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Memoizes the gains pipeline behind a [`CacheStore`].
pub struct CacheManager<S: CacheStore> {
    store: S,
    inflight: Mutex<HashSet<String>>,
    flight_done: Condvar,
}

impl<S: CacheStore> CacheManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            inflight: Mutex::new(HashSet::new()),
            flight_done: Condvar::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return cached gains for these inputs, computing and storing them on
    /// a miss. Corrupt or unreadable cache entries are treated as a cold
    /// start. With `force`, the cache check is skipped but the fresh
    /// result is still stored.
    pub fn get_or_compute(
        &self,
        transactions: &[Transaction],
        overrides: &HashMap<String, FundType>,
        reference: &HashMap<String, FundType>,
        rules: &dyn TermRules,
        force: bool,
    ) -> Result<GainReport> {
        let fp = fingerprint(transactions, overrides);

        if !force {
            if let Some(report) = self.try_cached(&fp) {
                return Ok(report);
            }
        }

        // Single-flight: one computation per fingerprint at a time. Losers
        // wait, then re-check the store before considering their own run.
        loop {
            let mut inflight = lock_unpoisoned(&self.inflight);
            if inflight.insert(fp.clone()) {
                break;
            }
            let guard = self
                .flight_done
                .wait(inflight)
                .unwrap_or_else(PoisonError::into_inner);
            drop(guard);

            if !force {
                if let Some(report) = self.try_cached(&fp) {
                    return Ok(report);
                }
            }
        }

        info!(fingerprint = %fp, transactions = transactions.len(), "recomputing FIFO gains");
        let resolver = FundTypeResolver::new(overrides.clone(), reference.clone());
        let report = compute_gains(transactions, &resolver, rules);

        let entry = CacheEntry {
            fingerprint: fp.clone(),
            gain_rows: report.gain_rows.clone(),
            oversold: report.oversold.clone(),
            computed_at: report.computed_at,
        };
        if let Err(e) = self.store.store(&entry) {
            warn!(error = %e, "failed to persist gains cache entry");
        }

        let mut inflight = lock_unpoisoned(&self.inflight);
        inflight.remove(&fp);
        drop(inflight);
        self.flight_done.notify_all();

        Ok(report)
    }

    fn try_cached(&self, fp: &str) -> Option<GainReport> {
        match self.store.load(fp) {
            Ok(Some(entry)) => {
                debug!(fingerprint = %fp, rows = entry.gain_rows.len(), "gains cache hit");
                Some(GainReport::from_rows(
                    entry.gain_rows,
                    entry.oversold,
                    entry.computed_at,
                    true,
                ))
            }
            Ok(None) => None,
            Err(e) => {
                // Treat corruption as a miss; recompute rather than fail
                warn!(fingerprint = %fp, error = %e, "unreadable cache entry, recomputing");
                None
            }
        }
    }
}
