//! Cache manager and fingerprint tests
//!
//! Verifies idempotence, override-driven invalidation, corrupt-entry
//! recovery, and single-flight behavior under concurrent callers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use mfgains::cache::{fingerprint, CacheManager, CacheStore};
use mfgains::classify::Itr2024Rules;
use mfgains::models::{FundType, Transaction, TransactionSide};
use mfgains::store::FileCacheStore;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn buy(ticker: &str, d: &str, units: Decimal, nav: Decimal) -> Transaction {
    Transaction::new(ticker, "F1", date(d), TransactionSide::Buy, units, nav, units * nav)
}

fn sell(ticker: &str, d: &str, units: Decimal, nav: Decimal) -> Transaction {
    Transaction::new(ticker, "F1", date(d), TransactionSide::Sell, units, nav, units * nav)
}

fn sample_portfolio() -> Vec<Transaction> {
    vec![
        buy("ABC", "2022-01-01", dec!(100), dec!(10)),
        buy("ABC", "2022-06-01", dec!(50), dec!(12)),
        sell("ABC", "2023-02-01", dec!(120), dec!(15)),
        buy("DEF", "2021-05-01", dec!(200), dec!(25)),
        sell("DEF", "2024-01-15", dec!(75.5), dec!(31.25)),
    ]
}

fn equity_reference() -> HashMap<String, FundType> {
    let mut reference = HashMap::new();
    reference.insert("ABC".to_string(), FundType::Equity);
    reference.insert("DEF".to_string(), FundType::Equity);
    reference
}

#[test]
fn test_idempotent_results_through_file_cache() {
    let dir = TempDir::new().unwrap();
    let manager = CacheManager::new(FileCacheStore::new(dir.path().join("cache")));
    let txs = sample_portfolio();
    let overrides = HashMap::new();
    let reference = equity_reference();
    let rules = Itr2024Rules::default();

    let first = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert!(!first.from_cache);

    let second = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert!(second.from_cache);

    // Bit-identical rows and summary, no hidden state drift
    assert_eq!(first.gain_rows, second.gain_rows);
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.computed_at, second.computed_at);
}

#[test]
fn test_cache_survives_manager_restart() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let txs = sample_portfolio();
    let overrides = HashMap::new();
    let reference = equity_reference();
    let rules = Itr2024Rules::default();

    let first = CacheManager::new(FileCacheStore::new(&cache_dir))
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();

    // A fresh manager over the same directory serves the stored entry
    let second = CacheManager::new(FileCacheStore::new(&cache_dir))
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(first.gain_rows, second.gain_rows);
}

#[test]
fn test_override_change_invalidates_and_revert_restores() {
    let dir = TempDir::new().unwrap();
    let manager = CacheManager::new(FileCacheStore::new(dir.path().join("cache")));
    let txs = sample_portfolio();
    let reference = equity_reference();
    let rules = Itr2024Rules::default();

    let empty = HashMap::new();
    let base = manager
        .get_or_compute(&txs, &empty, &reference, &rules, false)
        .unwrap();

    // Changing one override changes the fingerprint: full recomputation
    let mut with_override = HashMap::new();
    with_override.insert("ABC".to_string(), FundType::Debt);
    assert_ne!(fingerprint(&txs, &empty), fingerprint(&txs, &with_override));

    let overridden = manager
        .get_or_compute(&txs, &with_override, &reference, &rules, false)
        .unwrap();
    assert!(!overridden.from_cache);
    assert_ne!(base.summary, overridden.summary);

    // Reverting the override hits the original entry again
    let reverted = manager
        .get_or_compute(&txs, &empty, &reference, &rules, false)
        .unwrap();
    assert!(reverted.from_cache);
    assert_eq!(base.gain_rows, reverted.gain_rows);
    assert_eq!(base.summary, reverted.summary);
}

#[test]
fn test_transaction_change_invalidates() {
    let dir = TempDir::new().unwrap();
    let manager = CacheManager::new(FileCacheStore::new(dir.path().join("cache")));
    let mut txs = sample_portfolio();
    let overrides = HashMap::new();
    let reference = equity_reference();
    let rules = Itr2024Rules::default();

    manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();

    txs.push(buy("ABC", "2024-01-01", dec!(10), dec!(20)));
    let changed = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert!(!changed.from_cache);
}

#[test]
fn test_corrupt_cache_entry_recomputes() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let txs = sample_portfolio();
    let overrides = HashMap::new();
    let reference = equity_reference();
    let rules = Itr2024Rules::default();

    let manager = CacheManager::new(FileCacheStore::new(&cache_dir));
    let first = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();

    // Corrupt the stored entry on disk
    let fp = fingerprint(&txs, &overrides);
    fs::write(cache_dir.join(format!("gains_{}.json", fp)), "{broken").unwrap();

    // Cold start: recompute instead of failing
    let recovered = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert!(!recovered.from_cache);
    assert_eq!(first.gain_rows, recovered.gain_rows);
}

#[test]
fn test_oversold_diagnostics_survive_cache_hit() {
    let dir = TempDir::new().unwrap();
    let manager = CacheManager::new(FileCacheStore::new(dir.path().join("cache")));
    let txs = vec![
        buy("ABC", "2022-01-01", dec!(100), dec!(10)),
        sell("ABC", "2023-02-01", dec!(150), dec!(15)),
    ];
    let overrides = HashMap::new();
    let reference = equity_reference();
    let rules = Itr2024Rules::default();

    let first = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert_eq!(first.oversold.len(), 1);

    let cached = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.oversold, first.oversold);
}

#[test]
fn test_fingerprint_ignores_input_order() {
    let txs = sample_portfolio();
    let mut shuffled = txs.clone();
    shuffled.reverse();
    shuffled.swap(0, 2);
    let overrides = HashMap::new();

    assert_eq!(fingerprint(&txs, &overrides), fingerprint(&shuffled, &overrides));
}

#[test]
fn test_concurrent_callers_get_identical_results() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(CacheManager::new(FileCacheStore::new(
        dir.path().join("cache"),
    )));
    let txs = Arc::new(sample_portfolio());
    let reference = Arc::new(equity_reference());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let txs = Arc::clone(&txs);
            let reference = Arc::clone(&reference);
            std::thread::spawn(move || {
                let rules = Itr2024Rules::default();
                manager
                    .get_or_compute(&txs, &HashMap::new(), &reference, &rules, false)
                    .unwrap()
            })
        })
        .collect();

    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for report in &reports[1..] {
        assert_eq!(report.gain_rows, reports[0].gain_rows);
        assert_eq!(report.summary, reports[0].summary);
    }
}

#[test]
fn test_clear_forces_recompute() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let manager = CacheManager::new(FileCacheStore::new(&cache_dir));
    let txs = sample_portfolio();
    let overrides = HashMap::new();
    let reference = equity_reference();
    let rules = Itr2024Rules::default();

    manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    manager.store().clear().unwrap();

    let after_clear = manager
        .get_or_compute(&txs, &overrides, &reference, &rules, false)
        .unwrap();
    assert!(!after_clear.from_cache);
}
