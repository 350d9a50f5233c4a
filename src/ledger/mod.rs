//! Ledger builder: raw-row validation and per-fund buy/sell queues
//!
//! Turns the ingestion pipeline's unordered transaction rows into
//! time-ordered buy (lot) and sell queues per (ticker, folio) group.
//! Validation collects per-row issues instead of failing on the first
//! error, so one malformed row never blocks the rest of the portfolio.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::models::{round_nav, round_units, Lot, Transaction, TransactionSide};

/// A raw transaction row as emitted by the ingestion pipeline.
///
/// Fields arrive as strings: `units` may be parenthesised ("(142.297)")
/// or negative to mark a redemption, and numbers may carry thousands
/// separators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub folio: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub nav: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

/// A row skipped during validation, with the reason why
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRow {
    /// Row number within the input (1-indexed for user display)
    pub row: usize,
    pub field: String,
    pub value: String,
    pub reason: String,
}

impl SkippedRow {
    fn new(
        row: usize,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            row,
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result of validating a batch of raw rows
#[derive(Debug, Default)]
pub struct ValidatedBatch {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkippedRow>,
}

/// Parse a units string, detecting the transaction side.
///
/// Parenthesised or negative values are sells; everything else is a buy.
fn parse_units(raw: &str) -> Result<(TransactionSide, Decimal), String> {
    let trimmed = raw.trim();
    let (negated, digits) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };

    let value = Decimal::from_str(&digits.replace(',', ""))
        .map_err(|e| format!("unparsable decimal: {}", e))?;

    if negated || value < Decimal::ZERO {
        Ok((TransactionSide::Sell, value.abs()))
    } else {
        Ok((TransactionSide::Buy, value))
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    let (negated, digits) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };
    let value = Decimal::from_str(&digits.replace(',', ""))
        .map_err(|e| format!("unparsable decimal: {}", e))?;
    Ok(if negated { -value } else { value })
}

/// Validate raw rows into transactions, collecting per-row diagnostics.
///
/// Duplicate rows (same date/ticker/folio/units/nav) are dropped; missing
/// or non-positive required fields skip the row and continue.
pub fn validate_raw(rows: &[RawTransaction]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    let mut seen: HashSet<(NaiveDate, String, String, String, String)> = HashSet::new();

    for (idx, raw) in rows.iter().enumerate() {
        let row = idx + 1;

        let ticker = match raw.ticker.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                batch
                    .skipped
                    .push(SkippedRow::new(row, "ticker", "", "missing ticker"));
                continue;
            }
        };

        let date = match raw.date.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => match NaiveDate::parse_from_str(d, "%Y-%m-%d") {
                Ok(date) => date,
                Err(e) => {
                    batch.skipped.push(SkippedRow::new(
                        row,
                        "date",
                        d,
                        format!("invalid date: {}", e),
                    ));
                    continue;
                }
            },
            _ => {
                batch
                    .skipped
                    .push(SkippedRow::new(row, "date", "", "missing date"));
                continue;
            }
        };

        let (side, units) = match raw.units.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => match parse_units(u) {
                Ok(parsed) => parsed,
                Err(reason) => {
                    batch.skipped.push(SkippedRow::new(row, "units", u, reason));
                    continue;
                }
            },
            _ => {
                batch
                    .skipped
                    .push(SkippedRow::new(row, "units", "", "missing units"));
                continue;
            }
        };

        if units <= Decimal::ZERO {
            batch.skipped.push(SkippedRow::new(
                row,
                "units",
                units.to_string(),
                "units must be positive",
            ));
            continue;
        }

        let nav = match raw.nav.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => match parse_decimal(n) {
                Ok(nav) => nav,
                Err(reason) => {
                    batch.skipped.push(SkippedRow::new(row, "nav", n, reason));
                    continue;
                }
            },
            _ => {
                batch
                    .skipped
                    .push(SkippedRow::new(row, "nav", "", "missing nav"));
                continue;
            }
        };

        if nav <= Decimal::ZERO {
            batch.skipped.push(SkippedRow::new(
                row,
                "nav",
                nav.to_string(),
                "nav must be positive",
            ));
            continue;
        }

        // Amount is informational; fall back to units * nav when absent.
        let amount = match raw.amount.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => match parse_decimal(a) {
                Ok(amount) => amount,
                Err(reason) => {
                    batch
                        .skipped
                        .push(SkippedRow::new(row, "amount", a, reason));
                    continue;
                }
            },
            _ => units * nav,
        };

        let folio = raw
            .folio
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();

        let dedup_key = (
            date,
            ticker.clone(),
            folio.clone(),
            round_units(units).to_string(),
            round_nav(nav).to_string(),
        );
        if !seen.insert(dedup_key) {
            debug!(row, ticker = %ticker, "duplicate transaction skipped");
            continue;
        }

        batch
            .transactions
            .push(Transaction::new(ticker, folio, date, side, units, nav, amount));
    }

    if !batch.skipped.is_empty() {
        warn!(
            skipped = batch.skipped.len(),
            accepted = batch.transactions.len(),
            "some transaction rows were skipped during validation"
        );
    }

    batch
}

/// Key identifying an independent matching group
pub type GroupKey = (String, String);

/// Buy lots and sell transactions for one (ticker, folio) group,
/// each sorted by date ascending with input order as tiebreak
#[derive(Debug, Clone, Default)]
pub struct LedgerGroup {
    pub lots: Vec<Lot>,
    pub sells: Vec<Transaction>,
}

/// All matching groups, keyed by (ticker, folio)
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub groups: BTreeMap<GroupKey, LedgerGroup>,
}

/// Group transactions by (ticker, folio) and build sorted queues.
///
/// Pure transform; the FIFO invariant (lots ordered by buy date, input
/// order breaking ties) is established here.
pub fn build_ledger(transactions: &[Transaction]) -> Ledger {
    let mut buys: BTreeMap<GroupKey, Vec<(usize, &Transaction)>> = BTreeMap::new();
    let mut sells: BTreeMap<GroupKey, Vec<(usize, &Transaction)>> = BTreeMap::new();

    for (idx, tx) in transactions.iter().enumerate() {
        let key = (tx.ticker.clone(), tx.folio.clone());
        match tx.side {
            TransactionSide::Buy => buys.entry(key).or_default().push((idx, tx)),
            TransactionSide::Sell => sells.entry(key).or_default().push((idx, tx)),
        }
    }

    let mut ledger = Ledger::default();

    for (key, mut group_buys) in buys {
        group_buys.sort_by_key(|(idx, tx)| (tx.date, *idx));
        ledger.groups.entry(key).or_default().lots =
            group_buys.iter().map(|(_, tx)| Lot::from_buy(tx)).collect();
    }

    for (key, mut group_sells) in sells {
        group_sells.sort_by_key(|(idx, tx)| (tx.date, *idx));
        ledger.groups.entry(key).or_default().sells =
            group_sells.into_iter().map(|(_, tx)| tx.clone()).collect();
    }

    ledger
}
