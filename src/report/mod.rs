//! Aggregation of gain rows into category totals and the engine report
//!
//! Gains roll up into four fixed (fund type, term) buckets. Rows for
//! unclassified funds never enter the buckets or the overall total; they
//! surface as a warning list so the user can set an override.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::classify::{FundTypeResolver, TermRules};
use crate::ledger::build_ledger;
use crate::matcher::{match_all, OversoldPosition};
use crate::models::{FundType, GainRow, Term, Transaction};

/// Sums for one (fund type, term) bucket.
/// Each field is summed independently from the source rows; none is
/// derived from the others, so rounding never drifts between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub sale_consideration: Decimal,
    pub acquisition_cost: Decimal,
    pub gain_loss: Decimal,
}

impl CategoryTotal {
    fn add(&mut self, row: &GainRow) {
        self.sale_consideration += row.sale_consideration;
        self.acquisition_cost += row.acquisition_cost;
        self.gain_loss += row.gain;
    }
}

/// Category totals plus overall statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GainSummary {
    pub equity_short_term: CategoryTotal,
    pub equity_long_term: CategoryTotal,
    pub debt_short_term: CategoryTotal,
    pub debt_long_term: CategoryTotal,
    /// Sum of the four bucket gains (unknown funds excluded)
    pub total_gain: Decimal,
    /// Count of all emitted gain rows, unknown funds included
    pub total_transactions: usize,
}

/// Roll gain rows into the four fixed buckets.
pub fn summarize(rows: &[GainRow]) -> GainSummary {
    let mut summary = GainSummary {
        total_transactions: rows.len(),
        ..Default::default()
    };

    for row in rows {
        let bucket = match (row.fund_type, row.term) {
            (FundType::Equity, Term::ShortTerm) => &mut summary.equity_short_term,
            (FundType::Equity, Term::LongTerm) => &mut summary.equity_long_term,
            (FundType::Debt, Term::ShortTerm) => &mut summary.debt_short_term,
            (FundType::Debt, Term::LongTerm) => &mut summary.debt_long_term,
            // Unknown funds are reported but never aggregated
            (FundType::Unknown, _) => continue,
        };
        bucket.add(row);
    }

    summary.total_gain = summary.equity_short_term.gain_loss
        + summary.equity_long_term.gain_loss
        + summary.debt_short_term.gain_loss
        + summary.debt_long_term.gain_loss;

    summary
}

/// Tickers whose rows could not be classified, deduplicated, with the
/// number of affected rows each.
pub fn unknown_funds(rows: &[GainRow]) -> Vec<(String, usize)> {
    rows.iter()
        .filter(|r| r.fund_type == FundType::Unknown)
        .map(|r| r.ticker.clone())
        .sorted()
        .dedup_with_count()
        .map(|(count, ticker)| (ticker, count))
        .collect()
}

/// Complete engine output: rows, summary, and everything needing user
/// attention. Never a silent partial result.
#[derive(Debug, Clone, Serialize)]
pub struct GainReport {
    pub gain_rows: Vec<GainRow>,
    pub summary: GainSummary,
    pub unknown_tickers: Vec<String>,
    pub oversold: Vec<OversoldPosition>,
    pub computed_at: DateTime<Utc>,
    pub from_cache: bool,
}

impl GainReport {
    /// Assemble a report from matched rows (shared by the compute path
    /// and the cache-hit path, which re-derives the summary from stored
    /// rows rather than trusting a persisted aggregate).
    pub fn from_rows(
        gain_rows: Vec<GainRow>,
        oversold: Vec<OversoldPosition>,
        computed_at: DateTime<Utc>,
        from_cache: bool,
    ) -> Self {
        let summary = summarize(&gain_rows);
        let unknown_tickers = unknown_funds(&gain_rows)
            .into_iter()
            .map(|(ticker, _)| ticker)
            .collect();
        Self {
            gain_rows,
            summary,
            unknown_tickers,
            oversold,
            computed_at,
            from_cache,
        }
    }
}

/// Run the full pipeline: ledger -> FIFO matching -> aggregation.
pub fn compute_gains(
    transactions: &[Transaction],
    resolver: &FundTypeResolver,
    rules: &dyn TermRules,
) -> GainReport {
    let ledger = build_ledger(transactions);
    let outcome = match_all(ledger, resolver, rules);
    GainReport::from_rows(outcome.gain_rows, outcome.oversold, Utc::now(), false)
}
