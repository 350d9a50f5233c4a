//! Fund type resolution and holding-period term rules
//!
//! Fund classification comes from manual overrides first, then a market-cap
//! reference source; tickers absent from both stay `Unknown`. Term rules are
//! isolated behind the `TermRules` trait because thresholds and cutover
//! dates change with tax law; the matcher never encodes them directly.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::models::{FundType, Term};

/// Equity percentage at or above which a fund is taxed as equity
pub const EQUITY_PERCENTAGE_THRESHOLD: Decimal = Decimal::from_parts(65, 0, 0, false, 0);

/// Market-cap split percentages for a fund, as reported by the
/// reference source (raw strings like "68.73%", possibly empty)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapPercentages {
    #[serde(default, rename = "Large Cap")]
    pub large_cap: String,
    #[serde(default, rename = "Mid Cap")]
    pub mid_cap: String,
    #[serde(default, rename = "Small Cap")]
    pub small_cap: String,
    #[serde(default, rename = "Other Cap")]
    pub other_cap: String,
}

/// Parse a lenient percentage string ("68.73%", "0%", "") to a Decimal.
/// Invalid or empty input counts as zero.
fn parse_percentage(raw: &str) -> Decimal {
    let cleaned = raw.trim().trim_end_matches('%');
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(cleaned).unwrap_or(Decimal::ZERO)
}

/// Classify a fund from its market-cap split.
///
/// Rules (Indian tax law):
/// - ticker contains "arbi" -> equity (arbitrage funds get equity taxation)
/// - no cap data at all -> unknown
/// - summed equity percentage >= 65% -> equity, else debt
pub fn classify_fund_type(ticker: &str, caps: &CapPercentages) -> FundType {
    if ticker.to_lowercase().contains("arbi") {
        return FundType::Equity;
    }

    let fields = [&caps.large_cap, &caps.mid_cap, &caps.small_cap, &caps.other_cap];
    if fields.iter().all(|f| f.trim().is_empty()) {
        return FundType::Unknown;
    }

    let equity_pct: Decimal = fields.iter().map(|f| parse_percentage(f)).sum();
    if equity_pct >= EQUITY_PERCENTAGE_THRESHOLD {
        FundType::Equity
    } else {
        FundType::Debt
    }
}

/// Resolves fund types from a snapshot of overrides and reference data.
/// Overrides always win; the engine never mutates either map.
#[derive(Debug, Clone, Default)]
pub struct FundTypeResolver {
    overrides: HashMap<String, FundType>,
    reference: HashMap<String, FundType>,
}

impl FundTypeResolver {
    pub fn new(
        overrides: HashMap<String, FundType>,
        reference: HashMap<String, FundType>,
    ) -> Self {
        Self {
            overrides,
            reference,
        }
    }

    pub fn resolve(&self, ticker: &str) -> FundType {
        if let Some(fund_type) = self.overrides.get(ticker) {
            return *fund_type;
        }
        self.reference
            .get(ticker)
            .copied()
            .unwrap_or(FundType::Unknown)
    }

    pub fn overrides(&self) -> &HashMap<String, FundType> {
        &self.overrides
    }
}

/// Swap-in holding-period rule set.
///
/// A pure function of (fund type, buy date, sell date) so that tax law
/// changes are new implementations, not matcher edits.
pub trait TermRules {
    fn term_for(&self, fund_type: FundType, buy_date: NaiveDate, sell_date: NaiveDate) -> Term;
}

/// Rules in force for ITR filing as of FY 2024-25.
///
/// Equity: long-term above 365 holding days. Debt: units bought on or
/// after 2023-04-01 are always short-term (post-reform regime); older
/// units are long-term above 730 days. Unknown funds get the equity rule
/// as a provisional display default and are excluded from totals.
#[derive(Debug, Clone)]
pub struct Itr2024Rules {
    pub equity_ltcg_threshold_days: i64,
    pub debt_ltcg_threshold_days: i64,
    pub debt_regime_cutover: NaiveDate,
}

impl Default for Itr2024Rules {
    fn default() -> Self {
        Self {
            equity_ltcg_threshold_days: 365,
            debt_ltcg_threshold_days: 730,
            // Debt fund taxation changed on April 1, 2023: no long-term
            // treatment exists for units acquired from that date.
            debt_regime_cutover: NaiveDate::from_ymd_opt(2023, 4, 1)
                .expect("valid cutover date"),
        }
    }
}

impl TermRules for Itr2024Rules {
    fn term_for(&self, fund_type: FundType, buy_date: NaiveDate, sell_date: NaiveDate) -> Term {
        let holding_days = (sell_date - buy_date).num_days();

        match fund_type {
            FundType::Equity | FundType::Unknown => {
                if holding_days > self.equity_ltcg_threshold_days {
                    Term::LongTerm
                } else {
                    Term::ShortTerm
                }
            }
            FundType::Debt => {
                if buy_date >= self.debt_regime_cutover {
                    Term::ShortTerm
                } else if holding_days > self.debt_ltcg_threshold_days {
                    Term::LongTerm
                } else {
                    Term::ShortTerm
                }
            }
        }
    }
}
