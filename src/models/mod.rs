//! Core data types for FIFO capital gains calculations
//!
//! Transactions are immutable once ingested; lots carry the mutable
//! remaining-unit state consumed during matching. All money/unit values
//! use `rust_decimal::Decimal` with fixed precisions: units 3 dp,
//! NAV 4 dp, money 2 dp, rounded half-up.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const UNITS_DP: u32 = 3;
const NAV_DP: u32 = 4;
const MONEY_DP: u32 = 2;

/// Round units to 3 decimal places (half-up).
pub fn round_units(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(UNITS_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round NAV to 4 decimal places (half-up).
pub fn round_nav(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(NAV_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round money to 2 decimal places (half-up).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Transaction side (buy or sell)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSide {
    Buy,
    Sell,
}

impl TransactionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSide::Buy => "buy",
            TransactionSide::Sell => "sell",
        }
    }
}

impl FromStr for TransactionSide {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "purchase" => Ok(TransactionSide::Buy),
            "sell" | "redemption" => Ok(TransactionSide::Sell),
            _ => Err(()),
        }
    }
}

/// Fund classification for tax purposes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FundType {
    Equity,
    Debt,
    Unknown,
}

impl FundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundType::Equity => "equity",
            FundType::Debt => "debt",
            FundType::Unknown => "unknown",
        }
    }
}

impl FromStr for FundType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equity" => Ok(FundType::Equity),
            "debt" => Ok(FundType::Debt),
            "unknown" => Ok(FundType::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holding-period tax classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Term {
    #[serde(rename = "Short-term")]
    ShortTerm,
    #[serde(rename = "Long-term")]
    LongTerm,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::ShortTerm => "Short-term",
            Term::LongTerm => "Long-term",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validated buy or sell transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub ticker: String,
    pub folio: String,
    pub date: NaiveDate,
    pub side: TransactionSide,
    pub units: Decimal,
    pub nav: Decimal,
    pub amount: Decimal,
}

impl Transaction {
    pub fn new(
        ticker: impl Into<String>,
        folio: impl Into<String>,
        date: NaiveDate,
        side: TransactionSide,
        units: Decimal,
        nav: Decimal,
        amount: Decimal,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            folio: folio.into(),
            date,
            side,
            units: round_units(units.abs()),
            nav: round_nav(nav),
            amount,
        }
    }
}

/// A buy lot in the FIFO queue, tracking unconsumed units
#[derive(Debug, Clone)]
pub struct Lot {
    pub buy_date: NaiveDate,
    pub buy_nav: Decimal,
    pub remaining_units: Decimal,
    pub original_units: Decimal,
    pub original_cost: Decimal,
}

impl Lot {
    /// Create a lot from a buy transaction. The original total cost is kept
    /// so a whole-lot consumption reuses it instead of re-deriving from NAV
    /// (avoids re-rounding drift).
    pub fn from_buy(tx: &Transaction) -> Self {
        Self {
            buy_date: tx.date,
            buy_nav: round_nav(tx.nav),
            remaining_units: round_units(tx.units),
            original_units: round_units(tx.units),
            original_cost: round_money(tx.amount.abs()),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_units <= Decimal::ZERO
    }
}

/// One matched (lot-fragment, sell) pair, the unit of engine output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GainRow {
    pub ticker: String,
    pub folio: String,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub units: Decimal,
    pub buy_nav: Decimal,
    pub sell_nav: Decimal,
    pub sale_consideration: Decimal,
    pub acquisition_cost: Decimal,
    pub gain: Decimal,
    pub holding_days: i64,
    pub term: Term,
    pub fund_type: FundType,
    pub financial_year: String,
}

/// Indian financial year (April 1 to March 31) for a date.
/// Example: 2024-05-15 -> "2024-25", 2024-02-15 -> "2023-24".
pub fn financial_year(date: NaiveDate) -> String {
    use chrono::Datelike;
    let (start, end) = if date.month() >= 4 {
        (date.year(), date.year() + 1)
    } else {
        (date.year() - 1, date.year())
    };
    format!("{}-{:02}", start, end % 100)
}
