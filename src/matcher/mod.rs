//! FIFO lot matcher
//!
//! Consumes sell transactions against per-(ticker, folio) lot queues in
//! acquisition order, splitting lots and emitting one gain row per
//! consumed fragment. Groups are independent: an oversold position in one
//! never affects the others. All arithmetic is exact `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classify::{FundTypeResolver, TermRules};
use crate::ledger::{Ledger, LedgerGroup};
use crate::models::{financial_year, round_money, round_units, GainRow};

/// A sell that exceeded the units available in its lot queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OversoldPosition {
    pub ticker: String,
    pub folio: String,
    pub sell_date: chrono::NaiveDate,
    pub unmatched_units: Decimal,
}

/// Result of matching every group in a ledger
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub gain_rows: Vec<GainRow>,
    pub oversold: Vec<OversoldPosition>,
}

/// Match all groups in the ledger sequentially.
///
/// Group order is deterministic (BTreeMap key order), so repeated runs on
/// identical input produce identical row sequences.
pub fn match_all(
    ledger: Ledger,
    resolver: &FundTypeResolver,
    rules: &dyn TermRules,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for ((ticker, folio), group) in ledger.groups {
        match_group(&ticker, &folio, group, resolver, rules, &mut outcome);
    }

    outcome
}

/// Match one (ticker, folio) group: sells in date order against the lot
/// queue, earliest lot first.
fn match_group(
    ticker: &str,
    folio: &str,
    mut group: LedgerGroup,
    resolver: &FundTypeResolver,
    rules: &dyn TermRules,
    outcome: &mut MatchOutcome,
) {
    let fund_type = resolver.resolve(ticker);
    let mut next_lot = 0usize;

    for sell in &group.sells {
        let mut units_to_match = sell.units;

        while units_to_match > Decimal::ZERO && next_lot < group.lots.len() {
            let lot = &mut group.lots[next_lot];

            if lot.is_exhausted() {
                next_lot += 1;
                continue;
            }

            // A lot acquired after the sell date can never cover it; selling
            // units that were not yet held is a data-quality error, not a
            // match candidate.
            if lot.buy_date > sell.date {
                break;
            }

            let consumed = round_units(units_to_match.min(lot.remaining_units));

            // Whole-lot consumption reuses the recorded total cost so the
            // acquisition cost survives ingestion rounding exactly.
            let acquisition_cost =
                if consumed == lot.remaining_units && consumed == lot.original_units {
                    lot.original_cost
                } else {
                    round_money(consumed * lot.buy_nav)
                };

            let sale_consideration = round_money(consumed * sell.nav);
            let gain = round_money(sale_consideration - acquisition_cost);
            let holding_days = (sell.date - lot.buy_date).num_days();
            let term = rules.term_for(fund_type, lot.buy_date, sell.date);

            outcome.gain_rows.push(GainRow {
                ticker: ticker.to_string(),
                folio: folio.to_string(),
                buy_date: lot.buy_date,
                sell_date: sell.date,
                units: consumed,
                buy_nav: lot.buy_nav,
                sell_nav: sell.nav,
                sale_consideration,
                acquisition_cost,
                gain,
                holding_days,
                term,
                fund_type,
                financial_year: financial_year(sell.date),
            });

            units_to_match = round_units(units_to_match - consumed);
            lot.remaining_units = round_units(lot.remaining_units - consumed);

            if lot.is_exhausted() {
                next_lot += 1;
            }
        }

        if units_to_match > Decimal::ZERO {
            warn!(
                ticker,
                folio,
                sell_date = %sell.date,
                unmatched = %units_to_match,
                "sell exceeds available lot units"
            );
            outcome.oversold.push(OversoldPosition {
                ticker: ticker.to_string(),
                folio: folio.to_string(),
                sell_date: sell.date,
                unmatched_units: units_to_match,
            });
        }
    }

    debug_assert!(group
        .lots
        .iter()
        .all(|lot| lot.remaining_units >= Decimal::ZERO));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Itr2024Rules;
    use crate::ledger::build_ledger;
    use crate::models::{FundType, Term, Transaction, TransactionSide};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn buy(ticker: &str, d: &str, units: Decimal, nav: Decimal) -> Transaction {
        Transaction::new(ticker, "F1", date(d), TransactionSide::Buy, units, nav, units * nav)
    }

    fn sell(ticker: &str, d: &str, units: Decimal, nav: Decimal) -> Transaction {
        Transaction::new(ticker, "F1", date(d), TransactionSide::Sell, units, nav, units * nav)
    }

    fn equity_resolver(tickers: &[&str]) -> FundTypeResolver {
        let reference: HashMap<String, FundType> = tickers
            .iter()
            .map(|t| (t.to_string(), FundType::Equity))
            .collect();
        FundTypeResolver::new(HashMap::new(), reference)
    }

    fn run(txs: Vec<Transaction>, resolver: &FundTypeResolver) -> MatchOutcome {
        match_all(build_ledger(&txs), resolver, &Itr2024Rules::default())
    }

    #[test]
    fn test_sell_spanning_two_lots() {
        let resolver = equity_resolver(&["ABC"]);
        let outcome = run(
            vec![
                buy("ABC", "2022-01-01", dec!(100), dec!(10)),
                buy("ABC", "2022-06-01", dec!(50), dec!(12)),
                sell("ABC", "2023-02-01", dec!(120), dec!(15)),
            ],
            &resolver,
        );

        assert!(outcome.oversold.is_empty());
        assert_eq!(outcome.gain_rows.len(), 2);

        let first = &outcome.gain_rows[0];
        assert_eq!(first.units, dec!(100.000));
        assert_eq!(first.acquisition_cost, dec!(1000.00));
        assert_eq!(first.sale_consideration, dec!(1500.00));
        assert_eq!(first.gain, dec!(500.00));
        assert_eq!(first.term, Term::LongTerm);

        let second = &outcome.gain_rows[1];
        assert_eq!(second.units, dec!(20.000));
        assert_eq!(second.acquisition_cost, dec!(240.00));
        assert_eq!(second.sale_consideration, dec!(300.00));
        assert_eq!(second.gain, dec!(60.00));
        assert_eq!(second.term, Term::ShortTerm);
    }

    #[test]
    fn test_fifo_exhausts_earliest_lot_first() {
        let resolver = equity_resolver(&["ABC"]);
        let outcome = run(
            vec![
                buy("ABC", "2022-01-01", dec!(40), dec!(10)),
                buy("ABC", "2022-02-01", dec!(40), dec!(20)),
                sell("ABC", "2022-03-01", dec!(30), dec!(25)),
                sell("ABC", "2022-04-01", dec!(30), dec!(25)),
            ],
            &resolver,
        );

        assert_eq!(outcome.gain_rows.len(), 3);
        // First sell only touches lot 1
        assert_eq!(outcome.gain_rows[0].buy_date, date("2022-01-01"));
        assert_eq!(outcome.gain_rows[0].units, dec!(30.000));
        // Second sell drains lot 1's remaining 10 before touching lot 2
        assert_eq!(outcome.gain_rows[1].buy_date, date("2022-01-01"));
        assert_eq!(outcome.gain_rows[1].units, dec!(10.000));
        assert_eq!(outcome.gain_rows[2].buy_date, date("2022-02-01"));
        assert_eq!(outcome.gain_rows[2].units, dec!(20.000));
    }

    #[test]
    fn test_unit_conservation() {
        let resolver = equity_resolver(&["ABC"]);
        let txs = vec![
            buy("ABC", "2022-01-01", dec!(33.333), dec!(10.1234)),
            buy("ABC", "2022-02-01", dec!(66.667), dec!(11.4321)),
            sell("ABC", "2022-06-01", dec!(50), dec!(12)),
            sell("ABC", "2022-07-01", dec!(25.5), dec!(13)),
        ];
        let sold: Decimal = txs
            .iter()
            .filter(|t| t.side == TransactionSide::Sell)
            .map(|t| t.units)
            .sum();

        let outcome = run(txs, &resolver);
        assert!(outcome.oversold.is_empty());
        let matched: Decimal = outcome.gain_rows.iter().map(|r| r.units).sum();
        assert_eq!(matched, sold);
    }

    #[test]
    fn test_oversold_reported_per_ticker() {
        let resolver = equity_resolver(&["ABC", "XYZ"]);
        let outcome = run(
            vec![
                buy("ABC", "2022-01-01", dec!(100), dec!(10)),
                buy("ABC", "2022-06-01", dec!(50), dec!(12)),
                sell("ABC", "2023-02-01", dec!(200), dec!(15)),
                buy("XYZ", "2022-01-01", dec!(10), dec!(10)),
                sell("XYZ", "2022-06-01", dec!(10), dec!(11)),
            ],
            &resolver,
        );

        // ABC matched 150 of 200, 50 unmatched; XYZ unaffected
        assert_eq!(outcome.oversold.len(), 1);
        assert_eq!(outcome.oversold[0].ticker, "ABC");
        assert_eq!(outcome.oversold[0].unmatched_units, dec!(50.000));

        let abc_units: Decimal = outcome
            .gain_rows
            .iter()
            .filter(|r| r.ticker == "ABC")
            .map(|r| r.units)
            .sum();
        assert_eq!(abc_units, dec!(150.000));

        let xyz_rows: Vec<_> = outcome
            .gain_rows
            .iter()
            .filter(|r| r.ticker == "XYZ")
            .collect();
        assert_eq!(xyz_rows.len(), 1);
        assert_eq!(xyz_rows[0].gain, dec!(10.00));
    }

    #[test]
    fn test_sell_before_any_buy_is_oversold() {
        let resolver = equity_resolver(&["ABC"]);
        let outcome = run(
            vec![
                sell("ABC", "2022-01-01", dec!(10), dec!(10)),
                buy("ABC", "2022-02-01", dec!(10), dec!(9)),
            ],
            &resolver,
        );

        // The lot was acquired after the sell date: no match allowed
        assert!(outcome.gain_rows.is_empty());
        assert_eq!(outcome.oversold.len(), 1);
        assert_eq!(outcome.oversold[0].unmatched_units, dec!(10.000));
    }

    #[test]
    fn test_whole_lot_uses_original_cost() {
        // Ingested amount differs from units * nav by a rounding hair;
        // full consumption must reuse the recorded amount.
        let resolver = equity_resolver(&["ABC"]);
        let mut b = buy("ABC", "2022-01-01", dec!(142.297), dec!(70.2915));
        b.amount = dec!(10002.39);
        let outcome = run(
            vec![b, sell("ABC", "2022-06-01", dec!(142.297), dec!(80))],
            &resolver,
        );

        assert_eq!(outcome.gain_rows.len(), 1);
        assert_eq!(outcome.gain_rows[0].acquisition_cost, dec!(10002.39));
    }

    #[test]
    fn test_folio_isolation() {
        // Same ticker in two folios: queues never mix
        let resolver = equity_resolver(&["ABC"]);
        let d = date("2022-01-01");
        let txs = vec![
            Transaction::new("ABC", "F1", d, TransactionSide::Buy, dec!(10), dec!(10), dec!(100)),
            Transaction::new("ABC", "F2", d, TransactionSide::Buy, dec!(10), dec!(20), dec!(200)),
            Transaction::new(
                "ABC",
                "F2",
                date("2022-03-01"),
                TransactionSide::Sell,
                dec!(10),
                dec!(25),
                dec!(250),
            ),
        ];
        let outcome = run(txs, &resolver);

        assert_eq!(outcome.gain_rows.len(), 1);
        assert_eq!(outcome.gain_rows[0].folio, "F2");
        assert_eq!(outcome.gain_rows[0].acquisition_cost, dec!(200.00));
    }
}
