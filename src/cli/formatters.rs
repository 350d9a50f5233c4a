//! Output formatting for CLI display
//!
//! Terminal output formatting lives here, separating data calculation
//! from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::ledger::SkippedRow;
use crate::report::{summarize, unknown_funds, CategoryTotal, GainReport};

/// Format the full report for JSON output
pub fn format_gains_json(report: &GainReport, skipped: &[SkippedRow]) -> String {
    let payload = serde_json::json!({
        "gain_rows": report.gain_rows,
        "summary": report.summary,
        "unknown_tickers": report.unknown_tickers,
        "oversold": report.oversold,
        "skipped_rows": skipped,
        "computed_at": report.computed_at,
        "from_cache": report.from_cache,
    });
    serde_json::to_string_pretty(&payload)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Format gain rows and summary for terminal table output
pub fn format_gains_table(report: &GainReport, fy_filter: Option<&str>) -> String {
    let mut output = String::new();

    if let Some(fy) = fy_filter {
        output.push_str(&format!(
            "\n{} Capital Gains - FY {}\n\n",
            "💰".cyan().bold(),
            fy
        ));
    } else {
        output.push_str(&format!("\n{} Capital Gains\n\n", "💰".cyan().bold()));
    }

    let rows: Vec<_> = report
        .gain_rows
        .iter()
        .filter(|r| fy_filter.map_or(true, |fy| r.financial_year == fy))
        .cloned()
        .collect();

    if rows.is_empty() {
        output.push_str("No realized gains found.\n");
        return output;
    }

    // With a year filter, the summary covers the filtered rows only
    let summary = if fy_filter.is_some() {
        summarize(&rows)
    } else {
        report.summary.clone()
    };

    #[derive(Tabled)]
    struct GainTableRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Folio")]
        folio: String,
        #[tabled(rename = "Buy Date")]
        buy_date: String,
        #[tabled(rename = "Sell Date")]
        sell_date: String,
        #[tabled(rename = "Units")]
        units: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Consideration")]
        consideration: String,
        #[tabled(rename = "Gain")]
        gain: String,
        #[tabled(rename = "Days")]
        days: String,
        #[tabled(rename = "Term")]
        term: String,
        #[tabled(rename = "Type")]
        fund_type: String,
    }

    let table_rows: Vec<GainTableRow> = rows
        .iter()
        .map(|r| {
            let gain_colored = if r.gain >= Decimal::ZERO {
                format!("{:.2}", r.gain).green().to_string()
            } else {
                format!("{:.2}", r.gain).red().to_string()
            };
            let type_str = if r.fund_type == crate::models::FundType::Unknown {
                r.fund_type.as_str().yellow().to_string()
            } else {
                r.fund_type.as_str().to_string()
            };

            GainTableRow {
                ticker: r.ticker.clone(),
                folio: r.folio.clone(),
                buy_date: r.buy_date.to_string(),
                sell_date: r.sell_date.to_string(),
                units: format!("{:.3}", r.units),
                cost: format!("{:.2}", r.acquisition_cost),
                consideration: format!("{:.2}", r.sale_consideration),
                gain: gain_colored,
                days: r.holding_days.to_string(),
                term: r.term.as_str().to_string(),
                fund_type: type_str,
            }
        })
        .collect();

    let mut table = Table::new(&table_rows);
    table.with(Style::modern());
    // Right-align numeric columns
    table.modify(Columns::new(4..9), Alignment::right());
    output.push_str(&table.to_string());

    output.push_str(&format!("\n\n{} Summary", "━".repeat(80).bright_black()));
    output.push_str(&format_bucket("Equity / Short-term", &summary.equity_short_term));
    output.push_str(&format_bucket("Equity / Long-term", &summary.equity_long_term));
    output.push_str(&format_bucket("Debt / Short-term", &summary.debt_short_term));
    output.push_str(&format_bucket("Debt / Long-term", &summary.debt_long_term));

    let total_colored = if summary.total_gain >= Decimal::ZERO {
        format!("{:.2}", summary.total_gain).green()
    } else {
        format!("{:.2}", summary.total_gain).red()
    };
    output.push_str(&format!("\n{:<24} {}", "Total gain:".bold(), total_colored));
    output.push_str(&format!(
        "\n{:<24} {}\n",
        "Matched rows:".bold(),
        summary.total_transactions
    ));

    if report.from_cache {
        output.push_str(&format!(
            "{} Served from cache (computed {})\n",
            "ℹ".blue().bold(),
            report.computed_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    output
}

fn format_bucket(label: &str, total: &CategoryTotal) -> String {
    format!(
        "\n{:<24} consideration {:>14.2}  cost {:>14.2}  gain {:>12.2}",
        label, total.sale_consideration, total.acquisition_cost, total.gain_loss
    )
}

/// Format the attention section: unclassified funds, oversold positions,
/// and skipped input rows
pub fn format_warnings(report: &GainReport, skipped: &[SkippedRow]) -> String {
    let mut output = String::new();

    let unknown = unknown_funds(&report.gain_rows);
    if !unknown.is_empty() {
        output.push_str(&format!(
            "\n{} {} fund(s) without classification (excluded from totals):\n",
            "⚠".yellow().bold(),
            unknown.len()
        ));
        for (ticker, rows) in &unknown {
            output.push_str(&format!(
                "  {} ({} row(s)) - set one with: mfgains overrides set {} <equity|debt>\n",
                ticker.bold(),
                rows,
                ticker
            ));
        }
    }

    if !report.oversold.is_empty() {
        output.push_str(&format!(
            "\n{} Oversold positions (sell exceeds available units):\n",
            "✗".red().bold()
        ));
        for o in &report.oversold {
            output.push_str(&format!(
                "  {} (folio {}) on {}: {:.3} units unmatched\n",
                o.ticker.bold(),
                o.folio,
                o.sell_date,
                o.unmatched_units
            ));
        }
    }

    if !skipped.is_empty() {
        output.push_str(&format!(
            "\n{} {} input row(s) skipped:\n",
            "⚠".yellow().bold(),
            skipped.len()
        ));
        for s in skipped {
            output.push_str(&format!(
                "  row {}: {} \"{}\" - {}\n",
                s.row, s.field, s.value, s.reason
            ));
        }
    }

    output
}

/// Format empty gains message
pub fn format_empty_gains() -> String {
    format!(
        "{} No transactions found\nDrop transaction files into the data directory first (see: {} --help)\n",
        "ℹ".blue().bold(),
        "mfgains".bold()
    )
}
