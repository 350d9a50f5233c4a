//! mfgains - Mutual fund FIFO capital gains engine
//!
//! This library computes tax-law-compliant capital gains from mutual fund
//! transaction history: FIFO lot matching per (ticker, folio), equity/debt
//! term classification with the 2023 debt regime cutover, four-bucket
//! aggregation, and a fingerprint-keyed result cache.

pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod report;
pub mod store;
