//! Core business logic for Ledgerline.
//!
//! This crate contains the double-entry ledger engine with ZERO web or
//! database dependencies. Storage is reached through the traits in
//! [`ledger::store`]; the db crate implements them with `SeaORM` and
//! [`ledger::memory`] provides an in-memory implementation.
//!
//! # Modules
//!
//! - `ledger` - Posting, reversal, provisioning, opening balances, closures,
//!   reconciliation, the accounting bridge and the running-balance job

pub mod ledger;
