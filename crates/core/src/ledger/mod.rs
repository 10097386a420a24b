//! Double-entry ledger engine.
//!
//! This module implements the core ledger functionality:
//! - Ledger entries, accounts, rules and closures
//! - Posting validation and accounting rules
//! - Journal posting with interbranch splits
//! - Reversal, reconciliation and closures
//! - Provisioning and opening balances
//! - The running balance job
//! - The accounting bridge for portfolio subsystems
//! - Storage traits and an in-memory store

pub mod balance;
pub mod bridge;
pub mod closure;
pub mod entry;
pub mod error;
pub mod events;
pub mod interbranch;
mod lookup;
pub mod memory;
pub mod opening_balance;
pub mod poster;
pub mod provisioning;
pub mod reconciliation;
pub mod reversal;
pub mod rules;
pub mod running_balance;
pub mod services;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod reversal_props;
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod validation_props;

pub use balance::{BalanceSide, RunningBalances};
pub use bridge::{AccountingBridge, BridgeOutcome, BridgePayload};
pub use closure::ClosureService;
pub use entry::{EntityLink, EntityType, EntryKind, EntryType, LedgerEntry, NewLedgerEntry};
pub use error::{LedgerError, LedgerResult};
pub use events::{PostingEvent, PostingEventBus, PostingEventKind, PostingSubscription};
pub use memory::InMemoryLedger;
pub use opening_balance::{OpeningBalanceDefiner, OpeningBalanceLine, OpeningBalanceRequest};
pub use poster::JournalPoster;
pub use provisioning::{ProvisioningLine, ProvisioningPoster, ProvisioningRun};
pub use reconciliation::ReconciliationService;
pub use reversal::ReversalEngine;
pub use running_balance::{RunningBalanceEngine, RunningBalanceReport, RunningBalanceSettings};
pub use services::LedgerServices;
pub use store::{AccountStore, LedgerEntryStore, StoreError};
pub use types::{
    AccountType, AccountingClosure, AccountingRule, FinancialActivity, LedgerAccount,
    PostingContext, PostingLine, PostingRequest, PostingResult,
};
