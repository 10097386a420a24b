//! Storage seams of the ledger engine.
//!
//! These traits are implemented by the db crate to provide actual database
//! operations, and by [`super::memory::InMemoryLedger`] for tests and
//! embedded use. Every method is a typed query; no SQL crosses this line.

use std::future::Future;

use chrono::NaiveDate;
use ledgerline_shared::types::{
    AccountId, AccountingRuleId, ClosureId, Currency, CurrencyCode, LedgerEntryId, OfficeId,
    TransactionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entry::{EntityLink, EntryKind, LedgerEntry, NewLedgerEntry};
use super::types::{AccountingClosure, AccountingRule, FinancialActivity, LedgerAccount, NewClosure};

/// Errors raised by storage implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A reversal targeted an entry that is already reversed.
    #[error("Ledger entry {entry_id} was reversed concurrently")]
    Conflict {
        /// The contested original entry.
        entry_id: LedgerEntryId,
    },

    /// The backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Keyset cursor over `(transaction_date, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryCursor {
    /// Date of the last row seen.
    pub transaction_date: NaiveDate,
    /// Id of the last row seen.
    pub entry_id: LedgerEntryId,
}

impl EntryCursor {
    /// Cursor positioned at `entry`.
    #[must_use]
    pub const fn after(entry: &LedgerEntry) -> Self {
        Self {
            transaction_date: entry.transaction_date,
            entry_id: entry.id,
        }
    }
}

/// Office running balance of an account just before a recompute window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfficeBalanceSeed {
    /// Office.
    pub office_id: OfficeId,
    /// Account.
    pub account_id: AccountId,
    /// Office running balance of the last calculated entry.
    pub balance: Decimal,
}

/// Organization running balance of an account just before a recompute window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganizationBalanceSeed {
    /// Account.
    pub account_id: AccountId,
    /// Organization running balance of the last calculated entry.
    pub balance: Decimal,
}

/// Running-balance values to write for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningBalanceUpdate {
    /// Entry to update.
    pub entry_id: LedgerEntryId,
    /// New office running balance.
    pub office_running_balance: Decimal,
    /// New organization running balance; `None` leaves the stored value.
    pub organization_running_balance: Option<Decimal>,
    /// Whether to set `running_balance_calculated`.
    pub mark_calculated: bool,
}

/// Debit and credit totals of an account's foldable entries past its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMovement {
    /// Account.
    pub account_id: AccountId,
    /// Sum of debit amounts.
    pub debit_total: Decimal,
    /// Sum of credit amounts.
    pub credit_total: Decimal,
    /// Largest entry id included.
    pub last_entry_id: LedgerEntryId,
}

/// Cumulative organization balance of an account with its processing marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAccountBalance {
    /// Account.
    pub account_id: AccountId,
    /// Signed cumulative balance.
    pub balance: Decimal,
    /// Last entry folded into `balance`.
    pub last_entry_id: LedgerEntryId,
}

/// Read access to reference data and closure bookkeeping.
pub trait AccountStore: Send + Sync {
    /// Loads the accounts with the given ids. Unknown ids are omitted.
    fn find_accounts(
        &self,
        ids: &[AccountId],
    ) -> impl Future<Output = Result<Vec<LedgerAccount>, StoreError>> + Send;

    /// Loads an accounting rule with its tags.
    fn find_rule(
        &self,
        id: AccountingRuleId,
    ) -> impl Future<Output = Result<Option<AccountingRule>, StoreError>> + Send;

    /// Returns the subset of `ids` that exist.
    fn existing_offices(
        &self,
        ids: &[OfficeId],
    ) -> impl Future<Output = Result<Vec<OfficeId>, StoreError>> + Send;

    /// Looks up a currency and its precision.
    fn find_currency(
        &self,
        code: &CurrencyCode,
    ) -> impl Future<Output = Result<Option<Currency>, StoreError>> + Send;

    /// Latest closure of each given office that has one.
    fn latest_closures(
        &self,
        offices: &[OfficeId],
    ) -> impl Future<Output = Result<Vec<AccountingClosure>, StoreError>> + Send;

    /// Account mapped to a financial activity.
    fn control_account(
        &self,
        activity: FinancialActivity,
    ) -> impl Future<Output = Result<Option<LedgerAccount>, StoreError>> + Send;

    /// Records a closure.
    fn insert_closure(
        &self,
        closure: NewClosure,
    ) -> impl Future<Output = Result<AccountingClosure, StoreError>> + Send;

    /// Deletes a closure. Returns false if it did not exist.
    fn delete_closure(
        &self,
        id: ClosureId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Ledger entry persistence.
pub trait LedgerEntryStore: Send + Sync {
    /// Inserts `entries` atomically.
    ///
    /// For every entry with `reverses_entry_id`, the referenced original is
    /// marked reversed and its `reversal_id` set to the new row. If that
    /// original is already reversed the whole write is rolled back with
    /// [`StoreError::Conflict`].
    fn apply(
        &self,
        entries: Vec<NewLedgerEntry>,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, StoreError>> + Send;

    /// All entries of a transaction group ordered by id.
    fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, StoreError>> + Send;

    /// Flags every entry of a group as reconciled. Returns the group size.
    fn mark_reconciled(
        &self,
        transaction_id: TransactionId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Live opening-balance transaction ids on `contra` at `office`.
    ///
    /// Reversal entries and reversed entries are excluded.
    fn opening_balance_transactions(
        &self,
        contra: AccountId,
        office: OfficeId,
    ) -> impl Future<Output = Result<Vec<TransactionId>, StoreError>> + Send;

    /// True if `account` has any entry whose kind is not `kind`.
    fn has_entries_other_than(
        &self,
        account: AccountId,
        kind: EntryKind,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Live transaction ids linked to a portfolio transaction.
    fn transactions_for_entity(
        &self,
        entity: EntityLink,
    ) -> impl Future<Output = Result<Vec<TransactionId>, StoreError>> + Send;

    /// Earliest transaction date among entries not yet flagged calculated.
    fn earliest_uncalculated_date(
        &self,
        office: Option<OfficeId>,
    ) -> impl Future<Output = Result<Option<NaiveDate>, StoreError>> + Send;

    /// Clears `running_balance_calculated` on every entry dated on or after
    /// `from` and returns how many rows were cleared.
    fn reset_calculated_from(
        &self,
        from: NaiveDate,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Office balances of the last calculated entry per (office, account)
    /// strictly before `before`.
    fn office_balance_seeds(
        &self,
        before: NaiveDate,
        office: Option<OfficeId>,
    ) -> impl Future<Output = Result<Vec<OfficeBalanceSeed>, StoreError>> + Send;

    /// Organization balances of the last calculated entry per account
    /// strictly before `before`.
    fn organization_balance_seeds(
        &self,
        before: NaiveDate,
    ) -> impl Future<Output = Result<Vec<OrganizationBalanceSeed>, StoreError>> + Send;

    /// Entries dated on or after `from`, ordered by `(transaction_date, id)`,
    /// strictly after `cursor` when given.
    fn entries_page(
        &self,
        from: NaiveDate,
        cursor: Option<EntryCursor>,
        office: Option<OfficeId>,
        limit: u64,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, StoreError>> + Send;

    /// Writes one batch of running balances atomically.
    fn apply_running_balances(
        &self,
        updates: &[RunningBalanceUpdate],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Movements of every account past its derived-balance marker.
    ///
    /// Only calculated entries count, and only those below the account's
    /// earliest uncalculated entry, so the marker never passes a row that
    /// has not been folded yet.
    fn account_movements_since_markers(
        &self,
    ) -> impl Future<Output = Result<Vec<AccountMovement>, StoreError>> + Send;

    /// Stored derived balances for the given accounts.
    fn derived_balances(
        &self,
        accounts: &[AccountId],
    ) -> impl Future<Output = Result<Vec<DerivedAccountBalance>, StoreError>> + Send;

    /// Inserts or replaces derived balances.
    fn upsert_derived_balances(
        &self,
        balances: &[DerivedAccountBalance],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
