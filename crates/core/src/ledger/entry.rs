//! Ledger entry domain types.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerline_shared::types::{
    AccountId, CurrencyCode, LedgerEntryId, OfficeId, TransactionId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Debit entry (increases assets/expenses, decreases liabilities/equity/income).
    Debit,
    /// Credit entry (decreases assets/expenses, increases liabilities/equity/income).
    Credit,
}

impl EntryType {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }

    /// Stable storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }
}

/// What produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Business posting (manual journal or bridge posting).
    Standard,
    /// Control-account line synthesized by the interbranch split.
    InterBranch,
    /// Opening-balance line or its contra.
    OpeningBalance,
    /// Provisioning run aggregate.
    Provisioning,
}

impl EntryKind {
    /// Stable storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::InterBranch => "inter_branch",
            Self::OpeningBalance => "opening_balance",
            Self::Provisioning => "provisioning",
        }
    }
}

/// Portfolio object an entry originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Loan transaction.
    Loan,
    /// Savings transaction.
    Savings,
    /// Client transaction.
    Client,
}

impl EntityType {
    /// Stable storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loan => "loan",
            Self::Savings => "savings",
            Self::Client => "client",
        }
    }
}

/// Link from an entry to the portfolio transaction that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityLink {
    /// Kind of originating object.
    pub entity_type: EntityType,
    /// Identifier of the originating transaction.
    pub entity_id: i64,
}

/// A persisted ledger entry.
///
/// Rows are never deleted. Running-balance fields are written only by the
/// running-balance job; `reversed` and `reversal_id` only by reversals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Row id; a larger id was inserted later.
    pub id: LedgerEntryId,
    /// Office the entry is booked in.
    pub office_id: OfficeId,
    /// The account affected by this entry.
    pub account_id: AccountId,
    /// Currency of the amount.
    pub currency_code: CurrencyCode,
    /// Transaction group this entry belongs to.
    pub transaction_id: TransactionId,
    /// Whether this is a debit or credit.
    pub entry_type: EntryType,
    /// Positive amount scaled to currency precision.
    pub amount: Decimal,
    /// Business date of the entry.
    pub transaction_date: NaiveDate,
    /// Entered by a user rather than generated by a subsystem.
    pub manual_entry: bool,
    /// What produced this entry.
    pub kind: EntryKind,
    /// Free-text comment.
    pub comments: Option<String>,
    /// External reference number.
    pub reference_number: Option<String>,
    /// The entry has been reversed.
    pub reversed: bool,
    /// On a reversed original: the entry that reversed it.
    pub reversal_id: Option<LedgerEntryId>,
    /// On a reversal entry: the original it mirrors.
    pub reverses_entry_id: Option<LedgerEntryId>,
    /// The entry has been reconciled.
    pub reconciled: bool,
    /// The running-balance job has processed this entry.
    pub running_balance_calculated: bool,
    /// Cumulative balance of the account within the office.
    pub office_running_balance: Option<Decimal>,
    /// Cumulative balance of the account across all offices.
    pub organization_running_balance: Option<Decimal>,
    /// Originating portfolio transaction.
    pub entity: Option<EntityLink>,
    /// Acting user.
    pub created_by: UserId,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount,
            EntryType::Credit => -self.amount,
        }
    }
}

/// An entry about to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    /// Office the entry is booked in.
    pub office_id: OfficeId,
    /// The account affected by this entry.
    pub account_id: AccountId,
    /// Currency of the amount.
    pub currency_code: CurrencyCode,
    /// Transaction group this entry belongs to.
    pub transaction_id: TransactionId,
    /// Whether this is a debit or credit.
    pub entry_type: EntryType,
    /// Positive amount scaled to currency precision.
    pub amount: Decimal,
    /// Business date of the entry.
    pub transaction_date: NaiveDate,
    /// Entered by a user rather than generated by a subsystem.
    pub manual_entry: bool,
    /// What produced this entry.
    pub kind: EntryKind,
    /// Free-text comment.
    pub comments: Option<String>,
    /// External reference number.
    pub reference_number: Option<String>,
    /// Set on reversal entries; the store marks the original reversed.
    pub reverses_entry_id: Option<LedgerEntryId>,
    /// Originating portfolio transaction.
    pub entity: Option<EntityLink>,
    /// Acting user.
    pub created_by: UserId,
}

impl NewLedgerEntry {
    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount,
            EntryType::Credit => -self.amount,
        }
    }
}
