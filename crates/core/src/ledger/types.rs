//! Ledger domain types for posting requests and reference data.
//!
//! This module defines the chart-of-accounts view the engine needs
//! (accounts, rules, closures, control accounts) and the transient
//! request types callers submit.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerline_shared::types::{
    AccountId, AccountingRuleId, ClosureId, CurrencyCode, OfficeId, TransactionId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::{EntityLink, EntryType};

/// Account type classification.
///
/// In double-entry bookkeeping:
/// - Debits increase asset/expense accounts, decrease liability/equity/income accounts
/// - Credits decrease asset/expense accounts, increase liability/equity/income accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Asset account (debit-normal).
    Asset,
    /// Liability account (credit-normal).
    Liability,
    /// Equity account (credit-normal).
    Equity,
    /// Income account (credit-normal).
    Income,
    /// Expense account (debit-normal).
    Expense,
}

impl AccountType {
    /// The side that increases the balance.
    #[must_use]
    pub const fn normal_side(self) -> EntryType {
        match self {
            Self::Asset | Self::Expense => EntryType::Debit,
            Self::Liability | Self::Equity | Self::Income => EntryType::Credit,
        }
    }

    /// Stable storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }
}

/// A ledger (GL) account as seen by the posting engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    /// Account id.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Classification tag used by accounting rules.
    pub classification: Option<String>,
    /// Disabled accounts accept no new postings.
    pub disabled: bool,
    /// Whether users may post to this account by hand.
    pub manual_entries_allowed: bool,
}

/// A named posting rule.
///
/// A fixed account pins one side; without it, the caller's accounts on that
/// side must carry one of the side's eligible tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingRule {
    /// Rule id.
    pub id: AccountingRuleId,
    /// Display name.
    pub name: String,
    /// Fixed account for the credit side.
    pub credit_account: Option<AccountId>,
    /// Fixed account for the debit side.
    pub debit_account: Option<AccountId>,
    /// Tags eligible on the credit side when no fixed credit account is set.
    pub credit_tags: Vec<String>,
    /// Tags eligible on the debit side when no fixed debit account is set.
    pub debit_tags: Vec<String>,
}

/// Office-level accounting closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingClosure {
    /// Closure id.
    pub id: ClosureId,
    /// Office the closure applies to.
    pub office_id: OfficeId,
    /// Postings dated on or before this date are rejected.
    pub closing_date: NaiveDate,
    /// Free-text comment.
    pub comments: Option<String>,
    /// When the closure was recorded.
    pub created_at: DateTime<Utc>,
}

/// A closure about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClosure {
    /// Office the closure applies to.
    pub office_id: OfficeId,
    /// Closing date.
    pub closing_date: NaiveDate,
    /// Free-text comment.
    pub comments: Option<String>,
    /// Acting user.
    pub created_by: UserId,
}

/// Financial activities that can be mapped to a control account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialActivity {
    /// Balances multi-office postings. Asset or liability account.
    InterBranchTransfer,
    /// Absorbs opening-balance lines. Equity account.
    OpeningBalanceContra,
}

impl FinancialActivity {
    /// Returns true if an account of `account_type` may serve this activity.
    #[must_use]
    pub const fn accepts(self, account_type: AccountType) -> bool {
        match self {
            Self::InterBranchTransfer => {
                matches!(account_type, AccountType::Asset | AccountType::Liability)
            }
            Self::OpeningBalanceContra => matches!(account_type, AccountType::Equity),
        }
    }

    /// Stable storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InterBranchTransfer => "inter_branch_transfer",
            Self::OpeningBalanceContra => "opening_balance_contra",
        }
    }
}

/// One credit or debit line of a posting request.
///
/// Account and amount are optional so that incomplete input can be rejected
/// with a precise error instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingLine {
    /// Account to post to.
    #[serde(rename = "glAccountId")]
    pub account_id: Option<AccountId>,
    /// Positive amount.
    pub amount: Option<Decimal>,
    /// Office the line is booked in.
    pub office_id: OfficeId,
    /// Optional line comment.
    #[serde(default)]
    pub comments: Option<String>,
}

/// A request to post one balanced transaction group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingRequest {
    /// Currency of every line.
    pub currency_code: CurrencyCode,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Free-text comment.
    pub comments: Option<String>,
    /// External reference number.
    pub reference_number: Option<String>,
    /// Optional rule constraining the accounts.
    pub accounting_rule_id: Option<AccountingRuleId>,
    /// Credit lines (ordered).
    pub credits: Vec<PostingLine>,
    /// Debit lines (ordered).
    pub debits: Vec<PostingLine>,
    /// Originating portfolio transaction.
    pub entity: Option<EntityLink>,
    /// Entered by a user; manual postings respect `manual_entries_allowed`.
    pub manual: bool,
}

impl PostingRequest {
    /// Distinct offices named by any line, in ascending order.
    #[must_use]
    pub fn office_ids(&self) -> Vec<OfficeId> {
        let mut offices: Vec<OfficeId> = self
            .credits
            .iter()
            .chain(&self.debits)
            .map(|line| line.office_id)
            .collect();
        offices.sort_unstable();
        offices.dedup();
        offices
    }

    /// Sum of all credit amounts (missing amounts count as zero).
    #[must_use]
    pub fn credit_total(&self) -> Decimal {
        self.credits.iter().filter_map(|l| l.amount).sum()
    }

    /// Sum of all debit amounts (missing amounts count as zero).
    #[must_use]
    pub fn debit_total(&self) -> Decimal {
        self.debits.iter().filter_map(|l| l.amount).sum()
    }
}

/// Who is posting and what "today" is for date checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingContext {
    /// Acting user.
    pub acting_user: UserId,
    /// Current business date.
    pub today: NaiveDate,
}

impl PostingContext {
    /// Context for `user` with today's UTC date.
    #[must_use]
    pub fn now(user: UserId) -> Self {
        Self {
            acting_user: user,
            today: Utc::now().date_naive(),
        }
    }
}

/// Result of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingResult {
    /// The new transaction group id.
    pub transaction_id: TransactionId,
    /// Home office of the posting.
    pub office_id: Option<OfficeId>,
}
