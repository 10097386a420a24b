//! Ledger error types.
//!
//! Every error belongs to one class of the ledger taxonomy (validation,
//! reference, state, integrity). Nothing here is retryable: a rejected
//! posting stays rejected until the caller changes the request or the
//! ledger's reference data.

use chrono::NaiveDate;
use ledgerline_shared::types::{
    AccountId, AccountingRuleId, LedgerEntryId, OfficeId, TransactionId,
};
use ledgerline_shared::{AppError, ErrorClass};
use rust_decimal::Decimal;
use thiserror::Error;

use super::store::StoreError;
use super::types::FinancialActivity;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Credit or debit list is empty.
    #[error("Posting needs at least one debit and one credit")]
    NoDebitsOrCredits,

    /// A line lacks an account or amount, or the amount is not positive.
    #[error("Every debit and credit needs an account and a positive amount")]
    AccountOrAmountEmpty,

    /// Credits and debits do not sum to the same amount.
    #[error("Debits and credits do not balance. Debit: {debit}, Credit: {credit}")]
    SumMismatch {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Accounts do not satisfy the accounting rule (or target a forbidden account).
    #[error("Invalid debit or credit accounts: {0}")]
    InvalidAccounts(String),

    /// Both sides span more than one office.
    #[error("Debits and credits cannot both span multiple offices")]
    InvalidOffices,

    /// Transaction date is after today.
    #[error("Transaction date {0} is in the future")]
    FutureDate(NaiveDate),

    /// Transaction date is on or before the office's latest closure.
    #[error("Accounting is closed for office {office_id} up to {closing_date}")]
    AccountingClosed {
        /// The closed office.
        office_id: OfficeId,
        /// Latest closing date of the office.
        closing_date: NaiveDate,
    },

    /// The accounting bridge could not interpret a payload.
    #[error("Invalid accounting bridge payload: {0}")]
    BridgePayloadInvalid(String),

    /// A new closure must come after the current latest closure.
    #[error("Closure date must be after the latest closure {latest} of office {office_id}")]
    ClosureNotAfterLatest {
        /// The office.
        office_id: OfficeId,
        /// Current latest closing date.
        latest: NaiveDate,
    },

    // ========== Reference Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Office not found.
    #[error("Office not found: {0}")]
    OfficeNotFound(OfficeId),

    /// Accounting rule not found.
    #[error("Accounting rule not found: {0}")]
    AccountingRuleNotFound(AccountingRuleId),

    /// No reversible transaction group with this id.
    #[error("Transaction group not found: {0}")]
    TransactionGroupNotFound(TransactionId),

    /// Currency not configured.
    #[error("Currency not found: {0}")]
    CurrencyNotFound(String),

    /// The office has no closure to delete.
    #[error("No accounting closure found for office {0}")]
    ClosureNotFound(OfficeId),

    // ========== State Errors ==========
    /// Account is disabled.
    #[error("Account {0} is disabled")]
    AccountDisabled(AccountId),

    /// Account does not accept manual entries.
    #[error("Account {0} does not allow manual entries")]
    ManualEntriesNotPermitted(AccountId),

    /// The contra account already carries non-opening-balance entries.
    #[error("Opening balances cannot be defined: contra account {0} has other entries")]
    OpeningBalanceNotAllowed(AccountId),

    /// Control account has the wrong account type for its activity.
    #[error("Control account {account_id} has the wrong type for {activity:?}")]
    ContraAccountWrongType {
        /// The activity being served.
        activity: FinancialActivity,
        /// The mapped account.
        account_id: AccountId,
    },

    /// No control account mapped to the activity.
    #[error("No control account configured for {0:?}")]
    ControlAccountNotConfigured(FinancialActivity),

    /// Another reversal won the race for this entry.
    #[error("Ledger entry {0} has already been reversed")]
    AlreadyReversed(LedgerEntryId),

    // ========== Integrity Errors ==========
    /// Storage failure. The detail is logged, never returned to callers.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NoDebitsOrCredits => "NO_DEBITS_OR_CREDITS",
            Self::AccountOrAmountEmpty => "DEBIT_CREDIT_ACCOUNT_OR_AMOUNT_EMPTY",
            Self::SumMismatch { .. } => "DEBIT_CREDIT_SUM_MISMATCH",
            Self::InvalidAccounts(_) => "INVALID_DEBIT_OR_CREDIT_ACCOUNTS",
            Self::InvalidOffices => "INVALID_DEBIT_OR_CREDIT_OFFICES",
            Self::FutureDate(_) => "FUTURE_DATE",
            Self::AccountingClosed { .. } => "ACCOUNTING_CLOSED",
            Self::BridgePayloadInvalid(_) => "BRIDGE_PAYLOAD_INVALID",
            Self::ClosureNotAfterLatest { .. } => "CLOSURE_NOT_AFTER_LATEST",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::OfficeNotFound(_) => "OFFICE_NOT_FOUND",
            Self::AccountingRuleNotFound(_) => "ACCOUNTING_RULE_NOT_FOUND",
            Self::TransactionGroupNotFound(_) => "TRANSACTION_GROUP_NOT_FOUND",
            Self::CurrencyNotFound(_) => "CURRENCY_NOT_FOUND",
            Self::ClosureNotFound(_) => "CLOSURE_NOT_FOUND",
            Self::AccountDisabled(_) => "ACCOUNT_DISABLED",
            Self::ManualEntriesNotPermitted(_) => "MANUAL_ENTRIES_NOT_PERMITTED",
            Self::OpeningBalanceNotAllowed(_) => "OPENING_BALANCE_NOT_ALLOWED",
            Self::ContraAccountWrongType { .. } => "CONTRA_ACCOUNT_WRONG_TYPE",
            Self::ControlAccountNotConfigured(_) => "CONTROL_ACCOUNT_NOT_CONFIGURED",
            Self::AlreadyReversed(_) => "TRANSACTION_ALREADY_REVERSED",
            Self::Storage(_) => "LEDGER_INTEGRITY",
        }
    }

    /// Returns the error class.
    #[must_use]
    pub const fn error_class(&self) -> ErrorClass {
        match self {
            Self::NoDebitsOrCredits
            | Self::AccountOrAmountEmpty
            | Self::SumMismatch { .. }
            | Self::InvalidAccounts(_)
            | Self::InvalidOffices
            | Self::FutureDate(_)
            | Self::AccountingClosed { .. }
            | Self::BridgePayloadInvalid(_)
            | Self::ClosureNotAfterLatest { .. } => ErrorClass::Validation,

            Self::AccountNotFound(_)
            | Self::OfficeNotFound(_)
            | Self::AccountingRuleNotFound(_)
            | Self::TransactionGroupNotFound(_)
            | Self::CurrencyNotFound(_)
            | Self::ClosureNotFound(_) => ErrorClass::Reference,

            Self::AccountDisabled(_)
            | Self::ManualEntriesNotPermitted(_)
            | Self::OpeningBalanceNotAllowed(_)
            | Self::ContraAccountWrongType { .. }
            | Self::ControlAccountNotConfigured(_)
            | Self::AlreadyReversed(_) => ErrorClass::State,

            Self::Storage(_) => ErrorClass::Integrity,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.error_class().status_code()
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { entry_id } => Self::AlreadyReversed(entry_id),
            StoreError::Backend(message) => Self::Storage(message),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::from_class(err.error_class(), err.error_code(), err.to_string())
    }
}
