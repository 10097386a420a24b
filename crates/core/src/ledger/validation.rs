//! Business rule validation for posting requests.
//!
//! The validator is pure: callers load today's date and the latest closure
//! of each office beforehand and hand them in.

use chrono::NaiveDate;
use ledgerline_shared::types::OfficeId;
use rust_decimal::Decimal;

use super::entry::{EntryType, NewLedgerEntry};
use super::error::{LedgerError, LedgerResult};
use super::types::{AccountingClosure, PostingRequest};

/// Checks posting requests and dates against balance and closure rules.
#[derive(Debug, Clone, Copy)]
pub struct BalanceValidator<'a> {
    today: NaiveDate,
    closures: &'a [AccountingClosure],
}

impl<'a> BalanceValidator<'a> {
    /// Creates a validator for `today` and the latest closures of the
    /// offices involved.
    #[must_use]
    pub const fn new(today: NaiveDate, closures: &'a [AccountingClosure]) -> Self {
        Self { today, closures }
    }

    /// Validates a posting request.
    ///
    /// Checks run in a fixed order and the first failure wins: empty
    /// sides, incomplete lines, sum mismatch, future date, closure.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self, request: &PostingRequest) -> LedgerResult<()> {
        if request.credits.is_empty() || request.debits.is_empty() {
            return Err(LedgerError::NoDebitsOrCredits);
        }

        let incomplete = request.credits.iter().chain(&request.debits).any(|line| {
            line.account_id.is_none() || line.amount.is_none_or(|amount| amount <= Decimal::ZERO)
        });
        if incomplete {
            return Err(LedgerError::AccountOrAmountEmpty);
        }

        let debit = request.debit_total();
        let credit = request.credit_total();
        if debit != credit {
            return Err(LedgerError::SumMismatch { debit, credit });
        }

        self.check_date(request.transaction_date, &request.office_ids())
    }

    /// Rejects dates in the future or inside a closed period of any office.
    ///
    /// # Errors
    ///
    /// `FutureDate` or `AccountingClosed`.
    pub fn check_date(&self, date: NaiveDate, offices: &[OfficeId]) -> LedgerResult<()> {
        if date > self.today {
            return Err(LedgerError::FutureDate(date));
        }
        self.check_closures(date, offices)
    }

    /// Rejects dates on or before the latest closure of any office.
    ///
    /// # Errors
    ///
    /// `AccountingClosed` naming the first closed office.
    pub fn check_closures(&self, date: NaiveDate, offices: &[OfficeId]) -> LedgerResult<()> {
        let closed = self
            .closures
            .iter()
            .filter(|closure| offices.contains(&closure.office_id))
            .find(|closure| date <= closure.closing_date);

        match closed {
            Some(closure) => Err(LedgerError::AccountingClosed {
                office_id: closure.office_id,
                closing_date: closure.closing_date,
            }),
            None => Ok(()),
        }
    }
}

/// Verifies that resolved entries balance per currency before they are
/// written.
///
/// # Errors
///
/// `NoDebitsOrCredits` for an empty or single-sided set,
/// `AccountOrAmountEmpty` for a non-positive amount, `SumMismatch` when a
/// currency does not balance.
pub fn ensure_balanced(entries: &[NewLedgerEntry]) -> LedgerResult<()> {
    if entries.is_empty() {
        return Err(LedgerError::NoDebitsOrCredits);
    }

    let mut currencies: Vec<_> = entries.iter().map(|e| &e.currency_code).collect();
    currencies.sort();
    currencies.dedup();

    for currency in currencies {
        let mut debit = Decimal::ZERO;
        let mut credit = Decimal::ZERO;
        let mut has_debit = false;
        let mut has_credit = false;

        for entry in entries.iter().filter(|e| &e.currency_code == currency) {
            if entry.amount <= Decimal::ZERO {
                return Err(LedgerError::AccountOrAmountEmpty);
            }
            match entry.entry_type {
                EntryType::Debit => {
                    debit += entry.amount;
                    has_debit = true;
                }
                EntryType::Credit => {
                    credit += entry.amount;
                    has_credit = true;
                }
            }
        }

        if !has_debit || !has_credit {
            return Err(LedgerError::NoDebitsOrCredits);
        }
        if debit != credit {
            return Err(LedgerError::SumMismatch { debit, credit });
        }
    }

    Ok(())
}
