//! Accounting closures.
//!
//! A closure freezes an office's books up to and including its closing
//! date. Only the latest closure of an office may be deleted, which reopens
//! the period back to the previous closure.

use std::sync::Arc;

use chrono::NaiveDate;
use ledgerline_shared::types::{OfficeId, UserId};
use tracing::info;

use super::error::{LedgerError, LedgerResult};
use super::lookup;
use super::store::AccountStore;
use super::types::{AccountingClosure, NewClosure};

/// Creates and removes accounting closures.
pub struct ClosureService<A> {
    accounts: Arc<A>,
}

impl<A> Clone for ClosureService<A> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
        }
    }
}

impl<A: AccountStore> ClosureService<A> {
    /// Creates a new closure service.
    pub fn new(accounts: Arc<A>) -> Self {
        Self { accounts }
    }

    /// Closes an office's books up to `closing_date`.
    ///
    /// # Errors
    ///
    /// `OfficeNotFound`, `FutureDate`, or `ClosureNotAfterLatest` when the
    /// date does not come after the office's current latest closure.
    pub async fn create(
        &self,
        office_id: OfficeId,
        closing_date: NaiveDate,
        comments: Option<String>,
        created_by: UserId,
        today: NaiveDate,
    ) -> LedgerResult<AccountingClosure> {
        lookup::ensure_offices(self.accounts.as_ref(), &[office_id]).await?;
        if closing_date > today {
            return Err(LedgerError::FutureDate(closing_date));
        }
        if let Some(latest) = self.latest(office_id).await?
            && closing_date <= latest.closing_date
        {
            return Err(LedgerError::ClosureNotAfterLatest {
                office_id,
                latest: latest.closing_date,
            });
        }

        let closure = self
            .accounts
            .insert_closure(NewClosure {
                office_id,
                closing_date,
                comments,
                created_by,
            })
            .await?;
        info!(
            office_id = %office_id,
            closing_date = %closing_date,
            closure_id = %closure.id,
            "Accounting closure created"
        );
        Ok(closure)
    }

    /// Deletes the latest closure of an office.
    ///
    /// # Errors
    ///
    /// `ClosureNotFound` if the office has no closure.
    pub async fn delete_latest(&self, office_id: OfficeId) -> LedgerResult<AccountingClosure> {
        let latest = self
            .latest(office_id)
            .await?
            .ok_or(LedgerError::ClosureNotFound(office_id))?;
        if !self.accounts.delete_closure(latest.id).await? {
            return Err(LedgerError::ClosureNotFound(office_id));
        }
        info!(
            office_id = %office_id,
            closing_date = %latest.closing_date,
            "Accounting closure deleted"
        );
        Ok(latest)
    }

    /// Latest closure of an office, if any.
    pub async fn latest(&self, office_id: OfficeId) -> LedgerResult<Option<AccountingClosure>> {
        Ok(self
            .accounts
            .latest_closures(&[office_id])
            .await?
            .into_iter()
            .max_by_key(|closure| closure.closing_date))
    }
}
