//! Opening balance definition.
//!
//! Opening balances are booked against the equity account mapped to
//! [`FinancialActivity::OpeningBalanceContra`]. Defining them again for an
//! office replaces the previous definition: the old groups are reversed and
//! the new one is posted in the same write.

use std::sync::Arc;

use chrono::NaiveDate;
use ledgerline_shared::types::{AccountId, CurrencyCode, OfficeId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::entry::{EntryKind, EntryType, NewLedgerEntry};
use super::error::{LedgerError, LedgerResult};
use super::events::{PostingEvent, PostingEventBus};
use super::lookup;
use super::reversal::{ReversalPlan, plan_reversal};
use super::store::{AccountStore, LedgerEntryStore};
use super::types::{FinancialActivity, PostingContext, PostingResult};
use super::validation::{BalanceValidator, ensure_balanced};

/// One opening-balance line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningBalanceLine {
    /// Account receiving the opening balance.
    #[serde(rename = "glAccountId")]
    pub account_id: Option<AccountId>,
    /// Positive amount.
    pub amount: Option<Decimal>,
}

/// Opening balances of one office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningBalanceRequest {
    /// Office the balances belong to.
    pub office_id: OfficeId,
    /// Currency of every line.
    pub currency_code: CurrencyCode,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Free-text comment.
    #[serde(default)]
    pub comments: Option<String>,
    /// Credit balances.
    #[serde(default)]
    pub credits: Vec<OpeningBalanceLine>,
    /// Debit balances.
    #[serde(default)]
    pub debits: Vec<OpeningBalanceLine>,
}

/// Defines opening balances.
pub struct OpeningBalanceDefiner<A, L> {
    accounts: Arc<A>,
    entries: Arc<L>,
    events: PostingEventBus,
}

impl<A, L> Clone for OpeningBalanceDefiner<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            entries: Arc::clone(&self.entries),
            events: self.events.clone(),
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> OpeningBalanceDefiner<A, L> {
    /// Creates a new definer.
    pub fn new(accounts: Arc<A>, entries: Arc<L>, events: PostingEventBus) -> Self {
        Self {
            accounts,
            entries,
            events,
        }
    }

    /// Replaces the opening balances of an office.
    ///
    /// # Errors
    ///
    /// `ControlAccountNotConfigured` / `ContraAccountWrongType` without a
    /// usable contra account, `OpeningBalanceNotAllowed` once the contra
    /// account carries other postings, plus the usual line, date, reference
    /// and storage errors.
    pub async fn define(
        &self,
        request: &OpeningBalanceRequest,
        context: &PostingContext,
    ) -> LedgerResult<PostingResult> {
        let contra = lookup::control_account(
            self.accounts.as_ref(),
            FinancialActivity::OpeningBalanceContra,
        )
        .await?;
        if self
            .entries
            .has_entries_other_than(contra.id, EntryKind::OpeningBalance)
            .await?
        {
            return Err(LedgerError::OpeningBalanceNotAllowed(contra.id));
        }
        lookup::ensure_postable(&contra, false)?;

        if request.credits.is_empty() && request.debits.is_empty() {
            return Err(LedgerError::NoDebitsOrCredits);
        }
        let mut lines = Vec::with_capacity(request.credits.len() + request.debits.len());
        for (line, entry_type) in request
            .credits
            .iter()
            .map(|l| (l, EntryType::Credit))
            .chain(request.debits.iter().map(|l| (l, EntryType::Debit)))
        {
            let (Some(account_id), Some(amount)) = (line.account_id, line.amount) else {
                return Err(LedgerError::AccountOrAmountEmpty);
            };
            if amount <= Decimal::ZERO {
                return Err(LedgerError::AccountOrAmountEmpty);
            }
            if account_id == contra.id {
                return Err(LedgerError::InvalidAccounts(format!(
                    "opening balances cannot target the contra account {account_id}"
                )));
            }
            lines.push((account_id, entry_type, amount));
        }

        let office = [request.office_id];
        let closures = self.accounts.latest_closures(&office).await?;
        BalanceValidator::new(context.today, &closures)
            .check_date(request.transaction_date, &office)?;
        lookup::ensure_offices(self.accounts.as_ref(), &office).await?;
        let currency = lookup::currency(self.accounts.as_ref(), &request.currency_code).await?;

        let account_ids: Vec<AccountId> = lines.iter().map(|(id, _, _)| *id).collect();
        let accounts = lookup::accounts_by_id(self.accounts.as_ref(), &account_ids).await?;
        // System bookings: accounts closed to manual entries still take them.
        for account in accounts.values() {
            lookup::ensure_postable(account, false)?;
        }

        let mut replaced: Vec<ReversalPlan> = Vec::new();
        for previous in self
            .entries
            .opening_balance_transactions(contra.id, request.office_id)
            .await?
        {
            replaced.push(
                plan_reversal(
                    self.accounts.as_ref(),
                    self.entries.as_ref(),
                    previous,
                    None,
                    context,
                )
                .await?,
            );
        }

        let transaction_id = TransactionId::new();
        let mut new_entries = Vec::with_capacity(lines.len() * 2);
        for (account_id, entry_type, amount) in lines {
            let amount = currency.scale(amount);
            if amount.is_zero() {
                return Err(LedgerError::AccountOrAmountEmpty);
            }
            for (account_id, entry_type) in
                [(account_id, entry_type), (contra.id, entry_type.opposite())]
            {
                new_entries.push(NewLedgerEntry {
                    office_id: request.office_id,
                    account_id,
                    currency_code: request.currency_code.clone(),
                    transaction_id,
                    entry_type,
                    amount,
                    transaction_date: request.transaction_date,
                    manual_entry: false,
                    kind: EntryKind::OpeningBalance,
                    comments: request.comments.clone(),
                    reference_number: None,
                    reverses_entry_id: None,
                    entity: None,
                    created_by: context.acting_user,
                });
            }
        }
        ensure_balanced(&new_entries)?;

        let posted = new_entries.len();
        let mut batch: Vec<NewLedgerEntry> = replaced
            .iter()
            .flat_map(|plan| plan.entries.iter().cloned())
            .collect();
        batch.extend(new_entries);
        self.entries.apply(batch).await?;

        info!(
            transaction_id = %transaction_id,
            office_id = %request.office_id,
            entries = posted,
            replaced = replaced.len(),
            "Opening balances defined"
        );

        for plan in replaced {
            self.events.publish(PostingEvent::Reversed {
                original_transaction_id: plan.original_transaction_id,
                reversal_transaction_id: plan.reversal_transaction_id,
            });
        }
        self.events.publish(PostingEvent::Created {
            transaction_id,
            office_id: Some(request.office_id),
            kind: EntryKind::OpeningBalance,
            entry_count: posted,
        });

        Ok(PostingResult {
            transaction_id,
            office_id: Some(request.office_id),
        })
    }
}
