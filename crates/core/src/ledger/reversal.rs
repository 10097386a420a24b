//! Reversal of posted transaction groups.
//!
//! A reversal never edits amounts. Each live entry of the group gets a
//! mirror entry of the opposite type under a new transaction id, and the
//! store marks the original reversed in the same write.

use std::sync::Arc;

use ledgerline_shared::types::{OfficeId, TransactionId, UserId};
use tracing::info;

use super::entry::{LedgerEntry, NewLedgerEntry};
use super::error::{LedgerError, LedgerResult};
use super::events::{PostingEvent, PostingEventBus};
use super::store::{AccountStore, LedgerEntryStore};
use super::types::PostingContext;
use super::validation::{BalanceValidator, ensure_balanced};

/// Mirror entries for one transaction group, ready to be written.
#[derive(Debug, Clone)]
pub struct ReversalPlan {
    /// The group being reversed.
    pub original_transaction_id: TransactionId,
    /// The new mirror group.
    pub reversal_transaction_id: TransactionId,
    /// Mirror entries.
    pub entries: Vec<NewLedgerEntry>,
}

/// Builds the mirror of every entry in `originals`.
///
/// Each mirror keeps the account, office, amount, currency, kind, entity
/// link and transaction date of its original and points back to it.
#[must_use]
pub fn create_reversing_entries(
    originals: &[LedgerEntry],
    reversal_transaction_id: TransactionId,
    comment: Option<&str>,
    reversed_by: UserId,
) -> Vec<NewLedgerEntry> {
    originals
        .iter()
        .map(|original| NewLedgerEntry {
            office_id: original.office_id,
            account_id: original.account_id,
            currency_code: original.currency_code.clone(),
            transaction_id: reversal_transaction_id,
            entry_type: original.entry_type.opposite(),
            amount: original.amount,
            transaction_date: original.transaction_date,
            manual_entry: original.manual_entry,
            kind: original.kind,
            comments: Some(comment.map_or_else(
                || {
                    format!(
                        "Reversal entry for journal entry {} of transaction {}",
                        original.id, original.transaction_id
                    )
                },
                str::to_owned,
            )),
            reference_number: original.reference_number.clone(),
            reverses_entry_id: Some(original.id),
            entity: original.entity,
            created_by: reversed_by,
        })
        .collect()
}

/// Loads a group's live entries and plans their reversal.
///
/// # Errors
///
/// `TransactionGroupNotFound` if fewer than two live entries exist,
/// `AccountingClosed` if any involved office is closed on the entries' date.
pub(crate) async fn plan_reversal<A: AccountStore, L: LedgerEntryStore>(
    accounts: &A,
    entries: &L,
    transaction_id: TransactionId,
    comment: Option<&str>,
    context: &PostingContext,
) -> LedgerResult<ReversalPlan> {
    let live: Vec<LedgerEntry> = entries
        .find_by_transaction(transaction_id)
        .await?
        .into_iter()
        .filter(|entry| !entry.reversed)
        .collect();
    if live.len() < 2 {
        return Err(LedgerError::TransactionGroupNotFound(transaction_id));
    }

    let mut offices: Vec<OfficeId> = live.iter().map(|entry| entry.office_id).collect();
    offices.sort_unstable();
    offices.dedup();
    let closures = accounts.latest_closures(&offices).await?;
    let validator = BalanceValidator::new(context.today, &closures);
    for entry in &live {
        validator.check_closures(entry.transaction_date, &[entry.office_id])?;
    }

    let reversal_transaction_id = TransactionId::new();
    let mirrors =
        create_reversing_entries(&live, reversal_transaction_id, comment, context.acting_user);
    ensure_balanced(&mirrors)?;

    Ok(ReversalPlan {
        original_transaction_id: transaction_id,
        reversal_transaction_id,
        entries: mirrors,
    })
}

/// Reverses transaction groups.
pub struct ReversalEngine<A, L> {
    accounts: Arc<A>,
    entries: Arc<L>,
    events: PostingEventBus,
}

impl<A, L> Clone for ReversalEngine<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            entries: Arc::clone(&self.entries),
            events: self.events.clone(),
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> ReversalEngine<A, L> {
    /// Creates a new reversal engine.
    pub fn new(accounts: Arc<A>, entries: Arc<L>, events: PostingEventBus) -> Self {
        Self {
            accounts,
            entries,
            events,
        }
    }

    /// Reverses a transaction group and returns the mirror group's id.
    ///
    /// # Errors
    ///
    /// `TransactionGroupNotFound`, `AccountingClosed`, `AlreadyReversed`
    /// when a concurrent reversal won, or a storage failure.
    pub async fn reverse(
        &self,
        transaction_id: TransactionId,
        comment: Option<&str>,
        context: &PostingContext,
    ) -> LedgerResult<TransactionId> {
        let plan = plan_reversal(
            self.accounts.as_ref(),
            self.entries.as_ref(),
            transaction_id,
            comment,
            context,
        )
        .await?;
        self.write(plan).await
    }

    /// Reverses several groups, each in its own write.
    ///
    /// Stops at the first failure; groups reversed before it stay reversed.
    pub async fn reverse_all(
        &self,
        transaction_ids: &[TransactionId],
        comment: Option<&str>,
        context: &PostingContext,
    ) -> LedgerResult<Vec<TransactionId>> {
        let mut reversals = Vec::with_capacity(transaction_ids.len());
        for transaction_id in transaction_ids {
            reversals.push(self.reverse(*transaction_id, comment, context).await?);
        }
        Ok(reversals)
    }

    async fn write(&self, plan: ReversalPlan) -> LedgerResult<TransactionId> {
        let count = plan.entries.len();
        self.entries.apply(plan.entries).await?;
        info!(
            transaction_id = %plan.original_transaction_id,
            reversal_transaction_id = %plan.reversal_transaction_id,
            entries = count,
            "Transaction reversed"
        );
        self.events.publish(PostingEvent::Reversed {
            original_transaction_id: plan.original_transaction_id,
            reversal_transaction_id: plan.reversal_transaction_id,
        });
        Ok(plan.reversal_transaction_id)
    }
}
