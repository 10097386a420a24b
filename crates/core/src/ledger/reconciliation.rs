//! Reconciliation of transaction groups.

use std::sync::Arc;

use ledgerline_shared::types::TransactionId;
use tracing::info;

use super::error::{LedgerError, LedgerResult};
use super::events::{PostingEvent, PostingEventBus};
use super::store::LedgerEntryStore;

/// Flags transaction groups as reconciled.
pub struct ReconciliationService<L> {
    entries: Arc<L>,
    events: PostingEventBus,
}

impl<L> Clone for ReconciliationService<L> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            events: self.events.clone(),
        }
    }
}

impl<L: LedgerEntryStore> ReconciliationService<L> {
    /// Creates a new reconciliation service.
    pub fn new(entries: Arc<L>, events: PostingEventBus) -> Self {
        Self { entries, events }
    }

    /// Flags every entry of the group as reconciled. Safe to repeat.
    ///
    /// # Errors
    ///
    /// `TransactionGroupNotFound` unless the group has at least two rows.
    pub async fn reconcile(&self, transaction_id: TransactionId) -> LedgerResult<u64> {
        let rows = self.entries.find_by_transaction(transaction_id).await?;
        if rows.len() < 2 {
            return Err(LedgerError::TransactionGroupNotFound(transaction_id));
        }

        let updated = self.entries.mark_reconciled(transaction_id).await?;
        info!(transaction_id = %transaction_id, entries = updated, "Transaction reconciled");
        self.events
            .publish(PostingEvent::Reconciled { transaction_id });
        Ok(updated)
    }
}
