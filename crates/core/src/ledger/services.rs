//! All ledger services wired over one pair of stores.

use std::sync::Arc;

use ledgerline_shared::types::TransactionId;

use super::bridge::AccountingBridge;
use super::closure::ClosureService;
use super::entry::LedgerEntry;
use super::error::{LedgerError, LedgerResult};
use super::events::PostingEventBus;
use super::opening_balance::OpeningBalanceDefiner;
use super::poster::JournalPoster;
use super::provisioning::ProvisioningPoster;
use super::reconciliation::ReconciliationService;
use super::reversal::ReversalEngine;
use super::running_balance::{RunningBalanceEngine, RunningBalanceSettings};
use super::store::{AccountStore, LedgerEntryStore};

/// The ledger engine's services sharing one account store, one entry store
/// and one event bus.
pub struct LedgerServices<A, L> {
    /// Journal posting.
    pub poster: JournalPoster<A, L>,
    /// Reversals.
    pub reversals: ReversalEngine<A, L>,
    /// Provisioning runs.
    pub provisioning: ProvisioningPoster<A, L>,
    /// Opening balances.
    pub opening_balances: OpeningBalanceDefiner<A, L>,
    /// Running balance job.
    pub running_balances: RunningBalanceEngine<A, L>,
    /// Reconciliation.
    pub reconciliation: ReconciliationService<L>,
    /// Accounting closures.
    pub closures: ClosureService<A>,
    /// Portfolio accounting bridge.
    pub bridge: AccountingBridge<A, L>,
    /// Event bus every service publishes to.
    pub events: PostingEventBus,
    entries: Arc<L>,
}

impl<A, L> Clone for LedgerServices<A, L> {
    fn clone(&self) -> Self {
        Self {
            poster: self.poster.clone(),
            reversals: self.reversals.clone(),
            provisioning: self.provisioning.clone(),
            opening_balances: self.opening_balances.clone(),
            running_balances: self.running_balances.clone(),
            reconciliation: self.reconciliation.clone(),
            closures: self.closures.clone(),
            bridge: self.bridge.clone(),
            events: self.events.clone(),
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> LedgerServices<A, L> {
    /// Wires every service.
    pub fn new(
        accounts: Arc<A>,
        entries: Arc<L>,
        settings: RunningBalanceSettings,
        events: PostingEventBus,
    ) -> Self {
        let poster = JournalPoster::new(Arc::clone(&accounts), Arc::clone(&entries), events.clone());
        let reversals =
            ReversalEngine::new(Arc::clone(&accounts), Arc::clone(&entries), events.clone());
        Self {
            provisioning: ProvisioningPoster::new(
                Arc::clone(&accounts),
                Arc::clone(&entries),
                events.clone(),
            ),
            opening_balances: OpeningBalanceDefiner::new(
                Arc::clone(&accounts),
                Arc::clone(&entries),
                events.clone(),
            ),
            running_balances: RunningBalanceEngine::new(
                Arc::clone(&accounts),
                Arc::clone(&entries),
                settings,
            ),
            reconciliation: ReconciliationService::new(Arc::clone(&entries), events.clone()),
            closures: ClosureService::new(accounts),
            bridge: AccountingBridge::new(Arc::clone(&entries), poster.clone(), reversals.clone()),
            poster,
            reversals,
            events,
            entries,
        }
    }

    /// Every entry of a transaction group.
    ///
    /// # Errors
    ///
    /// `TransactionGroupNotFound` if the group has no rows.
    pub async fn transaction(&self, transaction_id: TransactionId) -> LedgerResult<Vec<LedgerEntry>> {
        let entries = self.entries.find_by_transaction(transaction_id).await?;
        if entries.is_empty() {
            return Err(LedgerError::TransactionGroupNotFound(transaction_id));
        }
        Ok(entries)
    }
}
