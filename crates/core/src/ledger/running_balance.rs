//! Running balance computation.
//!
//! Entries are posted with `running_balance_calculated = false`. This job
//! walks every entry from the earliest unflagged transaction date onward in
//! `(transaction_date, id)` order, writes the cumulative office and
//! organization balances of each entry's account, and flags it.
//!
//! The walk is resumable: the organization pass first clears the flag on
//! the whole window, balances are seeded from the last calculated entry
//! before the window, pages are fetched with a keyset cursor, and updates
//! are flushed in small batches. A run that stops early, at the iteration
//! bound or on a crash between flushes, leaves a flagged prefix and an
//! unflagged tail, which the next run picks up.
//!
//! Derived account balances only fold calculated entries, so the marker
//! never moves past a row the walk has not reached.

use std::collections::HashMap;
use std::sync::Arc;

use ledgerline_shared::LedgerConfig;
use ledgerline_shared::types::{AccountId, OfficeId};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::balance::{BalanceSide, RunningBalances};
use super::entry::LedgerEntry;
use super::error::LedgerResult;
use super::lookup;
use super::store::{
    AccountStore, DerivedAccountBalance, EntryCursor, LedgerEntryStore, RunningBalanceUpdate,
};

/// Paging and batching limits of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningBalanceSettings {
    /// Page size of the organization pass.
    pub organization_page_size: u64,
    /// Page size of the single-office pass.
    pub office_page_size: u64,
    /// Updates written per batch.
    pub flush_batch_size: usize,
    /// Maximum pages per run.
    pub max_iterations: u32,
}

impl Default for RunningBalanceSettings {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for RunningBalanceSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            organization_page_size: config.organization_page_size.max(1),
            office_page_size: config.office_page_size.max(1),
            flush_batch_size: config.flush_batch_size.max(1),
            max_iterations: config.max_iterations.max(1),
        }
    }
}

/// Outcome of one job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningBalanceReport {
    /// Entries whose balances were written.
    pub entries_updated: u64,
    /// Pages fetched.
    pub pages: u32,
    /// Accounts whose derived balance moved.
    pub derived_accounts_updated: usize,
    /// The run stopped at the page bound with rows possibly left over.
    pub hit_iteration_bound: bool,
}

/// Computes running balances.
pub struct RunningBalanceEngine<A, L> {
    accounts: Arc<A>,
    entries: Arc<L>,
    settings: RunningBalanceSettings,
}

impl<A, L> Clone for RunningBalanceEngine<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            entries: Arc::clone(&self.entries),
            settings: self.settings,
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> RunningBalanceEngine<A, L> {
    /// Creates a new engine.
    pub fn new(accounts: Arc<A>, entries: Arc<L>, settings: RunningBalanceSettings) -> Self {
        Self {
            accounts,
            entries,
            settings,
        }
    }

    /// Runs the job.
    ///
    /// Without an office, computes office and organization balances, flags
    /// the rows and then updates derived account balances. With an office,
    /// recomputes that office's running balances only and leaves the flag
    /// for the organization pass.
    pub async fn run(&self, office: Option<OfficeId>) -> LedgerResult<RunningBalanceReport> {
        let mut report = self.walk(office).await?;
        if office.is_none() {
            report.derived_accounts_updated = self.update_derived_balances().await?;
        }
        info!(
            office_id = ?office,
            entries_updated = report.entries_updated,
            pages = report.pages,
            derived_accounts_updated = report.derived_accounts_updated,
            hit_iteration_bound = report.hit_iteration_bound,
            "Running balance job finished"
        );
        Ok(report)
    }

    async fn walk(&self, office: Option<OfficeId>) -> LedgerResult<RunningBalanceReport> {
        let mut report = RunningBalanceReport::default();

        let Some(from) = self.entries.earliest_uncalculated_date(office).await? else {
            debug!(office_id = ?office, "No ledger entries need running balances");
            return Ok(report);
        };

        let organization_pass = office.is_none();
        if organization_pass {
            let cleared = self.entries.reset_calculated_from(from).await?;
            debug!(from = %from, cleared, "Cleared calculated flags for recompute");
        }
        let page_size = if organization_pass {
            self.settings.organization_page_size
        } else {
            self.settings.office_page_size
        };

        let mut office_balances = RunningBalances::seeded(
            self.entries
                .office_balance_seeds(from, office)
                .await?
                .into_iter()
                .map(|seed| ((seed.office_id, seed.account_id), seed.balance)),
        );
        let mut organization_balances = if organization_pass {
            RunningBalances::seeded(
                self.entries
                    .organization_balance_seeds(from)
                    .await?
                    .into_iter()
                    .map(|seed| (seed.account_id, seed.balance)),
            )
        } else {
            RunningBalances::default()
        };
        debug!(
            from = %from,
            office_seeds = office_balances.len(),
            organization_seeds = organization_balances.len(),
            "Seeded running balances"
        );

        let mut sides: HashMap<AccountId, BalanceSide> = HashMap::new();
        let mut pending: Vec<RunningBalanceUpdate> =
            Vec::with_capacity(self.settings.flush_batch_size);
        let mut cursor: Option<EntryCursor> = None;

        loop {
            if report.pages >= self.settings.max_iterations {
                report.hit_iteration_bound = true;
                warn!(
                    pages = report.pages,
                    "Running balance job stopped at the iteration bound"
                );
                break;
            }

            let page = self
                .entries
                .entries_page(from, cursor, office, page_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(EntryCursor::after(last));
            report.pages += 1;

            self.load_sides(&page, &mut sides).await?;
            for entry in &page {
                let side = sides
                    .get(&entry.account_id)
                    .copied()
                    .unwrap_or(BalanceSide::DebitNormal);
                let change = side.effect(entry.entry_type, entry.amount);
                let office_running_balance =
                    office_balances.apply((entry.office_id, entry.account_id), change);
                let organization_running_balance = organization_pass
                    .then(|| organization_balances.apply(entry.account_id, change));

                pending.push(RunningBalanceUpdate {
                    entry_id: entry.id,
                    office_running_balance,
                    organization_running_balance,
                    mark_calculated: organization_pass,
                });
                if pending.len() >= self.settings.flush_batch_size {
                    report.entries_updated += self.flush(&mut pending).await?;
                }
            }
            report.entries_updated += self.flush(&mut pending).await?;

            if (page.len() as u64) < page_size {
                break;
            }
            tokio::task::yield_now().await;
        }

        Ok(report)
    }

    async fn load_sides(
        &self,
        page: &[LedgerEntry],
        sides: &mut HashMap<AccountId, BalanceSide>,
    ) -> LedgerResult<()> {
        let missing: Vec<AccountId> = page
            .iter()
            .map(|entry| entry.account_id)
            .filter(|id| !sides.contains_key(id))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let accounts = lookup::accounts_by_id(self.accounts.as_ref(), &missing).await?;
        for (id, account) in accounts {
            sides.insert(id, BalanceSide::of(account.account_type));
        }
        Ok(())
    }

    async fn flush(&self, pending: &mut Vec<RunningBalanceUpdate>) -> LedgerResult<u64> {
        if pending.is_empty() {
            return Ok(0);
        }
        self.entries.apply_running_balances(pending).await?;
        let written = pending.len() as u64;
        pending.clear();
        Ok(written)
    }

    /// Folds entries past each account's marker into its derived balance.
    async fn update_derived_balances(&self) -> LedgerResult<usize> {
        let movements = self.entries.account_movements_since_markers().await?;
        if movements.is_empty() {
            debug!("No account movements past derived balance markers");
            return Ok(0);
        }

        let ids: Vec<AccountId> = movements.iter().map(|m| m.account_id).collect();
        let accounts = lookup::accounts_by_id(self.accounts.as_ref(), &ids).await?;
        let stored: HashMap<AccountId, DerivedAccountBalance> = self
            .entries
            .derived_balances(&ids)
            .await?
            .into_iter()
            .map(|balance| (balance.account_id, balance))
            .collect();

        let updated: Vec<DerivedAccountBalance> = movements
            .iter()
            .filter_map(|movement| {
                let account = accounts.get(&movement.account_id)?;
                let change = BalanceSide::of(account.account_type)
                    .calculate_balance_change(movement.debit_total, movement.credit_total);
                let previous = stored
                    .get(&movement.account_id)
                    .map(|balance| balance.balance)
                    .unwrap_or_default();
                Some(DerivedAccountBalance {
                    account_id: movement.account_id,
                    balance: previous + change,
                    last_entry_id: movement.last_entry_id,
                })
            })
            .collect();

        self.entries.upsert_derived_balances(&updated).await?;
        Ok(updated.len())
    }
}
