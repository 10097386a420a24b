//! In-memory ledger store.
//!
//! Implements both storage traits over plain collections behind a tokio
//! `RwLock`. Used by the engine tests and the API tests, and handy for
//! embedding the engine without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, Utc};
use ledgerline_shared::types::{
    AccountId, AccountingRuleId, ClosureId, Currency, CurrencyCode, LedgerEntryId, OfficeId,
    TransactionId,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::entry::{EntityLink, EntryKind, EntryType, LedgerEntry, NewLedgerEntry};
use super::store::{
    AccountMovement, AccountStore, DerivedAccountBalance, EntryCursor, LedgerEntryStore,
    OfficeBalanceSeed, OrganizationBalanceSeed, RunningBalanceUpdate, StoreError,
};
use super::types::{
    AccountingClosure, AccountingRule, FinancialActivity, LedgerAccount, NewClosure,
};

#[derive(Debug, Default)]
struct State {
    offices: BTreeMap<OfficeId, String>,
    currencies: HashMap<CurrencyCode, Currency>,
    accounts: BTreeMap<AccountId, LedgerAccount>,
    rules: HashMap<AccountingRuleId, AccountingRule>,
    control_accounts: HashMap<FinancialActivity, AccountId>,
    closures: Vec<AccountingClosure>,
    entries: Vec<LedgerEntry>,
    derived: BTreeMap<AccountId, DerivedAccountBalance>,
}

impl State {
    /// Row ids start at 1 and match `index + 1`.
    fn entry_mut(&mut self, id: LedgerEntryId) -> Option<&mut LedgerEntry> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.entries.get_mut(index)
    }

    fn entry(&self, id: LedgerEntryId) -> Option<&LedgerEntry> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.entries.get(index)
    }

    fn next_entry_id(&self) -> LedgerEntryId {
        LedgerEntryId(i64::try_from(self.entries.len()).unwrap_or(i64::MAX - 1) + 1)
    }
}

fn live_transactions<'a>(entries: impl Iterator<Item = &'a LedgerEntry>) -> Vec<TransactionId> {
    let mut ids = Vec::new();
    for entry in entries.filter(|e| !e.reversed && e.reverses_entry_id.is_none()) {
        if !ids.contains(&entry.transaction_id) {
            ids.push(entry.transaction_id);
        }
    }
    ids
}

/// Ledger store backed by in-process collections.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
    currency_lookups: AtomicUsize,
}

impl InMemoryLedger {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an office.
    #[must_use]
    pub fn with_office(mut self, id: OfficeId, name: &str) -> Self {
        self.state.get_mut().offices.insert(id, name.to_owned());
        self
    }

    /// Adds a currency.
    #[must_use]
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.state
            .get_mut()
            .currencies
            .insert(currency.code.clone(), currency);
        self
    }

    /// Adds an account.
    #[must_use]
    pub fn with_account(mut self, account: LedgerAccount) -> Self {
        self.state.get_mut().accounts.insert(account.id, account);
        self
    }

    /// Adds an accounting rule.
    #[must_use]
    pub fn with_rule(mut self, rule: AccountingRule) -> Self {
        self.state.get_mut().rules.insert(rule.id, rule);
        self
    }

    /// Maps a financial activity to an account.
    #[must_use]
    pub fn with_control_account(mut self, activity: FinancialActivity, account: AccountId) -> Self {
        self.state
            .get_mut()
            .control_accounts
            .insert(activity, account);
        self
    }

    /// Adds a closure.
    #[must_use]
    pub fn with_closure(mut self, office_id: OfficeId, closing_date: NaiveDate) -> Self {
        let state = self.state.get_mut();
        let id = ClosureId(i64::try_from(state.closures.len()).unwrap_or(0) + 1);
        state.closures.push(AccountingClosure {
            id,
            office_id,
            closing_date,
            comments: None,
            created_at: Utc::now(),
        });
        self
    }

    /// Snapshot of every stored entry in id order.
    pub async fn all_entries(&self) -> Vec<LedgerEntry> {
        self.state.read().await.entries.clone()
    }

    /// Snapshot of one entry.
    pub async fn entry(&self, id: LedgerEntryId) -> Option<LedgerEntry> {
        self.state.read().await.entry(id).cloned()
    }

    /// Snapshot of the derived balance of an account.
    pub async fn derived_balance(&self, account: AccountId) -> Option<DerivedAccountBalance> {
        self.state.read().await.derived.get(&account).copied()
    }

    /// Number of `find_currency` calls served so far.
    #[must_use]
    pub fn currency_lookups(&self) -> usize {
        self.currency_lookups.load(Ordering::Relaxed)
    }

    /// Disables or enables an account.
    pub async fn set_account_disabled(&self, account: AccountId, disabled: bool) {
        if let Some(account) = self.state.write().await.accounts.get_mut(&account) {
            account.disabled = disabled;
        }
    }
}

impl AccountStore for InMemoryLedger {
    async fn find_accounts(&self, ids: &[AccountId]) -> Result<Vec<LedgerAccount>, StoreError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.accounts.get(id).cloned())
            .collect())
    }

    async fn find_rule(&self, id: AccountingRuleId) -> Result<Option<AccountingRule>, StoreError> {
        Ok(self.state.read().await.rules.get(&id).cloned())
    }

    async fn existing_offices(&self, ids: &[OfficeId]) -> Result<Vec<OfficeId>, StoreError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.offices.contains_key(id))
            .collect())
    }

    async fn find_currency(&self, code: &CurrencyCode) -> Result<Option<Currency>, StoreError> {
        self.currency_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.state.read().await.currencies.get(code).cloned())
    }

    async fn latest_closures(
        &self,
        offices: &[OfficeId],
    ) -> Result<Vec<AccountingClosure>, StoreError> {
        let state = self.state.read().await;
        let mut latest: BTreeMap<OfficeId, &AccountingClosure> = BTreeMap::new();
        for closure in state
            .closures
            .iter()
            .filter(|c| offices.contains(&c.office_id))
        {
            let slot = latest.entry(closure.office_id).or_insert(closure);
            if closure.closing_date > slot.closing_date {
                *slot = closure;
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn control_account(
        &self,
        activity: FinancialActivity,
    ) -> Result<Option<LedgerAccount>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .control_accounts
            .get(&activity)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn insert_closure(&self, closure: NewClosure) -> Result<AccountingClosure, StoreError> {
        let mut state = self.state.write().await;
        let next = state.closures.iter().map(|c| c.id.get()).max().unwrap_or(0) + 1;
        let stored = AccountingClosure {
            id: ClosureId(next),
            office_id: closure.office_id,
            closing_date: closure.closing_date,
            comments: closure.comments,
            created_at: Utc::now(),
        };
        state.closures.push(stored.clone());
        Ok(stored)
    }

    async fn delete_closure(&self, id: ClosureId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.closures.len();
        state.closures.retain(|c| c.id != id);
        Ok(state.closures.len() != before)
    }
}

impl LedgerEntryStore for InMemoryLedger {
    async fn apply(&self, entries: Vec<NewLedgerEntry>) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut state = self.state.write().await;

        // Check every reversal target before touching anything.
        let mut targets = Vec::new();
        for entry in &entries {
            if let Some(original) = entry.reverses_entry_id {
                let reversed = state.entry(original).is_none_or(|e| e.reversed);
                if reversed || targets.contains(&original) {
                    return Err(StoreError::Conflict { entry_id: original });
                }
                targets.push(original);
            }
        }

        let now = Utc::now();
        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = state.next_entry_id();
            let stored = LedgerEntry {
                id,
                office_id: entry.office_id,
                account_id: entry.account_id,
                currency_code: entry.currency_code,
                transaction_id: entry.transaction_id,
                entry_type: entry.entry_type,
                amount: entry.amount,
                transaction_date: entry.transaction_date,
                manual_entry: entry.manual_entry,
                kind: entry.kind,
                comments: entry.comments,
                reference_number: entry.reference_number,
                reversed: false,
                reversal_id: None,
                reverses_entry_id: entry.reverses_entry_id,
                reconciled: false,
                running_balance_calculated: false,
                office_running_balance: None,
                organization_running_balance: None,
                entity: entry.entity,
                created_by: entry.created_by,
                created_at: now,
            };
            state.entries.push(stored.clone());

            if let Some(original) = stored.reverses_entry_id
                && let Some(target) = state.entry_mut(original)
            {
                target.reversed = true;
                target.reversal_id = Some(id);
            }
            written.push(stored);
        }
        Ok(written)
    }

    async fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .entries
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn mark_reconciled(&self, transaction_id: TransactionId) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for entry in state
            .entries
            .iter_mut()
            .filter(|e| e.transaction_id == transaction_id)
        {
            entry.reconciled = true;
            count += 1;
        }
        Ok(count)
    }

    async fn opening_balance_transactions(
        &self,
        contra: AccountId,
        office: OfficeId,
    ) -> Result<Vec<TransactionId>, StoreError> {
        let state = self.state.read().await;
        Ok(live_transactions(state.entries.iter().filter(|e| {
            e.account_id == contra && e.office_id == office && e.kind == EntryKind::OpeningBalance
        })))
    }

    async fn has_entries_other_than(
        &self,
        account: AccountId,
        kind: EntryKind,
    ) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .any(|e| e.account_id == account && e.kind != kind))
    }

    async fn transactions_for_entity(
        &self,
        entity: EntityLink,
    ) -> Result<Vec<TransactionId>, StoreError> {
        let state = self.state.read().await;
        Ok(live_transactions(
            state.entries.iter().filter(|e| e.entity == Some(entity)),
        ))
    }

    async fn earliest_uncalculated_date(
        &self,
        office: Option<OfficeId>,
    ) -> Result<Option<NaiveDate>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| !e.running_balance_calculated)
            .filter(|e| office.is_none_or(|o| e.office_id == o))
            .map(|e| e.transaction_date)
            .min())
    }

    async fn reset_calculated_from(&self, from: NaiveDate) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut cleared = 0;
        for entry in state
            .entries
            .iter_mut()
            .filter(|e| e.running_balance_calculated && e.transaction_date >= from)
        {
            entry.running_balance_calculated = false;
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn office_balance_seeds(
        &self,
        before: NaiveDate,
        office: Option<OfficeId>,
    ) -> Result<Vec<OfficeBalanceSeed>, StoreError> {
        let state = self.state.read().await;
        let mut latest: BTreeMap<(OfficeId, AccountId), &LedgerEntry> = BTreeMap::new();
        for entry in state.entries.iter().filter(|e| {
            e.running_balance_calculated
                && e.transaction_date < before
                && office.is_none_or(|o| e.office_id == o)
        }) {
            let slot = latest.entry((entry.office_id, entry.account_id)).or_insert(entry);
            if (entry.transaction_date, entry.id) > (slot.transaction_date, slot.id) {
                *slot = entry;
            }
        }
        Ok(latest
            .into_iter()
            .map(|((office_id, account_id), entry)| OfficeBalanceSeed {
                office_id,
                account_id,
                balance: entry.office_running_balance.unwrap_or(Decimal::ZERO),
            })
            .collect())
    }

    async fn organization_balance_seeds(
        &self,
        before: NaiveDate,
    ) -> Result<Vec<OrganizationBalanceSeed>, StoreError> {
        let state = self.state.read().await;
        let mut latest: BTreeMap<AccountId, &LedgerEntry> = BTreeMap::new();
        for entry in state
            .entries
            .iter()
            .filter(|e| e.running_balance_calculated && e.transaction_date < before)
        {
            let slot = latest.entry(entry.account_id).or_insert(entry);
            if (entry.transaction_date, entry.id) > (slot.transaction_date, slot.id) {
                *slot = entry;
            }
        }
        Ok(latest
            .into_iter()
            .map(|(account_id, entry)| OrganizationBalanceSeed {
                account_id,
                balance: entry.organization_running_balance.unwrap_or(Decimal::ZERO),
            })
            .collect())
    }

    async fn entries_page(
        &self,
        from: NaiveDate,
        cursor: Option<EntryCursor>,
        office: Option<OfficeId>,
        limit: u64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.read().await;
        let mut page: Vec<&LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.transaction_date >= from)
            .filter(|e| office.is_none_or(|o| e.office_id == o))
            .filter(|e| cursor.is_none_or(|c| (e.transaction_date, e.id) > (c.transaction_date, c.entry_id)))
            .collect();
        page.sort_by_key(|e| (e.transaction_date, e.id));
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(page.into_iter().take(limit).cloned().collect())
    }

    async fn apply_running_balances(
        &self,
        updates: &[RunningBalanceUpdate],
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for update in updates {
            let entry = state.entry_mut(update.entry_id).ok_or_else(|| {
                StoreError::Backend(format!("ledger entry {} does not exist", update.entry_id))
            })?;
            entry.office_running_balance = Some(update.office_running_balance);
            if let Some(balance) = update.organization_running_balance {
                entry.organization_running_balance = Some(balance);
            }
            if update.mark_calculated {
                entry.running_balance_calculated = true;
            }
        }
        Ok(())
    }

    async fn account_movements_since_markers(&self) -> Result<Vec<AccountMovement>, StoreError> {
        let state = self.state.read().await;
        let mut first_pending: HashMap<AccountId, LedgerEntryId> = HashMap::new();
        for entry in state.entries.iter().filter(|e| !e.running_balance_calculated) {
            first_pending
                .entry(entry.account_id)
                .and_modify(|id| *id = (*id).min(entry.id))
                .or_insert(entry.id);
        }

        let mut movements: BTreeMap<AccountId, AccountMovement> = BTreeMap::new();
        for entry in state.entries.iter().filter(|e| e.running_balance_calculated) {
            let marker = state
                .derived
                .get(&entry.account_id)
                .map_or(LedgerEntryId(0), |d| d.last_entry_id);
            let below_pending = first_pending
                .get(&entry.account_id)
                .is_none_or(|pending| entry.id < *pending);
            if entry.id <= marker || !below_pending {
                continue;
            }
            let movement = movements
                .entry(entry.account_id)
                .or_insert(AccountMovement {
                    account_id: entry.account_id,
                    debit_total: Decimal::ZERO,
                    credit_total: Decimal::ZERO,
                    last_entry_id: entry.id,
                });
            match entry.entry_type {
                EntryType::Debit => movement.debit_total += entry.amount,
                EntryType::Credit => movement.credit_total += entry.amount,
            }
            movement.last_entry_id = movement.last_entry_id.max(entry.id);
        }
        Ok(movements.into_values().collect())
    }

    async fn derived_balances(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<DerivedAccountBalance>, StoreError> {
        let state = self.state.read().await;
        Ok(accounts
            .iter()
            .filter_map(|id| state.derived.get(id).copied())
            .collect())
    }

    async fn upsert_derived_balances(
        &self,
        balances: &[DerivedAccountBalance],
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for balance in balances {
            state.derived.insert(balance.account_id, *balance);
        }
        Ok(())
    }
}
