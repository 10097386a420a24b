//! Loan-loss provisioning postings.
//!
//! A provisioning run reserves amounts per loan product and category. The
//! poster folds those line items into one entry per (office, currency,
//! account): credits on the liability (reserve) accounts, debits on the
//! expense accounts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use ledgerline_shared::types::{
    AccountId, CurrencyCode, OfficeId, ProvisioningRunId, TransactionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::entry::{EntryKind, EntryType, NewLedgerEntry};
use super::error::{LedgerError, LedgerResult};
use super::events::{PostingEvent, PostingEventBus};
use super::lookup;
use super::reversal::plan_reversal;
use super::store::{AccountStore, LedgerEntryStore};
use super::types::PostingContext;
use super::validation::{BalanceValidator, ensure_balanced};

/// One reserved amount of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningLine {
    /// Office of the provisioned loans.
    pub office_id: OfficeId,
    /// Currency of the provisioned loans.
    pub currency_code: CurrencyCode,
    /// Reserve (liability) account credited.
    pub liability_account_id: AccountId,
    /// Provisioning expense account debited.
    pub expense_account_id: AccountId,
    /// Amount reserved.
    pub reserve_amount: Decimal,
}

/// A provisioning run to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRun {
    /// Run id. The posted group uses it as transaction id.
    pub run_id: ProvisioningRunId,
    /// Business date of the run.
    pub date: NaiveDate,
    /// Reserved amounts.
    pub lines: Vec<ProvisioningLine>,
}

#[derive(Debug, Default)]
struct Aggregate {
    credits: BTreeMap<AccountId, Decimal>,
    debits: BTreeMap<AccountId, Decimal>,
}

/// Posts provisioning runs.
pub struct ProvisioningPoster<A, L> {
    accounts: Arc<A>,
    entries: Arc<L>,
    events: PostingEventBus,
}

impl<A, L> Clone for ProvisioningPoster<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            entries: Arc::clone(&self.entries),
            events: self.events.clone(),
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> ProvisioningPoster<A, L> {
    /// Creates a new provisioning poster.
    pub fn new(accounts: Arc<A>, entries: Arc<L>, events: PostingEventBus) -> Self {
        Self {
            accounts,
            entries,
            events,
        }
    }

    /// Posts a run. Re-posting a run replaces its previous entries.
    ///
    /// # Errors
    ///
    /// `NoDebitsOrCredits` for a run with nothing to post, reference and
    /// state errors of the offices, currencies and accounts involved, date
    /// errors, or a storage failure.
    pub async fn post(
        &self,
        run: &ProvisioningRun,
        context: &PostingContext,
    ) -> LedgerResult<TransactionId> {
        if run.lines.is_empty() {
            return Err(LedgerError::NoDebitsOrCredits);
        }
        if run.lines.iter().any(|line| line.reserve_amount < Decimal::ZERO) {
            return Err(LedgerError::AccountOrAmountEmpty);
        }

        let mut offices: Vec<OfficeId> = run.lines.iter().map(|l| l.office_id).collect();
        offices.sort_unstable();
        offices.dedup();
        let closures = self.accounts.latest_closures(&offices).await?;
        BalanceValidator::new(context.today, &closures).check_date(run.date, &offices)?;
        lookup::ensure_offices(self.accounts.as_ref(), &offices).await?;

        let account_ids: Vec<AccountId> = run
            .lines
            .iter()
            .flat_map(|l| [l.liability_account_id, l.expense_account_id])
            .collect();
        let accounts = lookup::accounts_by_id(self.accounts.as_ref(), &account_ids).await?;
        for account in accounts.values() {
            lookup::ensure_postable(account, false)?;
        }

        let currency_codes: Vec<&CurrencyCode> =
            run.lines.iter().map(|line| &line.currency_code).collect();
        let currencies = lookup::currencies(self.accounts.as_ref(), currency_codes).await?;
        let mut groups: BTreeMap<(OfficeId, CurrencyCode), Aggregate> = BTreeMap::new();
        for line in &run.lines {
            let Some(currency) = currencies.get(&line.currency_code) else {
                return Err(LedgerError::CurrencyNotFound(line.currency_code.to_string()));
            };
            let amount = currency.scale(line.reserve_amount);
            let group = groups
                .entry((line.office_id, line.currency_code.clone()))
                .or_default();
            *group.credits.entry(line.liability_account_id).or_default() += amount;
            *group.debits.entry(line.expense_account_id).or_default() += amount;
        }

        let transaction_id = TransactionId::from(run.run_id);
        let new_entries = build_entries(run, context, transaction_id, &groups);
        if new_entries.is_empty() {
            return Err(LedgerError::NoDebitsOrCredits);
        }
        let credit: Decimal = amounts(&new_entries, EntryType::Credit);
        let debit: Decimal = amounts(&new_entries, EntryType::Debit);
        if credit != debit {
            return Err(LedgerError::SumMismatch { debit, credit });
        }
        ensure_balanced(&new_entries)?;

        let has_live_entries = self
            .entries
            .find_by_transaction(transaction_id)
            .await?
            .iter()
            .any(|entry| !entry.reversed);
        let replaced = if has_live_entries {
            Some(
                plan_reversal(
                    self.accounts.as_ref(),
                    self.entries.as_ref(),
                    transaction_id,
                    None,
                    context,
                )
                .await?,
            )
        } else {
            None
        };

        let mut batch = Vec::new();
        if let Some(plan) = &replaced {
            batch.extend(plan.entries.iter().cloned());
        }
        let posted = new_entries.len();
        batch.extend(new_entries);
        self.entries.apply(batch).await?;

        info!(
            transaction_id = %transaction_id,
            entries = posted,
            replaced = replaced.is_some(),
            "Provisioning entries posted"
        );

        if let Some(plan) = replaced {
            self.events.publish(PostingEvent::Reversed {
                original_transaction_id: plan.original_transaction_id,
                reversal_transaction_id: plan.reversal_transaction_id,
            });
        }
        self.events.publish(PostingEvent::Created {
            transaction_id,
            office_id: (offices.len() == 1).then(|| offices[0]),
            kind: EntryKind::Provisioning,
            entry_count: posted,
        });

        Ok(transaction_id)
    }
}

fn amounts(entries: &[NewLedgerEntry], entry_type: EntryType) -> Decimal {
    entries
        .iter()
        .filter(|e| e.entry_type == entry_type)
        .map(|e| e.amount)
        .sum()
}

fn build_entries(
    run: &ProvisioningRun,
    context: &PostingContext,
    transaction_id: TransactionId,
    groups: &BTreeMap<(OfficeId, CurrencyCode), Aggregate>,
) -> Vec<NewLedgerEntry> {
    let mut entries = Vec::new();
    for ((office_id, currency_code), group) in groups {
        let sides = group
            .credits
            .iter()
            .map(|(account, amount)| (EntryType::Credit, *account, *amount))
            .chain(
                group
                    .debits
                    .iter()
                    .map(|(account, amount)| (EntryType::Debit, *account, *amount)),
            );
        for (entry_type, account_id, amount) in sides {
            if amount.is_zero() {
                continue;
            }
            entries.push(NewLedgerEntry {
                office_id: *office_id,
                account_id,
                currency_code: currency_code.clone(),
                transaction_id,
                entry_type,
                amount,
                transaction_date: run.date,
                manual_entry: false,
                kind: EntryKind::Provisioning,
                comments: Some(format!("Provisioning run {}", run.run_id)),
                reference_number: None,
                reverses_entry_id: None,
                entity: None,
                created_by: context.acting_user,
            });
        }
    }
    entries
}
