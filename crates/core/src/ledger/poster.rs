//! Journal posting.
//!
//! Turns a validated [`PostingRequest`] into one balanced transaction group,
//! adding interbranch control entries when the lines span several offices.

use std::sync::Arc;

use ledgerline_shared::types::{AccountId, Currency, OfficeId, TransactionId};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::entry::{EntryKind, EntryType, NewLedgerEntry};
use super::error::{LedgerError, LedgerResult};
use super::events::{PostingEvent, PostingEventBus};
use super::interbranch::{SplitPlan, plan_split};
use super::lookup;
use super::rules::check_rule;
use super::store::{AccountStore, LedgerEntryStore};
use super::types::{
    FinancialActivity, LedgerAccount, PostingContext, PostingLine, PostingRequest, PostingResult,
};
use super::validation::{BalanceValidator, ensure_balanced};

/// Posts journal entries.
pub struct JournalPoster<A, L> {
    accounts: Arc<A>,
    entries: Arc<L>,
    events: PostingEventBus,
}

impl<A, L> Clone for JournalPoster<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            entries: Arc::clone(&self.entries),
            events: self.events.clone(),
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> JournalPoster<A, L> {
    /// Creates a new poster.
    pub fn new(accounts: Arc<A>, entries: Arc<L>, events: PostingEventBus) -> Self {
        Self {
            accounts,
            entries,
            events,
        }
    }

    /// Posts a transaction group.
    ///
    /// # Errors
    ///
    /// Any validation, reference or state error of the request, or a
    /// storage failure. Nothing is written on error.
    pub async fn post(
        &self,
        request: &PostingRequest,
        context: &PostingContext,
    ) -> LedgerResult<PostingResult> {
        let offices = request.office_ids();
        let closures = self.accounts.latest_closures(&offices).await?;
        BalanceValidator::new(context.today, &closures).validate(request)?;

        let currency = lookup::currency(self.accounts.as_ref(), &request.currency_code).await?;
        lookup::ensure_offices(self.accounts.as_ref(), &offices).await?;

        let account_ids: Vec<AccountId> = request
            .credits
            .iter()
            .chain(&request.debits)
            .filter_map(|line| line.account_id)
            .collect();
        let accounts = lookup::accounts_by_id(self.accounts.as_ref(), &account_ids).await?;
        for account_id in &account_ids {
            if let Some(account) = accounts.get(account_id) {
                lookup::ensure_postable(account, request.manual)?;
            }
        }

        if let Some(rule_id) = request.accounting_rule_id {
            let rule = self
                .accounts
                .find_rule(rule_id)
                .await?
                .ok_or(LedgerError::AccountingRuleNotFound(rule_id))?;
            check_rule(&rule, request, &accounts)?;
        }

        let credits = scaled_lines(&request.credits, &currency)?;
        let debits = scaled_lines(&request.debits, &currency)?;
        let debit: Decimal = debits.iter().map(|line| line.amount).sum();
        let credit: Decimal = credits.iter().map(|line| line.amount).sum();
        if debit != credit {
            return Err(LedgerError::SumMismatch { debit, credit });
        }

        let plan = plan_split(&office_amounts(&credits), &office_amounts(&debits))?;
        let control = if plan.is_interbranch() {
            let account =
                lookup::control_account(self.accounts.as_ref(), FinancialActivity::InterBranchTransfer)
                    .await?;
            lookup::ensure_postable(&account, false)?;
            Some(account)
        } else {
            None
        };

        let transaction_id = TransactionId::new();
        let new_entries = build_entries(
            request,
            context,
            transaction_id,
            &credits,
            &debits,
            &plan,
            control.as_ref(),
        );
        ensure_balanced(&new_entries)?;

        let written = self.entries.apply(new_entries).await?;
        info!(
            transaction_id = %transaction_id,
            office_id = %plan.home_office,
            entries = written.len(),
            interbranch = plan.is_interbranch(),
            "Journal entries posted"
        );

        self.events.publish(PostingEvent::Created {
            transaction_id,
            office_id: Some(plan.home_office),
            kind: EntryKind::Standard,
            entry_count: written.len(),
        });

        Ok(PostingResult {
            transaction_id,
            office_id: Some(plan.home_office),
        })
    }
}

/// A request line after validation and scaling.
#[derive(Debug, Clone)]
struct ScaledLine {
    account_id: AccountId,
    office_id: OfficeId,
    amount: Decimal,
    comments: Option<String>,
}

fn scaled_lines(lines: &[PostingLine], currency: &Currency) -> LedgerResult<Vec<ScaledLine>> {
    lines
        .iter()
        .map(|line| {
            let (Some(account_id), Some(amount)) = (line.account_id, line.amount) else {
                return Err(LedgerError::AccountOrAmountEmpty);
            };
            let amount = currency.scale(amount);
            if amount <= Decimal::ZERO {
                debug!(%account_id, "Amount rounds to zero at currency precision");
                return Err(LedgerError::AccountOrAmountEmpty);
            }
            Ok(ScaledLine {
                account_id,
                office_id: line.office_id,
                amount,
                comments: line.comments.clone(),
            })
        })
        .collect()
}

fn office_amounts(lines: &[ScaledLine]) -> Vec<(OfficeId, Decimal)> {
    lines.iter().map(|line| (line.office_id, line.amount)).collect()
}

fn build_entries(
    request: &PostingRequest,
    context: &PostingContext,
    transaction_id: TransactionId,
    credits: &[ScaledLine],
    debits: &[ScaledLine],
    plan: &SplitPlan,
    control: Option<&LedgerAccount>,
) -> Vec<NewLedgerEntry> {
    let template = NewLedgerEntry {
        office_id: plan.home_office,
        account_id: AccountId(0),
        currency_code: request.currency_code.clone(),
        transaction_id,
        entry_type: EntryType::Debit,
        amount: Decimal::ZERO,
        transaction_date: request.transaction_date,
        manual_entry: request.manual,
        kind: EntryKind::Standard,
        comments: request.comments.clone(),
        reference_number: request.reference_number.clone(),
        reverses_entry_id: None,
        entity: request.entity,
        created_by: context.acting_user,
    };

    let sides = credits
        .iter()
        .map(|line| (line, EntryType::Credit))
        .chain(debits.iter().map(|line| (line, EntryType::Debit)));

    let mut entries = Vec::with_capacity(credits.len() + debits.len() + plan.transfers.len());
    for (line, entry_type) in sides {
        entries.push(NewLedgerEntry {
            office_id: line.office_id,
            account_id: line.account_id,
            entry_type,
            amount: line.amount,
            comments: line.comments.clone().or_else(|| request.comments.clone()),
            ..template.clone()
        });
    }

    // Control lines are system lines even inside a manual posting.
    if let Some(account) = control {
        for transfer in &plan.transfers {
            entries.push(NewLedgerEntry {
                office_id: transfer.office_id,
                account_id: account.id,
                entry_type: transfer.entry_type,
                amount: transfer.amount,
                manual_entry: false,
                kind: EntryKind::InterBranch,
                ..template.clone()
            });
        }
    }

    entries
}
