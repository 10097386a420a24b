//! Accounting bridge for portfolio subsystems.
//!
//! Loan, savings and client subsystems describe their new monetary
//! transactions as a JSON payload. The bridge turns each one into a
//! system posting linked to the originating transaction, or reverses the
//! postings linked to it when the portfolio transaction was reversed.

use std::sync::Arc;

use chrono::NaiveDate;
use ledgerline_shared::types::{AccountId, CurrencyCode, OfficeId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::entry::{EntityLink, EntityType};
use super::error::{LedgerError, LedgerResult};
use super::poster::JournalPoster;
use super::reversal::ReversalEngine;
use super::store::{AccountStore, LedgerEntryStore};
use super::types::{PostingContext, PostingLine, PostingRequest};

/// Payload sent by a portfolio subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgePayload {
    /// Office of the portfolio account.
    pub office_id: OfficeId,
    /// Currency of the portfolio account.
    pub currency_code: CurrencyCode,
    /// Portfolio subsystem.
    pub entity_type: EntityType,
    /// Portfolio account (loan, savings account or client).
    pub entity_id: i64,
    /// Cash accounting is enabled for the product.
    pub cash_based_accounting_enabled: bool,
    /// Upfront accrual accounting is enabled for the product.
    pub accrual_based_accounting_enabled: bool,
    /// Periodic accrual accounting is enabled for the product.
    #[serde(default)]
    pub periodic_accrual_based_accounting_enabled: bool,
    /// Transactions to book.
    pub new_transactions: Vec<BridgeTransaction>,
}

impl BridgePayload {
    /// Parses a payload.
    ///
    /// # Errors
    ///
    /// `BridgePayloadInvalid` for missing or unknown keys and bad values.
    pub fn parse(value: serde_json::Value) -> LedgerResult<Self> {
        serde_json::from_value(value).map_err(|err| LedgerError::BridgePayloadInvalid(err.to_string()))
    }

    fn accounting_enabled(&self) -> bool {
        self.cash_based_accounting_enabled || self.accrual_enabled()
    }

    fn accrual_enabled(&self) -> bool {
        self.accrual_based_accounting_enabled || self.periodic_accrual_based_accounting_enabled
    }
}

/// One portfolio transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgeTransaction {
    /// Portfolio transaction id.
    pub id: i64,
    /// Business date.
    pub date: NaiveDate,
    /// The portfolio transaction was reversed.
    #[serde(default)]
    pub reversed: bool,
    /// Debit/credit pairs to book.
    #[serde(default)]
    pub postings: Vec<BridgePosting>,
}

/// One debit/credit pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgePosting {
    /// Account debited.
    pub debit_account_id: AccountId,
    /// Account credited.
    pub credit_account_id: AccountId,
    /// Amount.
    pub amount: Decimal,
    /// Only booked under accrual accounting.
    #[serde(default)]
    pub accrual: bool,
}

/// What the bridge did with a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOutcome {
    /// Groups posted.
    pub posted: Vec<TransactionId>,
    /// Reversal groups written.
    pub reversed: Vec<TransactionId>,
    /// Portfolio transactions skipped (nothing to book or already booked).
    pub skipped: usize,
}

/// Books portfolio transactions.
pub struct AccountingBridge<A, L> {
    entries: Arc<L>,
    poster: JournalPoster<A, L>,
    reversals: ReversalEngine<A, L>,
}

impl<A, L> Clone for AccountingBridge<A, L> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            poster: self.poster.clone(),
            reversals: self.reversals.clone(),
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> AccountingBridge<A, L> {
    /// Creates a new bridge.
    pub fn new(
        entries: Arc<L>,
        poster: JournalPoster<A, L>,
        reversals: ReversalEngine<A, L>,
    ) -> Self {
        Self {
            entries,
            poster,
            reversals,
        }
    }

    /// Processes a raw JSON payload.
    ///
    /// Each portfolio transaction is booked in its own write; a failure
    /// stops processing and leaves earlier transactions booked. Booking an
    /// already booked transaction is a no-op, so the payload can be resent.
    pub async fn process(
        &self,
        payload: serde_json::Value,
        context: &PostingContext,
    ) -> LedgerResult<BridgeOutcome> {
        let payload = BridgePayload::parse(payload)?;
        self.process_payload(&payload, context).await
    }

    /// Processes a parsed payload.
    pub async fn process_payload(
        &self,
        payload: &BridgePayload,
        context: &PostingContext,
    ) -> LedgerResult<BridgeOutcome> {
        let mut outcome = BridgeOutcome::default();
        if !payload.accounting_enabled() {
            debug!(
                entity_type = payload.entity_type.as_str(),
                entity_id = payload.entity_id,
                "Accounting disabled for portfolio account, nothing to book"
            );
            outcome.skipped = payload.new_transactions.len();
            return Ok(outcome);
        }

        for transaction in &payload.new_transactions {
            let link = EntityLink {
                entity_type: payload.entity_type,
                entity_id: transaction.id,
            };
            let existing = self.entries.transactions_for_entity(link).await?;

            if transaction.reversed {
                let comment = format!(
                    "Reversal of {} transaction {}",
                    payload.entity_type.as_str(),
                    transaction.id
                );
                let reversals = self
                    .reversals
                    .reverse_all(&existing, Some(&comment), context)
                    .await?;
                if reversals.is_empty() {
                    outcome.skipped += 1;
                }
                outcome.reversed.extend(reversals);
                continue;
            }

            if !existing.is_empty() {
                outcome.skipped += 1;
                continue;
            }
            let Some(request) = posting_request(payload, transaction, link) else {
                outcome.skipped += 1;
                continue;
            };
            let result = self.poster.post(&request, context).await?;
            outcome.posted.push(result.transaction_id);
        }

        info!(
            entity_type = payload.entity_type.as_str(),
            entity_id = payload.entity_id,
            posted = outcome.posted.len(),
            reversed = outcome.reversed.len(),
            skipped = outcome.skipped,
            "Accounting bridge payload processed"
        );
        Ok(outcome)
    }
}

fn posting_request(
    payload: &BridgePayload,
    transaction: &BridgeTransaction,
    link: EntityLink,
) -> Option<PostingRequest> {
    let accrual_enabled = payload.accrual_enabled();
    let postings: Vec<&BridgePosting> = transaction
        .postings
        .iter()
        .filter(|posting| accrual_enabled || !posting.accrual)
        .collect();
    if postings.is_empty() {
        return None;
    }

    let line = |account_id: AccountId, amount: Decimal| PostingLine {
        account_id: Some(account_id),
        amount: Some(amount),
        office_id: payload.office_id,
        comments: None,
    };

    Some(PostingRequest {
        currency_code: payload.currency_code.clone(),
        transaction_date: transaction.date,
        comments: Some(format!(
            "{} {} transaction {}",
            payload.entity_type.as_str(),
            payload.entity_id,
            transaction.id
        )),
        reference_number: Some(transaction.id.to_string()),
        accounting_rule_id: None,
        credits: postings
            .iter()
            .map(|p| line(p.credit_account_id, p.amount))
            .collect(),
        debits: postings
            .iter()
            .map(|p| line(p.debit_account_id, p.amount))
            .collect(),
        entity: Some(link),
        manual: false,
    })
}
