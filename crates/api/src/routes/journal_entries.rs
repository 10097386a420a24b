//! Journal entry routes: posting, lookup, reversal and reconciliation.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use ledgerline_core::ledger::{
    AccountStore, EntryKind, EntryType, LedgerEntry, LedgerEntryStore, PostingLine,
    PostingRequest,
};
use ledgerline_shared::types::{
    AccountId, AccountingRuleId, CurrencyCode, LedgerEntryId, OfficeId, TransactionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::ledger_error_response;
use crate::{AppState, middleware::ActingUser};

/// Creates the journal entry routes.
pub fn routes<A, L>() -> Router<AppState<A, L>>
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    Router::new()
        .route("/journal-entries", post(create_journal_entry::<A, L>))
        .route("/journal-entries/{transaction_id}", get(get_journal_entry::<A, L>))
        .route(
            "/journal-entries/{transaction_id}/reversal",
            post(reverse_journal_entry::<A, L>),
        )
        .route(
            "/journal-entries/{transaction_id}/reconciliation",
            post(reconcile_journal_entry::<A, L>),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for posting a journal entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJournalEntryRequest {
    /// Currency of every line.
    pub currency_code: CurrencyCode,
    /// Business date (YYYY-MM-DD).
    pub transaction_date: NaiveDate,
    /// Optional comment.
    #[serde(default)]
    pub comments: Option<String>,
    /// Optional external reference.
    #[serde(default)]
    pub reference_number: Option<String>,
    /// Optional accounting rule.
    #[serde(default)]
    pub accounting_rule_id: Option<AccountingRuleId>,
    /// Credit lines.
    #[serde(default)]
    pub credits: Vec<PostingLine>,
    /// Debit lines.
    #[serde(default)]
    pub debits: Vec<PostingLine>,
}

impl From<CreateJournalEntryRequest> for PostingRequest {
    fn from(request: CreateJournalEntryRequest) -> Self {
        Self {
            currency_code: request.currency_code,
            transaction_date: request.transaction_date,
            comments: request.comments,
            reference_number: request.reference_number,
            accounting_rule_id: request.accounting_rule_id,
            credits: request.credits,
            debits: request.debits,
            entity: None,
            manual: true,
        }
    }
}

/// Request body for a reversal.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseJournalEntryRequest {
    /// Comment for the mirror entries.
    #[serde(default)]
    pub comments: Option<String>,
}

/// Response for a single ledger entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    /// Entry ID.
    pub id: LedgerEntryId,
    /// Office ID.
    pub office_id: OfficeId,
    /// GL account ID.
    pub gl_account_id: AccountId,
    /// Currency code.
    pub currency_code: CurrencyCode,
    /// Entry type.
    pub entry_type: EntryType,
    /// Amount.
    pub amount: Decimal,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Entered by hand.
    pub manual_entry: bool,
    /// Origin of the entry.
    pub kind: EntryKind,
    /// Comment.
    pub comments: Option<String>,
    /// External reference.
    pub reference_number: Option<String>,
    /// Reversed flag.
    pub reversed: bool,
    /// Reconciled flag.
    pub reconciled: bool,
    /// Office running balance, once calculated.
    pub office_running_balance: Option<Decimal>,
    /// Organization running balance, once calculated.
    pub organization_running_balance: Option<Decimal>,
}

impl From<LedgerEntry> for EntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            office_id: entry.office_id,
            gl_account_id: entry.account_id,
            currency_code: entry.currency_code,
            entry_type: entry.entry_type,
            amount: entry.amount,
            transaction_date: entry.transaction_date,
            manual_entry: entry.manual_entry,
            kind: entry.kind,
            comments: entry.comments,
            reference_number: entry.reference_number,
            reversed: entry.reversed,
            reconciled: entry.reconciled,
            office_running_balance: entry.office_running_balance,
            organization_running_balance: entry.organization_running_balance,
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/journal-entries` - Post a balanced transaction group.
async fn create_journal_entry<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    user: ActingUser,
    Json(payload): Json<CreateJournalEntryRequest>,
) -> impl IntoResponse {
    let request = PostingRequest::from(payload);
    match state.services.poster.post(&request, &user.context()).await {
        Ok(result) => (StatusCode::CREATED, Json(result)).into_response(),
        Err(e) => {
            info!(error_code = e.error_code(), "Journal entry rejected");
            ledger_error_response(e)
        }
    }
}

/// GET `/journal-entries/{transaction_id}` - Every entry of a group.
async fn get_journal_entry<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    Path(transaction_id): Path<TransactionId>,
) -> impl IntoResponse {
    match state.services.transaction(transaction_id).await {
        Ok(entries) => {
            let entries: Vec<EntryResponse> = entries.into_iter().map(EntryResponse::from).collect();
            (
                StatusCode::OK,
                Json(json!({
                    "transactionId": transaction_id,
                    "entries": entries
                })),
            )
                .into_response()
        }
        Err(e) => ledger_error_response(e),
    }
}

/// POST `/journal-entries/{transaction_id}/reversal` - Reverse a group.
async fn reverse_journal_entry<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    user: ActingUser,
    Path(transaction_id): Path<TransactionId>,
    Json(payload): Json<ReverseJournalEntryRequest>,
) -> impl IntoResponse {
    match state
        .services
        .reversals
        .reverse(transaction_id, payload.comments.as_deref(), &user.context())
        .await
    {
        Ok(reversal) => (
            StatusCode::CREATED,
            Json(json!({ "reversalTransactionId": reversal })),
        )
            .into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// POST `/journal-entries/{transaction_id}/reconciliation` - Flag a group reconciled.
async fn reconcile_journal_entry<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    Path(transaction_id): Path<TransactionId>,
) -> impl IntoResponse {
    match state.services.reconciliation.reconcile(transaction_id).await {
        Ok(count) => (
            StatusCode::OK,
            Json(json!({
                "transactionId": transaction_id,
                "entriesReconciled": count
            })),
        )
            .into_response(),
        Err(e) => ledger_error_response(e),
    }
}
