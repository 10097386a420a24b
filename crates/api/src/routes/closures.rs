//! Accounting closure routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};
use chrono::NaiveDate;
use ledgerline_core::ledger::{AccountStore, AccountingClosure, LedgerEntryStore};
use ledgerline_shared::types::{ClosureId, OfficeId};
use serde::{Deserialize, Serialize};

use super::ledger_error_response;
use crate::{AppState, middleware::ActingUser};

/// Creates the closure routes.
pub fn routes<A, L>() -> Router<AppState<A, L>>
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    Router::new()
        .route("/offices/{office_id}/closures", post(create_closure::<A, L>))
        .route(
            "/offices/{office_id}/closures/latest",
            delete(delete_latest_closure::<A, L>),
        )
}

/// Request body for closing an office's books.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClosureRequest {
    /// Closing date (YYYY-MM-DD).
    pub closing_date: NaiveDate,
    /// Optional comment.
    #[serde(default)]
    pub comments: Option<String>,
}

/// Response for a closure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureResponse {
    /// Closure ID.
    pub id: ClosureId,
    /// Office ID.
    pub office_id: OfficeId,
    /// Closing date.
    pub closing_date: NaiveDate,
    /// Comment.
    pub comments: Option<String>,
    /// Created at timestamp.
    pub created_at: String,
}

impl From<AccountingClosure> for ClosureResponse {
    fn from(closure: AccountingClosure) -> Self {
        Self {
            id: closure.id,
            office_id: closure.office_id,
            closing_date: closure.closing_date,
            comments: closure.comments,
            created_at: closure.created_at.to_rfc3339(),
        }
    }
}

/// POST `/offices/{office_id}/closures` - Close an office up to a date.
async fn create_closure<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    user: ActingUser,
    Path(office_id): Path<OfficeId>,
    Json(payload): Json<CreateClosureRequest>,
) -> impl IntoResponse {
    let context = user.context();
    match state
        .services
        .closures
        .create(
            office_id,
            payload.closing_date,
            payload.comments,
            context.acting_user,
            context.today,
        )
        .await
    {
        Ok(closure) => (StatusCode::CREATED, Json(ClosureResponse::from(closure))).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// DELETE `/offices/{office_id}/closures/latest` - Reopen the latest closed period.
async fn delete_latest_closure<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    Path(office_id): Path<OfficeId>,
) -> impl IntoResponse {
    match state.services.closures.delete_latest(office_id).await {
        Ok(closure) => (StatusCode::OK, Json(ClosureResponse::from(closure))).into_response(),
        Err(e) => ledger_error_response(e),
    }
}
