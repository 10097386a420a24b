//! Opening balance routes.

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use ledgerline_core::ledger::{AccountStore, LedgerEntryStore, OpeningBalanceRequest};
use tracing::info;

use super::ledger_error_response;
use crate::{AppState, middleware::ActingUser};

/// Creates the opening balance routes.
pub fn routes<A, L>() -> Router<AppState<A, L>>
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    Router::new().route("/opening-balances", post(define_opening_balances::<A, L>))
}

/// POST `/opening-balances` - Define (or redefine) an office's opening balances.
async fn define_opening_balances<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    user: ActingUser,
    Json(payload): Json<OpeningBalanceRequest>,
) -> impl IntoResponse {
    match state
        .services
        .opening_balances
        .define(&payload, &user.context())
        .await
    {
        Ok(result) => (StatusCode::CREATED, Json(result)).into_response(),
        Err(e) => {
            info!(
                office_id = %payload.office_id,
                error_code = e.error_code(),
                "Opening balances rejected"
            );
            ledger_error_response(e)
        }
    }
}
