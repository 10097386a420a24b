//! Accounting bridge route for portfolio subsystems.

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use ledgerline_core::ledger::{AccountStore, LedgerEntryStore};
use tracing::info;

use super::ledger_error_response;
use crate::{AppState, middleware::ActingUser};

/// Creates the accounting bridge routes.
pub fn routes<A, L>() -> Router<AppState<A, L>>
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    Router::new().route("/accounting-bridge", post(process_bridge_payload::<A, L>))
}

/// POST `/accounting-bridge` - Book a portfolio subsystem's transactions.
///
/// The payload is validated by the bridge itself so that unknown keys are
/// reported as `BRIDGE_PAYLOAD_INVALID` rather than a generic JSON error.
async fn process_bridge_payload<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    user: ActingUser,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match state.services.bridge.process(payload, &user.context()).await {
        Ok(outcome) => {
            info!(
                posted = outcome.posted.len(),
                reversed = outcome.reversed.len(),
                skipped = outcome.skipped,
                "Bridge payload processed"
            );
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => ledger_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::test_support::{CASH, FEES, HEAD_OFFICE, LOANS, app, send, state};

    fn payload(reversed: bool) -> Value {
        json!({
            "officeId": HEAD_OFFICE,
            "currencyCode": "USD",
            "entityType": "loan",
            "entityId": 42,
            "cashBasedAccountingEnabled": true,
            "accrualBasedAccountingEnabled": false,
            "periodicAccrualBasedAccountingEnabled": false,
            "newTransactions": [{
                "id": 1001,
                "date": "2024-03-10",
                "reversed": reversed,
                "postings": [
                    { "debitAccountId": LOANS, "creditAccountId": CASH, "amount": "250.00" },
                    {
                        "debitAccountId": LOANS,
                        "creditAccountId": FEES,
                        "amount": "5.00",
                        "accrual": true
                    }
                ]
            }]
        })
    }

    #[tokio::test]
    async fn test_post_then_reverse_through_bridge() {
        let state = state();

        let (status, body) = send(
            app(&state),
            "POST",
            "/api/v1/accounting-bridge",
            Some(payload(false)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["posted"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            app(&state),
            "POST",
            "/api/v1/accounting-bridge",
            Some(payload(true)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reversed"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let state = state();
        let mut body = payload(false);
        body["shareAccountId"] = json!(3);

        let (status, body) =
            send(app(&state), "POST", "/api/v1/accounting-bridge", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BRIDGE_PAYLOAD_INVALID");
    }
}
