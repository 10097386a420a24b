//! Loan loss provisioning routes.

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use ledgerline_core::ledger::{AccountStore, LedgerEntryStore, ProvisioningRun};
use serde_json::json;

use super::ledger_error_response;
use crate::{AppState, middleware::ActingUser};

/// Creates the provisioning routes.
pub fn routes<A, L>() -> Router<AppState<A, L>>
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    Router::new().route("/provisioning-runs", post(post_provisioning_run::<A, L>))
}

/// POST `/provisioning-runs` - Book a provisioning run.
///
/// Posting the same run id again replaces the earlier booking.
async fn post_provisioning_run<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    user: ActingUser,
    Json(payload): Json<ProvisioningRun>,
) -> impl IntoResponse {
    match state
        .services
        .provisioning
        .post(&payload, &user.context())
        .await
    {
        Ok(transaction_id) => (
            StatusCode::CREATED,
            Json(json!({ "transactionId": transaction_id })),
        )
            .into_response(),
        Err(e) => ledger_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use ledgerline_shared::types::ProvisioningRunId;
    use serde_json::{Value, json};

    use crate::test_support::{HEAD_OFFICE, PROVISION_EXPENSE, RESERVE, app, send, state};

    fn run(run_id: ProvisioningRunId, amounts: &[&str]) -> Value {
        let lines: Vec<Value> = amounts
            .iter()
            .map(|amount| {
                json!({
                    "officeId": HEAD_OFFICE,
                    "currencyCode": "USD",
                    "liabilityAccountId": RESERVE,
                    "expenseAccountId": PROVISION_EXPENSE,
                    "reserveAmount": amount
                })
            })
            .collect();
        json!({ "runId": run_id, "date": "2024-03-31", "lines": lines })
    }

    #[tokio::test]
    async fn test_run_id_becomes_transaction_id() {
        let state = state();
        let run_id = ProvisioningRunId::new();

        let (status, body) = send(
            app(&state),
            "POST",
            "/api/v1/provisioning-runs",
            Some(run(run_id, &["100.25", "50.50"])),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["transactionId"], run_id.to_string());

        let (_, group) = send(
            app(&state),
            "GET",
            &format!("/api/v1/journal-entries/{run_id}"),
            None,
        )
        .await;
        let entries = group["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e["amount"] == "150.75"));
    }

    #[tokio::test]
    async fn test_all_zero_run_is_rejected() {
        let state = state();
        let (status, _) = send(
            app(&state),
            "POST",
            "/api/v1/provisioning-runs",
            Some(run(ProvisioningRunId::new(), &["0"])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
