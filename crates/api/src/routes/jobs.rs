//! Batch job triggers.

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use ledgerline_core::ledger::{AccountStore, LedgerEntryStore};
use ledgerline_shared::types::OfficeId;
use serde::Deserialize;
use tracing::info;

use super::ledger_error_response;
use crate::AppState;

/// Creates the job routes.
pub fn routes<A, L>() -> Router<AppState<A, L>>
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    Router::new().route("/jobs/running-balance", post(run_running_balance::<A, L>))
}

/// Request body for a running-balance run.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningBalanceJobRequest {
    /// Restrict the run to one office.
    #[serde(default)]
    pub office_id: Option<OfficeId>,
}

/// POST `/jobs/running-balance` - Run the running-balance job now.
///
/// Waits for any run already in progress.
async fn run_running_balance<A: AccountStore, L: LedgerEntryStore>(
    State(state): State<AppState<A, L>>,
    Json(payload): Json<RunningBalanceJobRequest>,
) -> impl IntoResponse {
    match state.run_running_balance(payload.office_id).await {
        Ok(report) => {
            info!(
                office_id = ?payload.office_id,
                entries_updated = report.entries_updated,
                "Running balance job triggered"
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => ledger_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{CASH, FEES, HEAD_OFFICE, app, send, state};

    #[tokio::test]
    async fn test_job_computes_then_settles() {
        let state = state();
        for (date, amount) in [("2024-03-01", "100"), ("2024-03-02", "5")] {
            let (status, _) = send(
                app(&state),
                "POST",
                "/api/v1/journal-entries",
                Some(json!({
                    "currencyCode": "USD",
                    "transactionDate": date,
                    "credits": [{ "glAccountId": FEES, "amount": amount, "officeId": HEAD_OFFICE }],
                    "debits": [{ "glAccountId": CASH, "amount": amount, "officeId": HEAD_OFFICE }]
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, report) =
            send(app(&state), "POST", "/api/v1/jobs/running-balance", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["entriesUpdated"], 4);
        assert_eq!(report["hitIterationBound"], false);

        let (_, report) =
            send(app(&state), "POST", "/api/v1/jobs/running-balance", Some(json!({}))).await;
        assert_eq!(report["entriesUpdated"], 0);
    }

    #[tokio::test]
    async fn test_office_run_is_accepted() {
        let state = state();
        let (status, report) = send(
            app(&state),
            "POST",
            "/api/v1/jobs/running-balance",
            Some(json!({ "officeId": HEAD_OFFICE })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["entriesUpdated"], 0);
    }
}
