//! API route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
};
use ledgerline_core::ledger::{AccountStore, LedgerEntryStore, LedgerError};
use ledgerline_shared::AppError;
use serde_json::json;
use tracing::error;

use crate::{AppState, middleware::acting_user_middleware};

pub mod bridge;
pub mod closures;
pub mod health;
pub mod jobs;
pub mod journal_entries;
pub mod opening_balances;
pub mod provisioning;

/// Creates the API router with all routes.
///
/// Everything except the health check requires an acting user.
pub fn api_routes<A, L>() -> Router<AppState<A, L>>
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    let ledger_routes = Router::new()
        .merge(journal_entries::routes())
        .merge(opening_balances::routes())
        .merge(provisioning::routes())
        .merge(bridge::routes())
        .merge(closures::routes())
        .merge(jobs::routes())
        .layer(middleware::from_fn(acting_user_middleware));

    Router::new().merge(health::routes()).merge(ledger_routes)
}

/// Maps ledger errors to HTTP responses.
///
/// Storage details are logged and replaced by a generic message.
pub(crate) fn ledger_error_response(e: LedgerError) -> Response {
    if let LedgerError::Storage(detail) = &e {
        error!(error = %detail, "Ledger storage failure");
    }
    let status =
        StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let app = AppError::from(e);
    (
        status,
        Json(json!({
            "error": app.error_code(),
            "message": app.to_string()
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use ledgerline_shared::types::{AccountId, OfficeId};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(LedgerError::NoDebitsOrCredits, StatusCode::BAD_REQUEST, "NO_DEBITS_OR_CREDITS")]
    #[case(
        LedgerError::OfficeNotFound(OfficeId(4)),
        StatusCode::NOT_FOUND,
        "OFFICE_NOT_FOUND"
    )]
    #[case(
        LedgerError::AccountDisabled(AccountId(3)),
        StatusCode::UNPROCESSABLE_ENTITY,
        "ACCOUNT_DISABLED"
    )]
    #[tokio::test]
    async fn test_error_body_carries_code(
        #[case] err: LedgerError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        let response = ledger_error_response(err);
        assert_eq!(response.status(), status);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], code);
    }

    #[tokio::test]
    async fn test_storage_details_are_not_exposed() {
        let response = ledger_error_response(LedgerError::Storage(
            "relation ledger_entries does not exist".into(),
        ));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "LEDGER_INTEGRITY");
        assert!(!json["message"].as_str().unwrap().contains("relation"));
    }
}
