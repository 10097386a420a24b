//! Acting-user middleware for ledger commands.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user's id in a header and every posting records it as `created_by`.

use axum::{
    Json,
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ledgerline_core::ledger::PostingContext;
use ledgerline_shared::types::UserId;
use serde_json::json;

/// Header carrying the acting user's id.
pub const ACTING_USER_HEADER: &str = "x-user-id";

/// Resolves the acting user from [`ACTING_USER_HEADER`].
///
/// Stores an [`ActingUser`] in request extensions for handlers to access.
pub async fn acting_user_middleware(mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(ACTING_USER_HEADER)
        .and_then(|h| h.to_str().ok());

    let Some(raw) = header else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "missing_user",
                "message": "X-User-Id header is required"
            })),
        )
            .into_response();
    };

    match raw.trim().parse::<UserId>() {
        Ok(user) => {
            request.extensions_mut().insert(ActingUser(user));
            next.run(request).await
        }
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "invalid_user",
                "message": "X-User-Id must be a numeric user id"
            })),
        )
            .into_response(),
    }
}

/// Extractor for the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

impl ActingUser {
    /// Posting context for this user dated today.
    #[must_use]
    pub fn context(self) -> PostingContext {
        PostingContext::now(self.0)
    }
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().copied().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "unauthorized",
                    "message": "Acting user required"
                })),
            )
        })
    }
}
