//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes over the ledger services
//! - Acting-user middleware
//! - Error mapping to JSON responses
//! - The serialized running-balance job entry point

pub mod middleware;
pub mod routes;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::Router;
use ledgerline_core::ledger::{
    AccountStore, LedgerEntryStore, LedgerResult, LedgerServices, RunningBalanceReport,
};
use ledgerline_shared::types::OfficeId;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
pub struct AppState<A, L> {
    /// Ledger services over the configured stores.
    pub services: LedgerServices<A, L>,
    /// Held while the running-balance job runs.
    job_lock: Arc<Mutex<()>>,
}

impl<A, L> Clone for AppState<A, L> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            job_lock: Arc::clone(&self.job_lock),
        }
    }
}

impl<A: AccountStore, L: LedgerEntryStore> AppState<A, L> {
    /// Creates the state around a set of ledger services.
    pub fn new(services: LedgerServices<A, L>) -> Self {
        Self {
            services,
            job_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Runs the running-balance job, one run at a time.
    ///
    /// Callers queue on the lock; API triggers, the interval scheduler and
    /// event-driven runs all go through here.
    pub async fn run_running_balance(
        &self,
        office: Option<OfficeId>,
    ) -> LedgerResult<RunningBalanceReport> {
        let _guard = self.job_lock.lock().await;
        self.services.running_balances.run(office).await
    }
}

/// Creates the main application router.
pub fn create_router<A, L>(state: AppState<A, L>) -> Router
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
