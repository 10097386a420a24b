//! Running-balance scheduler.
//!
//! Runs the job on a fixed interval and whenever a group is posted or
//! reversed. Runs go through [`AppState::run_running_balance`], so they never
//! overlap with each other or with API-triggered runs.

use std::time::Duration;

use ledgerline_api::AppState;
use ledgerline_core::ledger::{AccountStore, LedgerEntryStore, PostingEventKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// Drives the job until the event bus closes.
pub async fn run<A, L>(state: AppState<A, L>, period: Duration)
where
    A: AccountStore + 'static,
    L: LedgerEntryStore + 'static,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events = state
        .services
        .events
        .subscribe(&[PostingEventKind::Created, PostingEventKind::Reversed]);

    loop {
        let trigger = tokio::select! {
            _ = ticker.tick() => "interval",
            event = events.recv() => match event {
                Ok(event) => {
                    debug!(?event, "Posting event received");
                    "event"
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Scheduler fell behind posting events");
                    "event"
                }
                Err(RecvError::Closed) => {
                    info!("Posting event bus closed, scheduler stopping");
                    return;
                }
            },
        };
        run_once(&state, trigger).await;
    }
}

async fn run_once<A: AccountStore, L: LedgerEntryStore>(state: &AppState<A, L>, trigger: &str) {
    match state.run_running_balance(None).await {
        Ok(report) if report.entries_updated == 0 && report.derived_accounts_updated == 0 => {
            debug!(trigger, "No running balances to compute");
        }
        Ok(report) => {
            if report.hit_iteration_bound {
                warn!(
                    trigger,
                    pages = report.pages,
                    "Running balance job stopped at its iteration bound"
                );
            }
            info!(
                trigger,
                entries_updated = report.entries_updated,
                derived_accounts_updated = report.derived_accounts_updated,
                "Running balances computed"
            );
        }
        Err(e) => error!(trigger, error = %e, "Running balance job failed"),
    }
}
