//! Ledgerline API Server
//!
//! Main entry point for the ledger engine service.

mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerline_api::{AppState, create_router};
use ledgerline_core::ledger::{LedgerServices, PostingEventBus, RunningBalanceSettings};
use ledgerline_db::{AccountRepository, LedgerRepository, connect_with};
use ledgerline_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect_with(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    // Wire the ledger services
    let events = PostingEventBus::new(config.ledger.event_channel_capacity);
    let services = LedgerServices::new(
        Arc::new(AccountRepository::new(db.clone())),
        Arc::new(LedgerRepository::new(db)),
        RunningBalanceSettings::from(&config.ledger),
        events,
    );
    let state = AppState::new(services);

    // Start the running-balance scheduler
    let interval = Duration::from_secs(config.ledger.schedule_interval_secs.max(1));
    tokio::spawn(scheduler::run(state.clone(), interval));
    info!(
        interval_secs = interval.as_secs(),
        "Running balance scheduler started"
    );

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
