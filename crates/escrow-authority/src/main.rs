//! Escrow Authority Binary
//!
//! Runs the HTTP server that registers nodes and escrows their disk keys.

use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use escrow_authority::{create_router, storage, AppState, AuthorityConfig, AuthorityService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AuthorityConfig::from_env()?;

    // Initialize logging
    let log_level = config.log_level.parse().unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize storage
    let store = storage::connect(config.database_url.as_deref())
        .await
        .inspect_err(|e| error!(error = %e, "Failed to open credential store"))?;

    let mut service = AuthorityService::new(store).with_policy(config.key_policy);
    if let Some(path) = &config.payload_path {
        service = service.with_payload_path(path);
    }

    info!(
        storage = config.storage_kind(),
        key_policy = %config.key_policy,
        payload = ?config.payload_path,
        "Starting escrow authority"
    );

    let addr = config.listen_addr();
    let state = Arc::new(AppState { service, config });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "Escrow authority listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Escrow authority stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
