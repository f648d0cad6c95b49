pub mod api;
pub mod parser;
pub mod reverse;
pub mod store;

pub use api::{AppState, MAX_SCAN_LIMIT};
pub use parser::{LineParser, ParseError, ParsedLine};
pub use reverse::{ReverseLines, READ_BLOCK_SIZE};
pub use store::{BackwardScan, LogfileStore, ScanError};

use crate::catalog::LOGFILES_ENDPOINT;
use crate::config::types::ServerConfig;
use crate::query::SCAN_ENDPOINT;
use axum::{routing::get, Router};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind or serve: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Routes for the catalog and scan endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health_check))
        .route(LOGFILES_ENDPOINT, get(api::list_logfiles))
        .route(SCAN_ENDPOINT, get(api::scan_logfile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve scans until `shutdown_rx` turns true
pub async fn run_server(
    config: &ServerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let store = LogfileStore::from_config(config)?;
    if store.is_empty() {
        tracing::warn!("No logfiles configured; the catalog will be empty");
    }

    let state = AppState {
        store: Arc::new(store),
        batch_size: config.batch_size,
    };

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    tracing::info!(
        addr = %config.listen,
        logfiles = state.store.len(),
        "Scan server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            tracing::info!("Scan server shutting down gracefully");
        })
        .await?;

    Ok(())
}
