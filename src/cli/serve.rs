use super::CliError;
use crate::config::load_or_default;
use crate::server::run_server;
use std::path::Path;
use tokio::sync::watch;

/// Run the scan server until interrupted
pub async fn serve(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_or_default(config_path)?;
    let server = config.server.ok_or(CliError::NoServerSection)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received interrupt, stopping");
            let _ = shutdown_tx.send(true);
        }
    });

    run_server(&server, shutdown_rx).await?;
    Ok(())
}
