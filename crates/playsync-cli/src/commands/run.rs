use crate::output::Output;
use color_eyre::Result;
use playsync_config::{CredentialStore, PathManager};
use playsync_core::SyncOrchestrator;
use playsync_sources::{create_remote_history, ReqwestTransport, ResilientClient, ServerFactoryRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn run(paths: &PathManager, output: &Output) -> Result<()> {
    let config = super::load_config(paths)?;
    if !config.scrobbling_enabled() {
        info!(operation = "run", "Scrobbling is disabled (interval = 0)");
        output.warn("Scrobbling is disabled: the global interval is 0");
        return Ok(());
    }

    let credentials_file = paths.credentials_file();
    let mut credentials = CredentialStore::new(credentials_file.clone());
    credentials.load().map_err(|e| {
        color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e)
    })?;

    let cancel = CancellationToken::new();
    let transport = Arc::new(ReqwestTransport::new()?);
    let client = ResilientClient::from_config(transport, &config.request).with_cancellation(cancel.clone());

    let registry = ServerFactoryRegistry::new();
    registry
        .validate_all_configs(&config)
        .map_err(|e| color_eyre::eyre::eyre!("Configuration validation failed: {}", e))?;
    let servers = registry
        .create_all_servers(&config, &client)
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create servers: {}", e))?;
    let remote = create_remote_history(&config, &credentials, &client);

    let mut orchestrator = SyncOrchestrator::new(&config, &servers, remote);
    if orchestrator.workers().is_empty() {
        return Err(color_eyre::eyre::eyre!("No valid sync group to run"));
    }

    orchestrator.start(&cancel);
    output.success(format!(
        "Syncing {} group(s), press Ctrl+C to stop",
        orchestrator.workers().len()
    ));

    shutdown_signal().await;
    info!(operation = "shutdown", "Shutdown signal received");

    cancel.cancel();
    orchestrator.stop();
    orchestrator.join().await;

    output.success("Stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
