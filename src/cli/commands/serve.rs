use std::sync::Arc;

use anyhow::Context;
use blueprint_engine::DesignService;
use blueprint_store::{AllowAll, OwnerRegistry, ProjectAccess};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::Config;

/// `blueprint serve`: run until Ctrl-C or SIGTERM, then drain running jobs.
pub(crate) async fn serve(config: &Config, require_user: bool) -> anyhow::Result<()> {
    let access: Arc<dyn ProjectAccess> = if require_user {
        Arc::new(OwnerRegistry::new())
    } else {
        Arc::new(AllowAll)
    };
    let service = Arc::new(DesignService::from_config(config, access)?);
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    blueprint_server::serve(listener, service.clone(), shutdown_signal()).await?;

    match Arc::try_unwrap(service) {
        Ok(service) => {
            info!("Waiting for running jobs");
            service.shutdown().await;
        }
        Err(_) => warn!("Design service still shared at exit; running jobs are abandoned"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
