//! HTTP server lifecycle

use std::sync::Arc;
use tracing::{error, info};

use multiauth_api::{create_router, AppState};
use multiauth_core::{Config, MultiProviderDispatcher};

pub struct LoginServer {
    config: Config,
    dispatcher: Arc<MultiProviderDispatcher>,
}

impl LoginServer {
    pub const fn new(config: Config, dispatcher: Arc<MultiProviderDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Serve HTTP until SIGTERM or Ctrl+C, then drain in-flight requests
    pub async fn run(self) -> anyhow::Result<()> {
        let state = AppState::new(&self.config, self.dispatcher)?;
        let router = create_router(state)?;

        let http_address = self.config.http_address();
        let http_addr: std::net::SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;

        info!("HTTP server listening on {}", http_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
