//! Proxy server: listener, startup banner, graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::forward::Forwarder;
use super::router::{create_router, AppState};
use crate::config::Config;
use crate::tenant::TenantStore;
use crate::{Error, Result};

/// The auth proxy server.
pub struct AuthProxy {
    config: Config,
    tenants: Arc<dyn TenantStore>,
}

impl AuthProxy {
    /// Assemble the proxy from configuration and a tenant registry.
    #[must_use]
    pub fn new(config: Config, tenants: Arc<dyn TenantStore>) -> Self {
        Self { config, tenants }
    }

    /// Run until a shutdown signal, then drain in-flight requests for up to
    /// `server.shutdown_timeout` before aborting.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let multi_tenant = self.tenants.admin().is_some();
        let state = Arc::new(AppState {
            tenants: Arc::clone(&self.tenants),
            forwarder: Forwarder::new(self.config.lrs.timeout)?,
            admin_token: self.config.admin.bearer_token.clone(),
            max_body_size: self.config.server.max_body_size,
        });

        let app = create_router(state);
        let listener = TcpListener::bind(addr).await?;

        info!(
            version = env!("CARGO_PKG_VERSION"),
            host = %self.config.server.host,
            port = self.config.server.port,
            multi_tenant,
            "Listening"
        );

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
        let graceful =
            axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));
        let mut server = tokio::spawn(async move { graceful.await });

        tokio::select! {
            // Listener died on its own (fatal); surface the error.
            res = &mut server => {
                res.map_err(|e| Error::Internal(e.to_string()))?
                    .map_err(|e| Error::Internal(e.to_string()))?;
            }
            _ = shutdown_rx.recv() => {
                info!("Shutting down server...");
                match tokio::time::timeout(self.config.server.shutdown_timeout, &mut server).await {
                    Ok(res) => {
                        res.map_err(|e| Error::Internal(e.to_string()))?
                            .map_err(|e| Error::Internal(e.to_string()))?;
                    }
                    Err(_) => {
                        warn!("Drain timeout exceeded; aborting in-flight requests");
                        server.abort();
                    }
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM and broadcasts the shutdown.
async fn shutdown_signal(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
