//! HTTP endpoint serving `/cpu_usage`

use crate::registry::{AggregateReport, TrackerRegistry};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CPU_USAGE_ENDPOINT: &str = "/cpu_usage";

pub fn router(registry: Arc<TrackerRegistry>) -> Router {
    Router::new()
        .route(CPU_USAGE_ENDPOINT, get(cpu_usage))
        .with_state(registry)
}

/// Always 200: a missing process is reported inside the body.
async fn cpu_usage(State(registry): State<Arc<TrackerRegistry>>) -> Json<AggregateReport> {
    Json(registry.sample_and_report().await)
}

pub struct HttpServer {
    listener: TcpListener,
    registry: Arc<TrackerRegistry>,
}

impl HttpServer {
    pub async fn bind(addr: SocketAddr, registry: Arc<TrackerRegistry>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP server listening on {}", listener.local_addr()?);
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, router(self.registry))
            .with_graceful_shutdown(shutdown)
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}
