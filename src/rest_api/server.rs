//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controller::SyncController;
use crate::persist::Provider;
use crate::{Error, Result};

use super::handlers;

/// State shared by every handler
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<SyncController>,
    pub provider: Arc<dyn Provider>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/v1/connections", get(handlers::list_connections))
        .route("/api/v1/status", get(handlers::controller_status))
        .route("/api/v1/resync", post(handlers::resync))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the REST API server until `shutdown` fires
pub async fn run_server(
    state: ApiState,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(state);

    info!("REST API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}
