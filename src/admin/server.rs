//! Admin HTTP server module
//!
//! This module sets up the HTTP server for the admin API using axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::admin::error::{AdminError, AdminResult};
use crate::admin::handlers;
use crate::config::DualModeConfig;

/// Route of the SSL dual mode status endpoint
pub const DUAL_MODE_STATUS_PATH: &str = "/_opendistro/_security/ssl_dual_mode";

/// State shared by admin handlers
#[derive(Debug, Clone)]
pub struct AdminState {
    pub dual_mode: Arc<DualModeConfig>,
}

/// Serve the admin API on an already bound listener
pub async fn start_admin_server(listener: TcpListener, state: AdminState) -> AdminResult<()> {
    log::info!("Admin API server listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| AdminError::Internal(e.to_string()))?;

    Ok(())
}

/// Bind `listen_addr` and serve the admin API
pub async fn bind_and_serve(listen_addr: SocketAddr, state: AdminState) -> AdminResult<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    start_admin_server(listener, state).await
}

/// Build the application router with all routes
pub fn build_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(DUAL_MODE_STATUS_PATH, get(handlers::get_dual_mode))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
