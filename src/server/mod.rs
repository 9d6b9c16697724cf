//! HTTP service exposing the collector
//!
//! # Routes
//!
//! - `GET /pictures?from=YYYY-MM-DD&to=YYYY-MM-DD` - Picture URLs for a range
//! - `GET /health` - Health check
//! - `GET /metrics` - Fetch and collection counters

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cli::config::ServerSettings;
use crate::collector::PictureCollector;

pub mod handlers;
pub mod response;
pub mod shutdown;
pub mod state;

pub use state::AppState;

/// Create the router with all route definitions
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/pictures",
            get(handlers::get_pictures).fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` fires
pub async fn serve(
    settings: &ServerSettings,
    collector: Arc<PictureCollector>,
    shutdown: CancellationToken,
) -> Result<()> {
    let bind_address = settings.bind_address()?;
    let listener = TcpListener::bind(bind_address)
        .await
        .context(format!("Failed to bind {}", bind_address))?;

    serve_on(listener, settings, collector, shutdown).await
}

/// Serve on an already bound listener.
///
/// Once `shutdown` fires no new connections are accepted; requests still in
/// flight get `shutdown_grace_secs` before their collections are cancelled.
pub async fn serve_on(
    listener: TcpListener,
    settings: &ServerSettings,
    collector: Arc<PictureCollector>,
    shutdown: CancellationToken,
) -> Result<()> {
    let requests = CancellationToken::new();
    let state = AppState::new(
        collector,
        requests.clone(),
        Duration::from_secs(settings.request_timeout_secs),
    );
    let app = create_router(state);

    let grace = Duration::from_secs(settings.shutdown_grace_secs);
    let drain_deadline = {
        let shutdown = shutdown.clone();
        let requests = requests.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
            warn!(?grace, "Grace period elapsed, cancelling in-flight requests");
            requests.cancel();
        })
    };

    info!(address = %listener.local_addr()?, "API server listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("API server failed");

    drain_deadline.abort();
    requests.cancel();

    info!("API server stopped");
    result
}
