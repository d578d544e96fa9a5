// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard-facing proxy over the Zapflow REST API.
//!
//! Forwards a small set of routes to the backend, passing the caller's
//! `Authorization` header through, and reshapes instance records into the
//! form the dashboard UI renders.

pub mod client;
pub mod error;
pub mod reshape;
pub mod routes;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use zapflow_config::model::DashboardConfig;

pub use client::BackendClient;
pub use error::{BACKEND_UNAVAILABLE, DashboardError, INVALID_REQUEST};
pub use reshape::UiInstance;
pub use routes::router;

/// Serve the dashboard proxy until `shutdown` is cancelled.
pub async fn serve(
    config: &DashboardConfig,
    shutdown: CancellationToken,
) -> Result<(), DashboardError> {
    let client = BackendClient::from_config(config)?;
    let app = router(client)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DashboardError::Internal(format!("failed to bind dashboard to {addr}: {e}")))?;

    tracing::info!(backend = %config.backend_url, "dashboard proxy listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| DashboardError::Internal(format!("dashboard server error: {e}")))?;

    Ok(())
}
