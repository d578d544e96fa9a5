// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST API server built on axum.
//!
//! Sets up routes, middleware, and shared state for the API.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use zapflow_auth::AccountService;
use zapflow_config::model::ServerConfig;
use zapflow_core::ZapflowError;
use zapflow_whatsapp::InstanceManager;

use crate::auth::{AuthConfig, require_auth, require_bridge_token};
use crate::error::INTERNAL_ERROR;
use crate::handlers::{self, auth, bridge, health, instances, messages};
use crate::limits::{LimitsState, creation_rate_limit, instance_cap, memory_guard};

/// State behind the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Prometheus text renderer; `None` disables `/metrics`.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: Instant::now(),
            prometheus_render,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: InstanceManager,
    pub accounts: AccountService,
    pub auth: AuthConfig,
    pub limits: LimitsState,
    pub health: HealthState,
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": INTERNAL_ERROR })),
    )
        .into_response()
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin.filter(|o| !o.trim().is_empty() && *o != "*") else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin),
        Err(_) => {
            tracing::warn!(%origin, "unusable CORS origin, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Build the full application router.
///
/// `POST /api/instances` runs rate limit, instance cap, then the memory
/// guard; every other `/api` route runs only the memory guard. Health and
/// metrics routes are unguarded.
pub fn build_router(state: GatewayState, config: &ServerConfig) -> Router {
    let limits = state.limits.clone();
    let memory = axum_middleware::from_fn_with_state(limits.clone(), memory_guard);
    let cap = axum_middleware::from_fn_with_state(limits.clone(), instance_cap);
    let rate = axum_middleware::from_fn_with_state(limits, creation_rate_limit);

    // Unauthenticated health and metrics routes for probes and Prometheus.
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ping", get(health::ping))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/metrics", get(health::metrics))
        .route("/health/version", get(health::version))
        .route("/metrics", get(health::prometheus));

    let account_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route_layer(memory.clone());

    let bridge_routes = Router::new()
        .route(
            "/api/bridge/instances/{id}/events",
            post(bridge::events),
        )
        .route_layer(memory.clone())
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            require_bridge_token,
        ));

    let create_instance = post(instances::create)
        .route_layer(memory.clone())
        .route_layer(cap)
        .route_layer(rate);

    let guarded_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/instances/{id}", get(instances::get).delete(instances::delete))
        .route("/api/instances/{id}/status", get(instances::status))
        .route("/api/instances/{id}/qr", get(instances::qr))
        .route("/api/instances/{id}/restart", post(instances::restart))
        .route("/api/instances/{id}/logout", post(instances::logout))
        .route(
            "/api/instances/{id}/webhook",
            put(instances::set_webhook).delete(instances::clear_webhook),
        )
        .route("/api/messages", get(messages::list))
        .route("/api/messages/send", post(messages::send))
        .route("/api/messages/bulk", post(messages::bulk))
        .route("/api/messages/{id}", get(messages::get))
        .route_layer(memory.clone());

    // Routes requiring an access token.
    let api_routes = Router::new()
        .route(
            "/api/instances",
            get(instances::list)
                .route_layer(memory)
                .merge(create_instance),
        )
        .merge(guarded_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(bridge_routes)
        .merge(api_routes)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_origin.as_deref()))
}

/// Serve the API until `shutdown` is cancelled.
pub async fn serve(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), ZapflowError> {
    let app = build_router(state, config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ZapflowError::Internal(format!("failed to bind API server to {addr}: {e}")))?;

    tracing::info!("API server listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| ZapflowError::Internal(format!("API server error: {e}")))?;

    tracing::info!("API server stopped");
    Ok(())
}
