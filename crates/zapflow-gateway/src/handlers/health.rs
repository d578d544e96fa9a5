// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unauthenticated health and metrics endpoints for probes and scrapers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use zapflow_core::{HealthStatus, ZapflowError};
use zapflow_limits::memory::MIB;

use crate::server::GatewayState;

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn check_result(result: Result<HealthStatus, ZapflowError>) -> (bool, Value) {
    match result {
        Ok(HealthStatus::Healthy) => (true, json!({ "status": "ok" })),
        Ok(HealthStatus::Degraded(reason)) => {
            (true, json!({ "status": "degraded", "message": reason }))
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            (false, json!({ "status": "error", "message": reason }))
        }
        Err(e) => (false, json!({ "status": "error", "message": e.to_string() })),
    }
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": timestamp(),
        "uptime": state.health.uptime_secs(),
    }))
}

/// GET /health/ping
pub async fn ping() -> &'static str {
    "pong"
}

/// GET /health/live
pub async fn live() -> Json<Value> {
    Json(json!({ "status": "alive", "timestamp": timestamp() }))
}

/// GET /health/ready
///
/// Ready when both the database and the bridge answer their health checks.
pub async fn ready(State(state): State<GatewayState>) -> (StatusCode, Json<Value>) {
    let (database_ok, database) = check_result(state.manager.storage().health_check().await);
    let (bridge_ok, bridge) = check_result(state.manager.driver().health_check().await);
    let checks = json!({ "database": database, "bridge": bridge });

    if database_ok && bridge_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "ready", "timestamp": timestamp(), "checks": checks })),
        )
    } else {
        tracing::warn!(%checks, "readiness check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "timestamp": timestamp(), "checks": checks })),
        )
    }
}

/// GET /health/metrics
pub async fn metrics(State(state): State<GatewayState>) -> Json<Value> {
    let memory = match state.limits.memory.sample() {
        Some(sample) => json!({
            "heapMb": sample.used_mb(),
            "limitMb": sample.limit_mb(),
            "percent": sample.percent(),
        }),
        None => json!({
            "heapMb": Value::Null,
            "limitMb": state.limits.memory.limit_bytes() / MIB,
            "percent": Value::Null,
        }),
    };

    let current = match state.limits.cap.current().await {
        Ok(current) => json!(current),
        Err(e) => {
            tracing::warn!(error = %e, "could not count live instances");
            Value::Null
        }
    };

    Json(json!({
        "uptime": state.health.uptime_secs(),
        "timestamp": timestamp(),
        "memory": memory,
        "instances": { "current": current, "max": state.limits.cap.max() },
    }))
}

/// GET /health/version
pub async fn version() -> Json<Value> {
    Json(json!({
        "name": "zapflow",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics
///
/// Prometheus text exposition; 404 when metrics are disabled.
pub async fn prometheus(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_results_classify_availability() {
        assert!(check_result(Ok(HealthStatus::Healthy)).0);
        assert!(check_result(Ok(HealthStatus::Degraded("slow".into()))).0);
        assert!(!check_result(Ok(HealthStatus::Unhealthy("down".into()))).0);
        let (ok, body) = check_result(Err(ZapflowError::Internal("boom".into())));
        assert!(!ok);
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let ts = timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok(), "{ts}");
    }
}
