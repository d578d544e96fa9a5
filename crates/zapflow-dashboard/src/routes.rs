// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard proxy routes.

use axum::{
    Json, Router,
    extract::{Path, RawQuery, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    routing::{get, post},
};
use reqwest::Method;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::client::BackendClient;
use crate::error::DashboardError;
use crate::reshape::{UiInstance, reshape_list};

type ProxyResult = Result<Json<Value>, DashboardError>;

fn authorization(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers.get(header::AUTHORIZATION)
}

/// Unwrap a JSON body, turning a rejection into a structured 400.
fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, DashboardError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| DashboardError::BadRequest(rejection.body_text()))
}

/// Backend path for one instance. Only UUIDs are forwarded.
fn instance_path(id: &str, suffix: &str) -> Result<String, DashboardError> {
    let id = Uuid::parse_str(id)
        .map_err(|_| DashboardError::BadRequest(format!("invalid instance id `{id}`")))?;
    Ok(format!("/api/instances/{id}{suffix}"))
}

/// Replace the backend's `instance` object with its UI shape.
fn reshape_single(mut body: Value) -> Value {
    if let Some(ui) = body.get("instance").and_then(UiInstance::from_backend)
        && let Ok(rendered) = serde_json::to_value(ui)
    {
        body["instance"] = rendered;
    }
    body
}

/// GET /api/instances
pub async fn list_instances(
    State(client): State<BackendClient>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ProxyResult {
    let path = match query {
        Some(query) if !query.is_empty() => format!("/api/instances?{query}"),
        _ => "/api/instances".to_string(),
    };
    let body = client
        .forward(Method::GET, &path, authorization(&headers), None)
        .await?;
    let (instances, total) = reshape_list(&body);
    Ok(Json(json!({
        "success": true,
        "instances": instances,
        "total": total,
    })))
}

/// POST /api/instances
pub async fn create_instance(
    State(client): State<BackendClient>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), DashboardError> {
    let payload = json_body(payload)?;
    let body = client
        .forward(
            Method::POST,
            "/api/instances",
            authorization(&headers),
            Some(&payload),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(reshape_single(body))))
}

/// GET /api/instances/{id}
pub async fn get_instance(
    State(client): State<BackendClient>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ProxyResult {
    let body = client
        .forward(
            Method::GET,
            &instance_path(&id, "")?,
            authorization(&headers),
            None,
        )
        .await?;
    Ok(Json(reshape_single(body)))
}

/// DELETE /api/instances/{id}
pub async fn delete_instance(
    State(client): State<BackendClient>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ProxyResult {
    let body = client
        .forward(
            Method::DELETE,
            &instance_path(&id, "")?,
            authorization(&headers),
            None,
        )
        .await?;
    Ok(Json(body))
}

/// GET /api/instances/{id}/qr
pub async fn instance_qr(
    State(client): State<BackendClient>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ProxyResult {
    let body = client
        .forward(
            Method::GET,
            &instance_path(&id, "/qr")?,
            authorization(&headers),
            None,
        )
        .await?;
    Ok(Json(body))
}

/// POST /api/messages/send
pub async fn send_message(
    State(client): State<BackendClient>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), DashboardError> {
    let payload = json_body(payload)?;
    let body = client
        .forward(
            Method::POST,
            "/api/messages/send",
            authorization(&headers),
            Some(&payload),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /api/health
pub async fn health(State(client): State<BackendClient>) -> ProxyResult {
    let body = client.forward(Method::GET, "/health", None, None).await?;
    let mut merged = match body {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("backendResponse".to_string(), other);
            map
        }
    };
    merged.insert("backend".to_string(), Value::from("up"));
    Ok(Json(Value::Object(merged)))
}

/// Build the dashboard router over a backend client.
pub fn router(client: BackendClient) -> Router {
    Router::new()
        .route(
            "/api/instances",
            get(list_instances).post(create_instance),
        )
        .route(
            "/api/instances/{id}",
            get(get_instance).delete(delete_instance),
        )
        .route("/api/instances/{id}/qr", get(instance_qr))
        .route("/api/messages/send", post(send_message))
        .route("/api/health", get(health))
        .with_state(client)
}
