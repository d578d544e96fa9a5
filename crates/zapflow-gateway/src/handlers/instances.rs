// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance lifecycle endpoints under `/api/instances`.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use serde_json::{Value, json};
use zapflow_auth::AuthUser;
use zapflow_core::{InstanceFilter, WebhookConfig};
use zapflow_whatsapp::NewInstance;

use crate::error::ApiError;
use crate::schemas::{
    CreateInstanceRequest, InstanceIdPath, ListInstancesQuery, WebhookConfigRequest, page_offset,
};
use crate::server::GatewayState;
use crate::validation::{ValidJson, ValidPath, ValidQuery};

type ApiResult = Result<Json<Value>, ApiError>;

/// GET /api/instances
pub async fn list(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidQuery(query): ValidQuery<ListInstancesQuery>,
) -> ApiResult {
    let filter = InstanceFilter {
        owner_id: None,
        status: query.status,
        limit: query.limit,
        offset: page_offset(query.page, query.limit),
    };
    let page = state.manager.list(caller.owner_scope(), filter).await?;
    Ok(Json(json!({
        "success": true,
        "instances": page.items,
        "total": page.total,
        "page": query.page,
        "limit": query.limit,
    })))
}

/// POST /api/instances
pub async fn create(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(body): ValidJson<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let instance = state
        .manager
        .create(
            caller.id,
            NewInstance {
                name: body.name.trim().to_string(),
                webhook_url: body.webhook_url,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "instance": instance })),
    ))
}

/// GET /api/instances/{id}
pub async fn get(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
) -> ApiResult {
    let instance = state.manager.get(path.uuid(), caller.owner_scope()).await?;
    Ok(Json(json!({ "success": true, "instance": instance })))
}

/// DELETE /api/instances/{id}
pub async fn delete(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
) -> ApiResult {
    state
        .manager
        .delete(path.uuid(), caller.owner_scope())
        .await?;
    Ok(Json(
        json!({ "success": true, "message": "Instância removida com sucesso" }),
    ))
}

/// GET /api/instances/{id}/status
pub async fn status(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
) -> ApiResult {
    let instance = state.manager.get(path.uuid(), caller.owner_scope()).await?;
    Ok(Json(json!({
        "success": true,
        "id": instance.id,
        "status": instance.status,
        "phone": instance.phone,
        "lastActivityAt": instance.last_activity_at,
    })))
}

/// GET /api/instances/{id}/qr
pub async fn qr(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
) -> ApiResult {
    match state.manager.qr(path.uuid(), caller.owner_scope()).await? {
        Some(qr) => Ok(Json(json!({ "success": true, "qr": qr }))),
        None => Err(ApiError::Unavailable("Nenhum QR code disponível")),
    }
}

/// POST /api/instances/{id}/restart
pub async fn restart(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
) -> ApiResult {
    let instance = state
        .manager
        .restart(path.uuid(), caller.owner_scope())
        .await?;
    Ok(Json(json!({ "success": true, "instance": instance })))
}

/// POST /api/instances/{id}/logout
pub async fn logout(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
) -> ApiResult {
    let instance = state
        .manager
        .logout(path.uuid(), caller.owner_scope())
        .await?;
    Ok(Json(json!({ "success": true, "instance": instance })))
}

/// PUT /api/instances/{id}/webhook
pub async fn set_webhook(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
    ValidJson(body): ValidJson<WebhookConfigRequest>,
) -> ApiResult {
    let webhook = WebhookConfig {
        url: body.url,
        events: body.events,
        enabled: body.enabled.unwrap_or(true),
        secret: body.secret,
    };
    let instance = state
        .manager
        .set_webhook(path.uuid(), caller.owner_scope(), webhook)
        .await?;
    Ok(Json(json!({ "success": true, "instance": instance })))
}

/// DELETE /api/instances/{id}/webhook
pub async fn clear_webhook(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<InstanceIdPath>,
) -> ApiResult {
    let instance = state
        .manager
        .clear_webhook(path.uuid(), caller.owner_scope())
        .await?;
    Ok(Json(json!({ "success": true, "instance": instance })))
}
