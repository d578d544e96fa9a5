// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message endpoints under `/api/messages`.

use std::time::Duration;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use serde_json::{Value, json};
use zapflow_auth::AuthUser;
use zapflow_core::MessageFilter;
use zapflow_whatsapp::{BulkRequest, SendRequest};

use crate::error::ApiError;
use crate::schemas::{BulkSendRequest, IdPath, ListMessagesQuery, SendMessageRequest, page_offset};
use crate::server::GatewayState;
use crate::validation::{ValidJson, ValidPath, ValidQuery};

/// POST /api/messages/send
pub async fn send(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(body): ValidJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let message = state
        .manager
        .send_message(
            caller.owner_scope(),
            SendRequest {
                instance_id: body.instance_id,
                to: body.to,
                body: body.message,
                media_url: body.media_url,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    ))
}

/// POST /api/messages/bulk
pub async fn bulk(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(body): ValidJson<BulkSendRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let accepted = state
        .manager
        .bulk_send(
            caller.owner_scope(),
            BulkRequest {
                instance_id: body.instance_id,
                recipients: body.recipients,
                body: body.message,
                delay: Duration::from_millis(body.delay_ms),
            },
        )
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "batchId": accepted.batch_id,
            "total": accepted.total,
        })),
    ))
}

/// GET /api/messages
pub async fn list(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidQuery(query): ValidQuery<ListMessagesQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = MessageFilter {
        instance_id: query.instance_id,
        owner_id: None,
        direction: query.direction,
        limit: query.limit,
        offset: page_offset(query.page, query.limit),
    };
    let page = state
        .manager
        .list_messages(caller.owner_scope(), filter)
        .await?;
    Ok(Json(json!({
        "success": true,
        "messages": page.items,
        "total": page.total,
        "page": query.page,
        "limit": query.limit,
    })))
}

/// GET /api/messages/{id}
pub async fn get(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
    ValidPath(path): ValidPath<IdPath>,
) -> Result<Json<Value>, ApiError> {
    let message = state
        .manager
        .get_message(path.uuid(), caller.owner_scope())
        .await?;
    Ok(Json(json!({ "success": true, "message": message })))
}
