// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback receiving session events from the bridge sidecar.

use axum::{Json, extract::State};
use serde_json::{Value, json};
use zapflow_whatsapp::BridgeEvent;

use crate::error::ApiError;
use crate::schemas::InstanceIdPath;
use crate::server::GatewayState;
use crate::validation::{ValidJson, ValidPath};

/// POST /api/bridge/instances/{id}/events
pub async fn events(
    State(state): State<GatewayState>,
    ValidPath(path): ValidPath<InstanceIdPath>,
    ValidJson(event): ValidJson<BridgeEvent>,
) -> Result<Json<Value>, ApiError> {
    state.manager.handle_event(path.uuid(), event).await?;
    Ok(Json(json!({ "success": true })))
}
