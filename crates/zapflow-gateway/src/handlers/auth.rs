// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account registration, login, and the current caller.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use serde_json::{Value, json};
use zapflow_auth::AuthUser;

use crate::error::ApiError;
use crate::schemas::{LoginRequest, RegisterRequest};
use crate::server::GatewayState;
use crate::validation::ValidJson;

/// POST /api/auth/register
pub async fn register(
    State(state): State<GatewayState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let session = state.accounts.register(&body.email, &body.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": session.user, "token": session.token })),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<GatewayState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.accounts.login(&body.email, &body.password).await?;
    Ok(Json(
        json!({ "success": true, "token": session.token, "user": session.user }),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<GatewayState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let user = state.accounts.current_user(caller.id).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}
