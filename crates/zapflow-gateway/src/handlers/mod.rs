// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the REST API.

pub mod auth;
pub mod bridge;
pub mod health;
pub mod instances;
pub mod messages;

use axum::Json;
use axum::http::{StatusCode, Uri};
use serde_json::{Value, json};

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    tracing::debug!(path = %uri.path(), "no route matched");
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Rota não encontrada" })),
    )
}
