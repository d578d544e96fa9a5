// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proxy failures and their HTTP rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

pub const BACKEND_UNAVAILABLE: &str = "Backend API unavailable";
pub const INVALID_REQUEST: &str = "Requisição inválida";

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// The backend timed out or could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with a non-2xx status.
    #[error("backend returned {status}")]
    Backend { status: StatusCode, body: Value },

    /// The request was rejected before reaching the backend.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        match self {
            DashboardError::Unavailable(message) => {
                tracing::warn!(error = %message, "backend unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "success": false,
                        "error": BACKEND_UNAVAILABLE,
                        "message": message,
                    })),
                )
                    .into_response()
            }
            DashboardError::Backend { status, body } => (status, Json(body)).into_response(),
            DashboardError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": INVALID_REQUEST,
                    "message": message,
                })),
            )
                .into_response(),
            DashboardError::Internal(message) => {
                tracing::error!(error = %message, "dashboard proxy failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": "Erro interno do servidor" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_503() {
        let response = DashboardError::Unavailable("timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn bad_request_is_400() {
        let response = DashboardError::BadRequest("expected JSON".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_status_is_preserved() {
        let response = DashboardError::Backend {
            status: StatusCode::UNAUTHORIZED,
            body: json!({ "success": false, "error": "Não autorizado" }),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
