// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of failures to HTTP responses.
//!
//! Every failure body is `{"success": false, "error": "<mensagem>"}` plus
//! optional structured fields. Internal details are logged, never returned.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{error, warn};
use zapflow_core::ZapflowError;

use crate::validation::FieldError;

pub const INVALID_INPUT: &str = "Dados de entrada inválidos";
pub const INTERNAL_ERROR: &str = "Erro interno do servidor";
pub const MEMORY_USAGE_HEADER: &str = "X-Memory-Usage-MB";
pub const MEMORY_LIMIT_HEADER: &str = "X-Memory-Limit-MB";

/// A request failure ready to be rendered.
#[derive(Debug)]
pub enum ApiError {
    /// Schema validation failed for one request section.
    Validation(Vec<FieldError>),
    RateLimited { retry_after_secs: u64 },
    Capacity { current: u64, max: u64 },
    MemoryPressure { used_mb: u64, limit_mb: u64 },
    /// A resource exists but has nothing to return (e.g. no pending QR code).
    Unavailable(&'static str),
    Core(ZapflowError),
}

impl From<ZapflowError> for ApiError {
    fn from(err: ZapflowError) -> Self {
        ApiError::Core(err)
    }
}

fn body(error: &str) -> Value {
    json!({ "success": false, "error": error })
}

fn with_message(error: &str, message: impl ToString) -> Value {
    json!({ "success": false, "error": error, "message": message.to_string() })
}

fn capacity_body(current: u64, max: u64) -> Value {
    json!({
        "success": false,
        "error": "Limite máximo de instâncias atingido",
        "current": current,
        "max": max,
    })
}

fn not_found_message(entity: &str) -> &'static str {
    match entity {
        "instance" => "Instância não encontrada",
        "message" => "Mensagem não encontrada",
        "user" => "Usuário não encontrado",
        _ => "Recurso não encontrado",
    }
}

fn core_response(err: ZapflowError) -> (StatusCode, Value) {
    match err {
        ZapflowError::Validation(detail) => {
            (StatusCode::BAD_REQUEST, with_message(INVALID_INPUT, detail))
        }
        ZapflowError::Unauthorized(detail) => {
            warn!(reason = %detail, "request rejected as unauthorized");
            (StatusCode::UNAUTHORIZED, body("Não autorizado"))
        }
        ZapflowError::Forbidden(detail) => {
            warn!(reason = %detail, "request rejected as forbidden");
            (StatusCode::FORBIDDEN, body("Acesso negado"))
        }
        ZapflowError::NotFound { entity, .. } => {
            (StatusCode::NOT_FOUND, body(not_found_message(entity)))
        }
        ZapflowError::Conflict(detail) => (
            StatusCode::CONFLICT,
            with_message("Conflito com o estado atual do recurso", detail),
        ),
        ZapflowError::Capacity { current, max } => {
            (StatusCode::TOO_MANY_REQUESTS, capacity_body(current, max))
        }
        ZapflowError::InvalidTransition { from, to } => (
            StatusCode::CONFLICT,
            with_message(
                "Transição de status inválida",
                format!("{from} -> {to}"),
            ),
        ),
        ZapflowError::Driver { message, .. } => {
            error!(error = %message, "bridge failure");
            (
                StatusCode::BAD_GATEWAY,
                body("Falha na comunicação com o serviço do WhatsApp"),
            )
        }
        ZapflowError::Timeout { duration } => {
            error!(?duration, "bridge timed out");
            (
                StatusCode::GATEWAY_TIMEOUT,
                body("O serviço do WhatsApp não respondeu a tempo"),
            )
        }
        other @ (ZapflowError::Config(_)
        | ZapflowError::Storage { .. }
        | ZapflowError::Internal(_)) => {
            error!(error = %other, "unexpected error while handling request");
            (StatusCode::INTERNAL_SERVER_ERROR, body(INTERNAL_ERROR))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": INVALID_INPUT, "details": details })),
            )
                .into_response(),
            ApiError::RateLimited { retry_after_secs } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "success": false,
                        "error": "Muitas requisições de criação de instância. Tente novamente mais tarde.",
                        "retryAfter": retry_after_secs,
                    })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            ApiError::Capacity { current, max } => {
                (StatusCode::TOO_MANY_REQUESTS, Json(capacity_body(current, max))).into_response()
            }
            ApiError::MemoryPressure { used_mb, limit_mb } => {
                let mut response = (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "success": false,
                        "error": "Servidor com uso de memória elevado. Tente novamente mais tarde.",
                        "memoryUsageMb": used_mb,
                        "memoryLimitMb": limit_mb,
                    })),
                )
                    .into_response();
                let headers = response.headers_mut();
                headers.insert(MEMORY_USAGE_HEADER, HeaderValue::from(used_mb));
                headers.insert(MEMORY_LIMIT_HEADER, HeaderValue::from(limit_mb));
                response
            }
            ApiError::Unavailable(message) => {
                (StatusCode::NOT_FOUND, Json(body(message))).into_response()
            }
            ApiError::Core(err) => {
                let (status, payload) = core_response(err);
                (status, Json(payload)).into_response()
            }
        }
    }
}
