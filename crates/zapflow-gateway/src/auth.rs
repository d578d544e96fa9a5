// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the REST API.
//!
//! Two credentials are accepted on different route groups:
//! 1. Account access tokens (`Authorization: Bearer <jwt>`) on `/api/*`
//! 2. The shared bridge token (`X-Bridge-Token`) on the bridge callback
//!
//! Both fail closed: a missing or unconfigured credential rejects the request.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use zapflow_auth::{AuthUser, TokenService};
use zapflow_core::ZapflowError;
use zapflow_whatsapp::BRIDGE_TOKEN_HEADER;

use crate::error::ApiError;

/// Credentials the middleware checks against.
#[derive(Clone)]
pub struct AuthConfig {
    pub tokens: TokenService,
    /// Shared secret the bridge sidecar presents. `None` rejects every event.
    pub bridge_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tokens", &self.tokens)
            .field(
                "bridge_token",
                &self.bridge_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

fn bearer(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn unauthorized(reason: &str) -> Response {
    ApiError::from(ZapflowError::Unauthorized(reason.to_string())).into_response()
}

/// Resolve the access token into an [`AuthUser`] request extension.
pub async fn require_auth(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer(&request) else {
        return unauthorized("missing bearer token");
    };

    let user = match auth.tokens.verify(token).and_then(AuthUser::try_from) {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(error = %e, "access token rejected");
            return unauthorized("invalid or expired token");
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Byte comparison whose duration does not depend on where inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Admit only requests carrying the configured bridge token.
pub async fn require_bridge_token(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth.bridge_token.as_deref() else {
        tracing::error!("no bridge token configured -- rejecting bridge event");
        return unauthorized("bridge token not configured");
    };

    let presented = request
        .headers()
        .get(BRIDGE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("bridge event with missing or wrong token");
            unauthorized("invalid bridge token")
        }
    }
}
