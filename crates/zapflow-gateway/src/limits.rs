// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-limiting middleware.
//!
//! Instance creation passes through the rate limiter, then the total
//! instance cap, then the memory guard. Every other API route only passes
//! the memory guard.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use zapflow_auth::AuthUser;
use zapflow_limits::{
    InstanceCap, MemoryLevel, MemoryMonitor, RateDecision, RateLimiter, retry_after_secs,
};

use crate::error::{ApiError, MEMORY_LIMIT_HEADER, MEMORY_USAGE_HEADER};

pub const RATE_LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const RATE_REMAINING_HEADER: &str = "X-RateLimit-Remaining";

/// The limiters shared by every request.
#[derive(Clone)]
pub struct LimitsState {
    pub creation: RateLimiter,
    pub cap: InstanceCap,
    pub memory: MemoryMonitor,
}

/// First `X-Forwarded-For` hop, else the socket address.
fn client_address(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());
    if let Some(hop) = forwarded {
        return hop.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Counter key for the creation limiter, `None` for admins.
fn caller_key(request: &Request) -> Option<String> {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin() => None,
        Some(user) => Some(format!("user:{}", user.id)),
        None => Some(format!("ip:{}", client_address(request))),
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

/// Fixed-window limit on instance creation per caller. Admins bypass.
pub async fn creation_rate_limit(
    State(limits): State<LimitsState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(key) = caller_key(&request) else {
        return next.run(request).await;
    };

    match limits.creation.check(&key) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            set_header(headers, RATE_LIMIT_HEADER, u64::from(limits.creation.max()));
            set_header(headers, RATE_REMAINING_HEADER, u64::from(remaining));
            response
        }
        RateDecision::Limited { retry_after } => {
            let retry_after_secs = retry_after_secs(retry_after);
            warn!(%key, retry_after_secs, "instance creation rate limited");
            zapflow_prometheus::record_instance_rejected("rate_limit");
            let mut response = ApiError::RateLimited { retry_after_secs }.into_response();
            let headers = response.headers_mut();
            set_header(headers, RATE_LIMIT_HEADER, u64::from(limits.creation.max()));
            set_header(headers, RATE_REMAINING_HEADER, 0);
            response
        }
    }
}

/// Reject creation once the live-instance cap is reached.
///
/// This is the early answer; the insert itself re-checks the cap atomically.
pub async fn instance_cap(
    State(limits): State<LimitsState>,
    request: Request,
    next: Next,
) -> Response {
    match limits.cap.check().await {
        Ok(Ok(_)) => next.run(request).await,
        Ok(Err(exceeded)) => {
            warn!(
                current = exceeded.current,
                max = exceeded.max,
                "instance cap reached"
            );
            zapflow_prometheus::record_instance_rejected("capacity");
            ApiError::Capacity {
                current: exceeded.current,
                max: exceeded.max,
            }
            .into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Report heap usage on every response and shed load above the limit.
///
/// An unreadable probe lets the request through without usage headers.
pub async fn memory_guard(
    State(limits): State<LimitsState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(sample) = limits.memory.sample() else {
        return next.run(request).await;
    };

    match sample.level {
        MemoryLevel::Critical => {
            warn!(
                used_mb = sample.used_mb(),
                limit_mb = sample.limit_mb(),
                path = %request.uri().path(),
                "memory limit exceeded, rejecting request"
            );
            zapflow_prometheus::record_instance_rejected("memory");
            return ApiError::MemoryPressure {
                used_mb: sample.used_mb(),
                limit_mb: sample.limit_mb(),
            }
            .into_response();
        }
        MemoryLevel::Warning => warn!(
            used_mb = sample.used_mb(),
            limit_mb = sample.limit_mb(),
            percent = sample.percent(),
            "memory usage high"
        ),
        MemoryLevel::Normal => {}
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    set_header(headers, MEMORY_USAGE_HEADER, sample.used_mb());
    set_header(headers, MEMORY_LIMIT_HEADER, sample.limit_mb());
    response
}
