// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the backend REST API.

use std::time::Duration;

use axum::http::HeaderValue;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use zapflow_config::model::DashboardConfig;

use crate::error::DashboardError;

/// Forwards dashboard calls to the backend with a fixed timeout.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DashboardError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, DashboardError> {
        Self::new(
            &config.backend_url,
            Duration::from_secs(config.backend_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the parsed 2xx body.
    ///
    /// `authorization` is passed through unchanged. Non-2xx answers become
    /// [`DashboardError::Backend`] carrying the backend's status and body.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        authorization: Option<&HeaderValue>,
        body: Option<&Value>,
    ) -> Result<Value, DashboardError> {
        let mut request = self
            .http
            .request(method.clone(), format!("{}{path}", self.base_url));
        if let Some(value) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, value.clone());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DashboardError::Unavailable(format!("backend timed out: {e}"))
            } else if e.is_connect() {
                DashboardError::Unavailable(format!("backend unreachable: {e}"))
            } else {
                DashboardError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        debug!(%method, path, %status, "backend response received");

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DashboardError::Unavailable(format!("backend body unreadable: {e}")))?;
        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        if status.is_success() {
            Ok(body)
        } else {
            Err(DashboardError::Backend { status, body })
        }
    }
}
