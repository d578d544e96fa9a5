// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end API testing.
//!
//! `TestApp` assembles the full REST router over in-memory storage, a
//! [`MockDriver`], and a settable memory probe. Requests are driven through
//! the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;
use zapflow_auth::{AccountService, TokenService};
use zapflow_config::model::ServerConfig;
use zapflow_core::ZapflowError;
use zapflow_gateway::{AuthConfig, GatewayState, HealthState, LimitsState, build_router};
use zapflow_limits::memory::MIB;
use zapflow_limits::{FixedProbe, InMemoryCounterStore, InstanceCap, MemoryMonitor, RateLimiter};
use zapflow_storage::SqliteStorage;
use zapflow_whatsapp::{BRIDGE_TOKEN_HEADER, BridgeEvent, InstanceManager};

use crate::fixtures::ManagerFixture;
use crate::mock_driver::MockDriver;

pub const TEST_JWT_SECRET: &str = "test-signing-secret-with-enough-length";
pub const TEST_BRIDGE_TOKEN: &str = "test-bridge-token";
pub const ADMIN_EMAIL: &str = "admin@zapflow.test";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const USER_PASSWORD: &str = "user-password";

/// Builder for [`TestApp`] with adjustable limits.
pub struct TestAppBuilder {
    max_instances: u32,
    creation_max: u32,
    creation_window: Duration,
    memory_limit_mb: u64,
    memory_used_mb: u64,
    metrics: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl TestAppBuilder {
    fn new() -> Self {
        Self {
            max_instances: 50,
            creation_max: 3,
            creation_window: Duration::from_secs(900),
            memory_limit_mb: 512,
            memory_used_mb: 64,
            metrics: None,
        }
    }

    pub fn with_max_instances(mut self, max: u32) -> Self {
        self.max_instances = max;
        self
    }

    pub fn with_creation_limit(mut self, max: u32, window: Duration) -> Self {
        self.creation_max = max;
        self.creation_window = window;
        self
    }

    /// Set the memory ceiling and the probe's initial reading.
    pub fn with_memory(mut self, limit_mb: u64, used_mb: u64) -> Self {
        self.memory_limit_mb = limit_mb;
        self.memory_used_mb = used_mb;
        self
    }

    /// Serve `/metrics` with a fixed renderer.
    pub fn with_metrics(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.metrics = Some(render);
        self
    }

    pub async fn build(self) -> Result<TestApp, ZapflowError> {
        let fixture = ManagerFixture::with_max_instances(self.max_instances).await?;
        let tokens = TokenService::new(TEST_JWT_SECRET, 1);
        let accounts = AccountService::new(fixture.storage.clone(), tokens.clone());
        let probe = Arc::new(FixedProbe::from_mb(self.memory_used_mb));

        let limits = LimitsState {
            creation: RateLimiter::new(
                Arc::new(InMemoryCounterStore::new()),
                self.creation_max,
                self.creation_window,
            ),
            cap: InstanceCap::new(Arc::new(fixture.manager.clone()), self.max_instances),
            memory: MemoryMonitor::new(probe.clone(), self.memory_limit_mb, 80),
        };
        let state = GatewayState {
            manager: fixture.manager.clone(),
            accounts: accounts.clone(),
            auth: AuthConfig {
                tokens,
                bridge_token: Some(TEST_BRIDGE_TOKEN.to_string()),
            },
            limits,
            health: HealthState::new(self.metrics),
        };
        let router = build_router(state, &ServerConfig::default());

        Ok(TestApp {
            router,
            accounts,
            probe,
            fixture,
        })
    }
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` when the body is not JSON.
    pub json: Value,
    pub text: String,
}

/// The REST API wired to mocks, driven in-process.
pub struct TestApp {
    pub router: Router,
    pub accounts: AccountService,
    pub probe: Arc<FixedProbe>,
    fixture: ManagerFixture,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::new()
    }

    /// An app with default limits.
    pub async fn new() -> Result<Self, ZapflowError> {
        Self::builder().build().await
    }

    pub fn manager(&self) -> &InstanceManager {
        &self.fixture.manager
    }

    pub fn driver(&self) -> &Arc<MockDriver> {
        &self.fixture.driver
    }

    pub fn storage(&self) -> &Arc<SqliteStorage> {
        &self.fixture.storage
    }

    pub fn set_memory_mb(&self, used_mb: u64) {
        self.probe.set_bytes(used_mb * MIB);
    }

    /// Register a regular account and return its id and access token.
    pub async fn user(&self, email: &str) -> Result<(Uuid, String), ZapflowError> {
        let session = self.accounts.register(email, USER_PASSWORD).await?;
        Ok((session.user.id, session.token))
    }

    /// Bootstrap the admin account (once) and return an access token.
    pub async fn admin_token(&self) -> Result<String, ZapflowError> {
        self.accounts.ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
        Ok(self.accounts.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?.token)
    }

    /// Drive an instance through pairing to `connected`.
    pub async fn connect(&self, instance_id: Uuid) -> Result<(), ZapflowError> {
        let manager = self.manager();
        manager
            .handle_event(instance_id, BridgeEvent::Qr { qr: "2@pairing".into() })
            .await?;
        manager
            .handle_event(
                instance_id,
                BridgeEvent::Ready {
                    phone: Some("5511999998888@c.us".into()),
                },
            )
            .await
    }

    /// Send a request through the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse, ZapflowError> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder, body).await
    }

    /// POST a bridge event for an instance with the configured bridge token.
    pub async fn bridge_event(
        &self,
        instance_id: Uuid,
        event: Value,
    ) -> Result<TestResponse, ZapflowError> {
        let builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/bridge/instances/{instance_id}/events"))
            .header(BRIDGE_TOKEN_HEADER, TEST_BRIDGE_TOKEN);
        self.send(builder, Some(event)).await
    }

    /// Send a fully custom request.
    pub async fn send(
        &self,
        builder: axum::http::request::Builder,
        body: Option<Value>,
    ) -> Result<TestResponse, ZapflowError> {
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| ZapflowError::Internal(format!("invalid test request: {e}")))?;

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ZapflowError::Internal(format!("unreadable test response: {e}")))?
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok(TestResponse {
            status,
            headers,
            json,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_serves_health() {
        let app = TestApp::new().await.unwrap();
        let response = app
            .request(Method::GET, "/health/ping", None, None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text, "pong");
    }

    #[tokio::test]
    async fn harness_issues_working_tokens() {
        let app = TestApp::new().await.unwrap();
        let (id, token) = app.user("ana@example.com").await.unwrap();
        let response = app
            .request(Method::GET, "/api/auth/me", Some(&token), None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json["user"]["id"], id.to_string());

        let admin = app.admin_token().await.unwrap();
        let response = app
            .request(Method::GET, "/api/auth/me", Some(&admin), None)
            .await
            .unwrap();
        assert_eq!(response.json["user"]["role"], "admin");
    }
}
