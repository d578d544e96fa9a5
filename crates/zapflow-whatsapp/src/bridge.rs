// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP driver for the WhatsApp Web bridge sidecar.
//!
//! The sidecar runs the browser automation; [`BridgeDriver`] relays session
//! commands to it and tells it where to post session events back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use zapflow_config::ZapflowConfig;
use zapflow_core::{Adapter, HealthStatus, OutboundMessage, SessionDriver, ZapflowError};

/// Header carrying the shared bridge token in both directions.
pub const BRIDGE_TOKEN_HEADER: &str = "X-Bridge-Token";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSession<'a> {
    session_path: &'a str,
    callback_url: String,
}

#[derive(Deserialize)]
struct QrResponse {
    qr: Option<String>,
}

#[derive(Deserialize)]
struct SentResponse {
    id: String,
}

/// Session driver backed by the bridge sidecar's HTTP API.
#[derive(Debug, Clone)]
pub struct BridgeDriver {
    client: reqwest::Client,
    base_url: String,
    public_url: String,
    timeout: Duration,
}

impl BridgeDriver {
    /// Creates a driver for the sidecar at `base_url`.
    ///
    /// `public_url` is this server's externally reachable address, used to
    /// build the event callback URL handed to the sidecar.
    pub fn new(
        base_url: &str,
        public_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ZapflowError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                BRIDGE_TOKEN_HEADER,
                HeaderValue::from_str(token).map_err(|e| {
                    ZapflowError::Config(format!("invalid bridge token header value: {e}"))
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ZapflowError::Driver {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &ZapflowConfig) -> Result<Self, ZapflowError> {
        Self::new(
            &config.whatsapp.bridge_url,
            &config.server.public_url,
            config.security.bridge_token.as_deref(),
            Duration::from_secs(config.whatsapp.bridge_timeout_secs),
        )
    }

    /// Where the sidecar posts events for an instance.
    pub fn callback_url(&self, instance_id: Uuid) -> String {
        format!("{}/api/bridge/instances/{instance_id}/events", self.public_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request_error(&self, e: reqwest::Error) -> ZapflowError {
        if e.is_timeout() {
            ZapflowError::Timeout {
                duration: self.timeout,
            }
        } else {
            ZapflowError::Driver {
                message: format!("bridge request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }

    /// Send a request and return the response, rejecting non-2xx statuses
    /// other than the ones listed in `tolerated`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        tolerated: &[StatusCode],
    ) -> Result<reqwest::Response, ZapflowError> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        debug!(%method, path, %status, "bridge response received");

        if status.is_success() || tolerated.contains(&status) {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ZapflowError::Driver {
            message: format!("bridge returned {status}: {body}"),
            source: None,
        })
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ZapflowError> {
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ZapflowError::Timeout {
                    duration: self.timeout,
                }
            } else {
                ZapflowError::Driver {
                    message: format!("failed to parse bridge response: {e}"),
                    source: Some(Box::new(e)),
                }
            }
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ZapflowError> {
    serde_json::to_value(value)
        .map_err(|e| ZapflowError::Internal(format!("failed to encode bridge request: {e}")))
}

#[async_trait]
impl Adapter for BridgeDriver {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn health_check(&self) -> Result<HealthStatus, ZapflowError> {
        match self.send(Method::GET, "/health", None, &[]).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ZapflowError> {
        Ok(())
    }
}

#[async_trait]
impl SessionDriver for BridgeDriver {
    async fn start_session(
        &self,
        instance_id: Uuid,
        session_path: &str,
    ) -> Result<(), ZapflowError> {
        let body = to_json(&StartSession {
            session_path,
            callback_url: self.callback_url(instance_id),
        })?;
        self.send(
            Method::POST,
            &format!("/sessions/{instance_id}"),
            Some(body),
            &[],
        )
        .await?;
        Ok(())
    }

    async fn stop_session(&self, instance_id: Uuid) -> Result<(), ZapflowError> {
        // Stopping a session the sidecar no longer knows is fine.
        self.send(
            Method::DELETE,
            &format!("/sessions/{instance_id}"),
            None,
            &[StatusCode::NOT_FOUND],
        )
        .await?;
        Ok(())
    }

    async fn logout(&self, instance_id: Uuid) -> Result<(), ZapflowError> {
        self.send(
            Method::POST,
            &format!("/sessions/{instance_id}/logout"),
            None,
            &[],
        )
        .await?;
        Ok(())
    }

    async fn qr_code(&self, instance_id: Uuid) -> Result<Option<String>, ZapflowError> {
        let response = self
            .send(
                Method::GET,
                &format!("/sessions/{instance_id}/qr"),
                None,
                &[StatusCode::NOT_FOUND],
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let qr: QrResponse = self.read_json(response).await?;
        Ok(qr.qr.filter(|code| !code.is_empty()))
    }

    async fn send_message(
        &self,
        instance_id: Uuid,
        message: &OutboundMessage,
    ) -> Result<String, ZapflowError> {
        let response = self
            .send(
                Method::POST,
                &format!("/sessions/{instance_id}/messages"),
                Some(to_json(message)?),
                &[],
            )
            .await?;
        let sent: SentResponse = self.read_json(response).await?;
        Ok(sent.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn driver(server: &MockServer) -> BridgeDriver {
        BridgeDriver::new(
            &server.uri(),
            "https://api.example.com/",
            Some("bridge-secret"),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn start_session_posts_callback() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path(format!("/sessions/{id}")))
            .and(header(BRIDGE_TOKEN_HEADER, "bridge-secret"))
            .and(body_json(json!({
                "sessionPath": "/data/sessions/x",
                "callbackUrl": format!("https://api.example.com/api/bridge/instances/{id}/events"),
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        driver(&server)
            .start_session(id, "/data/sessions/x")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_message_returns_provider_id() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path(format!("/sessions/{id}/messages")))
            .and(body_json(json!({"to": "5511999998888@c.us", "body": "oi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wamid-42"})))
            .mount(&server)
            .await;

        let sent = driver(&server)
            .send_message(
                id,
                &OutboundMessage {
                    to: "5511999998888@c.us".into(),
                    body: "oi".into(),
                    media_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(sent, "wamid-42");
    }

    #[tokio::test]
    async fn missing_qr_is_none() {
        let server = MockServer::start().await;
        let pending = Uuid::new_v4();
        let absent = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path(format!("/sessions/{pending}/qr")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"qr": "2@abc"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/sessions/{absent}/qr")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let driver = driver(&server);
        assert_eq!(driver.qr_code(pending).await.unwrap().as_deref(), Some("2@abc"));
        assert_eq!(driver.qr_code(absent).await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_error_maps_to_driver_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("browser crashed"))
            .mount(&server)
            .await;

        let err = driver(&server).logout(Uuid::new_v4()).await.unwrap_err();
        match err {
            ZapflowError::Driver { message, .. } => assert!(message.contains("browser crashed")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_bridge_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let driver = BridgeDriver::new(
            &server.uri(),
            "http://localhost:3000",
            None,
            Duration::from_millis(50),
        )
        .unwrap();
        let err = driver
            .start_session(Uuid::new_v4(), "/tmp/s")
            .await
            .unwrap_err();
        assert!(matches!(err, ZapflowError::Timeout { .. }));
    }

    #[tokio::test]
    async fn stopping_unknown_session_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        driver(&server).stop_session(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn health_reflects_sidecar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        assert_eq!(
            driver(&server).health_check().await.unwrap(),
            HealthStatus::Healthy
        );

        let down = BridgeDriver::new(
            "http://127.0.0.1:1",
            "http://localhost:3000",
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(!down.health_check().await.unwrap().is_available());
    }
}
