// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort delivery of instance events to caller-configured webhooks.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};
use uuid::Uuid;
use zapflow_core::{WebhookConfig, WebhookEvent, ZapflowError};

type HmacSha256 = Hmac<Sha256>;

/// Header naming the event type of a delivery.
pub const EVENT_HEADER: &str = "X-Zapflow-Event";
/// Header carrying `sha256=<hex>` of the request body when a secret is set.
pub const SIGNATURE_HEADER: &str = "X-Zapflow-Signature";

/// JSON body POSTed to webhook targets.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub event: WebhookEvent,
    pub instance_id: Uuid,
    pub timestamp: String,
    pub data: &'a serde_json::Value,
}

/// Signature header value for a body signed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Check a `sha256=<hex>` signature header in constant time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_sig) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Posts event payloads to webhook URLs.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, ZapflowError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ZapflowError::Internal(format!("failed to build webhook client: {e}")))?;
        Ok(Self { client })
    }

    /// Deliver one event. Returns whether the target answered 2xx.
    ///
    /// Never fails: errors are logged and counted.
    pub async fn deliver(
        &self,
        webhook: &WebhookConfig,
        event: WebhookEvent,
        instance_id: Uuid,
        data: &serde_json::Value,
    ) -> bool {
        let payload = WebhookPayload {
            event,
            instance_id,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(%instance_id, error = %e, "failed to encode webhook payload");
                zapflow_prometheus::record_webhook("failed");
                return false;
            }
        };

        let mut request = self
            .client
            .post(&webhook.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, event.to_string());
        if let Some(signature) = webhook.secret.as_deref().and_then(|s| sign(s, &body)) {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let delivered = match request.body(body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%instance_id, %event, "webhook delivered");
                true
            }
            Ok(response) => {
                warn!(
                    %instance_id,
                    %event,
                    status = %response.status(),
                    "webhook target rejected delivery"
                );
                false
            }
            Err(e) => {
                warn!(%instance_id, %event, error = %e, "webhook delivery failed");
                false
            }
        };
        zapflow_prometheus::record_webhook(if delivered { "delivered" } else { "failed" });
        delivered
    }
}
