// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by storage, the instance manager, and the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    /// Whether the adapter can serve traffic (healthy or degraded).
    pub fn is_available(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy(_))
    }
}

/// Connection status of a WhatsApp instance.
///
/// Lifecycle: `connecting -> authenticating -> connected`, any status may drop
/// to `disconnected`, and a disconnected instance may be restarted into
/// `connecting`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InstanceStatus {
    Connecting,
    Authenticating,
    #[serde(alias = "ready")]
    #[strum(to_string = "connected", serialize = "ready")]
    Connected,
    Disconnected,
}

impl InstanceStatus {
    /// Whether moving from `self` to `next` respects the instance lifecycle.
    ///
    /// Staying in the same status is always allowed (idempotent updates from
    /// the bridge).
    pub fn can_transition_to(self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Authenticating, Connected)
                | (_, Disconnected)
                | (Disconnected, Connecting)
        )
    }
}

/// Events an instance webhook can subscribe to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookEvent {
    Message,
    MessageAck,
    Status,
    Qr,
}

/// Caller-configured HTTP callback for instance events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Target URL receiving POSTed event payloads.
    pub url: String,
    /// Subscribed events.
    pub events: Vec<WebhookEvent>,
    /// Whether deliveries are currently active.
    pub enabled: bool,
    /// HMAC-SHA256 signing secret. Never serialized to API responses.
    #[serde(skip_serializing, default)]
    pub secret: Option<String>,
}

impl WebhookConfig {
    /// Whether this webhook should receive the given event.
    pub fn wants(&self, event: WebhookEvent) -> bool {
        self.enabled && self.events.contains(&event)
    }
}

/// One managed WhatsApp session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub status: InstanceStatus,
    /// Directory holding the session credentials for this instance.
    pub session_path: String,
    /// Phone number of the paired account, known once connected.
    pub phone: Option<String>,
    pub webhook: Option<WebhookConfig>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Direction of a message relative to the instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

/// Delivery acknowledgement state of a message.
///
/// Acks only move forward (`pending -> sent -> delivered -> read`); `failed`
/// is terminal and reachable from any non-read state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AckState {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl AckState {
    fn rank(self) -> u8 {
        match self {
            AckState::Pending => 0,
            AckState::Sent => 1,
            AckState::Delivered => 2,
            AckState::Read => 3,
            AckState::Failed => 4,
        }
    }

    /// Whether an ack update from `self` to `next` should be applied.
    pub fn can_advance_to(self, next: AckState) -> bool {
        match (self, next) {
            (AckState::Failed, _) => false,
            (AckState::Read, AckState::Failed) => false,
            (_, AckState::Failed) => true,
            _ => next.rank() > self.rank(),
        }
    }
}

/// A sent or received WhatsApp message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub direction: MessageDirection,
    /// Chat id of the other party (`<digits>@c.us`).
    pub remote: String,
    pub body: String,
    pub media_url: Option<String>,
    pub ack: AckState,
    /// Message id assigned by the bridge, used to correlate ack updates.
    pub provider_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Account role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// A platform account that owns instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Filter and pagination for instance listings.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    /// Restrict to instances owned by this user.
    pub owner_id: Option<Uuid>,
    pub status: Option<InstanceStatus>,
    pub limit: u32,
    pub offset: u32,
}

/// Filter and pagination for message listings.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub instance_id: Option<Uuid>,
    /// Restrict to messages of instances owned by this user.
    pub owner_id: Option<Uuid>,
    pub direction: Option<MessageDirection>,
    pub limit: u32,
    pub offset: u32,
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// A message handed to the session driver for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Chat id of the recipient.
    pub to: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lifecycle_forward_path_is_allowed() {
        use InstanceStatus::*;
        assert!(Connecting.can_transition_to(Authenticating));
        assert!(Authenticating.can_transition_to(Connected));
    }

    #[test]
    fn any_status_can_disconnect() {
        use InstanceStatus::*;
        for from in [Connecting, Authenticating, Connected, Disconnected] {
            assert!(from.can_transition_to(Disconnected), "{from} -> disconnected");
        }
    }

    #[test]
    fn skipping_or_reversing_lifecycle_is_rejected() {
        use InstanceStatus::*;
        assert!(!Connecting.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Authenticating));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Disconnected.can_transition_to(Connected));
    }

    #[test]
    fn restart_from_disconnected_enters_connecting() {
        assert!(InstanceStatus::Disconnected.can_transition_to(InstanceStatus::Connecting));
    }

    #[test]
    fn ready_is_an_alias_for_connected() {
        assert_eq!(
            InstanceStatus::from_str("ready").unwrap(),
            InstanceStatus::Connected
        );
        let parsed: InstanceStatus = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(parsed, InstanceStatus::Connected);
        assert_eq!(InstanceStatus::Connected.to_string(), "connected");
    }

    #[test]
    fn ack_only_moves_forward() {
        assert!(AckState::Pending.can_advance_to(AckState::Sent));
        assert!(AckState::Sent.can_advance_to(AckState::Read));
        assert!(!AckState::Read.can_advance_to(AckState::Delivered));
        assert!(!AckState::Delivered.can_advance_to(AckState::Delivered));
    }

    #[test]
    fn failed_ack_is_terminal() {
        assert!(AckState::Sent.can_advance_to(AckState::Failed));
        assert!(!AckState::Failed.can_advance_to(AckState::Read));
        assert!(!AckState::Read.can_advance_to(AckState::Failed));
    }

    #[test]
    fn webhook_secret_is_not_serialized() {
        let webhook = WebhookConfig {
            url: "https://example.com/hook".into(),
            events: vec![WebhookEvent::Message],
            enabled: true,
            secret: Some("super-secret".into()),
        };
        let json = serde_json::to_string(&webhook).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(webhook.wants(WebhookEvent::Message));
        assert!(!webhook.wants(WebhookEvent::Qr));
    }

    #[test]
    fn webhook_event_names_are_snake_case() {
        assert_eq!(WebhookEvent::MessageAck.to_string(), "message_ack");
        assert_eq!(
            WebhookEvent::from_str("message_ack").unwrap(),
            WebhookEvent::MessageAck
        );
    }
}
