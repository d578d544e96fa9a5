// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events pushed by the bridge sidecar to the event callback.

use chrono::{DateTime, TimeZone, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use zapflow_core::AckState;

/// Ack as sent by the bridge: a state name or a WhatsApp Web ack code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckValue {
    Code(i64),
    State(AckState),
}

impl AckValue {
    /// Map to an ack state. Codes: -1 error, 0 pending, 1 server, 2 device,
    /// 3 read, 4 played.
    pub fn state(self) -> Option<AckState> {
        match self {
            AckValue::State(state) => Some(state),
            AckValue::Code(-1) => Some(AckState::Failed),
            AckValue::Code(0) => Some(AckState::Pending),
            AckValue::Code(1) => Some(AckState::Sent),
            AckValue::Code(2) => Some(AckState::Delivered),
            AckValue::Code(3 | 4) => Some(AckState::Read),
            AckValue::Code(_) => None,
        }
    }
}

/// A session event reported by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeEvent {
    /// A pairing QR code is waiting to be scanned.
    Qr {
        #[garde(length(min = 1))]
        qr: String,
    },
    /// The QR code was scanned (or stored credentials were accepted).
    Authenticated,
    /// The session is connected and can send messages.
    Ready {
        #[garde(skip)]
        #[serde(default)]
        phone: Option<String>,
    },
    Disconnected {
        #[garde(skip)]
        #[serde(default)]
        reason: Option<String>,
    },
    /// An incoming message.
    #[serde(rename_all = "camelCase")]
    Message {
        /// Bridge-assigned message id.
        #[garde(length(min = 1))]
        id: String,
        /// Sender chat id.
        #[garde(length(min = 1))]
        from: String,
        #[garde(skip)]
        #[serde(default)]
        body: String,
        #[garde(skip)]
        #[serde(default)]
        media_url: Option<String>,
        /// Unix seconds.
        #[garde(skip)]
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Delivery progress of an outgoing message.
    Ack {
        #[garde(length(min = 1))]
        id: String,
        #[garde(skip)]
        ack: AckValue,
    },
}

impl BridgeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeEvent::Qr { .. } => "qr",
            BridgeEvent::Authenticated => "authenticated",
            BridgeEvent::Ready { .. } => "ready",
            BridgeEvent::Disconnected { .. } => "disconnected",
            BridgeEvent::Message { .. } => "message",
            BridgeEvent::Ack { .. } => "ack",
        }
    }
}

/// Message timestamp from unix seconds, falling back to now.
pub(crate) fn event_time(timestamp: Option<i64>) -> DateTime<Utc> {
    timestamp
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tagged_events() {
        let qr: BridgeEvent = serde_json::from_value(json!({"type": "qr", "qr": "2@abc"})).unwrap();
        assert_eq!(qr, BridgeEvent::Qr { qr: "2@abc".into() });

        let ready: BridgeEvent = serde_json::from_value(json!({"type": "ready"})).unwrap();
        assert_eq!(ready, BridgeEvent::Ready { phone: None });

        let message: BridgeEvent = serde_json::from_value(json!({
            "type": "message",
            "id": "wamid-1",
            "from": "5511999998888@c.us",
            "body": "oi",
            "mediaUrl": "https://cdn.example.com/a.jpg",
            "timestamp": 1767225600
        }))
        .unwrap();
        match message {
            BridgeEvent::Message { media_url, .. } => {
                assert_eq!(media_url.as_deref(), Some("https://cdn.example.com/a.jpg"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ack_accepts_codes_and_names() {
        let coded: BridgeEvent =
            serde_json::from_value(json!({"type": "ack", "id": "x", "ack": 3})).unwrap();
        let named: BridgeEvent =
            serde_json::from_value(json!({"type": "ack", "id": "x", "ack": "read"})).unwrap();
        for event in [coded, named] {
            let BridgeEvent::Ack { ack, .. } = event else {
                panic!("expected ack");
            };
            assert_eq!(ack.state(), Some(AckState::Read));
        }
        assert_eq!(AckValue::Code(-1).state(), Some(AckState::Failed));
        assert_eq!(AckValue::Code(9).state(), None);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_value::<BridgeEvent>(json!({"type": "typing"})).is_err());
    }

    #[test]
    fn empty_qr_fails_validation() {
        assert!(BridgeEvent::Qr { qr: String::new() }.validate().is_err());
        assert!(BridgeEvent::Authenticated.validate().is_ok());
    }

    #[test]
    fn event_time_falls_back_to_now() {
        assert_eq!(event_time(Some(0)).timestamp(), 0);
        assert!(event_time(None) <= Utc::now());
    }
}
