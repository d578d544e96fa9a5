// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp instance management for the Zapflow platform.
//!
//! - [`InstanceManager`] drives instance lifecycles and outbound messages
//! - [`BridgeDriver`] talks to the WhatsApp Web bridge sidecar
//! - [`WebhookDispatcher`] fans instance events out to caller webhooks
//! - [`phone`] normalizes phone numbers into chat ids

pub mod bridge;
pub mod events;
pub mod manager;
pub mod phone;
pub mod webhook;

pub use bridge::{BRIDGE_TOKEN_HEADER, BridgeDriver};
pub use events::{AckValue, BridgeEvent};
pub use manager::{BulkAccepted, BulkRequest, InstanceManager, NewInstance, SendRequest};
pub use webhook::WebhookDispatcher;
