// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session driver trait for the external WhatsApp automation layer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ZapflowError;
use crate::traits::adapter::Adapter;
use crate::types::OutboundMessage;

/// Drives WhatsApp Web sessions on behalf of instances.
///
/// The automation itself runs outside this process; implementations only
/// relay commands. Status changes, QR codes, incoming messages and acks flow
/// back asynchronously as bridge events.
#[async_trait]
pub trait SessionDriver: Adapter {
    /// Starts (or resumes) the session for an instance.
    async fn start_session(&self, instance_id: Uuid, session_path: &str)
    -> Result<(), ZapflowError>;

    /// Stops the session, keeping stored credentials.
    async fn stop_session(&self, instance_id: Uuid) -> Result<(), ZapflowError>;

    /// Logs the account out, invalidating stored credentials.
    async fn logout(&self, instance_id: Uuid) -> Result<(), ZapflowError>;

    /// Returns the pending pairing QR code, if the session is waiting for a scan.
    async fn qr_code(&self, instance_id: Uuid) -> Result<Option<String>, ZapflowError>;

    /// Sends a message and returns the id assigned by the automation layer.
    async fn send_message(
        &self,
        instance_id: Uuid,
        message: &OutboundMessage,
    ) -> Result<String, ZapflowError>;
}
