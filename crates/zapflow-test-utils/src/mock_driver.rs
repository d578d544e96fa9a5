// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock session driver for deterministic testing.
//!
//! `MockDriver` implements `SessionDriver` without a bridge sidecar. Every
//! call is captured for assertions, and failures can be switched on per
//! operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;
use zapflow_core::{Adapter, HealthStatus, OutboundMessage, SessionDriver, ZapflowError};

/// A captured driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Start { instance_id: Uuid, session_path: String },
    Stop(Uuid),
    Logout(Uuid),
    Qr(Uuid),
    Send { instance_id: Uuid, message: OutboundMessage },
}

/// A session driver that records calls and answers from local state.
#[derive(Default)]
pub struct MockDriver {
    calls: Arc<Mutex<Vec<DriverCall>>>,
    qr: Arc<Mutex<Option<String>>>,
    fail_start: AtomicBool,
    fail_send: AtomicBool,
    unhealthy: AtomicBool,
    next_id: AtomicU64,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start_session` fail until switched off again.
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make `send_message` fail until switched off again.
    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// QR code returned by `qr_code`.
    pub async fn set_qr(&self, qr: Option<&str>) {
        *self.qr.lock().await = qr.map(str::to_string);
    }

    pub async fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().await.clone()
    }

    /// Messages passed to `send_message`, in order.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                DriverCall::Send { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: DriverCall) {
        self.calls.lock().await.push(call);
    }

    fn failure(operation: &str) -> ZapflowError {
        ZapflowError::Driver {
            message: format!("mock {operation} failure"),
            source: None,
        }
    }
}

#[async_trait]
impl Adapter for MockDriver {
    fn name(&self) -> &str {
        "mock-driver"
    }

    async fn health_check(&self) -> Result<HealthStatus, ZapflowError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("mock bridge down".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), ZapflowError> {
        Ok(())
    }
}

#[async_trait]
impl SessionDriver for MockDriver {
    async fn start_session(
        &self,
        instance_id: Uuid,
        session_path: &str,
    ) -> Result<(), ZapflowError> {
        self.record(DriverCall::Start {
            instance_id,
            session_path: session_path.to_string(),
        })
        .await;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Self::failure("start"));
        }
        Ok(())
    }

    async fn stop_session(&self, instance_id: Uuid) -> Result<(), ZapflowError> {
        self.record(DriverCall::Stop(instance_id)).await;
        Ok(())
    }

    async fn logout(&self, instance_id: Uuid) -> Result<(), ZapflowError> {
        self.record(DriverCall::Logout(instance_id)).await;
        Ok(())
    }

    async fn qr_code(&self, instance_id: Uuid) -> Result<Option<String>, ZapflowError> {
        self.record(DriverCall::Qr(instance_id)).await;
        Ok(self.qr.lock().await.clone())
    }

    async fn send_message(
        &self,
        instance_id: Uuid,
        message: &OutboundMessage,
    ) -> Result<String, ZapflowError> {
        self.record(DriverCall::Send {
            instance_id,
            message: message.clone(),
        })
        .await;
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Self::failure("send"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("mock-{n}"))
    }
}
