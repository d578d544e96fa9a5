// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance lifecycle orchestration.
//!
//! [`InstanceManager`] owns the rules that tie persisted instances to bridge
//! sessions: creation and teardown, status transitions driven by bridge
//! events, outbound sends, and webhook fan-out. Background work (webhook
//! deliveries, bulk sends) runs on a [`TaskTracker`] and stops when the
//! manager's cancellation token fires.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zapflow_config::ZapflowConfig;
use zapflow_core::{
    AckState, Instance, InstanceFilter, InstanceStatus, Message, MessageDirection, MessageFilter,
    OutboundMessage, Page, SessionDriver, StorageAdapter, WebhookConfig, WebhookEvent,
    ZapflowError,
};
use zapflow_limits::{CleanupHook, InstanceCounter};

use crate::events::{BridgeEvent, event_time};
use crate::phone;
use crate::webhook::WebhookDispatcher;

/// Events subscribed by a webhook configured at creation time.
pub const ALL_EVENTS: [WebhookEvent; 4] = [
    WebhookEvent::Message,
    WebhookEvent::MessageAck,
    WebhookEvent::Status,
    WebhookEvent::Qr,
];

#[derive(Debug, Clone)]
pub struct NewInstance {
    pub name: String,
    /// Subscribes a webhook to every event when set.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub instance_id: Uuid,
    /// Recipient phone number in any common formatting.
    pub to: String,
    pub body: String,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub instance_id: Uuid,
    pub recipients: Vec<String>,
    pub body: String,
    /// Pause between consecutive sends.
    pub delay: Duration,
}

/// Acknowledgement of a queued bulk send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAccepted {
    pub batch_id: Uuid,
    pub total: usize,
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn invalid_recipient(raw: &str, err: phone::PhoneError) -> ZapflowError {
    ZapflowError::Validation(format!("invalid phone number `{raw}`: {err}"))
}

/// Coordinates storage, the session driver, and webhooks.
///
/// Operations taking a `scope` restrict access to instances owned by that
/// account; `None` grants access to every instance. Instances outside the
/// scope are reported as not found.
#[derive(Clone)]
pub struct InstanceManager {
    storage: Arc<dyn StorageAdapter>,
    driver: Arc<dyn SessionDriver>,
    webhooks: WebhookDispatcher,
    session_dir: PathBuf,
    idle_ttl: Duration,
    max_instances: Option<u64>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl InstanceManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        driver: Arc<dyn SessionDriver>,
        webhooks: WebhookDispatcher,
        session_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            driver,
            webhooks,
            session_dir: session_dir.into(),
            idle_ttl: Duration::ZERO,
            max_instances: None,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(
        config: &ZapflowConfig,
        storage: Arc<dyn StorageAdapter>,
        driver: Arc<dyn SessionDriver>,
    ) -> Result<Self, ZapflowError> {
        let webhooks =
            WebhookDispatcher::new(Duration::from_secs(config.whatsapp.webhook_timeout_secs))?;
        Ok(Self::new(storage, driver, webhooks, &config.whatsapp.session_dir)
            .with_idle_ttl(Duration::from_secs(config.limits.idle_instance_ttl_secs))
            .with_max_instances(config.limits.max_instances))
    }

    /// Evict instances disconnected for longer than `ttl`. Zero disables.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Refuse to create an instance once `max` records exist.
    pub fn with_max_instances(mut self, max: u32) -> Self {
        self.max_instances = Some(u64::from(max));
        self
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn driver(&self) -> &Arc<dyn SessionDriver> {
        &self.driver
    }

    async fn owned(&self, id: Uuid, scope: Option<Uuid>) -> Result<Instance, ZapflowError> {
        match self.storage.get_instance(id).await? {
            Some(instance) if scope.is_none_or(|owner| owner == instance.owner_id) => Ok(instance),
            _ => Err(ZapflowError::instance_not_found(id)),
        }
    }

    async fn refresh_live_gauge(&self) {
        match self.storage.count_instances().await {
            Ok(count) => zapflow_prometheus::set_live_instances(count),
            Err(e) => debug!(error = %e, "failed to count instances"),
        }
    }

    /// Queue a webhook delivery when the instance subscribes to `event`.
    fn notify(&self, instance: &Instance, event: WebhookEvent, data: serde_json::Value) {
        let Some(webhook) = instance.webhook.clone().filter(|w| w.wants(event)) else {
            return;
        };
        let dispatcher = self.webhooks.clone();
        let instance_id = instance.id;
        self.tracker.spawn(async move {
            dispatcher.deliver(&webhook, event, instance_id, &data).await;
        });
    }

    /// Persist a status change and announce it.
    ///
    /// Re-entering the current status without new data is a no-op.
    async fn apply_status(
        &self,
        mut instance: Instance,
        next: InstanceStatus,
        phone: Option<&str>,
    ) -> Result<Instance, ZapflowError> {
        let phone_unchanged = phone.is_none_or(|p| instance.phone.as_deref() == Some(p));
        if instance.status == next && phone_unchanged {
            return Ok(instance);
        }
        if !instance.status.can_transition_to(next) {
            return Err(ZapflowError::InvalidTransition {
                from: instance.status.to_string(),
                to: next.to_string(),
            });
        }

        // Any status may drop to disconnected; every other change must
        // still start from the status it was validated against.
        let expected = (next != InstanceStatus::Disconnected).then_some(instance.status);
        self.storage
            .update_instance_status(instance.id, next, phone, expected)
            .await?;
        let previous = instance.status;
        instance.status = next;
        if let Some(phone) = phone {
            instance.phone = Some(phone.to_string());
        }
        instance.last_activity_at = now();
        info!(instance_id = %instance.id, %previous, status = %next, "instance status changed");

        self.notify(
            &instance,
            WebhookEvent::Status,
            json!({ "status": next, "previous": previous, "phone": instance.phone }),
        );
        Ok(instance)
    }

    // --- Lifecycle ---

    /// Create an instance and ask the bridge to start its session.
    ///
    /// A bridge failure does not fail creation: the instance is kept and
    /// reported as disconnected so it can be restarted later.
    pub async fn create(
        &self,
        owner_id: Uuid,
        request: NewInstance,
    ) -> Result<Instance, ZapflowError> {
        let id = Uuid::new_v4();
        let created_at = now();
        let session_path = self
            .session_dir
            .join(id.to_string())
            .to_string_lossy()
            .into_owned();
        let webhook = request.webhook_url.map(|url| WebhookConfig {
            url,
            events: ALL_EVENTS.to_vec(),
            enabled: true,
            secret: None,
        });
        let mut instance = Instance {
            id,
            name: request.name,
            owner_id,
            status: InstanceStatus::Connecting,
            session_path,
            phone: None,
            webhook,
            created_at,
            last_activity_at: created_at,
        };

        let inserted = match self.max_instances {
            Some(max) => self.storage.create_instance_capped(&instance, max).await,
            None => self.storage.create_instance(&instance).await,
        };
        if let Err(e) = inserted {
            if let ZapflowError::Capacity { current, max } = &e {
                warn!(%owner_id, current, max, "instance creation rejected at capacity");
                zapflow_prometheus::record_instance_rejected("capacity");
            }
            return Err(e);
        }
        zapflow_prometheus::record_instance_created();
        info!(instance_id = %id, %owner_id, name = %instance.name, "instance created");

        let started = self.driver.start_session(id, &instance.session_path).await;
        if let Err(e) = started {
            warn!(instance_id = %id, error = %e, "bridge failed to start session");
            self.storage
                .update_instance_status(id, InstanceStatus::Disconnected, None, None)
                .await?;
            instance.status = InstanceStatus::Disconnected;
        }

        self.refresh_live_gauge().await;
        Ok(instance)
    }

    pub async fn get(&self, id: Uuid, scope: Option<Uuid>) -> Result<Instance, ZapflowError> {
        self.owned(id, scope).await
    }

    pub async fn list(
        &self,
        scope: Option<Uuid>,
        mut filter: InstanceFilter,
    ) -> Result<Page<Instance>, ZapflowError> {
        if scope.is_some() {
            filter.owner_id = scope;
        }
        self.storage.list_instances(&filter).await
    }

    /// Stop the session and remove the instance, its messages, and its
    /// session directory.
    pub async fn delete(&self, id: Uuid, scope: Option<Uuid>) -> Result<(), ZapflowError> {
        let instance = self.owned(id, scope).await?;
        self.teardown(&instance).await?;
        info!(instance_id = %id, "instance deleted");
        self.refresh_live_gauge().await;
        Ok(())
    }

    async fn teardown(&self, instance: &Instance) -> Result<bool, ZapflowError> {
        if let Err(e) = self.driver.stop_session(instance.id).await {
            warn!(instance_id = %instance.id, error = %e, "failed to stop bridge session");
        }
        let removed = self.storage.delete_instance(instance.id).await?;
        match tokio::fs::remove_dir_all(&instance.session_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                instance_id = %instance.id,
                path = %instance.session_path,
                error = %e,
                "failed to remove session directory"
            ),
        }
        Ok(removed)
    }

    /// Start a new session for a disconnected instance.
    pub async fn restart(&self, id: Uuid, scope: Option<Uuid>) -> Result<Instance, ZapflowError> {
        let instance = self.owned(id, scope).await?;
        if instance.status != InstanceStatus::Disconnected {
            return Err(ZapflowError::InvalidTransition {
                from: instance.status.to_string(),
                to: InstanceStatus::Connecting.to_string(),
            });
        }

        let instance = self
            .apply_status(instance, InstanceStatus::Connecting, None)
            .await?;
        let started = self.driver.start_session(id, &instance.session_path).await;
        if let Err(e) = started {
            warn!(instance_id = %id, error = %e, "bridge failed to restart session");
            self.apply_status(instance, InstanceStatus::Disconnected, None)
                .await?;
            return Err(e);
        }
        Ok(instance)
    }

    /// Log the WhatsApp account out and mark the instance disconnected.
    pub async fn logout(&self, id: Uuid, scope: Option<Uuid>) -> Result<Instance, ZapflowError> {
        let instance = self.owned(id, scope).await?;
        if let Err(e) = self.driver.logout(id).await {
            warn!(instance_id = %id, error = %e, "bridge logout failed");
        }
        self.apply_status(instance, InstanceStatus::Disconnected, None)
            .await
    }

    /// The pending pairing QR code, if any.
    pub async fn qr(&self, id: Uuid, scope: Option<Uuid>) -> Result<Option<String>, ZapflowError> {
        let instance = self.owned(id, scope).await?;
        self.driver.qr_code(instance.id).await
    }

    pub async fn set_webhook(
        &self,
        id: Uuid,
        scope: Option<Uuid>,
        webhook: WebhookConfig,
    ) -> Result<Instance, ZapflowError> {
        let mut instance = self.owned(id, scope).await?;
        self.storage.set_webhook(id, Some(&webhook)).await?;
        info!(instance_id = %id, url = %webhook.url, "webhook configured");
        instance.webhook = Some(webhook);
        Ok(instance)
    }

    pub async fn clear_webhook(
        &self,
        id: Uuid,
        scope: Option<Uuid>,
    ) -> Result<Instance, ZapflowError> {
        let mut instance = self.owned(id, scope).await?;
        self.storage.set_webhook(id, None).await?;
        info!(instance_id = %id, "webhook removed");
        instance.webhook = None;
        Ok(instance)
    }

    // --- Messaging ---

    fn ensure_connected(instance: &Instance) -> Result<(), ZapflowError> {
        if instance.status == InstanceStatus::Connected {
            Ok(())
        } else {
            Err(ZapflowError::Conflict(format!(
                "instance {} is {}, not connected",
                instance.id, instance.status
            )))
        }
    }

    /// Send one message through a connected instance.
    ///
    /// The message is stored even when the bridge rejects it, with ack
    /// `failed`.
    pub async fn send_message(
        &self,
        scope: Option<Uuid>,
        request: SendRequest,
    ) -> Result<Message, ZapflowError> {
        let instance = self.owned(request.instance_id, scope).await?;
        Self::ensure_connected(&instance)?;
        let to = phone::to_chat_id(&request.to).map_err(|e| invalid_recipient(&request.to, e))?;
        self.deliver(
            instance.id,
            OutboundMessage {
                to,
                body: request.body,
                media_url: request.media_url,
            },
        )
        .await
    }

    async fn deliver(
        &self,
        instance_id: Uuid,
        outbound: OutboundMessage,
    ) -> Result<Message, ZapflowError> {
        let (ack, provider_id) = match self.driver.send_message(instance_id, &outbound).await {
            Ok(provider_id) => (AckState::Sent, Some(provider_id)),
            Err(e) => {
                warn!(%instance_id, to = %outbound.to, error = %e, "bridge failed to send message");
                (AckState::Failed, None)
            }
        };

        let message = Message {
            id: Uuid::new_v4(),
            instance_id,
            direction: MessageDirection::Outgoing,
            remote: outbound.to,
            body: outbound.body,
            media_url: outbound.media_url,
            ack,
            provider_id,
            timestamp: now(),
        };
        self.storage.insert_message(&message).await?;
        self.storage.touch_instance(instance_id).await?;
        zapflow_prometheus::record_message("outgoing");
        debug!(%instance_id, message_id = %message.id, %ack, "outgoing message stored");
        Ok(message)
    }

    /// Queue the same text for many recipients.
    ///
    /// Recipients are validated up front; sends then run sequentially in
    /// the background, `delay` apart, until done or cancelled.
    pub async fn bulk_send(
        &self,
        scope: Option<Uuid>,
        request: BulkRequest,
    ) -> Result<BulkAccepted, ZapflowError> {
        let instance = self.owned(request.instance_id, scope).await?;
        Self::ensure_connected(&instance)?;
        let recipients = request
            .recipients
            .iter()
            .map(|raw| phone::to_chat_id(raw).map_err(|e| invalid_recipient(raw, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let accepted = BulkAccepted {
            batch_id: Uuid::new_v4(),
            total: recipients.len(),
        };
        info!(
            instance_id = %instance.id,
            batch_id = %accepted.batch_id,
            total = accepted.total,
            "bulk send queued"
        );

        let this = self.clone();
        let body = request.body;
        let delay = request.delay;
        self.tracker.spawn(async move {
            this.run_batch(accepted.batch_id, instance.id, recipients, body, delay)
                .await;
        });
        Ok(accepted)
    }

    async fn run_batch(
        &self,
        batch_id: Uuid,
        instance_id: Uuid,
        recipients: Vec<String>,
        body: String,
        delay: Duration,
    ) {
        let (mut sent, mut failed) = (0usize, 0usize);
        for (index, to) in recipients.into_iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                info!(%batch_id, sent, failed, "bulk send cancelled");
                return;
            }

            let outbound = OutboundMessage {
                to,
                body: body.clone(),
                media_url: None,
            };
            match self.deliver(instance_id, outbound).await {
                Ok(message) if message.ack == AckState::Failed => failed += 1,
                Ok(_) => sent += 1,
                Err(e) => {
                    warn!(%batch_id, error = %e, "bulk message could not be stored");
                    failed += 1;
                }
            }
        }
        info!(%batch_id, %instance_id, sent, failed, "bulk send finished");
    }

    pub async fn list_messages(
        &self,
        scope: Option<Uuid>,
        mut filter: MessageFilter,
    ) -> Result<Page<Message>, ZapflowError> {
        if scope.is_some() {
            filter.owner_id = scope;
        }
        self.storage.list_messages(&filter).await
    }

    pub async fn get_message(&self, id: Uuid, scope: Option<Uuid>) -> Result<Message, ZapflowError> {
        let message = self
            .storage
            .get_message(id)
            .await?
            .ok_or_else(|| ZapflowError::message_not_found(id))?;
        if scope.is_some() && self.owned(message.instance_id, scope).await.is_err() {
            return Err(ZapflowError::message_not_found(id));
        }
        Ok(message)
    }

    // --- Bridge events ---

    /// Apply an event reported by the bridge for an instance.
    pub async fn handle_event(
        &self,
        instance_id: Uuid,
        event: BridgeEvent,
    ) -> Result<(), ZapflowError> {
        let instance = self.owned(instance_id, None).await?;
        debug!(%instance_id, kind = event.kind(), "bridge event received");

        match event {
            BridgeEvent::Qr { qr } => {
                let instance = match instance.status {
                    InstanceStatus::Connecting => {
                        self.apply_status(instance, InstanceStatus::Authenticating, None)
                            .await?
                    }
                    InstanceStatus::Authenticating => instance,
                    other => {
                        return Err(ZapflowError::InvalidTransition {
                            from: other.to_string(),
                            to: InstanceStatus::Authenticating.to_string(),
                        });
                    }
                };
                self.notify(&instance, WebhookEvent::Qr, json!({ "qr": qr }));
            }
            BridgeEvent::Authenticated => {
                self.apply_status(instance, InstanceStatus::Authenticating, None)
                    .await?;
            }
            BridgeEvent::Ready { phone } => {
                let phone = phone.map(|p| phone::from_chat_id(&p).to_string());
                self.apply_status(instance, InstanceStatus::Connected, phone.as_deref())
                    .await?;
            }
            BridgeEvent::Disconnected { reason } => {
                info!(%instance_id, reason = reason.as_deref().unwrap_or("unknown"), "bridge reported disconnect");
                self.apply_status(instance, InstanceStatus::Disconnected, None)
                    .await?;
            }
            BridgeEvent::Message {
                id,
                from,
                body,
                media_url,
                timestamp,
            } => {
                // The bridge may redeliver events.
                if self
                    .storage
                    .find_message_by_provider_id(instance_id, &id)
                    .await?
                    .is_some()
                {
                    debug!(%instance_id, provider_id = %id, "duplicate incoming message ignored");
                    return Ok(());
                }
                let message = Message {
                    id: Uuid::new_v4(),
                    instance_id,
                    direction: MessageDirection::Incoming,
                    remote: from,
                    body,
                    media_url,
                    ack: AckState::Delivered,
                    provider_id: Some(id),
                    timestamp: event_time(timestamp).trunc_subsecs(3),
                };
                self.storage.insert_message(&message).await?;
                self.storage.touch_instance(instance_id).await?;
                zapflow_prometheus::record_message("incoming");
                let data = serde_json::to_value(&message).unwrap_or_default();
                self.notify(&instance, WebhookEvent::Message, data);
            }
            BridgeEvent::Ack { id, ack } => {
                let Some(state) = ack.state() else {
                    warn!(%instance_id, provider_id = %id, ?ack, "unknown ack value ignored");
                    return Ok(());
                };
                let Some(message) = self
                    .storage
                    .find_message_by_provider_id(instance_id, &id)
                    .await?
                else {
                    debug!(%instance_id, provider_id = %id, "ack for unknown message ignored");
                    return Ok(());
                };
                if !message.ack.can_advance_to(state) {
                    debug!(message_id = %message.id, from = %message.ack, to = %state, "stale ack ignored");
                    return Ok(());
                }
                self.storage.update_ack(message.id, state).await?;
                self.notify(
                    &instance,
                    WebhookEvent::MessageAck,
                    json!({ "messageId": message.id, "providerId": id, "ack": state }),
                );
            }
        }
        Ok(())
    }

    // --- Housekeeping ---

    pub async fn live_count(&self) -> Result<u64, ZapflowError> {
        self.storage.count_instances().await
    }

    /// Remove instances that stayed disconnected longer than the idle TTL.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> Result<usize, ZapflowError> {
        if self.idle_ttl.is_zero() {
            return Ok(0);
        }
        let ttl = TimeDelta::from_std(self.idle_ttl)
            .map_err(|e| ZapflowError::Internal(format!("idle ttl out of range: {e}")))?;
        let idle = self.storage.list_idle_instances(now - ttl).await?;

        let mut evicted = 0;
        for instance in idle {
            if self.teardown(&instance).await? {
                info!(instance_id = %instance.id, "idle instance evicted");
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.refresh_live_gauge().await;
        }
        Ok(evicted)
    }

    /// Wait for queued background work to finish.
    pub async fn wait_background(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel background work and wait for it to stop.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("instance manager stopped");
    }
}

#[async_trait]
impl InstanceCounter for InstanceManager {
    async fn live_instances(&self) -> Result<u64, ZapflowError> {
        self.live_count().await
    }
}

#[async_trait]
impl CleanupHook for InstanceManager {
    fn name(&self) -> &str {
        "idle_instances"
    }

    async fn run(&self) -> Result<usize, ZapflowError> {
        self.evict_idle(Utc::now()).await
    }
}
