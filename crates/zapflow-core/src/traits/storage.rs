// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ZapflowError;
use crate::traits::adapter::Adapter;
use crate::types::{
    AckState, Instance, InstanceFilter, InstanceStatus, Message, MessageFilter, Page, User,
    WebhookConfig,
};

/// Persistence for instances, messages, and accounts.
#[async_trait]
pub trait StorageAdapter: Adapter {
    // --- Instance operations ---

    /// Inserts a new instance. Fails with `Conflict` on a duplicate id or
    /// a duplicate name for the same owner.
    async fn create_instance(&self, instance: &Instance) -> Result<(), ZapflowError>;

    /// Inserts a new instance only while fewer than `max` records exist.
    ///
    /// The count and the insert happen atomically; a full store yields
    /// `Capacity`.
    async fn create_instance_capped(
        &self,
        instance: &Instance,
        max: u64,
    ) -> Result<(), ZapflowError>;

    async fn get_instance(&self, id: Uuid) -> Result<Option<Instance>, ZapflowError>;

    async fn list_instances(&self, filter: &InstanceFilter)
    -> Result<Page<Instance>, ZapflowError>;

    /// Number of instance records currently held (every record owns a session).
    async fn count_instances(&self) -> Result<u64, ZapflowError>;

    /// Persists a status change (and the paired phone, when known), bumping
    /// `last_activity_at`.
    ///
    /// With `expected` set, the row changes only while it still holds that
    /// status; otherwise the call fails with `InvalidTransition`.
    async fn update_instance_status(
        &self,
        id: Uuid,
        status: InstanceStatus,
        phone: Option<&str>,
        expected: Option<InstanceStatus>,
    ) -> Result<(), ZapflowError>;

    /// Bumps `last_activity_at` to now.
    async fn touch_instance(&self, id: Uuid) -> Result<(), ZapflowError>;

    async fn set_webhook(
        &self,
        id: Uuid,
        webhook: Option<&WebhookConfig>,
    ) -> Result<(), ZapflowError>;

    /// Deletes the instance and its messages. Returns whether a row existed.
    async fn delete_instance(&self, id: Uuid) -> Result<bool, ZapflowError>;

    /// Disconnected instances whose last activity is older than `before`.
    async fn list_idle_instances(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<Instance>, ZapflowError>;

    // --- Message operations ---

    async fn insert_message(&self, message: &Message) -> Result<(), ZapflowError>;

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, ZapflowError>;

    async fn list_messages(&self, filter: &MessageFilter) -> Result<Page<Message>, ZapflowError>;

    /// Sets the ack state of the message with the given id.
    async fn update_ack(&self, id: Uuid, ack: AckState) -> Result<(), ZapflowError>;

    /// Finds a message by the id the bridge assigned to it.
    async fn find_message_by_provider_id(
        &self,
        instance_id: Uuid,
        provider_id: &str,
    ) -> Result<Option<Message>, ZapflowError>;

    // --- Account operations ---

    /// Inserts a new account. Fails with `Conflict` on a duplicate email.
    async fn create_user(&self, user: &User) -> Result<(), ZapflowError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ZapflowError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ZapflowError>;
}
