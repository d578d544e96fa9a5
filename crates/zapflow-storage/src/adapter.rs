// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use zapflow_config::model::DatabaseConfig;
use zapflow_core::{
    Adapter, AckState, HealthStatus, Instance, InstanceFilter, InstanceStatus, Message,
    MessageFilter, Page, StorageAdapter, User, WebhookConfig, ZapflowError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all operations to the typed
/// query modules.
#[derive(Clone)]
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    /// Wrap an already opened database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the database described by `config` and run migrations.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, ZapflowError> {
        let db = Database::open(&config.path).await?;
        debug!(path = %config.path, "SQLite storage initialized");
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl Adapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<HealthStatus, ZapflowError> {
        match self.db.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ZapflowError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    // --- Instance operations ---

    async fn create_instance(&self, instance: &Instance) -> Result<(), ZapflowError> {
        queries::instances::create_instance(&self.db, instance).await
    }

    async fn create_instance_capped(
        &self,
        instance: &Instance,
        max: u64,
    ) -> Result<(), ZapflowError> {
        queries::instances::create_instance_capped(&self.db, instance, max).await
    }

    async fn get_instance(&self, id: Uuid) -> Result<Option<Instance>, ZapflowError> {
        queries::instances::get_instance(&self.db, id).await
    }

    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Page<Instance>, ZapflowError> {
        queries::instances::list_instances(&self.db, filter).await
    }

    async fn count_instances(&self) -> Result<u64, ZapflowError> {
        queries::instances::count_instances(&self.db).await
    }

    async fn update_instance_status(
        &self,
        id: Uuid,
        status: InstanceStatus,
        phone: Option<&str>,
        expected: Option<InstanceStatus>,
    ) -> Result<(), ZapflowError> {
        queries::instances::update_instance_status(&self.db, id, status, phone, expected).await
    }

    async fn touch_instance(&self, id: Uuid) -> Result<(), ZapflowError> {
        queries::instances::touch_instance(&self.db, id).await
    }

    async fn set_webhook(
        &self,
        id: Uuid,
        webhook: Option<&WebhookConfig>,
    ) -> Result<(), ZapflowError> {
        queries::instances::set_webhook(&self.db, id, webhook).await
    }

    async fn delete_instance(&self, id: Uuid) -> Result<bool, ZapflowError> {
        queries::instances::delete_instance(&self.db, id).await
    }

    async fn list_idle_instances(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<Instance>, ZapflowError> {
        queries::instances::list_idle_instances(&self.db, before).await
    }

    // --- Message operations ---

    async fn insert_message(&self, message: &Message) -> Result<(), ZapflowError> {
        queries::messages::insert_message(&self.db, message).await
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, ZapflowError> {
        queries::messages::get_message(&self.db, id).await
    }

    async fn list_messages(&self, filter: &MessageFilter) -> Result<Page<Message>, ZapflowError> {
        queries::messages::list_messages(&self.db, filter).await
    }

    async fn update_ack(&self, id: Uuid, ack: AckState) -> Result<(), ZapflowError> {
        queries::messages::update_ack(&self.db, id, ack).await
    }

    async fn find_message_by_provider_id(
        &self,
        instance_id: Uuid,
        provider_id: &str,
    ) -> Result<Option<Message>, ZapflowError> {
        queries::messages::find_message_by_provider_id(&self.db, instance_id, provider_id).await
    }

    // --- Account operations ---

    async fn create_user(&self, user: &User) -> Result<(), ZapflowError> {
        queries::users::create_user(&self.db, user).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ZapflowError> {
        queries::users::find_user_by_email(&self.db, email).await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, ZapflowError> {
        queries::users::get_user(&self.db, id).await
    }
}
