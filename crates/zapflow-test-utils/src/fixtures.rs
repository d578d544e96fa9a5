// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-made components for tests that need real storage and a manager.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use zapflow_core::{Instance, ZapflowError};
use zapflow_storage::database::IN_MEMORY;
use zapflow_storage::{Database, SqliteStorage};
use zapflow_whatsapp::{BridgeEvent, InstanceManager, NewInstance, WebhookDispatcher};

use crate::mock_driver::MockDriver;

/// SQLite storage backed by a private in-memory database.
pub async fn memory_storage() -> Result<Arc<SqliteStorage>, ZapflowError> {
    let db = Database::open(IN_MEMORY).await?;
    Ok(Arc::new(SqliteStorage::new(db)))
}

/// A manager wired to in-memory storage and a [`MockDriver`].
pub struct ManagerFixture {
    pub manager: InstanceManager,
    pub driver: Arc<MockDriver>,
    pub storage: Arc<SqliteStorage>,
    /// Session directory root, removed on drop.
    pub session_dir: tempfile::TempDir,
}

impl ManagerFixture {
    pub async fn new() -> Result<Self, ZapflowError> {
        Self::with_idle_ttl(Duration::ZERO).await
    }

    pub async fn with_idle_ttl(ttl: Duration) -> Result<Self, ZapflowError> {
        Self::build(ttl, None).await
    }

    /// A manager that refuses creation once `max` instances exist.
    pub async fn with_max_instances(max: u32) -> Result<Self, ZapflowError> {
        Self::build(Duration::ZERO, Some(max)).await
    }

    async fn build(ttl: Duration, max_instances: Option<u32>) -> Result<Self, ZapflowError> {
        let storage = memory_storage().await?;
        let driver = Arc::new(MockDriver::new());
        let session_dir = tempfile::TempDir::new().map_err(ZapflowError::storage)?;
        let webhooks = WebhookDispatcher::new(Duration::from_secs(2))?;
        let mut manager = InstanceManager::new(
            storage.clone(),
            driver.clone(),
            webhooks,
            session_dir.path(),
        )
        .with_idle_ttl(ttl);
        if let Some(max) = max_instances {
            manager = manager.with_max_instances(max);
        }
        Ok(Self {
            manager,
            driver,
            storage,
            session_dir,
        })
    }

    /// Create an instance and walk it through pairing to `connected`.
    pub async fn connected_instance(
        &self,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Instance, ZapflowError> {
        let instance = self
            .manager
            .create(
                owner_id,
                NewInstance {
                    name: name.to_string(),
                    webhook_url: None,
                },
            )
            .await?;
        self.manager
            .handle_event(instance.id, BridgeEvent::Qr { qr: "2@pairing".into() })
            .await?;
        self.manager
            .handle_event(
                instance.id,
                BridgeEvent::Ready {
                    phone: Some("5511999998888@c.us".into()),
                },
            )
            .await?;
        self.manager.get(instance.id, None).await
    }
}
