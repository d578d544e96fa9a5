// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance CRUD operations.

use chrono::{DateTime, Utc};
use rusqlite::{Row, TransactionBehavior, params};
use uuid::Uuid;
use zapflow_core::{
    Instance, InstanceFilter, InstanceStatus, Page, WebhookConfig, WebhookEvent, ZapflowError,
};

use super::{decode_enum, decode_ts, decode_uuid, encode_ts, is_constraint_violation};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, name, owner_id, status, session_path, phone, webhook_url, \
                       webhook_events, webhook_enabled, webhook_secret, created_at, last_activity_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Instance> {
    let webhook_url: Option<String> = row.get(6)?;
    let webhook = match webhook_url {
        Some(url) => {
            let events_json: Option<String> = row.get(7)?;
            let events: Vec<WebhookEvent> = match events_json {
                Some(json) => serde_json::from_str(&json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        7,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                None => Vec::new(),
            };
            Some(WebhookConfig {
                url,
                events,
                enabled: row.get(8)?,
                secret: row.get(9)?,
            })
        }
        None => None,
    };

    Ok(Instance {
        id: decode_uuid(0, row.get(0)?)?,
        name: row.get(1)?,
        owner_id: decode_uuid(2, row.get(2)?)?,
        status: decode_enum(3, row.get(3)?)?,
        session_path: row.get(4)?,
        phone: row.get(5)?,
        webhook,
        created_at: decode_ts(10, row.get(10)?)?,
        last_activity_at: decode_ts(11, row.get(11)?)?,
    })
}

/// Split a webhook into its column values.
fn webhook_columns(
    webhook: Option<&WebhookConfig>,
) -> Result<(Option<String>, Option<String>, bool, Option<String>), ZapflowError> {
    match webhook {
        Some(w) => {
            let events = serde_json::to_string(&w.events).map_err(ZapflowError::storage)?;
            Ok((Some(w.url.clone()), Some(events), w.enabled, w.secret.clone()))
        }
        None => Ok((None, None, false, None)),
    }
}

enum Inserted {
    Done,
    Duplicate,
    Full(u64),
}

/// Insert a new instance. Duplicate id or (owner, name) yields `Conflict`.
pub async fn create_instance(db: &Database, instance: &Instance) -> Result<(), ZapflowError> {
    insert_instance(db, instance, None).await
}

/// Insert a new instance unless `max` records already exist, in which case
/// the result is `Capacity`.
///
/// The count and the insert run in one transaction on the single writer
/// connection, so concurrent callers cannot overshoot `max`.
pub async fn create_instance_capped(
    db: &Database,
    instance: &Instance,
    max: u64,
) -> Result<(), ZapflowError> {
    insert_instance(db, instance, Some(max)).await
}

async fn insert_instance(
    db: &Database,
    instance: &Instance,
    max: Option<u64>,
) -> Result<(), ZapflowError> {
    let (webhook_url, webhook_events, webhook_enabled, webhook_secret) =
        webhook_columns(instance.webhook.as_ref())?;
    let id = instance.id.to_string();
    let name = instance.name.clone();
    let owner_id = instance.owner_id.to_string();
    let status = instance.status.to_string();
    let session_path = instance.session_path.clone();
    let phone = instance.phone.clone();
    let created_at = encode_ts(&instance.created_at);
    let last_activity_at = encode_ts(&instance.last_activity_at);

    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if let Some(max) = max {
                let current: i64 =
                    tx.query_row("SELECT COUNT(*) FROM instances", [], |row| row.get(0))?;
                let current = current as u64;
                if current >= max {
                    return Ok(Inserted::Full(current));
                }
            }
            let result = tx.execute(
                "INSERT INTO instances (id, name, owner_id, status, session_path, phone, \
                 webhook_url, webhook_events, webhook_enabled, webhook_secret, created_at, \
                 last_activity_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id,
                    name,
                    owner_id,
                    status,
                    session_path,
                    phone,
                    webhook_url,
                    webhook_events,
                    webhook_enabled,
                    webhook_secret,
                    created_at,
                    last_activity_at,
                ],
            );
            match result {
                Ok(_) => {
                    tx.commit()?;
                    Ok(Inserted::Done)
                }
                Err(e) if is_constraint_violation(&e) => Ok(Inserted::Duplicate),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        Inserted::Done => Ok(()),
        Inserted::Duplicate => Err(ZapflowError::Conflict(format!(
            "an instance named `{}` already exists",
            instance.name
        ))),
        Inserted::Full(current) => Err(ZapflowError::Capacity {
            current,
            max: max.unwrap_or(current),
        }),
    }
}

/// Get an instance by id.
pub async fn get_instance(db: &Database, id: Uuid) -> Result<Option<Instance>, ZapflowError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {COLUMNS} FROM instances WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![id], from_row) {
                Ok(instance) => Ok(Some(instance)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List instances newest first, filtered by owner and status.
pub async fn list_instances(
    db: &Database,
    filter: &InstanceFilter,
) -> Result<Page<Instance>, ZapflowError> {
    let owner_id = filter.owner_id.map(|id| id.to_string());
    let status = filter.status.map(|s| s.to_string());
    let limit = super::sql_limit(filter.limit);
    let offset = i64::from(filter.offset);

    db.connection()
        .call(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM instances \
                 WHERE (?1 IS NULL OR owner_id = ?1) AND (?2 IS NULL OR status = ?2)",
                params![owner_id, status],
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {COLUMNS} FROM instances \
                 WHERE (?1 IS NULL OR owner_id = ?1) AND (?2 IS NULL OR status = ?2) \
                 ORDER BY created_at DESC, id LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![owner_id, status, limit, offset], from_row)?;
            let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Page {
                items,
                total: total as u64,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Number of instance records.
pub async fn count_instances(db: &Database) -> Result<u64, ZapflowError> {
    db.connection()
        .call(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM instances", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Set status (and phone, when given) and bump the activity timestamp.
///
/// With `expected` set the row only changes while it still holds that
/// status; a concurrent change in between yields `InvalidTransition`.
pub async fn update_instance_status(
    db: &Database,
    id: Uuid,
    status: InstanceStatus,
    phone: Option<&str>,
    expected: Option<InstanceStatus>,
) -> Result<(), ZapflowError> {
    let key = id.to_string();
    let next = status.to_string();
    let phone = phone.map(str::to_string);
    let now = encode_ts(&Utc::now());
    let guard = expected.map(|s| s.to_string());
    let (changed, current) = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE instances SET status = ?1, phone = COALESCE(?2, phone), \
                 last_activity_at = ?3 WHERE id = ?4 AND (?5 IS NULL OR status = ?5)",
                params![next, phone, now, key, guard],
            )?;
            if changed > 0 {
                return Ok((changed, None));
            }
            let current: Option<String> = match conn.query_row(
                "SELECT status FROM instances WHERE id = ?1",
                params![key],
                |row| row.get(0),
            ) {
                Ok(status) => Some(status),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };
            Ok((changed, current))
        })
        .await
        .map_err(map_tr_err)?;
    if changed > 0 {
        return Ok(());
    }
    match current {
        Some(from) => Err(ZapflowError::InvalidTransition {
            from,
            to: status.to_string(),
        }),
        None => Err(ZapflowError::instance_not_found(id)),
    }
}

/// Bump the activity timestamp to now.
pub async fn touch_instance(db: &Database, id: Uuid) -> Result<(), ZapflowError> {
    let key = id.to_string();
    let now = encode_ts(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE instances SET last_activity_at = ?1 WHERE id = ?2",
                params![now, key],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Replace (or clear, with `None`) the instance webhook.
pub async fn set_webhook(
    db: &Database,
    id: Uuid,
    webhook: Option<&WebhookConfig>,
) -> Result<(), ZapflowError> {
    let (url, events, enabled, secret) = webhook_columns(webhook)?;
    let key = id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE instances SET webhook_url = ?1, webhook_events = ?2, \
                 webhook_enabled = ?3, webhook_secret = ?4 WHERE id = ?5",
                params![url, events, enabled, secret, key],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(ZapflowError::instance_not_found(id));
    }
    Ok(())
}

/// Delete an instance and its messages in one transaction.
pub async fn delete_instance(db: &Database, id: Uuid) -> Result<bool, ZapflowError> {
    let key = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM messages WHERE instance_id = ?1", params![key])?;
            let removed = tx.execute("DELETE FROM instances WHERE id = ?1", params![key])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Disconnected instances whose last activity precedes `before`.
pub async fn list_idle_instances(
    db: &Database,
    before: DateTime<Utc>,
) -> Result<Vec<Instance>, ZapflowError> {
    let before = encode_ts(&before);
    let status = InstanceStatus::Disconnected.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM instances \
                 WHERE status = ?1 AND last_activity_at < ?2 ORDER BY last_activity_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status, before], from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{at, make_instance, memory_db};

    #[tokio::test]
    async fn create_and_get_instance_roundtrips() {
        let db = memory_db().await;
        let owner = Uuid::new_v4();
        let mut instance = make_instance(owner, "sales", 0);
        instance.webhook = Some(WebhookConfig {
            url: "https://example.com/hook".into(),
            events: vec![WebhookEvent::Message, WebhookEvent::Status],
            enabled: true,
            secret: Some("s3cr3t-key".into()),
        });

        create_instance(&db, &instance).await.unwrap();
        let fetched = get_instance(&db, instance.id).await.unwrap().unwrap();
        assert_eq!(fetched, instance);
    }

    #[tokio::test]
    async fn get_missing_instance_returns_none() {
        let db = memory_db().await;
        assert!(get_instance(&db, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_name_for_same_owner_conflicts() {
        let db = memory_db().await;
        let owner = Uuid::new_v4();
        create_instance(&db, &make_instance(owner, "support", 0))
            .await
            .unwrap();

        let err = create_instance(&db, &make_instance(owner, "support", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ZapflowError::Conflict(_)));

        // Another owner may reuse the name.
        create_instance(&db, &make_instance(Uuid::new_v4(), "support", 2))
            .await
            .unwrap();
        assert_eq!(count_instances(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_owner_and_status_with_pagination() {
        let db = memory_db().await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for i in 0..5 {
            create_instance(&db, &make_instance(alice, &format!("a{i}"), i))
                .await
                .unwrap();
        }
        let mut bobs = make_instance(bob, "b0", 10);
        bobs.status = InstanceStatus::Disconnected;
        create_instance(&db, &bobs).await.unwrap();

        let page = list_instances(
            &db,
            &InstanceFilter {
                owner_id: Some(alice),
                limit: 2,
                offset: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "a4", "newest first");

        let disconnected = list_instances(
            &db,
            &InstanceFilter {
                status: Some(InstanceStatus::Disconnected),
                limit: 20,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(disconnected.total, 1);
        assert_eq!(disconnected.items[0].owner_id, bob);
    }

    #[tokio::test]
    async fn status_update_keeps_phone_when_absent() {
        let db = memory_db().await;
        let instance = make_instance(Uuid::new_v4(), "ops", 0);
        create_instance(&db, &instance).await.unwrap();

        update_instance_status(&db, instance.id, InstanceStatus::Connected, Some("5511999998888"), None)
            .await
            .unwrap();
        update_instance_status(&db, instance.id, InstanceStatus::Disconnected, None, None)
            .await
            .unwrap();

        let fetched = get_instance(&db, instance.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, InstanceStatus::Disconnected);
        assert_eq!(fetched.phone.as_deref(), Some("5511999998888"));
        assert!(fetched.last_activity_at > instance.last_activity_at);
    }

    #[tokio::test]
    async fn guarded_update_rejects_a_changed_status() {
        let db = memory_db().await;
        let instance = make_instance(Uuid::new_v4(), "guarded", 0);
        create_instance(&db, &instance).await.unwrap();

        update_instance_status(
            &db,
            instance.id,
            InstanceStatus::Disconnected,
            None,
            Some(InstanceStatus::Connecting),
        )
        .await
        .unwrap();

        let err = update_instance_status(
            &db,
            instance.id,
            InstanceStatus::Connected,
            None,
            Some(InstanceStatus::Connecting),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(&err, ZapflowError::InvalidTransition { from, .. } if from == "disconnected"),
            "{err:?}"
        );
        let fetched = get_instance(&db, instance.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, InstanceStatus::Disconnected);
    }

    #[tokio::test]
    async fn capped_insert_stops_at_max() {
        let db = memory_db().await;
        let owner = Uuid::new_v4();
        create_instance_capped(&db, &make_instance(owner, "one", 0), 2)
            .await
            .unwrap();
        create_instance_capped(&db, &make_instance(owner, "two", 1), 2)
            .await
            .unwrap();
        let err = create_instance_capped(&db, &make_instance(owner, "three", 2), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ZapflowError::Capacity { current: 2, max: 2 }), "{err:?}");
        assert_eq!(count_instances(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_capped_inserts_never_overshoot() {
        let db = memory_db().await;
        let owner = Uuid::new_v4();
        let attempts = (0..8).map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                create_instance_capped(&db, &make_instance(owner, &format!("c{i}"), i), 3).await
            })
        });
        let mut created = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.unwrap() {
                Ok(()) => created += 1,
                Err(ZapflowError::Capacity { max: 3, .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 3);
        assert_eq!(count_instances(&db).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn updates_on_missing_instance_are_not_found() {
        let db = memory_db().await;
        let id = Uuid::new_v4();
        assert!(matches!(
            update_instance_status(&db, id, InstanceStatus::Connected, None, None).await,
            Err(ZapflowError::NotFound { .. })
        ));
        assert!(matches!(
            set_webhook(&db, id, None).await,
            Err(ZapflowError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn clearing_webhook_removes_it() {
        let db = memory_db().await;
        let instance = make_instance(Uuid::new_v4(), "hooks", 0);
        create_instance(&db, &instance).await.unwrap();
        let webhook = WebhookConfig {
            url: "https://example.com/in".into(),
            events: vec![WebhookEvent::Qr],
            enabled: false,
            secret: None,
        };
        set_webhook(&db, instance.id, Some(&webhook)).await.unwrap();
        let fetched = get_instance(&db, instance.id).await.unwrap().unwrap();
        assert_eq!(fetched.webhook, Some(webhook));

        set_webhook(&db, instance.id, None).await.unwrap();
        let fetched = get_instance(&db, instance.id).await.unwrap().unwrap();
        assert!(fetched.webhook.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let db = memory_db().await;
        let instance = make_instance(Uuid::new_v4(), "tmp", 0);
        create_instance(&db, &instance).await.unwrap();
        assert!(delete_instance(&db, instance.id).await.unwrap());
        assert!(!delete_instance(&db, instance.id).await.unwrap());
        assert_eq!(count_instances(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn idle_listing_only_returns_stale_disconnected() {
        let db = memory_db().await;
        let owner = Uuid::new_v4();
        let mut stale = make_instance(owner, "stale", 0);
        stale.status = InstanceStatus::Disconnected;
        let mut fresh = make_instance(owner, "fresh", 500);
        fresh.status = InstanceStatus::Disconnected;
        let live = make_instance(owner, "live", 0);
        for i in [&stale, &fresh, &live] {
            create_instance(&db, i).await.unwrap();
        }

        let idle = list_idle_instances(&db, at(100)).await.unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id, stale.id);
    }
}
