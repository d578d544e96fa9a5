// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and ack tracking.

use rusqlite::{Row, params};
use uuid::Uuid;
use zapflow_core::{AckState, Message, MessageFilter, Page, ZapflowError};

use super::{decode_enum, decode_ts, decode_uuid, encode_ts, sql_limit};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "m.id, m.instance_id, m.direction, m.remote, m.body, m.media_url, m.ack, \
                       m.provider_id, m.timestamp";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: decode_uuid(0, row.get(0)?)?,
        instance_id: decode_uuid(1, row.get(1)?)?,
        direction: decode_enum(2, row.get(2)?)?,
        remote: row.get(3)?,
        body: row.get(4)?,
        media_url: row.get(5)?,
        ack: decode_enum(6, row.get(6)?)?,
        provider_id: row.get(7)?,
        timestamp: decode_ts(8, row.get(8)?)?,
    })
}

/// Insert a message.
pub async fn insert_message(db: &Database, message: &Message) -> Result<(), ZapflowError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, instance_id, direction, remote, body, media_url, \
                 ack, provider_id, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    message.id.to_string(),
                    message.instance_id.to_string(),
                    message.direction.to_string(),
                    message.remote,
                    message.body,
                    message.media_url,
                    message.ack.to_string(),
                    message.provider_id,
                    encode_ts(&message.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a message by id.
pub async fn get_message(db: &Database, id: Uuid) -> Result<Option<Message>, ZapflowError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {COLUMNS} FROM messages m WHERE m.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![id], from_row) {
                Ok(message) => Ok(Some(message)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List messages newest first.
///
/// `owner_id` restricts the listing to instances owned by that account.
pub async fn list_messages(
    db: &Database,
    filter: &MessageFilter,
) -> Result<Page<Message>, ZapflowError> {
    let instance_id = filter.instance_id.map(|id| id.to_string());
    let owner_id = filter.owner_id.map(|id| id.to_string());
    let direction = filter.direction.map(|d| d.to_string());
    let limit = sql_limit(filter.limit);
    let offset = i64::from(filter.offset);

    db.connection()
        .call(move |conn| {
            const WHERE: &str = "FROM messages m JOIN instances i ON i.id = m.instance_id \
                                 WHERE (?1 IS NULL OR m.instance_id = ?1) \
                                 AND (?2 IS NULL OR i.owner_id = ?2) \
                                 AND (?3 IS NULL OR m.direction = ?3)";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) {WHERE}"),
                params![instance_id, owner_id, direction],
                |row| row.get(0),
            )?;

            let sql =
                format!("SELECT {COLUMNS} {WHERE} ORDER BY m.timestamp DESC, m.id LIMIT ?4 OFFSET ?5");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![instance_id, owner_id, direction, limit, offset],
                from_row,
            )?;
            let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Page {
                items,
                total: total as u64,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the ack state of a message.
pub async fn update_ack(db: &Database, id: Uuid, ack: AckState) -> Result<(), ZapflowError> {
    let key = id.to_string();
    let ack = ack.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET ack = ?1 WHERE id = ?2",
                params![ack, key],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(ZapflowError::message_not_found(id));
    }
    Ok(())
}

/// Find a message of an instance by the bridge-assigned id.
pub async fn find_message_by_provider_id(
    db: &Database,
    instance_id: Uuid,
    provider_id: &str,
) -> Result<Option<Message>, ZapflowError> {
    let instance_id = instance_id.to_string();
    let provider_id = provider_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM messages m \
                 WHERE m.instance_id = ?1 AND m.provider_id = ?2 LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![instance_id, provider_id], from_row) {
                Ok(message) => Ok(Some(message)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::instances::{create_instance, delete_instance};
    use crate::queries::test_support::{at, make_instance, memory_db};
    use zapflow_core::MessageDirection;

    fn make_message(instance_id: Uuid, direction: MessageDirection, secs: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            instance_id,
            direction,
            remote: "5511999998888@c.us".into(),
            body: format!("hello {secs}"),
            media_url: None,
            ack: AckState::Pending,
            provider_id: Some(format!("wamid-{secs}")),
            timestamp: at(secs),
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrips() {
        let db = memory_db().await;
        let instance = make_instance(Uuid::new_v4(), "chat", 0);
        create_instance(&db, &instance).await.unwrap();

        let message = make_message(instance.id, MessageDirection::Outgoing, 1);
        insert_message(&db, &message).await.unwrap();
        let fetched = get_message(&db, message.id).await.unwrap().unwrap();
        assert_eq!(fetched, message);
    }

    #[tokio::test]
    async fn message_for_unknown_instance_is_rejected() {
        let db = memory_db().await;
        let message = make_message(Uuid::new_v4(), MessageDirection::Incoming, 1);
        assert!(insert_message(&db, &message).await.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_direction_and_owner() {
        let db = memory_db().await;
        let alice = make_instance(Uuid::new_v4(), "alice", 0);
        let bob = make_instance(Uuid::new_v4(), "bob", 0);
        create_instance(&db, &alice).await.unwrap();
        create_instance(&db, &bob).await.unwrap();

        for secs in 1..=3 {
            insert_message(&db, &make_message(alice.id, MessageDirection::Incoming, secs))
                .await
                .unwrap();
        }
        insert_message(&db, &make_message(alice.id, MessageDirection::Outgoing, 4))
            .await
            .unwrap();
        insert_message(&db, &make_message(bob.id, MessageDirection::Incoming, 5))
            .await
            .unwrap();

        let incoming = list_messages(
            &db,
            &MessageFilter {
                owner_id: Some(alice.owner_id),
                direction: Some(MessageDirection::Incoming),
                limit: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(incoming.total, 3);
        assert_eq!(incoming.items.len(), 2);
        assert_eq!(incoming.items[0].body, "hello 3");

        let everything = list_messages(&db, &MessageFilter::default()).await.unwrap();
        assert_eq!(everything.total, 5);
    }

    #[tokio::test]
    async fn ack_update_and_provider_lookup() {
        let db = memory_db().await;
        let instance = make_instance(Uuid::new_v4(), "acks", 0);
        create_instance(&db, &instance).await.unwrap();
        let message = make_message(instance.id, MessageDirection::Outgoing, 7);
        insert_message(&db, &message).await.unwrap();

        let found = find_message_by_provider_id(&db, instance.id, "wamid-7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, message.id);
        assert!(
            find_message_by_provider_id(&db, instance.id, "wamid-unknown")
                .await
                .unwrap()
                .is_none()
        );

        update_ack(&db, message.id, AckState::Delivered).await.unwrap();
        let fetched = get_message(&db, message.id).await.unwrap().unwrap();
        assert_eq!(fetched.ack, AckState::Delivered);

        assert!(matches!(
            update_ack(&db, Uuid::new_v4(), AckState::Read).await,
            Err(ZapflowError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn deleting_instance_removes_its_messages() {
        let db = memory_db().await;
        let instance = make_instance(Uuid::new_v4(), "gone", 0);
        create_instance(&db, &instance).await.unwrap();
        let message = make_message(instance.id, MessageDirection::Incoming, 1);
        insert_message(&db, &message).await.unwrap();

        delete_instance(&db, instance.id).await.unwrap();
        assert!(get_message(&db, message.id).await.unwrap().is_none());
    }
}
