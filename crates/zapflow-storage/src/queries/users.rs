// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account persistence.

use rusqlite::{Row, params};
use uuid::Uuid;
use zapflow_core::{User, ZapflowError};

use super::{decode_enum, decode_ts, decode_uuid, encode_ts, is_constraint_violation};
use crate::database::{Database, map_tr_err};

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: decode_uuid(0, row.get(0)?)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: decode_enum(3, row.get(3)?)?,
        created_at: decode_ts(4, row.get(4)?)?,
    })
}

/// Insert an account. Emails are unique case-insensitively.
pub async fn create_user(db: &Database, user: &User) -> Result<(), ZapflowError> {
    let user = user.clone();
    let email = user.email.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let result = conn.execute(
                "INSERT INTO users (id, email, password_hash, role, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.role.to_string(),
                    encode_ts(&user.created_at),
                ],
            );
            match result {
                Ok(_) => Ok(true),
                Err(e) if is_constraint_violation(&e) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    if inserted {
        Ok(())
    } else {
        Err(ZapflowError::Conflict(format!(
            "an account for `{email}` already exists"
        )))
    }
}

/// Find an account by email, ignoring case.
pub async fn find_user_by_email(db: &Database, email: &str) -> Result<Option<User>, ZapflowError> {
    let email = email.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, password_hash, role, created_at FROM users \
                 WHERE lower(email) = lower(?1)",
            )?;
            match stmt.query_row(params![email], from_row) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get an account by id.
pub async fn get_user(db: &Database, id: Uuid) -> Result<Option<User>, ZapflowError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, password_hash, role, created_at FROM users WHERE id = ?1",
            )?;
            match stmt.query_row(params![id], from_row) {
                Ok(user) => Ok(Some(user)),
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
    use crate::queries::test_support::{make_user, memory_db};
    use zapflow_core::Role;

    #[tokio::test]
    async fn create_and_find_by_email_ignores_case() {
        let db = memory_db().await;
        let user = make_user("Ana@Example.com");
        create_user(&db, &user).await.unwrap();

        let found = find_user_by_email(&db, "ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, user);
        assert_eq!(found.password_hash, user.password_hash);
        assert_eq!(get_user(&db, user.id).await.unwrap().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let db = memory_db().await;
        create_user(&db, &make_user("dup@example.com")).await.unwrap();
        let err = create_user(&db, &make_user("DUP@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ZapflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_user_is_none() {
        let db = memory_db().await;
        assert!(get_user(&db, Uuid::new_v4()).await.unwrap().is_none());
        assert!(
            find_user_by_email(&db, "nobody@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }
}
