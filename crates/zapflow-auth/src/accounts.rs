// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registration, login, and admin bootstrap.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use zapflow_core::{Role, StorageAdapter, User, ZapflowError};

use crate::jwt::TokenService;
use crate::password;

/// Account operations backed by the storage adapter.
#[derive(Clone)]
pub struct AccountService {
    storage: Arc<dyn StorageAdapter>,
    tokens: TokenService,
}

/// A freshly authenticated account and its access token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Argon2 blocks for tens of milliseconds, so it runs on the blocking pool.
async fn hash_off_thread(password: &str) -> Result<String, ZapflowError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| ZapflowError::Internal(format!("hashing task failed: {e}")))?
}

async fn verify_off_thread(password: &str, hash: &str) -> Result<bool, ZapflowError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| ZapflowError::Internal(format!("verification task failed: {e}")))?
}

impl AccountService {
    pub fn new(storage: Arc<dyn StorageAdapter>, tokens: TokenService) -> Self {
        Self { storage, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    async fn create(&self, email: &str, password: &str, role: Role) -> Result<User, ZapflowError> {
        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: hash_off_thread(password).await?,
            role,
            created_at: Utc::now(),
        };
        self.storage.create_user(&user).await?;
        Ok(user)
    }

    /// Create a regular account and sign it in. Duplicate email is `Conflict`.
    pub async fn register(&self, email: &str, password: &str) -> Result<Session, ZapflowError> {
        let user = self.create(email, password, Role::User).await?;
        info!(user_id = %user.id, "account registered");
        let token = self.tokens.issue(&user)?;
        Ok(Session { user, token })
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown email and wrong password produce the same `Unauthorized` error.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ZapflowError> {
        let rejected = || ZapflowError::Unauthorized("invalid email or password".into());

        let Some(user) = self
            .storage
            .find_user_by_email(&normalize_email(email))
            .await?
        else {
            warn!("login attempt for unknown account");
            return Err(rejected());
        };

        if !verify_off_thread(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "login attempt with wrong password");
            return Err(rejected());
        }

        let token = self.tokens.issue(&user)?;
        Ok(Session { user, token })
    }

    /// The account behind an authenticated request.
    pub async fn current_user(&self, id: Uuid) -> Result<User, ZapflowError> {
        self.storage
            .get_user(id)
            .await?
            .ok_or_else(|| ZapflowError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }

    /// Create the admin account unless one with this email already exists.
    ///
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, ZapflowError> {
        if self
            .storage
            .find_user_by_email(&normalize_email(email))
            .await?
            .is_some()
        {
            return Ok(false);
        }
        let admin = self.create(email, password, Role::Admin).await?;
        info!(user_id = %admin.id, "admin account bootstrapped");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapflow_storage::{Database, SqliteStorage};

    async fn service() -> AccountService {
        let db = Database::open(":memory:").await.unwrap();
        AccountService::new(
            Arc::new(SqliteStorage::new(db)),
            TokenService::new("accounts-test-secret", 1),
        )
    }

    #[tokio::test]
    async fn register_then_login() {
        let accounts = service().await;
        let registered = accounts
            .register("  New@Example.com ", "password123")
            .await
            .unwrap();
        assert_eq!(registered.user.email, "new@example.com");
        assert_eq!(registered.user.role, Role::User);

        let session = accounts
            .login("new@example.com", "password123")
            .await
            .unwrap();
        let claims = accounts.tokens().verify(&session.token).unwrap();
        assert_eq!(claims.sub, registered.user.id.to_string());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let accounts = service().await;
        accounts.register("dup@example.com", "password123").await.unwrap();
        let err = accounts
            .register("DUP@example.com", "password456")
            .await
            .unwrap_err();
        assert!(matches!(err, ZapflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let accounts = service().await;
        accounts.register("who@example.com", "password123").await.unwrap();
        assert!(matches!(
            accounts.login("who@example.com", "nope-nope").await,
            Err(ZapflowError::Unauthorized(_))
        ));
        assert!(matches!(
            accounts.login("ghost@example.com", "password123").await,
            Err(ZapflowError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn admin_bootstrap_is_idempotent() {
        let accounts = service().await;
        assert!(accounts.ensure_admin("root@example.com", "rootpass1").await.unwrap());
        assert!(!accounts.ensure_admin("root@example.com", "other").await.unwrap());
        let session = accounts.login("root@example.com", "rootpass1").await.unwrap();
        assert_eq!(session.user.role, Role::Admin);
    }
}
