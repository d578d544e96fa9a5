// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HS256 access tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use zapflow_config::model::SecurityConfig;
use zapflow_core::{Role, User, ZapflowError};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: u64,
    pub iat: u64,
}

/// Issues and verifies access tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours as i64),
        }
    }

    /// Build from the security section. Fails when no secret is configured.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, ZapflowError> {
        let secret = config
            .jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ZapflowError::Config("security.jwt_secret is not set".into()))?;
        Ok(Self::new(secret, config.jwt_expiration_hours))
    }

    /// Issue a token for the account.
    pub fn issue(&self, user: &User) -> Result<String, ZapflowError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: (now + self.ttl).timestamp().max(0) as u64,
            iat: now.timestamp().max(0) as u64,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ZapflowError::Internal(format!("token encoding failed: {e}")))
    }

    /// Verify signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ZapflowError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ZapflowError::Unauthorized(format!("invalid token: {e}")))
    }
}
