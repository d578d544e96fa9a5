// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authenticated caller of a request.

use uuid::Uuid;
use zapflow_core::{Role, User, ZapflowError};

use crate::jwt::Claims;

/// Identity resolved from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this caller may act on resources owned by `owner_id`.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.id == owner_id
    }

    /// Owner restriction for listings: `None` (everything) for admins.
    pub fn owner_scope(&self) -> Option<Uuid> {
        if self.is_admin() { None } else { Some(self.id) }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = ZapflowError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ZapflowError::Unauthorized("token subject is not an account id".into()))?;
        Ok(Self {
            id,
            email: claims.email,
            role: claims.role,
        })
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: Role) -> Claims {
        Claims {
            sub: sub.into(),
            email: "a@example.com".into(),
            role,
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn admin_sees_everything() {
        let admin = AuthUser::try_from(claims(&Uuid::new_v4().to_string(), Role::Admin)).unwrap();
        assert!(admin.can_access(Uuid::new_v4()));
        assert_eq!(admin.owner_scope(), None);
    }

    #[test]
    fn user_sees_only_own_resources() {
        let id = Uuid::new_v4();
        let user = AuthUser::try_from(claims(&id.to_string(), Role::User)).unwrap();
        assert!(user.can_access(id));
        assert!(!user.can_access(Uuid::new_v4()));
        assert_eq!(user.owner_scope(), Some(id));
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        assert!(AuthUser::try_from(claims("legacy-42", Role::User)).is_err());
    }
}
