// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the Zapflow platform.
//!
//! Argon2id password hashing, HS256 access tokens, the request identity
//! derived from them, and the account operations built on storage.

pub mod accounts;
pub mod identity;
pub mod jwt;
pub mod password;

pub use accounts::{AccountService, Session};
pub use identity::AuthUser;
pub use jwt::{Claims, TokenService};
