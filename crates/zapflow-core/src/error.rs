// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Zapflow platform.

use thiserror::Error;

/// The primary error type used across Zapflow crates and adapter traits.
#[derive(Debug, Error)]
pub enum ZapflowError {
    /// Configuration errors (missing secrets, out-of-range limits).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Caller input that passed schema checks but is still unusable
    /// (for example an unparseable phone number).
    #[error("invalid input: {0}")]
    Validation(String),

    /// A requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation collides with existing state (duplicate name, wrong status).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The live-instance ceiling is reached.
    #[error("instance limit reached ({current}/{max})")]
    Capacity { current: u64, max: u64 },

    /// An instance status change outside the allowed lifecycle.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The session driver (WhatsApp bridge) failed.
    #[error("driver error: {message}")]
    Driver {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacks access to the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ZapflowError {
    /// Shorthand for a `NotFound` error on an instance.
    pub fn instance_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "instance",
            id: id.to_string(),
        }
    }

    /// Shorthand for a `NotFound` error on a message.
    pub fn message_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "message",
            id: id.to_string(),
        }
    }

    /// Wrap any error as a storage error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }
}
