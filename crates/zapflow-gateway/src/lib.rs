// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST API for the Zapflow platform.
//!
//! Accounts, instances, messages, and the bridge event callback under
//! `/api`, plus unauthenticated health and Prometheus endpoints. Requests
//! pass through validating extractors and the limiting middleware before
//! reaching the [`InstanceManager`](zapflow_whatsapp::InstanceManager).

pub mod auth;
pub mod error;
pub mod handlers;
pub mod limits;
pub mod schemas;
pub mod server;
pub mod validation;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use limits::LimitsState;
pub use server::{GatewayState, HealthState, build_router, serve};
pub use validation::{FieldError, ValidJson, ValidPath, ValidQuery};
