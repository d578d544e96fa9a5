// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Zapflow integration tests.
//!
//! Provides mock adapters and harnesses for fast, deterministic tests
//! without a bridge sidecar or on-disk database.
//!
//! # Components
//!
//! - [`MockDriver`] - session driver recording every call
//! - [`ManagerFixture`] - instance manager over in-memory storage
//! - [`TestApp`] - the full REST router with a fixed memory probe

pub mod fixtures;
pub mod harness;
pub mod mock_driver;

pub use fixtures::{ManagerFixture, memory_storage};
pub use harness::TestApp;
pub use mock_driver::{DriverCall, MockDriver};
