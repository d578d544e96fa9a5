// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`Adapter`] base trait and use `#[async_trait]`
//! so they can be held as `Arc<dyn ...>` in shared server state.

pub mod adapter;
pub mod driver;
pub mod storage;

pub use adapter::Adapter;
pub use driver::SessionDriver;
pub use storage::StorageAdapter;
