// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource limits for the Zapflow backend.
//!
//! Fixed-window rate limiting over an injected counter store, the global
//! live-instance cap, heap monitoring against a configured ceiling, and the
//! periodic cleanup task.

pub mod capacity;
pub mod cleanup;
pub mod memory;
pub mod rate_limit;

pub use capacity::{CapacityExceeded, InstanceCap, InstanceCounter};
pub use cleanup::{
    CleanupHook, CleanupReport, CounterPurge, MemorySweep, run_cleanup_once, spawn_cleanup,
};
pub use memory::{
    FixedProbe, MemoryLevel, MemoryMonitor, MemoryProbe, MemorySample, RssProbe, default_probe,
};
pub use rate_limit::{
    CounterStore, InMemoryCounterStore, RateDecision, RateLimiter, WindowState, retry_after_secs,
};

#[cfg(not(target_env = "msvc"))]
pub use memory::JemallocProbe;
