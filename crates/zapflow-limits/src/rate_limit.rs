// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window request counting.
//!
//! Counters live in an injected [`CounterStore`] so the limiter can be tested
//! with a private store and later backed by a shared one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use zapflow_config::model::RateLimitConfig;

/// Counter state after recording one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Hits in the current window, including this one.
    pub count: u32,
    /// When the current window closes.
    pub resets_at: Instant,
}

/// Process-scoped storage for fixed-window counters.
pub trait CounterStore: Send + Sync + 'static {
    /// Record a hit for `key` at `now` and return the window state.
    ///
    /// A key whose window has elapsed starts a fresh window at `now`.
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowState;

    /// Drop windows that closed before `now`. Returns how many were removed.
    fn purge_expired(&self, now: Instant) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    length: Duration,
    count: u32,
}

impl Window {
    fn resets_at(&self) -> Instant {
        self.started + self.length
    }
}

/// In-memory [`CounterStore`] backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowState {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            length: window,
            count: 0,
        });
        if now >= entry.resets_at() {
            *entry = Window {
                started: now,
                length: window,
                count: 0,
            };
        }
        entry.count = entry.count.saturating_add(1);
        WindowState {
            count: entry.count,
            resets_at: entry.resets_at(),
        }
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now < w.resets_at());
        before.saturating_sub(self.windows.len())
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Allows at most `max` hits per key per fixed window.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max: u32,
    window: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max", &self.max)
            .field("window", &self.window)
            .field("tracked_keys", &self.store.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, max: u32, window: Duration) -> Self {
        Self { store, max, window }
    }

    /// Instance-creation limiter from the `rate_limit` section.
    pub fn from_config(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self::new(
            store,
            config.instance_creation_max,
            Duration::from_secs(config.instance_creation_window_secs),
        )
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Record a hit for `key` now.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Record a hit for `key` at an explicit instant.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let state = self.store.hit(key, self.window, now);
        if state.count <= self.max {
            RateDecision::Allowed {
                remaining: self.max - state.count,
            }
        } else {
            RateDecision::Limited {
                retry_after: state.resets_at.saturating_duration_since(now),
            }
        }
    }
}

/// Whole seconds a client should wait, never less than one.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryCounterStore::new()),
            max,
            Duration::from_secs(window_secs),
        )
    }

    #[test]
    fn fourth_hit_in_window_is_limited() {
        let limiter = limiter(3, 900);
        let t0 = Instant::now();
        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.check_at("user-1", t0),
                RateDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }
        let RateDecision::Limited { retry_after } =
            limiter.check_at("user-1", t0 + Duration::from_secs(100))
        else {
            panic!("fourth hit should be limited");
        };
        assert_eq!(retry_after, Duration::from_secs(800));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
        assert!(!limiter.check_at("a", now).is_allowed());
    }

    #[test]
    fn window_resets_after_elapsing() {
        let limiter = limiter(1, 60);
        let t0 = Instant::now();
        assert!(limiter.check_at("k", t0).is_allowed());
        assert!(!limiter.check_at("k", t0 + Duration::from_secs(59)).is_allowed());
        assert!(limiter.check_at("k", t0 + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn purge_drops_only_closed_windows() {
        let store = InMemoryCounterStore::new();
        let t0 = Instant::now();
        store.hit("old", Duration::from_secs(10), t0);
        store.hit("new", Duration::from_secs(100), t0);
        assert_eq!(store.purge_expired(t0 + Duration::from_secs(50)), 1);
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
    }
}
