// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic best-effort cleanup.
//!
//! A single interval task runs every registered [`CleanupHook`] per tick until
//! its cancellation token fires. Hook failures are logged and never stop the
//! loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zapflow_core::ZapflowError;

use crate::memory::{MemoryLevel, MemoryMonitor};
use crate::rate_limit::CounterStore;

/// One unit of periodic cleanup work.
#[async_trait]
pub trait CleanupHook: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Perform the cleanup and return how many items were reclaimed.
    async fn run(&self) -> Result<usize, ZapflowError>;
}

/// Drops rate-limit windows that have closed.
pub struct CounterPurge {
    store: Arc<dyn CounterStore>,
}

impl CounterPurge {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CleanupHook for CounterPurge {
    fn name(&self) -> &str {
        "rate_limit_counters"
    }

    async fn run(&self) -> Result<usize, ZapflowError> {
        Ok(self.store.purge_expired(Instant::now()))
    }
}

/// Refreshes allocator statistics and the heap gauge, warning under pressure.
pub struct MemorySweep {
    monitor: MemoryMonitor,
}

impl MemorySweep {
    pub fn new(monitor: MemoryMonitor) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl CleanupHook for MemorySweep {
    fn name(&self) -> &str {
        "memory"
    }

    async fn run(&self) -> Result<usize, ZapflowError> {
        if let Some(sample) = self.monitor.sample()
            && sample.level != MemoryLevel::Normal
        {
            warn!(
                used_mb = sample.used_mb(),
                limit_mb = sample.limit_mb(),
                percent = sample.percent(),
                "memory pressure at cleanup"
            );
        }
        Ok(0)
    }
}

/// Result of one cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub reclaimed: usize,
    pub failures: usize,
}

/// Run every hook once, logging and counting failures.
pub async fn run_cleanup_once(hooks: &[Arc<dyn CleanupHook>]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for hook in hooks {
        match hook.run().await {
            Ok(reclaimed) => {
                if reclaimed > 0 {
                    debug!(hook = hook.name(), reclaimed, "cleanup hook reclaimed items");
                }
                report.reclaimed += reclaimed;
            }
            Err(e) => {
                warn!(hook = hook.name(), error = %e, "cleanup hook failed (non-fatal)");
                report.failures += 1;
            }
        }
    }
    report
}

/// Spawn the periodic cleanup task.
///
/// The first pass runs one full `interval` after spawning.
pub fn spawn_cleanup(
    interval: Duration,
    hooks: Vec<Arc<dyn CleanupHook>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the first immediate tick.
        ticker.tick().await;

        info!(
            interval_secs = interval.as_secs(),
            hooks = hooks.len(),
            "cleanup task started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = run_cleanup_once(&hooks).await;
                    debug!(reclaimed = report.reclaimed, failures = report.failures, "cleanup pass complete");
                }
                _ = cancel.cancelled() => {
                    info!("cleanup task shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedProbe;
    use crate::rate_limit::InMemoryCounterStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CleanupHook for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) -> Result<usize, ZapflowError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ZapflowError::Internal("boom".into()))
            } else {
                Ok(2)
            }
        }
    }

    fn counting(fail: bool) -> Arc<Counting> {
        Arc::new(Counting {
            runs: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn failures_are_counted_not_propagated() {
        let ok = counting(false);
        let bad = counting(true);
        let hooks: Vec<Arc<dyn CleanupHook>> = vec![bad.clone(), ok.clone()];
        let report = run_cleanup_once(&hooks).await;
        assert_eq!(
            report,
            CleanupReport {
                reclaimed: 2,
                failures: 1
            }
        );
        assert_eq!(ok.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn counter_purge_removes_closed_windows() {
        let store = Arc::new(InMemoryCounterStore::new());
        store.hit("gone", Duration::ZERO, Instant::now());
        store.hit("kept", Duration::from_secs(3600), Instant::now());
        let purge = CounterPurge::new(store.clone());
        assert_eq!(purge.run().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn memory_sweep_never_fails() {
        let monitor = MemoryMonitor::new(Arc::new(FixedProbe::from_mb(500)), 100, 80);
        assert_eq!(MemorySweep::new(monitor).run().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn task_ticks_on_interval_and_stops_on_cancel() {
        let hook = counting(false);
        let cancel = CancellationToken::new();
        let handle = spawn_cleanup(
            Duration::from_secs(300),
            vec![hook.clone() as Arc<dyn CleanupHook>],
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(hook.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(602)).await;
        assert_eq!(hook.runs.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap();
    }
}
