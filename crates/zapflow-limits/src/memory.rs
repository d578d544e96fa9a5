// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heap usage sampling against a configured ceiling.
//!
//! The binary installs jemalloc as the global allocator and samples
//! `stats.allocated`; elsewhere the process RSS from `/proc/self/statm`
//! stands in for heap usage.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use zapflow_config::model::LimitsConfig;

pub const MIB: u64 = 1024 * 1024;

/// Reports current heap usage in bytes.
pub trait MemoryProbe: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Current usage, or `None` when the source cannot be read.
    fn heap_bytes(&self) -> Option<u64>;
}

/// Reads jemalloc's `stats.allocated` after advancing the stats epoch.
#[cfg(not(target_env = "msvc"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct JemallocProbe;

#[cfg(not(target_env = "msvc"))]
impl MemoryProbe for JemallocProbe {
    fn name(&self) -> &str {
        "jemalloc"
    }

    fn heap_bytes(&self) -> Option<u64> {
        // Statistics are cached until the epoch advances.
        tikv_jemalloc_ctl::epoch::advance().ok()?;
        tikv_jemalloc_ctl::stats::allocated::read()
            .ok()
            .map(|bytes| bytes as u64)
    }
}

/// Resident set size from `/proc/self/statm` (Linux only).
#[derive(Debug, Default, Clone, Copy)]
pub struct RssProbe;

impl MemoryProbe for RssProbe {
    fn name(&self) -> &str {
        "rss"
    }

    fn heap_bytes(&self) -> Option<u64> {
        read_rss_bytes()
    }
}

/// Read the process RSS in bytes from /proc/self/statm.
///
/// Returns None on non-Linux platforms or if the file cannot be read.
pub fn read_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let rss_pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
        Some(rss_pages * 4096)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// A probe reporting a settable value.
#[derive(Debug, Default)]
pub struct FixedProbe {
    bytes: AtomicU64,
}

impl FixedProbe {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
        }
    }

    pub fn from_mb(mb: u64) -> Self {
        Self::new(mb * MIB)
    }

    pub fn set_bytes(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedProbe {
    fn name(&self) -> &str {
        "fixed"
    }

    fn heap_bytes(&self) -> Option<u64> {
        Some(self.bytes.load(Ordering::Relaxed))
    }
}

/// The best probe available on this platform.
pub fn default_probe() -> Arc<dyn MemoryProbe> {
    #[cfg(not(target_env = "msvc"))]
    {
        Arc::new(JemallocProbe)
    }
    #[cfg(target_env = "msvc")]
    {
        Arc::new(RssProbe)
    }
}

/// Pressure classification of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLevel {
    Normal,
    /// Above the warning percentage of the limit.
    Warning,
    /// Above the limit itself.
    Critical,
}

/// One reading of the probe against the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub level: MemoryLevel,
}

impl MemorySample {
    pub fn used_mb(&self) -> u64 {
        self.used_bytes / MIB
    }

    pub fn limit_mb(&self) -> u64 {
        self.limit_bytes / MIB
    }

    /// Usage as a percentage of the limit, one decimal place.
    pub fn percent(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 0.0;
        }
        let raw = self.used_bytes as f64 * 100.0 / self.limit_bytes as f64;
        (raw * 10.0).round() / 10.0
    }
}

/// Classifies probe readings against the configured ceiling.
#[derive(Clone)]
pub struct MemoryMonitor {
    probe: Arc<dyn MemoryProbe>,
    limit_bytes: u64,
    warn_percent: u8,
}

impl MemoryMonitor {
    pub fn new(probe: Arc<dyn MemoryProbe>, limit_mb: u64, warn_percent: u8) -> Self {
        Self {
            probe,
            limit_bytes: limit_mb * MIB,
            warn_percent,
        }
    }

    pub fn from_config(probe: Arc<dyn MemoryProbe>, config: &LimitsConfig) -> Self {
        Self::new(probe, config.memory_limit_mb, config.memory_warn_percent)
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    pub fn probe_name(&self) -> &str {
        self.probe.name()
    }

    pub fn classify(&self, used_bytes: u64) -> MemoryLevel {
        let warn_bytes = self.limit_bytes / 100 * u64::from(self.warn_percent);
        if used_bytes > self.limit_bytes {
            MemoryLevel::Critical
        } else if used_bytes > warn_bytes {
            MemoryLevel::Warning
        } else {
            MemoryLevel::Normal
        }
    }

    /// Read the probe and record the heap gauge.
    ///
    /// Returns `None` when the probe cannot be read.
    pub fn sample(&self) -> Option<MemorySample> {
        let Some(used_bytes) = self.probe.heap_bytes() else {
            debug!(probe = self.probe.name(), "memory probe unavailable");
            return None;
        };
        zapflow_prometheus::set_memory_heap(used_bytes);
        Some(MemorySample {
            used_bytes,
            limit_bytes: self.limit_bytes,
            level: self.classify(used_bytes),
        })
    }
}
