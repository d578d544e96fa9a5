// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Global cap on live instances.

use std::sync::Arc;

use async_trait::async_trait;
use zapflow_core::ZapflowError;

/// Source of the current live-instance count.
#[async_trait]
pub trait InstanceCounter: Send + Sync + 'static {
    async fn live_instances(&self) -> Result<u64, ZapflowError>;
}

/// The cap was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub current: u64,
    pub max: u64,
}

/// Rejects creation once `max` instances are live.
#[derive(Clone)]
pub struct InstanceCap {
    counter: Arc<dyn InstanceCounter>,
    max: u64,
}

impl InstanceCap {
    pub fn new(counter: Arc<dyn InstanceCounter>, max: u32) -> Self {
        Self {
            counter,
            max: u64::from(max),
        }
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub async fn current(&self) -> Result<u64, ZapflowError> {
        self.counter.live_instances().await
    }

    /// `Ok(Ok(current))` when another instance fits, `Ok(Err(..))` at capacity.
    pub async fn check(&self) -> Result<Result<u64, CapacityExceeded>, ZapflowError> {
        let current = self.counter.live_instances().await?;
        if current >= self.max {
            Ok(Err(CapacityExceeded {
                current,
                max: self.max,
            }))
        } else {
            Ok(Ok(current))
        }
    }
}
