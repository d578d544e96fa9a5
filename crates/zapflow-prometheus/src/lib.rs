// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Zapflow platform.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text by [`PrometheusAdapter::render`], which the
//! gateway serves at `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use zapflow_core::{Adapter, HealthStatus, ZapflowError};

pub use recording::{
    record_instance_created, record_instance_rejected, record_message,
    record_validation_rejection, record_webhook, set_live_instances, set_memory_heap,
    set_memory_limit,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and keeps the handle used for rendering.
#[derive(Clone)]
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, ZapflowError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            ZapflowError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap a handle from a recorder built elsewhere (tests use a local recorder).
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl Adapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn health_check(&self) -> Result<HealthStatus, ZapflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ZapflowError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_recorder_renders_recorded_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let adapter = PrometheusAdapter::from_handle(recorder.handle());

        metrics::with_local_recorder(&recorder, || {
            record_instance_created();
            record_instance_rejected("capacity");
            set_live_instances(4);
        });

        let text = adapter.render();
        assert!(text.contains("zapflow_instances_created_total 1"), "{text}");
        assert!(text.contains("reason=\"capacity\""), "{text}");
        assert!(text.contains("zapflow_live_instances 4"), "{text}");
        assert_eq!(
            adapter.health_check().await.unwrap(),
            HealthStatus::Healthy
        );
    }
}
