// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `zapflow serve` and `zapflow dashboard`: wire every component and run
//! until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;
use zapflow_auth::{AccountService, TokenService};
use zapflow_config::ZapflowConfig;
use zapflow_core::{Adapter, HealthStatus, SessionDriver, StorageAdapter, ZapflowError};
use zapflow_gateway::{AuthConfig, GatewayState, HealthState, LimitsState};
use zapflow_limits::{
    CleanupHook, CounterPurge, CounterStore, InMemoryCounterStore, InstanceCap, MemoryMonitor,
    MemorySweep, RateLimiter, default_probe, spawn_cleanup,
};
use zapflow_prometheus::PrometheusAdapter;
use zapflow_storage::SqliteStorage;
use zapflow_whatsapp::{BridgeDriver, InstanceManager};

use crate::shutdown;

type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// A configured secret, or a random one for this process only.
fn secret_or_ephemeral(configured: Option<&str>, what: &str) -> String {
    match configured.filter(|s| !s.trim().is_empty()) {
        Some(secret) => secret.to_string(),
        None => {
            warn!("{what} is not configured; using an ephemeral value valid until restart");
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        }
    }
}

fn init_metrics(config: &ZapflowConfig) -> Option<MetricsRender> {
    if !config.metrics.enabled {
        return None;
    }
    match PrometheusAdapter::new() {
        Ok(adapter) => {
            zapflow_prometheus::set_memory_limit(
                config.limits.memory_limit_mb * zapflow_limits::memory::MIB,
            );
            Some(Arc::new(move || adapter.render()))
        }
        Err(e) => {
            warn!(error = %e, "prometheus metrics disabled");
            None
        }
    }
}

async fn log_bridge_health(driver: &BridgeDriver, bridge_url: &str) {
    match driver.health_check().await {
        Ok(HealthStatus::Healthy) => info!(bridge_url, "bridge sidecar reachable"),
        Ok(HealthStatus::Degraded(reason)) | Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(bridge_url, %reason, "bridge sidecar not healthy; sessions will fail until it is")
        }
        Err(e) => warn!(bridge_url, error = %e, "bridge sidecar unreachable at startup"),
    }
}

/// Run the backend API.
pub async fn run_serve(config: ZapflowConfig) -> Result<(), ZapflowError> {
    info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "starting zapflow"
    );
    let cancel = shutdown::install_signal_handler();

    let storage = Arc::new(SqliteStorage::open(&config.database).await?);
    info!(path = %config.database.path, "database opened");

    let jwt_secret = secret_or_ephemeral(config.security.jwt_secret.as_deref(), "security.jwt_secret");
    let tokens = TokenService::new(&jwt_secret, config.security.jwt_expiration_hours);
    let accounts = AccountService::new(storage.clone() as Arc<dyn StorageAdapter>, tokens.clone());

    if let (Some(email), Some(password)) = (
        config.security.admin_email.as_deref(),
        config.security.admin_password.as_deref(),
    ) {
        accounts.ensure_admin(email, password).await?;
    }

    let bridge_token =
        secret_or_ephemeral(config.security.bridge_token.as_deref(), "security.bridge_token");
    let driver = BridgeDriver::new(
        &config.whatsapp.bridge_url,
        &config.server.public_url,
        Some(&bridge_token),
        Duration::from_secs(config.whatsapp.bridge_timeout_secs),
    )?;
    log_bridge_health(&driver, &config.whatsapp.bridge_url).await;

    let manager = InstanceManager::from_config(
        &config,
        storage.clone() as Arc<dyn StorageAdapter>,
        Arc::new(driver) as Arc<dyn SessionDriver>,
    )?
    .with_cancellation(cancel.clone());

    let prometheus_render = init_metrics(&config);

    let counters: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
    let memory = MemoryMonitor::from_config(default_probe(), &config.limits);
    info!(
        probe = memory.probe_name(),
        limit_mb = config.limits.memory_limit_mb,
        "memory monitor configured"
    );
    let limits = LimitsState {
        creation: RateLimiter::from_config(counters.clone(), &config.rate_limit),
        cap: InstanceCap::new(Arc::new(manager.clone()), config.limits.max_instances),
        memory: memory.clone(),
    };

    let hooks: Vec<Arc<dyn CleanupHook>> = vec![
        Arc::new(CounterPurge::new(counters)),
        Arc::new(MemorySweep::new(memory)),
        Arc::new(manager.clone()),
    ];
    let cleanup = spawn_cleanup(
        Duration::from_secs(config.limits.cleanup_interval_secs),
        hooks,
        cancel.clone(),
    );

    let state = GatewayState {
        manager: manager.clone(),
        accounts,
        auth: AuthConfig {
            tokens,
            bridge_token: Some(bridge_token),
        },
        limits,
        health: HealthState::new(prometheus_render),
    };

    let served = zapflow_gateway::serve(&config.server, state, cancel.clone()).await;
    // A bind failure returns before any signal; stop the background work too.
    cancel.cancel();

    if let Err(e) = cleanup.await {
        warn!(error = %e, "cleanup task ended abnormally");
    }
    manager.shutdown().await;
    if let Err(e) = storage.shutdown().await {
        error!(error = %e, "database shutdown failed");
    }
    info!("zapflow stopped");
    served
}

/// Run the dashboard proxy.
pub async fn run_dashboard(config: ZapflowConfig) -> Result<(), zapflow_dashboard::DashboardError> {
    let cancel = shutdown::install_signal_handler();
    zapflow_dashboard::serve(&config.dashboard, cancel).await?;
    info!("dashboard stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn configured_secret_is_kept() {
        assert_eq!(secret_or_ephemeral(Some("abc"), "test"), "abc");
    }

    #[test]
    fn blank_secret_is_replaced() {
        let a = secret_or_ephemeral(Some("  "), "test");
        let b = secret_or_ephemeral(None, "test");
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    #[serial]
    fn metrics_disabled_yields_no_renderer() {
        let mut config = ZapflowConfig::default();
        config.metrics.enabled = false;
        assert!(init_metrics(&config).is_none());
    }

    #[tokio::test]
    async fn unreachable_bridge_is_only_logged() {
        let driver = BridgeDriver::new(
            "http://127.0.0.1:9",
            "http://127.0.0.1:3000",
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        log_bridge_health(&driver, "http://127.0.0.1:9").await;
    }
}
