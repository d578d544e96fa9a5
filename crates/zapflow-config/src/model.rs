// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Zapflow platform.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key in
//! `zapflow.toml` or a `ZAPFLOW_*` variable is rejected at startup.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Deployment environment selected by `APP_ENV`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

/// Top-level Zapflow configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZapflowConfig {
    /// Deployment environment profile.
    #[serde(default)]
    pub environment: Environment,

    /// HTTP listener settings for the backend API.
    #[serde(default)]
    pub server: ServerConfig,

    /// Token signing and bootstrap credentials.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Bridge sidecar and webhook delivery settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Instance creation rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Instance cap, memory ceiling, and cleanup cadence.
    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dashboard proxy settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ZapflowConfig {
    /// Applies the environment profile on top of the loaded values.
    ///
    /// - `production`: console logging restricted to `warn` unless set explicitly.
    /// - `test`: a single live instance, no log files, in-memory database.
    pub fn for_environment(mut self) -> Self {
        match self.environment {
            Environment::Development => {}
            Environment::Production => {
                if self.logging.console_level.is_none() {
                    self.logging.console_level = Some("warn".to_string());
                }
            }
            Environment::Test => {
                self.limits.max_instances = 1;
                self.logging.file_enabled = false;
                self.database.path = ":memory:".to_string();
            }
        }
        self
    }
}

/// Backend HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL the bridge uses to reach this server's event callback.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Allowed CORS origin. `None` allows any origin.
    #[serde(default)]
    pub cors_origin: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            cors_origin: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Token signing and bootstrap credential configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// HMAC secret for signing access tokens.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_jwt_expiration_hours")]
    pub jwt_expiration_hours: u64,

    /// Admin account created at startup when no account with this email exists.
    #[serde(default)]
    pub admin_email: Option<String>,

    #[serde(default)]
    pub admin_password: Option<String>,

    /// Shared secret the bridge sends in `X-Bridge-Token` on event callbacks.
    #[serde(default)]
    pub bridge_token: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_hours: default_jwt_expiration_hours(),
            admin_email: None,
            admin_password: None,
            bridge_token: None,
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() { "[REDACTED]" } else { "None" }
        }
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &redact(&self.admin_password))
            .field("bridge_token", &redact(&self.bridge_token))
            .finish()
    }
}

fn default_jwt_expiration_hours() -> u64 {
    24
}

/// Bridge sidecar and webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Base URL of the WhatsApp automation sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Root directory for per-instance session credentials.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    #[serde(default = "default_bridge_timeout_secs")]
    pub bridge_timeout_secs: u64,

    /// How long a pairing QR code stays valid on the bridge side.
    #[serde(default = "default_qr_timeout_secs")]
    pub qr_timeout_secs: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            session_dir: default_session_dir(),
            bridge_timeout_secs: default_bridge_timeout_secs(),
            qr_timeout_secs: default_qr_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_session_dir() -> String {
    "./sessions".to_string()
}

fn default_bridge_timeout_secs() -> u64 {
    15
}

fn default_qr_timeout_secs() -> u64 {
    60
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// SQLite database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "./data/zapflow.db".to_string()
}

/// Fixed-window limit on instance creation requests per caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_instance_creation_max")]
    pub instance_creation_max: u32,

    #[serde(default = "default_instance_creation_window_secs")]
    pub instance_creation_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            instance_creation_max: default_instance_creation_max(),
            instance_creation_window_secs: default_instance_creation_window_secs(),
        }
    }
}

fn default_instance_creation_max() -> u32 {
    3
}

fn default_instance_creation_window_secs() -> u64 {
    900
}

/// Resource limits for the backend process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum number of live instances across all accounts.
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,

    /// Heap ceiling in MiB; requests are rejected above it.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    /// Percentage of the memory limit that triggers a warning.
    #[serde(default = "default_memory_warn_percent")]
    pub memory_warn_percent: u8,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Disconnected instances idle for longer than this are evicted. 0 disables.
    #[serde(default)]
    pub idle_instance_ttl_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_instances: default_max_instances(),
            memory_limit_mb: default_memory_limit_mb(),
            memory_warn_percent: default_memory_warn_percent(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            idle_instance_ttl_secs: 0,
        }
    }
}

fn default_max_instances() -> u32 {
    10
}

fn default_memory_limit_mb() -> u64 {
    512
}

fn default_memory_warn_percent() -> u8 {
    80
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files.
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_true")]
    pub file_enabled: bool,

    #[serde(default = "default_true")]
    pub console_enabled: bool,

    /// Console-only level override; falls back to `level`.
    #[serde(default)]
    pub console_level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
            file_enabled: true,
            console_enabled: true,
            console_level: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

fn default_true() -> bool {
    true
}

/// Dashboard proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_dashboard_port")]
    pub port: u16,

    /// Base URL of the backend API the dashboard forwards to.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_dashboard_port(),
            backend_url: default_backend_url(),
            backend_timeout_secs: default_backend_timeout_secs(),
        }
    }
}

fn default_dashboard_port() -> u16 {
    3001
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_backend_timeout_secs() -> u64 {
    10
}

/// Prometheus exposition settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
