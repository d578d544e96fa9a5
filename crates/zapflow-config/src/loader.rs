// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `zapflow.toml` (or the file named by `ZAPFLOW_CONFIG`)
//! 3. Environment variables
//!
//! Two families of variables are recognized. The conventional deployment
//! names (`PORT`, `JWT_SECRET`, `MAX_INSTANCES`, ...) map to fixed keys, and
//! `ZAPFLOW_<SECTION>_<KEY>` addresses any key (`ZAPFLOW_LIMITS_MAX_INSTANCES`).

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ZapflowConfig;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "zapflow.toml";

/// Conventional variable names and the keys they set.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("app_env", "environment"),
    ("host", "server.host"),
    ("port", "server.port"),
    ("public_url", "server.public_url"),
    ("cors_origin", "server.cors_origin"),
    ("request_timeout_secs", "server.request_timeout_secs"),
    ("jwt_secret", "security.jwt_secret"),
    ("jwt_expires_in_hours", "security.jwt_expiration_hours"),
    ("admin_email", "security.admin_email"),
    ("admin_password", "security.admin_password"),
    ("bridge_token", "security.bridge_token"),
    ("whatsapp_bridge_url", "whatsapp.bridge_url"),
    ("session_dir", "whatsapp.session_dir"),
    ("database_path", "database.path"),
    ("instance_rate_limit_max", "rate_limit.instance_creation_max"),
    (
        "instance_rate_limit_window_secs",
        "rate_limit.instance_creation_window_secs",
    ),
    ("max_instances", "limits.max_instances"),
    ("memory_limit_mb", "limits.memory_limit_mb"),
    ("cleanup_interval_secs", "limits.cleanup_interval_secs"),
    ("idle_instance_ttl_secs", "limits.idle_instance_ttl_secs"),
    ("log_level", "logging.level"),
    ("log_dir", "logging.dir"),
    ("backend_url", "dashboard.backend_url"),
    ("dashboard_port", "dashboard.port"),
    ("backend_timeout_secs", "dashboard.backend_timeout_secs"),
    ("metrics_enabled", "metrics.enabled"),
];

/// Section names addressable through `ZAPFLOW_<SECTION>_<KEY>`.
///
/// `rate_limit` must precede any section it shares a prefix with.
const SECTIONS: &[&str] = &[
    "rate_limit",
    "server",
    "security",
    "whatsapp",
    "database",
    "limits",
    "logging",
    "dashboard",
    "metrics",
];

/// Keys whose values are always kept verbatim as strings.
///
/// Everything else is parsed, so `PORT=8080` becomes a number and
/// `METRICS_ENABLED=false` a boolean, while a numeric-looking secret stays text.
const TEXT_KEYS: &[&str] = &[
    "environment",
    "server.host",
    "server.public_url",
    "server.cors_origin",
    "security.jwt_secret",
    "security.admin_email",
    "security.admin_password",
    "security.bridge_token",
    "whatsapp.bridge_url",
    "whatsapp.session_dir",
    "database.path",
    "logging.level",
    "logging.dir",
    "logging.console_level",
    "dashboard.host",
    "dashboard.backend_url",
];

/// Map an environment variable name to a dotted configuration key.
///
/// Returns `None` for variables Zapflow does not read.
pub fn env_key(name: &str) -> Option<String> {
    let name = name.to_ascii_lowercase();

    if let Some(rest) = name.strip_prefix("zapflow_") {
        if rest == "config" {
            return None;
        }
        if rest == "environment" {
            return Some(rest.to_string());
        }
        // Explicit section matching rather than splitting on `_`, since key
        // names contain underscores themselves (`rate_limit_instance_creation_max`).
        return SECTIONS.iter().find_map(|section| {
            rest.strip_prefix(section)
                .and_then(|tail| tail.strip_prefix('_'))
                .filter(|key| !key.is_empty())
                .map(|key| format!("{section}.{key}"))
        });
    }

    ENV_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, key)| (*key).to_string())
}

fn is_text_key(key: &str) -> bool {
    TEXT_KEYS.contains(&key)
}

/// Recognized variables whose keys are (or are not) text keys.
fn env_layer(text: bool) -> Env {
    Env::raw().filter_map(move |name| {
        env_key(name.as_str())
            .filter(|key| is_text_key(key) == text)
            .map(Into::into)
    })
}

/// The environment provider pair: parsed values, then verbatim text values.
///
/// Mapped keys contain dots, which Figment nests into sections.
pub fn env_providers() -> [Env; 2] {
    [env_layer(false), env_layer(true).lossless()]
}

fn merge_env(figment: Figment) -> Figment {
    env_providers()
        .into_iter()
        .fold(figment, |figment, env| figment.merge(env))
}

/// Resolve the configuration file path: `ZAPFLOW_CONFIG` or `./zapflow.toml`.
pub fn config_file_path() -> PathBuf {
    std::env::var_os("ZAPFLOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Build the Figment from defaults, an optional TOML file and the process
/// environment.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment(toml_path: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(ZapflowConfig::default()));
    if let Some(path) = toml_path {
        figment = figment.merge(Toml::file(path));
    }
    merge_env(figment)
}

/// Load configuration from the configuration file and the process environment.
pub fn load_config() -> Result<ZapflowConfig, figment::Error> {
    let path = config_file_path();
    build_figment(Some(&path))
        .extract::<ZapflowConfig>()
        .map(ZapflowConfig::for_environment)
}

/// Load configuration from a TOML string, then apply the process environment.
pub fn load_config_from_str(toml_content: &str) -> Result<ZapflowConfig, figment::Error> {
    let figment = Figment::new()
        .merge(Serialized::defaults(ZapflowConfig::default()))
        .merge(Toml::string(toml_content));
    merge_env(figment)
        .extract::<ZapflowConfig>()
        .map(ZapflowConfig::for_environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn conventional_names_map_to_keys() {
        assert_eq!(env_key("PORT").as_deref(), Some("server.port"));
        assert_eq!(env_key("JWT_SECRET").as_deref(), Some("security.jwt_secret"));
        assert_eq!(
            env_key("MAX_INSTANCES").as_deref(),
            Some("limits.max_instances")
        );
        assert_eq!(env_key("APP_ENV").as_deref(), Some("environment"));
        assert_eq!(env_key("PATH"), None);
    }

    #[test]
    fn prefixed_names_split_on_section_only() {
        assert_eq!(
            env_key("ZAPFLOW_RATE_LIMIT_INSTANCE_CREATION_MAX").as_deref(),
            Some("rate_limit.instance_creation_max")
        );
        assert_eq!(
            env_key("ZAPFLOW_WHATSAPP_BRIDGE_TIMEOUT_SECS").as_deref(),
            Some("whatsapp.bridge_timeout_secs")
        );
        assert_eq!(env_key("ZAPFLOW_UNKNOWN_THING"), None);
        assert_eq!(env_key("ZAPFLOW_CONFIG"), None);
    }

    #[test]
    fn numeric_looking_secret_stays_text() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("JWT_SECRET", "12345678901234567890123456789012");
            jail.set_env("PORT", "8080");
            let config = load_config_from_str("")?;
            assert_eq!(
                config.security.jwt_secret.as_deref(),
                Some("12345678901234567890123456789012")
            );
            assert_eq!(config.server.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn text_keys_are_split_from_parsed_keys() {
        assert!(is_text_key("security.bridge_token"));
        assert!(!is_text_key("server.port"));
    }
}
