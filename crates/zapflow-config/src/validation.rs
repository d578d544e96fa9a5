// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express, such
//! as minimum secret length in production and non-zero limits.

use crate::diagnostic::ConfigError;
use crate::model::{Environment, ZapflowConfig};

/// Minimum JWT secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ZapflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.environment == Environment::Production {
        match config.security.jwt_secret.as_deref().map(str::trim) {
            None | Some("") => fail("security.jwt_secret must be set in production".into()),
            Some(secret) if secret.len() < MIN_PRODUCTION_SECRET_LEN => fail(format!(
                "security.jwt_secret must be at least {MIN_PRODUCTION_SECRET_LEN} characters in production, got {}",
                secret.len()
            )),
            Some(_) => {}
        }
    }

    if config.security.jwt_expiration_hours == 0 {
        fail("security.jwt_expiration_hours must be at least 1".into());
    }

    if config.security.admin_email.is_some() != config.security.admin_password.is_some() {
        fail("security.admin_email and security.admin_password must be set together".into());
    }

    if config.limits.max_instances == 0 {
        fail("limits.max_instances must be at least 1".into());
    }

    if config.limits.memory_limit_mb == 0 {
        fail("limits.memory_limit_mb must be at least 1".into());
    }

    if !(1..=100).contains(&config.limits.memory_warn_percent) {
        fail(format!(
            "limits.memory_warn_percent must be between 1 and 100, got {}",
            config.limits.memory_warn_percent
        ));
    }

    if config.limits.cleanup_interval_secs == 0 {
        fail("limits.cleanup_interval_secs must be at least 1".into());
    }

    if config.rate_limit.instance_creation_max == 0 {
        fail("rate_limit.instance_creation_max must be at least 1".into());
    }

    if config.rate_limit.instance_creation_window_secs == 0 {
        fail("rate_limit.instance_creation_window_secs must be at least 1".into());
    }

    for (key, url) in [
        ("whatsapp.bridge_url", &config.whatsapp.bridge_url),
        ("server.public_url", &config.server.public_url),
        ("dashboard.backend_url", &config.dashboard.backend_url),
    ] {
        if !is_http_url(url) {
            fail(format!("{key} must be an http(s) URL, got `{url}`"));
        }
    }

    if config.server.request_timeout_secs == 0 {
        fail("server.request_timeout_secs must be at least 1".into());
    }

    if config.whatsapp.bridge_timeout_secs == 0 {
        fail("whatsapp.bridge_timeout_secs must be at least 1".into());
    }

    if config.dashboard.backend_timeout_secs == 0 {
        fail("dashboard.backend_timeout_secs must be at least 1".into());
    }

    if config.database.path.trim().is_empty() {
        fail("database.path must not be empty".into());
    }

    if config.server.host.trim().is_empty() {
        fail("server.host must not be empty".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty())
}
