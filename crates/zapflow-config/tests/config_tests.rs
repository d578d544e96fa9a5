// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Zapflow configuration system.
//!
//! Each test runs inside a figment `Jail`: a private working directory and
//! an emptied process environment, restored afterwards.

use figment::Jail;
use zapflow_config::diagnostic::ConfigError;
use zapflow_config::{Environment, load_and_validate, load_and_validate_str, load_config_from_str};

/// Conventional deployment variables override compiled defaults.
#[test]
fn conventional_variables_override_defaults() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("PORT", "8080");
        jail.set_env("JWT_SECRET", "dev-secret");
        jail.set_env("MAX_INSTANCES", "25");
        jail.set_env("MEMORY_LIMIT_MB", "1024");
        jail.set_env("WHATSAPP_BRIDGE_URL", "http://bridge:4000");
        jail.set_env("BACKEND_URL", "http://api:3000");
        jail.set_env("METRICS_ENABLED", "false");
        jail.set_env("UNRELATED", "ignored");

        let config = load_config_from_str("")?;
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.jwt_secret.as_deref(), Some("dev-secret"));
        assert_eq!(config.limits.max_instances, 25);
        assert_eq!(config.limits.memory_limit_mb, 1024);
        assert_eq!(config.whatsapp.bridge_url, "http://bridge:4000");
        assert_eq!(config.dashboard.backend_url, "http://api:3000");
        assert!(!config.metrics.enabled);
        Ok(())
    });
}

/// Prefixed variables reach every key, including underscore-heavy ones.
#[test]
fn prefixed_variables_address_any_key() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("ZAPFLOW_RATE_LIMIT_INSTANCE_CREATION_MAX", "7");
        jail.set_env("ZAPFLOW_LOGGING_CONSOLE_LEVEL", "debug");
        jail.set_env("ZAPFLOW_DASHBOARD_BACKEND_TIMEOUT_SECS", "3");

        let config = load_config_from_str("")?;
        assert_eq!(config.rate_limit.instance_creation_max, 7);
        assert_eq!(config.logging.console_level.as_deref(), Some("debug"));
        assert_eq!(config.dashboard.backend_timeout_secs, 3);
        Ok(())
    });
}

/// Environment variables win over the TOML file.
#[test]
fn env_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("PORT", "4200");
        let config = load_config_from_str(
            r#"
[server]
port = 4100
host = "127.0.0.1"

[limits]
max_instances = 5
"#,
        )?;
        assert_eq!(config.server.port, 4200);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.limits.max_instances, 5);
        Ok(())
    });
}

/// `zapflow.toml` in the working directory is picked up.
#[test]
fn config_file_in_working_directory_is_loaded() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.create_file("zapflow.toml", "[dashboard]\nport = 3101\n")?;
        let config = load_and_validate().expect("file config should be valid");
        assert_eq!(config.dashboard.port, 3101);
        Ok(())
    });
}

/// The test profile pins the instance cap regardless of MAX_INSTANCES.
#[test]
fn test_environment_profile_applies() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("APP_ENV", "test");
        jail.set_env("MAX_INSTANCES", "50");
        let config = load_config_from_str("")?;
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.limits.max_instances, 1);
        assert_eq!(config.database.path, ":memory:");
        assert!(!config.logging.file_enabled);
        Ok(())
    });
}

/// Unknown keys produce a suggestion for the closest valid key.
#[test]
fn unknown_key_gets_suggestion() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        let err = load_config_from_str("[limits]\nmax_instance = 3\n").unwrap_err();
        let errors = zapflow_config::diagnostic::figment_to_config_errors(err);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => {
                assert_eq!(key, "limits.max_instance");
                assert_eq!(suggestion.as_deref(), Some("max_instances"));
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
        Ok(())
    });
}

/// A non-numeric port is reported as an invalid type.
#[test]
fn non_numeric_port_is_invalid_type() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("PORT", "eighty");
        let errors = load_and_validate_str("").unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "server.port")),
            "{errors:?}"
        );
        Ok(())
    });
}

/// An unknown APP_ENV value is rejected.
#[test]
fn unknown_environment_is_rejected() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("APP_ENV", "staging");
        assert!(!load_and_validate_str("").unwrap_err().is_empty());
        Ok(())
    });
}

/// Production without a JWT secret fails validation.
#[test]
fn production_without_secret_fails_validation() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("APP_ENV", "production");
        let errors = load_and_validate_str("").unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("security.jwt_secret")),
            "{errors:?}"
        );
        Ok(())
    });
}

/// Production with a strong secret loads and trims console logging.
#[test]
fn production_with_secret_is_valid() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("APP_ENV", "production");
        jail.set_env("JWT_SECRET", "s".repeat(48));
        let config = load_and_validate_str("").unwrap();
        assert_eq!(config.logging.console_level.as_deref(), Some("warn"));
        Ok(())
    });
}

/// A zero request timeout would expire every request and is refused.
#[test]
fn zero_request_timeout_fails_validation() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("REQUEST_TIMEOUT_SECS", "0");
        let errors = load_and_validate_str("").unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("server.request_timeout_secs")),
            "{errors:?}"
        );
        Ok(())
    });
}
