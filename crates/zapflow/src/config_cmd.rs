// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `zapflow config`: print the resolved configuration.

use zapflow_config::ZapflowConfig;

const REDACTED: &str = "[redacted]";

/// Copy of `config` with every secret replaced.
pub fn redacted(config: &ZapflowConfig) -> ZapflowConfig {
    let mut shown = config.clone();
    let security = &mut shown.security;
    for secret in [
        &mut security.jwt_secret,
        &mut security.admin_password,
        &mut security.bridge_token,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    shown
}

pub fn run_config(config: &ZapflowConfig, check_only: bool) -> Result<(), String> {
    if check_only {
        println!("configuration is valid ({} profile)", config.environment);
        return Ok(());
    }
    let rendered = toml::to_string_pretty(&redacted(config))
        .map_err(|e| format!("failed to render configuration: {e}"))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_never_render() {
        let mut config = ZapflowConfig::default();
        config.security.jwt_secret = Some("super-secret-signing-key".into());
        config.security.bridge_token = Some("bridge-token-value".into());
        let rendered = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!rendered.contains("super-secret-signing-key"));
        assert!(!rendered.contains("bridge-token-value"));
        assert!(rendered.contains(REDACTED));
        assert!(redacted(&config).security.admin_password.is_none());
    }
}
