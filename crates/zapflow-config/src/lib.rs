// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Zapflow platform.
//!
//! Settings come from compiled defaults, an optional `zapflow.toml`, and
//! environment variables, with strict key checking (`deny_unknown_fields`),
//! environment profiles, and miette diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use zapflow_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on port {}", config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_str};
pub use model::{Environment, ZapflowConfig};

/// Load configuration from the file and process environment, then validate it.
///
/// Returns either a valid `ZapflowConfig` or every diagnostic found.
pub fn load_and_validate() -> Result<ZapflowConfig, Vec<ConfigError>> {
    finish(loader::load_config())
}

/// Load configuration from a TOML string and the process environment, then
/// validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<ZapflowConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content))
}

#[allow(clippy::result_large_err)]
fn finish(
    loaded: Result<ZapflowConfig, figment::Error>,
) -> Result<ZapflowConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}
