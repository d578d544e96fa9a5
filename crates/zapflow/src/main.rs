// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zapflow - multi-tenant WhatsApp automation platform.
//!
//! This is the binary entry point for the backend API and the dashboard proxy.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config_cmd;
mod logging;
mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Zapflow - multi-tenant WhatsApp automation platform.
#[derive(Parser, Debug)]
#[command(name = "zapflow", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the backend REST API.
    Serve,
    /// Start the dashboard proxy in front of the backend API.
    Dashboard,
    /// Print the resolved configuration with secrets redacted.
    Config {
        /// Only validate; print nothing on success.
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match zapflow_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            zapflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            let _guard = logging::init_logging(&config.logging);
            serve::run_serve(config).await.map_err(|e| e.to_string())
        }
        Some(Commands::Dashboard) => {
            let _guard = logging::init_logging(&config.logging);
            serve::run_dashboard(config).await.map_err(|e| e.to_string())
        }
        Some(Commands::Config { check }) => config_cmd::run_config(&config, check),
        None => {
            println!("zapflow: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
