// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing subscriber setup: a console layer and a rolling daily file layer,
//! each with its own level filter. `RUST_LOG` overrides both.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};
use zapflow_config::model::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "zapflow.log";

/// Keeps the file writer flushing until dropped.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directive for a level: our crates and HTTP traces at `level`,
/// dependencies at `warn`.
pub fn directive(level: &str) -> String {
    format!("zapflow={level},tower_http={level},warn")
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)))
}

/// Install the global subscriber. A second call leaves the first in place.
pub fn init_logging(config: &LoggingConfig) -> LogGuard {
    let console_level = config.console_level.as_deref().unwrap_or(&config.level);
    let console = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_names(false)
            .with_filter(filter(console_level))
    });

    let (file, guard) = if config.file_enabled {
        let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
            .with_filter(filter(&config.level));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
    {
        eprintln!("zapflow: logging already initialized: {e}");
    }

    LogGuard { _file: guard }
}
