// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup: stderr always, plus daily-rolling files when
//! a log directory is configured.

use crate::config::LogConfig;
use crate::lifecycle::LifecycleError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "pvd.log";

/// `RUST_LOG` when set, otherwise the configured level
pub fn env_filter(level: &str) -> Result<EnvFilter, LifecycleError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LifecycleError::Logging(format!("invalid log level '{level}': {e}")))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the process so buffered file output is flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, LifecycleError> {
    let filter = env_filter(&config.level)?;
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(dir) = &config.dir else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr)
            .try_init()
            .map_err(|e| LifecycleError::Logging(e.to_string()))?;
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| LifecycleError::Logging(e.to_string()))?;
    Ok(Some(guard))
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
