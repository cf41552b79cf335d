// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, signals, shutdown.

mod startup;
pub use startup::{startup, startup_with};

use crate::config::{DaemonConfig, DaemonConfigError};
use pv_adapters::HttpError;
use pv_engine::{Engine, EngineError};
use std::fs::File;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// A running daemon.
pub struct Daemon {
    pub config: DaemonConfig,
    pub engine: Engine,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl Daemon {
    /// Shut the engine down, waiting up to `drain` for in-flight work, then
    /// remove the PID file. The lock is released when `self` is dropped.
    pub async fn shutdown(self, drain: Duration) -> Result<(), LifecycleError> {
        info!(drain_ms = drain.as_millis() as u64, "shutting down daemon");
        if !self.engine.shutdown(drain).await {
            warn!("engine tasks did not finish before the drain timeout");
        }

        let lock_path = self.config.lock_path();
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                warn!(path = %lock_path.display(), error = %e, "failed to remove PID file");
            }
        }
        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] DaemonConfigError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("HTTP client error: {0}")]
    Http(#[from] HttpError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve on ctrl-c, or SIGTERM on unix.
pub async fn wait_for_signal() -> Result<(), LifecycleError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("shutdown signal received");
    Ok(())
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
