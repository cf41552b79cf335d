// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use fs2::FileExt;
use pv_adapters::{CliGitClient, GitRepositoryFetcher, ReqwestHttpProbe, ShellCommandRunner, TcpPortRetriever};
use pv_core::SystemClock;
use pv_engine::{Engine, EngineDeps};
use tracing::{info, warn};

use super::{Daemon, LifecycleError};
use crate::config::DaemonConfig;

/// Start the daemon with the real git, shell, port and HTTP adapters
pub async fn startup(config: DaemonConfig) -> Result<Daemon, LifecycleError> {
    let deps = EngineDeps {
        git: Arc::new(CliGitClient),
        fetcher: Arc::new(GitRepositoryFetcher),
        commands: Arc::new(ShellCommandRunner),
        ports: Arc::new(TcpPortRetriever),
        http: Arc::new(ReqwestHttpProbe::new()?),
    };
    startup_with(config, deps).await
}

/// Start the daemon with the given adapters
pub async fn startup_with(config: DaemonConfig, deps: EngineDeps) -> Result<Daemon, LifecycleError> {
    let lock_path = config.lock_path();
    match startup_inner(config, deps).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // A failed lock means the PID file belongs to the running daemon
            if !matches!(e, LifecycleError::LockFailed(_)) {
                let _ = std::fs::remove_file(&lock_path);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: DaemonConfig, deps: EngineDeps) -> Result<Daemon, LifecycleError> {
    // 1. Storage folder holds the lock, base clones and session folders
    std::fs::create_dir_all(&config.storage_folder)?;

    // 2. Acquire lock file FIRST - prevents two daemons sharing a storage folder
    let lock_file = acquire_lock(&config.lock_path())?;

    // 3. Start the engine workers
    let engine = Engine::start(config.engine_config(), deps, SystemClock, config.applications.clone())?;

    // 4. Clone bases and start the fetch loops. A failing application is
    // reported through its notifications and does not stop the daemon.
    for (name, result) in engine.init_applications().await {
        if let Err(e) = result {
            warn!(app = %name, error = %e, "application not initialized");
        }
    }

    info!(
        storage = %config.storage_folder.display(),
        applications = config.applications.len(),
        filesystem = %config.filesystem,
        "daemon ready"
    );
    Ok(Daemon { config, engine, lock_file })
}

fn acquire_lock(path: &Path) -> Result<File, LifecycleError> {
    // Open without truncating so a running daemon's PID survives a failed attempt
    let mut file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}
