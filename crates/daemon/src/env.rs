// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_VAR: &str = "PV_CONFIG";
pub const STORAGE_DIR_VAR: &str = "PV_STORAGE_DIR";
pub const DRAIN_TIMEOUT_VAR: &str = "PV_DRAIN_TIMEOUT_MS";

/// Config file when `--config` is not given: PV_CONFIG > XDG_CONFIG_HOME/pv/pvd.toml > ./pvd.toml
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_VAR) {
        return PathBuf::from(path);
    }
    dirs::config_dir().map(|dir| dir.join("pv").join("pvd.toml")).unwrap_or_else(|| PathBuf::from("pvd.toml"))
}

/// Storage folder override
pub fn storage_dir() -> Option<PathBuf> {
    std::env::var(STORAGE_DIR_VAR).ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Storage folder when the config file names none: XDG_DATA_HOME/pv > ./pv-storage
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir().map(|dir| dir.join("pv")).unwrap_or_else(|| PathBuf::from("pv-storage"))
}

/// Shutdown drain timeout (default 10s, configurable via `PV_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var(DRAIN_TIMEOUT_VAR)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
