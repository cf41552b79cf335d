// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file.
//!
//! ```toml
//! storage_folder = "/srv/pv"
//! max_sessions = 20
//! filesystem = "copy"
//! destroy_timeout = "3m"
//!
//! [log]
//! level = "info"
//! dir = "/var/log/pv"
//!
//! [[applications]]
//! name = "shop"
//! remote = "git@example.com:shop.git"
//! start = ["npm ci", "npm start -- --port ${port}"]
//! watch = ["main"]
//! ```

use pv_core::duration::serde_str;
use pv_core::{validate_applications, ApplicationConfig, ConfigError};
use pv_engine::{EngineConfig, FilesystemStrategy, DEFAULT_DESTROY_TIMEOUT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_level")]
    pub level: String,
    /// Daily-rolling log files are written here when set
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level(), dir: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default = "crate::env::default_storage_dir")]
    pub storage_folder: PathBuf,
    #[serde(default)]
    pub max_sessions: Option<usize>,
    #[serde(default)]
    pub filesystem: FilesystemStrategy,
    #[serde(default = "default_destroy_timeout", with = "serde_str")]
    pub destroy_timeout: Duration,
    #[serde(default = "default_true")]
    pub remove_folders: bool,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

impl DaemonConfig {
    /// Read and validate `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, DaemonConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| DaemonConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config = Self::parse(&text)?;
        if let Some(dir) = crate::env::storage_dir() {
            config.storage_folder = dir;
        }
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, DaemonConfigError> {
        let config: Self = toml::from_str(text)?;
        validate_applications(&config.applications)?;
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            storage_folder: self.storage_folder.clone(),
            max_sessions: self.max_sessions,
            filesystem: self.filesystem,
            destroy_timeout: self.destroy_timeout,
            remove_folders: self.remove_folders,
        }
    }

    /// Where the single-instance lock lives
    pub fn lock_path(&self) -> PathBuf {
        self.storage_folder.join("pvd.pid")
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_destroy_timeout() -> Duration {
    DEFAULT_DESTROY_TIMEOUT
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
