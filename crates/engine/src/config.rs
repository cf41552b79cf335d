// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-wide settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DESTROY_TIMEOUT: Duration = Duration::from_secs(180);

/// How a session folder is produced from the application's base clone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemStrategy {
    /// Reset the base clone to the commit and copy its tree
    #[default]
    Copy,
    /// Clone from the base clone, then fetch and reset
    Clone,
}

pv_core::simple_display! {
    FilesystemStrategy {
        Copy => "copy",
        Clone => "clone",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root of `<app>/base` clones and `<app>/sessions/<alias>` folders
    pub storage_folder: PathBuf,
    /// Alive sessions across all applications
    pub max_sessions: Option<usize>,
    pub filesystem: FilesystemStrategy,
    /// Bound on stop + clean commands when destroying a session
    pub destroy_timeout: Duration,
    /// Delete session folders once they are cleaned
    pub remove_folders: bool,
}

impl EngineConfig {
    pub fn new(storage_folder: impl Into<PathBuf>) -> Self {
        Self {
            storage_folder: storage_folder.into(),
            max_sessions: None,
            filesystem: FilesystemStrategy::default(),
            destroy_timeout: DEFAULT_DESTROY_TIMEOUT,
            remove_folders: true,
        }
    }

    pub fn application_folder(&self, app: &str) -> PathBuf {
        self.storage_folder.join(app)
    }

    pub fn base_folder(&self, app: &str) -> PathBuf {
        self.application_folder(app).join("base")
    }

    pub fn sessions_folder(&self, app: &str) -> PathBuf {
        self.application_folder(app).join("sessions")
    }

    pub fn session_folder(&self, app: &str, alias: &str) -> PathBuf {
        self.sessions_folder(app).join(alias)
    }

    /// True when `path` is inside this engine's storage folder
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.storage_folder)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
