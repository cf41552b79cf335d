// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-application configuration.
//!
//! Loaded from the `[[applications]]` tables of the daemon config file.
//! Durations accept the strings understood by [`crate::duration::parse_duration`].

use crate::duration::{serde_opt, serde_str};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("application name must not be empty")]
    MissingName,
    #[error("application '{0}' is defined more than once")]
    DuplicateApplication(String),
    #[error("application '{0}' has no remote")]
    MissingRemote(String),
    #[error("application '{app}': invalid branch pattern '{pattern}': {reason}")]
    InvalidBranchPattern { app: String, pattern: String, reason: String },
    #[error("application '{app}': status {status} is not a valid HTTP status")]
    InvalidStatus { app: String, status: u16 },
}

/// One shell command of a start/stop/clean list.
///
/// In TOML either a plain string or `{ command, continue_on_error, timeout }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCommand")]
pub struct CommandConfig {
    pub command: String,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default, with = "serde_opt", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Plain(String),
    Full {
        command: String,
        #[serde(default)]
        continue_on_error: bool,
        #[serde(default, with = "serde_opt")]
        timeout: Option<Duration>,
    },
}

impl From<RawCommand> for CommandConfig {
    fn from(raw: RawCommand) -> Self {
        match raw {
            RawCommand::Plain(command) => Self { command, continue_on_error: false, timeout: None },
            RawCommand::Full { command, continue_on_error, timeout } => {
                Self { command, continue_on_error, timeout }
            }
        }
    }
}

impl CommandConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), continue_on_error: false, timeout: None }
    }

    crate::setters! {
        set { continue_on_error: bool }
        option { timeout: Duration }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_interval", with = "serde_str")]
    pub interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { interval: default_fetch_interval() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Deadline for a whole build attempt (filesystem, commands, warm-ups)
    #[serde(default = "default_startup_timeout", with = "serde_str")]
    pub timeout: Duration,
    /// Extra attempts after the first failed build
    #[serde(default)]
    pub retries: u32,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self { timeout: default_startup_timeout(), retries: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleConfig {
    #[serde(default = "default_inactivity_timeout", with = "serde_str")]
    pub inactivity_timeout: Duration,
}

impl Default for RecycleConfig {
    fn default() -> Self {
        Self { inactivity_timeout: default_inactivity_timeout() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortsConfig {
    #[serde(default)]
    pub except: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthcheckConfig {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Overrides the `Host` header sent to the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_initial_delay", with = "serde_str")]
    pub initial_delay: Duration,
    #[serde(default = "default_retry_interval", with = "serde_str")]
    pub retry_interval: Duration,
    /// Per-request timeout
    #[serde(default = "default_retry_timeout", with = "serde_str")]
    pub retry_timeout: Duration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            status: default_status(),
            headers: BTreeMap::new(),
            host: None,
            initial_delay: default_initial_delay(),
            retry_interval: default_retry_interval(),
            retry_timeout: default_retry_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl HealthcheckConfig {
    crate::setters! {
        into { path: String }
        set {
            status: u16,
            initial_delay: Duration,
            retry_interval: Duration,
            retry_timeout: Duration,
            max_retries: u32,
        }
        option { host: String }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupConfig {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl WarmupConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: default_method(),
            status: default_status(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupsConfig {
    #[serde(default = "default_warmup_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_timeout", with = "serde_str")]
    pub timeout: Duration,
    #[serde(default = "default_retry_interval", with = "serde_str")]
    pub retry_interval: Duration,
    #[serde(default)]
    pub urls: Vec<WarmupConfig>,
}

impl Default for WarmupsConfig {
    fn default() -> Self {
        Self {
            max_retries: default_warmup_retries(),
            timeout: default_retry_timeout(),
            retry_interval: default_retry_interval(),
            urls: Vec::new(),
        }
    }
}

/// Overrides applied when a checkout name matches `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOverride {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Vec<CommandConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<CommandConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<Vec<CommandConfig>>,
    /// Merged over the application `env`
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthcheckConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    pub remote: String,
    #[serde(default)]
    pub start: Vec<CommandConfig>,
    #[serde(default)]
    pub stop: Vec<CommandConfig>,
    #[serde(default)]
    pub clean: Vec<CommandConfig>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Refs that are always watched; their sessions never expire on inactivity
    #[serde(default)]
    pub watch: Vec<String>,
    /// Cap on alive sessions of this application (`None` = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub recycle: RecycleConfig,
    #[serde(default)]
    pub ports: PortsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthcheckConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmups: Option<WarmupsConfig>,
    #[serde(default)]
    pub branches: Vec<BranchOverride>,
}

impl ApplicationConfig {
    pub fn new(name: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: remote.into(),
            start: Vec::new(),
            stop: Vec::new(),
            clean: Vec::new(),
            env: BTreeMap::new(),
            watch: Vec::new(),
            max_sessions: None,
            fetch: FetchConfig::default(),
            startup: StartupConfig::default(),
            recycle: RecycleConfig::default(),
            ports: PortsConfig::default(),
            healthcheck: None,
            warmups: None,
            branches: Vec::new(),
        }
    }

    crate::setters! {
        set {
            start: Vec<CommandConfig>,
            stop: Vec<CommandConfig>,
            clean: Vec<CommandConfig>,
            watch: Vec<String>,
            branches: Vec<BranchOverride>,
        }
        option {
            max_sessions: usize,
            healthcheck: HealthcheckConfig,
            warmups: WarmupsConfig,
        }
    }

    pub fn is_watched(&self, checkout: &str) -> bool {
        self.watch.iter().any(|w| w == checkout)
    }

    /// Effective configuration for `checkout`: the first branch override
    /// whose pattern matches replaces the fields it sets; `env` is merged.
    pub fn for_checkout(&self, checkout: &str) -> ApplicationConfig {
        let mut merged = self.clone();
        let matched = self.branches.iter().find(|b| {
            Regex::new(&b.pattern).map(|re| re.is_match(checkout)).unwrap_or(false)
        });
        if let Some(over) = matched {
            if let Some(start) = &over.start {
                merged.start = start.clone();
            }
            if let Some(stop) = &over.stop {
                merged.stop = stop.clone();
            }
            if let Some(clean) = &over.clean {
                merged.clean = clean.clone();
            }
            if let Some(hc) = &over.healthcheck {
                merged.healthcheck = Some(hc.clone());
            }
            merged.env.extend(over.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.remote.trim().is_empty() {
            return Err(ConfigError::MissingRemote(self.name.clone()));
        }
        for branch in &self.branches {
            if let Err(e) = Regex::new(&branch.pattern) {
                return Err(ConfigError::InvalidBranchPattern {
                    app: self.name.clone(),
                    pattern: branch.pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }
        let statuses = self
            .healthcheck
            .iter()
            .map(|h| h.status)
            .chain(self.branches.iter().filter_map(|b| b.healthcheck.as_ref().map(|h| h.status)))
            .chain(self.warmups.iter().flat_map(|w| w.urls.iter().map(|u| u.status)));
        for status in statuses {
            if !(100..=599).contains(&status) {
                return Err(ConfigError::InvalidStatus { app: self.name.clone(), status });
            }
        }
        Ok(())
    }
}

/// Validate every application and reject duplicate names.
pub fn validate_applications(apps: &[ApplicationConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for app in apps {
        app.validate()?;
        if !seen.insert(app.name.as_str()) {
            return Err(ConfigError::DuplicateApplication(app.name.clone()));
        }
    }
    Ok(())
}

fn default_fetch_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_startup_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_inactivity_timeout() -> Duration {
    Duration::from_secs(1800)
}

fn default_path() -> String {
    "/".to_string()
}

fn default_status() -> u16 {
    200
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_retries() -> u32 {
    5
}

fn default_warmup_retries() -> u32 {
    3
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
