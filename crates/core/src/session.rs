// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session: one build/run of an application at a checkout.
//!
//! All mutable state sits behind a single `RwLock`; every status change goes
//! through [`Session::transition`], which validates the edge and publishes the
//! matching event while the lock is held so the bus order equals the status order.

use crate::event::SessionEvent;
use crate::event_bus::{EventBus, Subscription};
use crate::id::SessionId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use thiserror::Error;
use tokio::time::Instant;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Started,
    /// Serving traffic, but the health check is failing
    Degraded,
    Stopping,
    Stopped,
    StartFailed,
    StopFailed,
}

crate::simple_display! {
    SessionStatus {
        Starting => "starting",
        Started => "started",
        Degraded => "degraded",
        Stopping => "stopping",
        Stopped => "stopped",
        StartFailed => "start_failed",
        StopFailed => "stop_failed",
    }
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 7] = [
        SessionStatus::Starting,
        SessionStatus::Started,
        SessionStatus::Degraded,
        SessionStatus::Stopping,
        SessionStatus::Stopped,
        SessionStatus::StartFailed,
        SessionStatus::StopFailed,
    ];

    /// Counts against capacity and deduplication
    pub fn is_alive(self) -> bool {
        matches!(self, SessionStatus::Starting | SessionStatus::Started | SessionStatus::Degraded)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Stopped | SessionStatus::StartFailed | SessionStatus::StopFailed)
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Starting, Started)
                | (Starting, StartFailed)
                | (Starting, Stopping)
                | (Started, Degraded)
                | (Degraded, Started)
                | (Degraded, StartFailed)
                | (Started, Stopping)
                | (Degraded, Stopping)
                | (Stopping, Stopped)
                | (Stopping, StopFailed)
                | (Stopping, StartFailed)
                | (StartFailed, Starting)
        )
    }

    /// Event published when entering `next` from `self`.
    ///
    /// Re-entering `starting` publishes nothing here; the build pipeline
    /// announces each attempt with `build_started`.
    fn event_for(self, next: SessionStatus) -> Option<SessionEvent> {
        match (self, next) {
            (_, SessionStatus::Starting) => None,
            (SessionStatus::Degraded, SessionStatus::Started) => {
                Some(SessionEvent::SessionRecovered)
            }
            (_, SessionStatus::Started) => Some(SessionEvent::SessionAvailable),
            (_, SessionStatus::Degraded) => Some(SessionEvent::SessionDegraded),
            (_, SessionStatus::Stopping) => Some(SessionEvent::SessionStopping),
            (_, SessionStatus::Stopped) => Some(SessionEvent::SessionStopped),
            (_, SessionStatus::StartFailed) => Some(SessionEvent::BuildFailed),
            (_, SessionStatus::StopFailed) => Some(SessionEvent::StopFailed),
        }
    }
}

/// Why a session died. Decides whether its checkout may be rebuilt
/// automatically and whether a failed session is recycled for a retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillReason {
    #[default]
    None,
    Stopped,
    BuildFailed,
    HealthcheckFailed,
    Replaced,
}

crate::simple_display! {
    KillReason {
        None => "none",
        Stopped => "stopped",
        BuildFailed => "build_failed",
        HealthcheckFailed => "healthcheck_failed",
        Replaced => "replaced",
    }
}

impl KillReason {
    /// Blocks auto-start of the same commit until the ref moves
    pub fn prevents_rebuild(self) -> bool {
        match self {
            KillReason::Stopped | KillReason::BuildFailed => true,
            KillReason::None | KillReason::HealthcheckFailed | KillReason::Replaced => false,
        }
    }

    /// A retry reuses the same session object
    pub fn allows_recycle(self) -> bool {
        match self {
            KillReason::BuildFailed | KillReason::HealthcheckFailed => true,
            KillReason::None | KillReason::Stopped | KillReason::Replaced => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

crate::simple_display! {
    LogLevel {
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at_ms: u64,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub created_at_ms: u64,
    pub build_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_started_at_ms: Option<u64>,
    /// Duration of the attempt that made the session available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_at_ms: Option<u64>,
    /// From creation to the first `started`, across all attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_available_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition { from: SessionStatus, to: SessionStatus },
    #[error("session was replaced by {0}")]
    Superseded(SessionId),
}

/// Everything needed to allocate a fresh session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: SessionId,
    pub application: String,
    pub alias: String,
    pub checkout: String,
    pub commit: String,
    pub port: u16,
    pub folder: PathBuf,
    pub variables: HashMap<String, String>,
    pub watched: bool,
    pub replaces: Vec<SessionId>,
    pub created_at_ms: u64,
}

#[derive(Debug)]
struct SessionState {
    alias: String,
    checkout: String,
    commit: String,
    port: u16,
    folder: PathBuf,
    variables: HashMap<String, String>,
    logs: Vec<LogEntry>,
    metrics: SessionMetrics,
    status: SessionStatus,
    kill_reason: KillReason,
    startup_retries: u32,
    replaces: Vec<SessionId>,
    replaced_by: Option<SessionId>,
    watched: bool,
    last_access: Instant,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    application: String,
    events: EventBus<SessionEvent>,
    state: RwLock<SessionState>,
}

/// Serializable point-in-time copy of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub application: String,
    pub alias: String,
    pub checkout: String,
    pub commit: String,
    pub port: u16,
    pub folder: PathBuf,
    pub variables: BTreeMap<String, String>,
    pub status: SessionStatus,
    pub kill_reason: KillReason,
    pub startup_retries: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaces: Vec<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<SessionId>,
    pub watched: bool,
    pub metrics: SessionMetrics,
    pub logs: Vec<LogEntry>,
}

impl Session {
    pub fn new(new: NewSession) -> Self {
        Self {
            id: new.id,
            application: new.application,
            events: EventBus::new(),
            state: RwLock::new(SessionState {
                alias: new.alias,
                checkout: new.checkout,
                commit: new.commit,
                port: new.port,
                folder: new.folder,
                variables: new.variables,
                logs: Vec::new(),
                metrics: SessionMetrics { created_at_ms: new.created_at_ms, ..Default::default() },
                status: SessionStatus::Starting,
                kill_reason: KillReason::None,
                startup_retries: 0,
                replaces: new.replaces,
                replaced_by: None,
                watched: new.watched,
                last_access: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn events(&self) -> &EventBus<SessionEvent> {
        &self.events
    }

    pub fn subscribe(&self) -> Subscription<SessionEvent> {
        self.events.subscribe()
    }

    /// Publish a pipeline milestone that is not a status change.
    pub fn publish(&self, event: SessionEvent) {
        // Hold the read lock so milestones cannot interleave with a transition
        let _state = self.state.read();
        self.events.publish(event);
    }

    pub fn alias(&self) -> String {
        self.state.read().alias.clone()
    }

    pub fn checkout(&self) -> String {
        self.state.read().checkout.clone()
    }

    pub fn commit(&self) -> String {
        self.state.read().commit.clone()
    }

    pub fn port(&self) -> u16 {
        self.state.read().port
    }

    pub fn folder(&self) -> PathBuf {
        self.state.read().folder.clone()
    }

    pub fn variables(&self) -> HashMap<String, String> {
        self.state.read().variables.clone()
    }

    pub fn set_variable(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.write().variables.insert(key.into(), value.into());
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn is_alive(&self) -> bool {
        self.status().is_alive()
    }

    /// Move to `next`, publishing the mapped event. Returns the previous status.
    pub fn transition(&self, next: SessionStatus) -> Result<SessionStatus, SessionError> {
        let mut state = self.state.write();
        let from = state.status;
        if !from.can_transition_to(next) {
            return Err(SessionError::InvalidTransition { from, to: next });
        }
        state.status = next;
        if let Some(event) = from.event_for(next) {
            self.events.publish(event);
        }
        Ok(from)
    }

    /// Transition only if the current status is one of `from`.
    ///
    /// Returns `Ok(false)` without side effects when the status differs.
    pub fn transition_from(
        &self,
        from: &[SessionStatus],
        next: SessionStatus,
    ) -> Result<bool, SessionError> {
        let mut state = self.state.write();
        let current = state.status;
        if !from.contains(&current) {
            return Ok(false);
        }
        if !current.can_transition_to(next) {
            return Err(SessionError::InvalidTransition { from: current, to: next });
        }
        state.status = next;
        if let Some(event) = current.event_for(next) {
            self.events.publish(event);
        }
        Ok(true)
    }

    /// Reuse a `start_failed` session for another attempt: port and variables
    /// are replaced, the retry counter grows and the status returns to `starting`.
    ///
    /// Returns the new retry count.
    pub fn recycle(
        &self,
        port: u16,
        variables: HashMap<String, String>,
    ) -> Result<u32, SessionError> {
        let mut state = self.state.write();
        if let Some(by) = &state.replaced_by {
            return Err(SessionError::Superseded(by.clone()));
        }
        if !state.status.can_transition_to(SessionStatus::Starting) {
            return Err(SessionError::InvalidTransition {
                from: state.status,
                to: SessionStatus::Starting,
            });
        }
        state.status = SessionStatus::Starting;
        state.port = port;
        state.variables = variables;
        state.kill_reason = KillReason::None;
        state.startup_retries += 1;
        Ok(state.startup_retries)
    }

    pub fn kill_reason(&self) -> KillReason {
        self.state.read().kill_reason
    }

    pub fn set_kill_reason(&self, reason: KillReason) {
        self.state.write().kill_reason = reason;
    }

    /// Record `reason` unless one is already set. Returns whether it was set.
    pub fn set_kill_reason_if_none(&self, reason: KillReason) -> bool {
        let mut state = self.state.write();
        if state.kill_reason == KillReason::None {
            state.kill_reason = reason;
            true
        } else {
            false
        }
    }

    pub fn startup_retries(&self) -> u32 {
        self.state.read().startup_retries
    }

    pub fn reset_startup_retries(&self) {
        self.state.write().startup_retries = 0;
    }

    pub fn replaces(&self) -> Vec<SessionId> {
        self.state.read().replaces.clone()
    }

    pub fn replaced_by(&self) -> Option<SessionId> {
        self.state.read().replaced_by.clone()
    }

    pub fn set_replaced_by(&self, by: SessionId) {
        self.state.write().replaced_by = Some(by);
    }

    /// Watched sessions never expire on inactivity
    pub fn watched(&self) -> bool {
        self.state.read().watched
    }

    pub fn log(&self, at_ms: u64, level: LogLevel, message: impl Into<String>) {
        self.state.write().logs.push(LogEntry { at_ms, level, message: message.into() });
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state.read().logs.clone()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.state.read().metrics.clone()
    }

    pub fn update_metrics(&self, f: impl FnOnce(&mut SessionMetrics)) {
        f(&mut self.state.write().metrics);
    }

    /// Record traffic; pushes back inactivity expiry.
    pub fn touch(&self) {
        self.state.write().last_access = Instant::now();
    }

    pub fn last_access(&self) -> Instant {
        self.state.read().last_access
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            id: self.id.clone(),
            application: self.application.clone(),
            alias: state.alias.clone(),
            checkout: state.checkout.clone(),
            commit: state.commit.clone(),
            port: state.port,
            folder: state.folder.clone(),
            variables: state.variables.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            status: state.status,
            kill_reason: state.kill_reason,
            startup_retries: state.startup_retries,
            replaces: state.replaces.clone(),
            replaced_by: state.replaced_by.clone(),
            watched: state.watched,
            metrics: state.metrics.clone(),
            logs: state.logs.clone(),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
