// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ApplicationEvent, SessionEvent};

impl SessionEvent {
    /// Stable snake_case name, identical to the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::BuildStarted { .. } => "build_started",
            SessionEvent::PreparingFolders => "preparing_folders",
            SessionEvent::CommandsExecutionStarted => "commands_execution_started",
            SessionEvent::WarmupStarted => "warmup_started",
            SessionEvent::WarmupSucceeded => "warmup_succeeded",
            SessionEvent::HealthcheckStarted => "healthcheck_started",
            SessionEvent::HealthcheckSucceeded => "healthcheck_succeeded",
            SessionEvent::HealthcheckFailed { .. } => "healthcheck_failed",
            SessionEvent::SessionAvailable => "session_available",
            SessionEvent::SessionDegraded => "session_degraded",
            SessionEvent::SessionRecovered => "session_recovered",
            SessionEvent::BuildFailed => "build_failed",
            SessionEvent::SessionStopping => "session_stopping",
            SessionEvent::SessionStopped => "session_stopped",
            SessionEvent::StopFailed => "stop_failed",
            SessionEvent::SessionReplaced { .. } => "session_replaced",
        }
    }

    /// One-line summary for tracing output
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            SessionEvent::BuildStarted { attempt } => format!("{t} attempt={attempt}"),
            SessionEvent::HealthcheckFailed { failures, error } => {
                format!("{t} failures={failures} error={error}")
            }
            SessionEvent::SessionReplaced { by } => format!("{t} by={}", by.short(8)),
            _ => t.to_string(),
        }
    }
}

impl ApplicationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ApplicationEvent::InitStarted => "init_started",
            ApplicationEvent::InitCompleted => "init_completed",
            ApplicationEvent::InitFailed { .. } => "init_failed",
            ApplicationEvent::FetchStarted => "fetch_started",
            ApplicationEvent::FetchCompleted => "fetch_completed",
            ApplicationEvent::FetchFailed { .. } => "fetch_failed",
            ApplicationEvent::HotSwap { .. } => "hot_swap",
            ApplicationEvent::AutoStart { .. } => "auto_start",
            ApplicationEvent::SessionBuild { .. } => "session_build",
            ApplicationEvent::SessionBuildSucceeded { .. } => "session_build_succeeded",
            ApplicationEvent::SessionBuildFailed { .. } => "session_build_failed",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            ApplicationEvent::InitFailed { error } | ApplicationEvent::FetchFailed { error } => {
                format!("{t} error={error}")
            }
            ApplicationEvent::HotSwap { checkout, commit, replaces } => {
                format!(
                    "{t} checkout={checkout} commit={} replaces={}",
                    crate::id::short(commit, 7),
                    replaces.len()
                )
            }
            ApplicationEvent::AutoStart { checkout, commit } => {
                format!("{t} checkout={checkout} commit={}", crate::id::short(commit, 7))
            }
            ApplicationEvent::SessionBuild { session, checkout } => {
                format!("{t} session={} checkout={checkout}", session.short(8))
            }
            ApplicationEvent::SessionBuildSucceeded { session }
            | ApplicationEvent::SessionBuildFailed { session } => {
                format!("{t} session={}", session.short(8))
            }
            ApplicationEvent::InitStarted
            | ApplicationEvent::InitCompleted
            | ApplicationEvent::FetchStarted
            | ApplicationEvent::FetchCompleted => t.to_string(),
        }
    }
}
