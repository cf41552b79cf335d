// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events published on session and application buses

mod methods;

use crate::id::SessionId;
use serde::{Deserialize, Serialize};

/// Timeline of a single session.
///
/// Serializes with `{"type": "event_name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A build attempt began; `attempt` is 1 for the first build and grows on recycle
    BuildStarted { attempt: u32 },

    PreparingFolders,

    CommandsExecutionStarted,

    WarmupStarted,

    WarmupSucceeded,

    HealthcheckStarted,

    HealthcheckSucceeded,

    HealthcheckFailed { failures: u32, error: String },

    /// starting -> started
    SessionAvailable,

    /// started -> degraded
    SessionDegraded,

    /// degraded -> started
    SessionRecovered,

    /// The session ended in `start_failed`
    BuildFailed,

    SessionStopping,

    SessionStopped,

    StopFailed,

    /// A newer session for the same checkout took over
    SessionReplaced { by: SessionId },
}

/// Timeline of an application: fetches and the builds they trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicationEvent {
    InitStarted,

    InitCompleted,

    InitFailed { error: String },

    FetchStarted,

    FetchCompleted,

    FetchFailed { error: String },

    /// A watched ref moved while sessions were serving it
    HotSwap {
        checkout: String,
        commit: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        replaces: Vec<SessionId>,
    },

    /// A watched ref moved with no session serving it
    AutoStart { checkout: String, commit: String },

    /// A fresh session was admitted by the build worker
    SessionBuild { session: SessionId, checkout: String },

    SessionBuildSucceeded { session: SessionId },

    /// Startup retries are exhausted
    SessionBuildFailed { session: SessionId },
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
