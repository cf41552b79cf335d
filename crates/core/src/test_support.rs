// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::application::{Commit, RefState};
use crate::config::{ApplicationConfig, CommandConfig, HealthcheckConfig};
use crate::id::SessionId;
use crate::session::{NewSession, Session};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::session::{KillReason, SessionStatus};
    use proptest::prelude::*;

    pub fn arb_session_status() -> impl Strategy<Value = SessionStatus> {
        proptest::sample::select(SessionStatus::ALL.to_vec())
    }

    pub fn arb_kill_reason() -> impl Strategy<Value = KillReason> {
        prop_oneof![
            Just(KillReason::None),
            Just(KillReason::Stopped),
            Just(KillReason::BuildFailed),
            Just(KillReason::HealthcheckFailed),
            Just(KillReason::Replaced),
        ]
    }
}

// ── Factories ───────────────────────────────────────────────────────────

/// A `starting` session with a deterministic folder and port.
pub fn new_session(app: &str, checkout: &str, commit: &str) -> Session {
    Session::new(NewSession {
        id: SessionId::new(),
        application: app.to_string(),
        alias: format!("{checkout}-test"),
        checkout: checkout.to_string(),
        commit: commit.to_string(),
        port: 4000,
        folder: PathBuf::from(format!("/tmp/pv-test/{app}/sessions/{checkout}")),
        variables: HashMap::new(),
        watched: false,
        replaces: Vec::new(),
        created_at_ms: 1_000_000,
    })
}

/// Ref state with one commit per distinct hash.
pub fn ref_state(branches: &[(&str, &str)], tags: &[(&str, &str)]) -> RefState {
    let to_map = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    };
    let mut hashes: Vec<&str> = branches.iter().chain(tags).map(|(_, h)| *h).collect();
    hashes.sort_unstable();
    hashes.dedup();
    let commits = hashes
        .into_iter()
        .map(|h| Commit { hash: h.to_string(), subject: format!("commit {h}"), ..Default::default() })
        .collect();
    RefState::from_refs(to_map(branches), to_map(tags), commits)
}

/// Application config with fast timings for engine tests.
pub fn app_config(name: &str) -> ApplicationConfig {
    let mut config = ApplicationConfig::new(name, format!("https://git.example.com/{name}.git"))
        .start(vec![CommandConfig::new("./run.sh")]);
    config.startup.timeout = Duration::from_secs(30);
    config.fetch.interval = Duration::from_secs(60);
    config.recycle.inactivity_timeout = Duration::from_secs(600);
    config
}

/// Health check tuned for paused-time tests.
pub fn fast_healthcheck() -> HealthcheckConfig {
    HealthcheckConfig::default()
        .initial_delay(Duration::from_millis(10))
        .retry_interval(Duration::from_millis(50))
        .retry_timeout(Duration::from_millis(100))
        .max_retries(3)
}
