// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine fixture wired to fake adapters

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::mediator::BuildResult;
use crate::runtime::EngineDeps;
use pv_adapters::{FakeCommandRunner, FakeGitClient, FakeHttpProbe, FakePortRetriever, FakeRepositoryFetcher};
use pv_core::{ApplicationConfig, ApplicationEvent, FakeClock, RefState, Session, SessionEvent, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Upper bound for any single wait in engine tests
pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) const C1: &str = "1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a";
pub(crate) const C2: &str = "2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b";
pub(crate) const C3: &str = "3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c";

pub(crate) struct Harness {
    pub engine: Engine<FakeClock>,
    pub git: FakeGitClient,
    pub fetcher: FakeRepositoryFetcher,
    pub commands: FakeCommandRunner,
    pub http: FakeHttpProbe,
    pub clock: FakeClock,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(apps: Vec<ApplicationConfig>) -> Self {
        Self::with_config(apps, |_| {})
    }

    /// Base clones are created on disk with a single file so the copy
    /// strategy has something to copy without running init.
    pub fn with_config(apps: Vec<ApplicationConfig>, configure: impl FnOnce(&mut EngineConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::new(dir.path().join("storage"));
        config.destroy_timeout = Duration::from_secs(2);
        configure(&mut config);

        for app in &apps {
            let base = config.base_folder(&app.name);
            std::fs::create_dir_all(base.join(".git")).unwrap();
            std::fs::write(base.join("README.md"), format!("# {}\n", app.name)).unwrap();
        }

        let git = FakeGitClient::new();
        let fetcher = FakeRepositoryFetcher::new();
        let commands = FakeCommandRunner::new();
        let http = FakeHttpProbe::new();
        let clock = FakeClock::new();
        let deps = EngineDeps {
            git: Arc::new(git.clone()),
            fetcher: Arc::new(fetcher.clone()),
            commands: Arc::new(commands.clone()),
            ports: Arc::new(FakePortRetriever::new()),
            http: Arc::new(http.clone()),
        };
        let engine = Engine::start(config, deps, clock.clone(), apps).unwrap();
        Self { engine, git, fetcher, commands, http, clock, dir }
    }

    pub fn set_refs(&self, app: &str, refs: RefState) {
        self.engine.application(app).unwrap().set_refs(refs);
    }

    /// Build and return the accepted session
    pub async fn build(&self, app: &str, checkout: &str) -> Arc<Session> {
        match self.engine.build_session(app, checkout).await {
            BuildResult::Accepted(session) => session,
            other => panic!("expected accepted build, got {other:?}"),
        }
    }
}

pub(crate) fn event_names(session: &Session) -> Vec<&'static str> {
    session.events().history().iter().map(SessionEvent::name).collect()
}

pub(crate) fn app_event_names(events: &[ApplicationEvent]) -> Vec<&'static str> {
    events.iter().map(ApplicationEvent::name).collect()
}

/// Wait until `session` publishes an event called `name`.
pub(crate) async fn wait_for_event(session: &Session, name: &str) {
    let mut rx = session.subscribe();
    let found = tokio::time::timeout(WAIT, async {
        while let Some(event) = rx.recv().await {
            if event.name() == name {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(found, Ok(true), "no {name} event; saw {:?}", event_names(session));
}

/// Wait until `session` has published `count` events called `name`.
pub(crate) async fn wait_for_events(session: &Session, name: &str, count: usize) {
    let mut rx = session.subscribe();
    let found = tokio::time::timeout(WAIT, async {
        let mut seen = 0;
        while let Some(event) = rx.recv().await {
            if event.name() == name {
                seen += 1;
                if seen == count {
                    return true;
                }
            }
        }
        false
    })
    .await;
    assert_eq!(found, Ok(true), "expected {count} {name} events; saw {:?}", event_names(session));
}

pub(crate) async fn wait_for_app_event(app: &pv_core::Application, name: &str) {
    let mut rx = app.subscribe();
    let found = tokio::time::timeout(WAIT, async {
        while let Some(event) = rx.recv().await {
            if event.name() == name {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(found, Ok(true), "no {name} application event");
}

pub(crate) async fn wait_for_status(session: &Session, status: SessionStatus) {
    let reached = tokio::time::timeout(WAIT, async {
        while session.status() != status {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        reached.is_ok(),
        "session stuck in {} waiting for {status}; events {:?}",
        session.status(),
        event_names(session)
    );
}

/// Give spawned tasks a moment to run
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
