// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_helpers::{
    app_event_names, event_names, wait_for_app_event, wait_for_status, Harness, C1,
};
use pv_core::test_support::{app_config, ref_state};
use pv_core::{ApplicationConfig, KillReason, SessionStatus};
use std::time::Duration;

fn retrying(retries: u32) -> ApplicationConfig {
    let mut config = app_config("shop");
    config.startup.retries = retries;
    config.watch = vec!["main".to_string()];
    config
}

fn attempts(session: &pv_core::Session) -> usize {
    event_names(session).iter().filter(|n| **n == "build_started").count()
}

#[tokio::test]
async fn failing_build_is_retried_then_given_up() {
    let h = Harness::new(vec![retrying(3)]);
    h.commands.fail("./run.sh");
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let app = h.engine.application("shop").unwrap();

    let session = h.build("shop", "main").await;
    wait_for_app_event(&app, "session_build_failed").await;

    assert_eq!(attempts(&session), 4);
    assert_eq!(h.commands.count("./run.sh"), 4);
    assert_eq!(session.status(), SessionStatus::StartFailed);
    assert_eq!(session.kill_reason(), KillReason::BuildFailed);
    assert_eq!(session.startup_retries(), 3);
    assert!(!session.folder().exists());
    assert_eq!(app_event_names(&app.events().history()), ["session_build", "session_build_failed"]);

    h.fetcher.set_refs(ref_state(&[("main", C1)], &[]));
    let outcome = h.engine.fetch("shop", true).await.unwrap();
    assert!(outcome.auto_starts.is_empty());
    assert_eq!(h.engine.sessions_of("shop").len(), 1);
}

#[tokio::test]
async fn transient_failure_recovers_within_budget() {
    let h = Harness::new(vec![retrying(3)]);
    h.commands.fail_times("./run.sh", 2);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));

    let session = h.build("shop", "main").await;
    wait_for_status(&session, SessionStatus::Started).await;

    assert_eq!(attempts(&session), 3);
    assert_eq!(session.startup_retries(), 0);
    assert_eq!(session.kill_reason(), KillReason::None);
    assert_eq!(session.metrics().build_attempts, 3);
}

#[tokio::test]
async fn slow_build_times_out() {
    let mut config = retrying(0);
    config.startup.timeout = Duration::from_millis(150);
    let h = Harness::new(vec![config]);
    h.commands.hang("./run.sh");
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let app = h.engine.application("shop").unwrap();

    let session = h.build("shop", "main").await;
    wait_for_app_event(&app, "session_build_failed").await;

    assert_eq!(session.status(), SessionStatus::StartFailed);
    assert_eq!(session.kill_reason(), KillReason::BuildFailed);
    assert!(session.logs().iter().any(|l| l.message.contains("timed out")));
    assert_eq!(event_names(&session).iter().filter(|n| **n == "build_failed").count(), 1);
}
