// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{wait_for_status, Harness, C1, C2};
use pv_core::test_support::{app_config, new_session, ref_state};

#[tokio::test]
async fn only_starting_sessions_start() {
    let h = Harness::new(vec![app_config("shop")]);
    let session = Arc::new(new_session("shop", "main", C1));
    session.transition(SessionStatus::Stopping).unwrap();

    let result = h.engine.runtime().handle_start(StartRequest { session: Arc::clone(&session) }).await;
    assert_eq!(result, StartResult::Ignored(SessionStatus::Stopping));
}

#[tokio::test]
async fn start_records_metrics_and_announces() {
    let h = Harness::new(vec![app_config("shop")]);
    let app = h.engine.application("shop").unwrap();
    let session = Arc::new(new_session("shop", "main", C1));
    session.update_metrics(|m| m.build_started_at_ms = Some(1_000_000));
    h.clock.advance(std::time::Duration::from_millis(1500));

    let result = h.engine.runtime().handle_start(StartRequest { session: Arc::clone(&session) }).await;

    assert_eq!(result, StartResult::Started);
    assert_eq!(session.status(), SessionStatus::Started);
    assert_eq!(session.startup_retries(), 0);
    let metrics = session.metrics();
    assert_eq!(metrics.available_at_ms, Some(1_001_500));
    assert_eq!(metrics.build_duration_ms, Some(1500));
    assert_eq!(metrics.time_to_available_ms, Some(1500));
    assert!(matches!(
        app.events().history().last(),
        Some(ApplicationEvent::SessionBuildSucceeded { session: id }) if id == session.id()
    ));
}

#[tokio::test]
async fn replaced_sessions_are_retired_after_the_new_one_is_available() {
    let h = Harness::new(vec![app_config("shop")]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let old = h.build("shop", "main").await;
    wait_for_status(&old, SessionStatus::Started).await;

    h.set_refs("shop", ref_state(&[("main", C2)], &[]));
    let mut request = crate::mediator::BuildRequest::new("shop", "main");
    request.replaces = vec![old.id().clone()];
    let new = match h.engine.build(request).await {
        crate::mediator::BuildResult::Accepted(s) => s,
        other => panic!("unexpected {other:?}"),
    };

    wait_for_status(&old, SessionStatus::Stopped).await;
    assert_eq!(new.status(), SessionStatus::Started);
    assert_eq!(old.kill_reason(), KillReason::Replaced);
    let replaced_at = old.events().history().into_iter().position(|e| {
        matches!(e, SessionEvent::SessionReplaced { ref by } if by == new.id())
    });
    assert!(replaced_at.is_some());
    assert!(new.metrics().available_at_ms <= old.metrics().stopped_at_ms);
}
