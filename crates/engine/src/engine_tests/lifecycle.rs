// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::checked;
use crate::error::EngineError;
use crate::mediator::BuildResult;
use crate::test_helpers::{app_event_names, event_names, settle, wait_for_status, Harness, C1};
use pv_core::test_support::{app_config, ref_state};
use pv_core::{CommandConfig, KillReason, SessionStatus};
use std::time::Duration;

#[tokio::test]
async fn session_becomes_available_through_every_stage() {
    let h = Harness::new(vec![checked("shop")]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));

    let session = h.build("shop", "main").await;
    wait_for_status(&session, SessionStatus::Started).await;

    assert_eq!(
        event_names(&session),
        [
            "build_started",
            "preparing_folders",
            "commands_execution_started",
            "healthcheck_started",
            "healthcheck_succeeded",
            "session_available",
        ]
    );
    assert!(session.folder().join("README.md").is_file());
    assert!(!session.folder().join(".git").exists());
    assert!(session.logs().iter().any(|l| l.message == "$ ./run.sh"));
    let app = h.engine.application("shop").unwrap();
    assert_eq!(app_event_names(&app.events().history()), ["session_build", "session_build_succeeded"]);
}

#[tokio::test]
async fn building_the_same_commit_twice_yields_one_session() {
    let h = Harness::new(vec![app_config("shop")]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));

    let first = h.build("shop", "main").await;
    let second = h.engine.build_session("shop", C1).await;

    match second {
        BuildResult::Existing(session) => assert_eq!(session.id(), first.id()),
        other => panic!("expected existing session, got {other:?}"),
    }
    assert_eq!(h.engine.sessions_of("shop").len(), 1);
}

#[tokio::test]
async fn commands_receive_session_environment() {
    let mut config = app_config("shop");
    config.start = vec![CommandConfig::new("./run.sh --port ${port}")];
    config.env.insert("DATABASE".to_string(), "shop_${alias}".to_string());
    let h = Harness::new(vec![config]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));

    let session = h.build("shop", "main").await;
    wait_for_status(&session, SessionStatus::Started).await;

    let call = &h.commands.calls()[0];
    assert_eq!(call.command, format!("./run.sh --port {}", session.port()));
    assert_eq!(call.cwd, session.folder());
    assert_eq!(call.env["PORT"], session.port().to_string());
    assert_eq!(call.env["COMMIT"], C1);
    assert_eq!(call.env["DATABASE"], format!("shop_{}", session.alias()));
}

#[tokio::test]
async fn idle_session_expires_unless_it_sees_traffic() {
    let mut config = app_config("shop");
    config.recycle.inactivity_timeout = Duration::from_millis(200);
    let h = Harness::new(vec![config]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let session = h.build("shop", "main").await;
    wait_for_status(&session, SessionStatus::Started).await;

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(h.engine.record_traffic(session.id()));
    }
    assert_eq!(session.status(), SessionStatus::Started);

    wait_for_status(&session, SessionStatus::Stopped).await;
    assert_eq!(session.kill_reason(), KillReason::Stopped);
    assert!(!h.engine.record_traffic(session.id()));
}

#[tokio::test]
async fn watched_session_never_expires() {
    let mut config = app_config("shop");
    config.watch = vec!["main".to_string()];
    config.recycle.inactivity_timeout = Duration::from_millis(50);
    let h = Harness::new(vec![config]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let session = h.build("shop", "main").await;
    wait_for_status(&session, SessionStatus::Started).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.status(), SessionStatus::Started);
}

#[tokio::test]
async fn only_finished_sessions_can_be_deleted() {
    let h = Harness::new(vec![app_config("shop")]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let session = h.build("shop", "main").await;
    wait_for_status(&session, SessionStatus::Started).await;

    assert_eq!(
        h.engine.delete_session(session.id()).unwrap_err(),
        EngineError::SessionAlive(session.id().clone())
    );

    h.engine.destroy_session(session.id()).await.unwrap();
    wait_for_status(&session, SessionStatus::Stopped).await;
    h.engine.delete_session(session.id()).unwrap();

    assert!(h.engine.session(session.id()).is_none());
    assert!(session.events().is_closed());
    assert_eq!(
        h.engine.delete_session(session.id()).unwrap_err(),
        EngineError::UnknownSession(session.id().clone())
    );
}

#[tokio::test]
async fn sessions_can_be_found_by_id_prefix() {
    let h = Harness::new(vec![app_config("shop")]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let session = h.build("shop", "main").await;

    let found = h.engine.find_session(&session.id().short(12)).unwrap();
    assert_eq!(found.id(), session.id());
}

#[tokio::test]
async fn shutdown_cancels_builds_and_closes_queues() {
    let h = Harness::new(vec![app_config("shop")]);
    h.commands.hang("./run.sh");
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let session = h.build("shop", "main").await;
    crate::test_helpers::wait_for_event(&session, "commands_execution_started").await;

    assert!(h.engine.shutdown(Duration::from_secs(2)).await);
    settle().await;
    assert!(h.engine.application("shop").unwrap().events().is_closed());

    match h.engine.build_session("shop", "main").await {
        BuildResult::Failed(EngineError::QueueClosed(queue)) => assert_eq!(queue, "build_session"),
        other => panic!("expected closed queue, got {other:?}"),
    }
}
