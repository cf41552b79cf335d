// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{event_names, wait_for_app_event, wait_for_status, Harness, C1, C2, C3};
use pv_core::test_support::{app_config, ref_state};

#[yare::parameterized(
    branch = { "main", "main" },
    nested = { "feature/Login_v2", "feature-login-v2" },
    repeated_separators = { "fix//--it", "fix-it" },
    leading_trailing = { "/release/", "release" },
    only_symbols = { "///", "session" },
)]
fn slugs(checkout: &str, expected: &str) {
    assert_eq!(slug(checkout), expected);
}

fn shop() -> Harness {
    let h = Harness::new(vec![app_config("shop")]);
    h.set_refs("shop", ref_state(&[("main", C1), ("feature/cart", C2)], &[("v1.0", C3)]));
    h
}

#[tokio::test]
async fn fresh_build_allocates_session() {
    let h = shop();
    let app = h.engine.application("shop").unwrap();
    let session = h.build("shop", "feature/cart").await;

    assert_eq!(session.checkout(), "feature/cart");
    assert_eq!(session.commit(), C2);
    assert!(session.alias().starts_with("feature-cart-"));
    assert_eq!(session.alias().len(), "feature-cart-".len() + ALIAS_ID_LEN);
    assert_eq!(session.port(), 4000);
    assert_eq!(
        session.folder(),
        h.engine.config().session_folder("shop", &session.alias())
    );
    let vars = session.variables();
    assert_eq!(vars["commit"], C2);
    assert_eq!(vars["port"], "4000");
    assert_eq!(vars["app"], "shop");
    assert!(matches!(
        app.events().history().first(),
        Some(ApplicationEvent::SessionBuild { session: id, .. }) if id == session.id()
    ));
}

#[tokio::test]
async fn commit_checkout_records_branch() {
    let h = shop();
    let session = h.build("shop", &C1[..10]).await;
    assert_eq!(session.checkout(), "main");
    assert_eq!(session.commit(), C1);
}

#[tokio::test]
async fn same_commit_returns_existing_session() {
    let h = shop();
    let first = h.build("shop", "main").await;
    match h.engine.build_session("shop", C1).await {
        BuildResult::Existing(existing) => assert_eq!(existing.id(), first.id()),
        other => panic!("expected existing session, got {other:?}"),
    }
    assert_eq!(h.engine.sessions().len(), 1);
}

#[tokio::test]
async fn unknown_inputs_are_rejected() {
    let h = shop();
    assert!(matches!(
        h.engine.build_session("nope", "main").await,
        BuildResult::Failed(EngineError::UnknownApplication(_))
    ));
    assert!(matches!(
        h.engine.build_session("shop", "does-not-exist").await,
        BuildResult::Failed(EngineError::UnresolvableCheckout { .. })
    ));
    assert!(h.engine.sessions().is_empty());
}

#[tokio::test]
async fn global_capacity_counts_alive_sessions() {
    let h = Harness::with_config(vec![app_config("shop")], |c| c.max_sessions = Some(1));
    h.set_refs("shop", ref_state(&[("main", C1), ("dev", C2)], &[]));
    let first = h.build("shop", "main").await;

    assert!(matches!(
        h.engine.build_session("shop", "dev").await,
        BuildResult::Failed(EngineError::GlobalCapacity(1))
    ));

    wait_for_status(&first, SessionStatus::Started).await;
    h.engine.destroy_session(first.id()).await.unwrap();
    wait_for_status(&first, SessionStatus::Stopped).await;
    h.build("shop", "dev").await;
}

#[tokio::test]
async fn application_capacity_is_per_application() {
    let h = Harness::new(vec![app_config("shop").max_sessions(1usize), app_config("blog")]);
    h.set_refs("shop", ref_state(&[("main", C1), ("dev", C2)], &[]));
    h.set_refs("blog", ref_state(&[("main", C1)], &[]));

    h.build("shop", "main").await;
    assert!(matches!(
        h.engine.build_session("shop", "dev").await,
        BuildResult::Failed(EngineError::ApplicationCapacity { limit: 1, .. })
    ));
    h.build("blog", "main").await;
}

#[tokio::test]
async fn ports_skip_excluded_and_used() {
    let mut config = app_config("shop");
    config.ports.except = vec![4000];
    let h = Harness::new(vec![config]);
    h.set_refs("shop", ref_state(&[("main", C1), ("dev", C2)], &[]));

    let a = h.build("shop", "main").await;
    let b = h.build("shop", "dev").await;
    assert_eq!(a.port(), 4001);
    assert_ne!(b.port(), a.port());
    assert_ne!(b.port(), 4000);
}

#[tokio::test]
async fn supersede_marks_older_sessions_of_the_checkout() {
    let h = shop();
    let old = h.build("shop", "main").await;
    wait_for_status(&old, SessionStatus::Started).await;

    h.set_refs("shop", ref_state(&[("main", C2)], &[]));
    let mut request = BuildRequest::new("shop", "main");
    request.supersede = true;
    let new = match h.engine.build(request).await {
        BuildResult::Accepted(session) => session,
        other => panic!("expected accepted build, got {other:?}"),
    };

    assert_eq!(new.replaces(), vec![old.id().clone()]);
    assert_eq!(old.replaced_by().as_ref(), Some(new.id()));
}

#[tokio::test]
async fn superseded_session_is_not_recycled() {
    let h = shop();
    h.commands.fail("./run.sh");
    let failed = h.build("shop", "main").await;
    wait_for_status(&failed, SessionStatus::StartFailed).await;
    failed.set_replaced_by(SessionId::new());

    assert!(matches!(
        h.engine.build(BuildRequest::retry(&failed)).await,
        BuildResult::Failed(EngineError::Session(pv_core::SessionError::Superseded(_)))
    ));
}

fn warming(max_retries: u32) -> pv_core::ApplicationConfig {
    let mut config = app_config("shop");
    config.warmups = Some(WarmupsConfig {
        max_retries,
        timeout: std::time::Duration::from_millis(100),
        retry_interval: std::time::Duration::from_millis(30),
        urls: vec![pv_core::WarmupConfig::new("/warm")],
    });
    config
}

#[tokio::test]
async fn warm_up_retries_until_expected_status() {
    let h = Harness::new(vec![warming(3)]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    h.http.push(Ok(503));
    let started = tokio::time::Instant::now();
    let session = h.build("shop", "main").await;
    wait_for_status(&session, SessionStatus::Started).await;

    let requests = h.http.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, format!("http://127.0.0.1:{}/warm", session.port()));
    assert!(started.elapsed() >= std::time::Duration::from_millis(30));
    assert!(session.logs().iter().any(|l| l.message.contains("warm-up /warm failed (1/3)")));

    let names = event_names(&session);
    let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(pos("commands_execution_started") < pos("warmup_started"));
    assert!(pos("warmup_started") < pos("warmup_succeeded"));
    assert!(pos("warmup_succeeded") < pos("session_available"));
}

#[tokio::test]
async fn exhausted_warm_up_fails_the_build_and_retries() {
    let mut config = warming(2);
    config.startup.retries = 1;
    let h = Harness::new(vec![config]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    h.http.set_status(500);
    let app = h.engine.application("shop").unwrap();
    let session = h.build("shop", "main").await;

    wait_for_app_event(&app, "session_build_failed").await;
    assert_eq!(session.status(), SessionStatus::StartFailed);
    assert_eq!(session.kill_reason(), KillReason::BuildFailed);
    assert_eq!(session.startup_retries(), 1);
    // two attempts per build, two builds
    assert_eq!(h.http.requests().len(), 4);
    assert!(!event_names(&session).contains(&"warmup_succeeded"));
}

#[tokio::test]
async fn zero_warm_up_retries_still_tries_once() {
    let h = Harness::new(vec![warming(0)]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    h.http.set_status(500);
    let app = h.engine.application("shop").unwrap();
    let session = h.build("shop", "main").await;

    wait_for_app_event(&app, "session_build_failed").await;
    assert_eq!(h.http.requests().len(), 1);
    assert_eq!(session.kill_reason(), KillReason::BuildFailed);
}

#[tokio::test]
async fn health_check_already_registered_fails_the_build() {
    let mut config = app_config("shop");
    config.healthcheck = Some(pv_core::test_support::fast_healthcheck());
    let h = Harness::new(vec![config]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    h.commands.delay("./run.sh", std::time::Duration::from_millis(200));
    let session = h.build("shop", "main").await;
    h.engine.runtime().healthchecks.lock().insert(session.id().clone());

    wait_for_status(&session, SessionStatus::StartFailed).await;
    assert_eq!(session.kill_reason(), KillReason::BuildFailed);
    assert!(session.logs().iter().any(|l| l.message.contains("health check already running")));
    assert!(h.http.requests().is_empty());
}
