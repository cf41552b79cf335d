// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::EngineError;
use crate::test_helpers::{app_event_names, settle, wait_for_app_event, Harness};
use pv_adapters::GitCall;
use pv_core::test_support::app_config;
use pv_core::NotificationKind;

fn without_base(h: &Harness, app: &str) -> std::path::PathBuf {
    let base = h.engine.config().base_folder(app);
    std::fs::remove_dir_all(&base).unwrap();
    base
}

#[tokio::test]
async fn missing_base_is_cloned_then_fetched() {
    let h = Harness::new(vec![app_config("shop")]);
    let base = without_base(&h, "shop");

    h.engine.init_application("shop").await.unwrap();

    assert_eq!(
        h.git.calls(),
        vec![GitCall::Clone {
            base: None,
            out: base.clone(),
            remote: "https://git.example.com/shop.git".to_string(),
        }]
    );
    assert!(h.engine.config().sessions_folder("shop").is_dir());

    let app = h.engine.application("shop").unwrap();
    wait_for_app_event(&app, "fetch_completed").await;
    assert_eq!(
        app_event_names(&app.events().history())[..4],
        ["init_started", "init_completed", "fetch_started", "fetch_completed"]
    );
    assert_eq!(h.fetcher.calls(), vec![base]);
}

#[tokio::test]
async fn existing_base_is_reused() {
    let h = Harness::new(vec![app_config("shop")]);

    h.engine.init_application("shop").await.unwrap();

    assert!(h.git.calls().is_empty());
    let app = h.engine.application("shop").unwrap();
    wait_for_app_event(&app, "fetch_completed").await;
}

#[tokio::test]
async fn clone_failure_is_reported_until_a_later_success() {
    let h = Harness::new(vec![app_config("shop")]);
    without_base(&h, "shop");
    h.git.fail_clone(Some("fatal: Authentication failed for 'https://git.example.com/shop.git'"));

    let err = h.engine.init_application("shop").await.unwrap_err();
    assert!(matches!(err, EngineError::Init { ref app, .. } if app == "shop"));

    let app = h.engine.application("shop").unwrap();
    let notifications = app.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::CloneFailed);
    assert_eq!(app_event_names(&app.events().history()), ["init_started", "init_failed"]);
    settle().await;
    assert!(h.fetcher.calls().is_empty());

    h.git.fail_clone(None);
    h.engine.init_application("shop").await.unwrap();
    assert!(app.notifications().is_empty());
}

#[tokio::test]
async fn one_failing_application_does_not_block_others() {
    let h = Harness::new(vec![app_config("shop"), app_config("blog")]);
    without_base(&h, "shop");
    h.git.fail_clone(Some("fatal: repository not found"));

    let results = h.engine.init_applications().await;

    let outcome: Vec<(&str, bool)> = results.iter().map(|(name, r)| (name.as_str(), r.is_ok())).collect();
    assert!(outcome.contains(&("shop", false)));
    assert!(outcome.contains(&("blog", true)));
}

#[tokio::test]
async fn unknown_application_is_rejected() {
    let h = Harness::new(vec![app_config("shop")]);
    assert_eq!(
        h.engine.init_application("nope").await,
        Err(EngineError::UnknownApplication("nope".to_string()))
    );
}
