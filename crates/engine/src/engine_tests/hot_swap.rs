// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::checked;
use crate::test_helpers::{
    app_event_names, event_names, settle, wait_for_app_event, wait_for_event, wait_for_events, wait_for_status,
    Harness, C1, C2,
};
use pv_core::test_support::{app_config, ref_state};
use pv_core::{CommandConfig, KillReason, SessionStatus};
use std::time::Duration;

#[tokio::test]
async fn hot_swap_announces_in_order_and_retires_the_old_session() {
    let h = Harness::new(vec![checked("shop")]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let app = h.engine.application("shop").unwrap();
    let old = h.build("shop", "main").await;
    wait_for_status(&old, SessionStatus::Started).await;
    let before = app.events().history().len();

    h.fetcher.set_refs(ref_state(&[("main", C2)], &[]));
    h.engine.fetch("shop", true).await.unwrap();
    wait_for_status(&old, SessionStatus::Stopped).await;

    let history = app.events().history();
    assert_eq!(
        app_event_names(&history[before..]),
        ["fetch_started", "hot_swap", "session_build", "fetch_completed", "session_build_succeeded"]
    );
    let new = h.engine.session(&old.replaced_by().unwrap()).unwrap();
    assert_eq!(new.status(), SessionStatus::Started);
    assert_eq!(old.kill_reason(), KillReason::Replaced);
    let names = event_names(&old);
    assert_eq!(&names[names.len() - 3..], ["session_replaced", "session_stopping", "session_stopped"]);
}

#[tokio::test]
async fn applications_do_not_affect_each_other() {
    let mut blog = app_config("blog");
    blog.start = vec![CommandConfig::new("./blog.sh")];
    let h = Harness::new(vec![app_config("shop"), blog]);
    h.commands.fail("./blog.sh");
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    h.set_refs("blog", ref_state(&[("main", C1)], &[]));

    let shop = h.build("shop", "main").await;
    let blog = h.build("blog", "main").await;

    wait_for_status(&shop, SessionStatus::Started).await;
    wait_for_app_event(&h.engine.application("blog").unwrap(), "session_build_failed").await;
    assert_eq!(blog.status(), SessionStatus::StartFailed);
    assert_ne!(shop.port(), blog.port());
    assert_ne!(shop.folder(), blog.folder());

    let shop_events = app_event_names(&h.engine.application("shop").unwrap().events().history());
    assert_eq!(shop_events, ["session_build", "session_build_succeeded"]);
}

#[tokio::test]
async fn hot_swap_in_one_application_leaves_the_other_running() {
    let watching = |name: &str| {
        let mut config = checked(name);
        config.watch = vec!["main".to_string()];
        config
    };
    let h = Harness::new(vec![watching("shop"), watching("blog")]);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    h.set_refs("blog", ref_state(&[("main", C1)], &[]));
    let shop = h.build("shop", "main").await;
    let blog = h.build("blog", "main").await;
    wait_for_status(&shop, SessionStatus::Started).await;
    wait_for_status(&blog, SessionStatus::Started).await;
    let blog_app = h.engine.application("blog").unwrap();
    let blog_events = blog_app.events().history().len();

    h.fetcher.set_refs(ref_state(&[("main", C2)], &[]));
    let outcome = h.engine.fetch("shop", true).await.unwrap();
    assert_eq!(outcome.hot_swaps, vec!["main".to_string()]);
    wait_for_status(&shop, SessionStatus::Stopped).await;
    settle().await;

    assert_eq!(blog.status(), SessionStatus::Started);
    assert_eq!(blog.kill_reason(), KillReason::None);
    assert!(blog.replaced_by().is_none());
    assert_eq!(h.engine.sessions_of("blog").len(), 1);
    assert_eq!(blog_app.events().history().len(), blog_events);
    assert_eq!(blog_app.resolve("main").as_deref(), Some(C1));
}

#[tokio::test]
async fn hot_swap_stops_retries_of_the_failing_commit() {
    let mut config = app_config("shop");
    config.start = vec![CommandConfig::new("./run.sh ${commit}")];
    config.startup.retries = 20;
    config.startup.timeout = Duration::from_millis(100);
    config.watch = vec!["main".to_string()];
    let h = Harness::new(vec![config]);
    h.commands.hang(C1);
    h.set_refs("shop", ref_state(&[("main", C1)], &[]));
    let app = h.engine.application("shop").unwrap();

    let old = h.build("shop", "main").await;
    wait_for_events(&old, "build_started", 2).await;

    h.fetcher.set_refs(ref_state(&[("main", C2)], &[]));
    h.engine.fetch("shop", true).await.unwrap();
    wait_for_event(&old, "session_replaced").await;
    wait_for_status(&old, SessionStatus::StartFailed).await;

    let new = h.engine.session(&old.replaced_by().unwrap()).unwrap();
    assert_eq!(new.commit(), C2);
    wait_for_status(&new, SessionStatus::Started).await;

    let attempts = event_names(&old).iter().filter(|n| **n == "build_started").count();
    settle().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(event_names(&old).iter().filter(|n| **n == "build_started").count(), attempts);
    assert_eq!(old.status(), SessionStatus::StartFailed);
    assert!(!app_event_names(&app.events().history()).contains(&"session_build_failed"));
}
