// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for event names, serialization tags and `log_summary()`.

use crate::event::*;
use crate::id::SessionId;

#[test]
fn session_event_names_match_serde_tags() {
    let events = vec![
        SessionEvent::BuildStarted { attempt: 1 },
        SessionEvent::PreparingFolders,
        SessionEvent::CommandsExecutionStarted,
        SessionEvent::WarmupStarted,
        SessionEvent::WarmupSucceeded,
        SessionEvent::HealthcheckStarted,
        SessionEvent::HealthcheckSucceeded,
        SessionEvent::HealthcheckFailed { failures: 2, error: "503".into() },
        SessionEvent::SessionAvailable,
        SessionEvent::SessionDegraded,
        SessionEvent::SessionRecovered,
        SessionEvent::BuildFailed,
        SessionEvent::SessionStopping,
        SessionEvent::SessionStopped,
        SessionEvent::StopFailed,
        SessionEvent::SessionReplaced { by: SessionId::from_string("abc") },
    ];
    for event in events {
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name(), "{event:?}");
        let back: SessionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

#[test]
fn application_event_names_match_serde_tags() {
    let sid = SessionId::from_string("0123456789abcdef");
    let events = vec![
        ApplicationEvent::InitStarted,
        ApplicationEvent::InitCompleted,
        ApplicationEvent::InitFailed { error: "boom".into() },
        ApplicationEvent::FetchStarted,
        ApplicationEvent::FetchCompleted,
        ApplicationEvent::FetchFailed { error: "auth".into() },
        ApplicationEvent::HotSwap {
            checkout: "main".into(),
            commit: "deadbeef".into(),
            replaces: vec![sid.clone()],
        },
        ApplicationEvent::AutoStart { checkout: "main".into(), commit: "deadbeef".into() },
        ApplicationEvent::SessionBuild { session: sid.clone(), checkout: "main".into() },
        ApplicationEvent::SessionBuildSucceeded { session: sid.clone() },
        ApplicationEvent::SessionBuildFailed { session: sid },
    ];
    for event in events {
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name(), "{event:?}");
    }
}

#[test]
fn log_summary_includes_key_fields() {
    let cases = vec![
        (SessionEvent::BuildStarted { attempt: 3 }.log_summary(), "build_started attempt=3"),
        (SessionEvent::SessionStopped.log_summary(), "session_stopped"),
        (
            ApplicationEvent::AutoStart { checkout: "main".into(), commit: "0123456789".into() }
                .log_summary(),
            "auto_start checkout=main commit=0123456",
        ),
        (
            ApplicationEvent::SessionBuild {
                session: SessionId::from_string("0123456789abcdef"),
                checkout: "v1.0".into(),
            }
            .log_summary(),
            "session_build session=01234567 checkout=v1.0",
        ),
    ];
    for (got, want) in cases {
        assert_eq!(got, want);
    }
}

#[test]
fn hot_swap_omits_empty_replaces() {
    let event =
        ApplicationEvent::HotSwap { checkout: "main".into(), commit: "c".into(), replaces: vec![] };
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("replaces").is_none());
}
