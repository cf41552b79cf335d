// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{Harness, C1};
use pv_adapters::GitCall;
use pv_core::test_support::app_config;
use pv_core::{NewSession, Session, SessionId};
use std::collections::HashMap;
use std::sync::Arc;

fn session_in(h: &Harness, alias: &str) -> Arc<Session> {
    Arc::new(Session::new(NewSession {
        id: SessionId::new(),
        application: "shop".into(),
        alias: alias.into(),
        checkout: "main".into(),
        commit: C1.into(),
        port: 4000,
        folder: h.engine.config().session_folder("shop", alias),
        variables: HashMap::new(),
        watched: false,
        replaces: Vec::new(),
        created_at_ms: 0,
    }))
}

#[test]
fn copy_tree_skips_git_and_keeps_structure() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(src.path().join(".git/objects")).unwrap();
    std::fs::write(src.path().join(".git/HEAD"), "ref").unwrap();
    std::fs::create_dir_all(src.path().join("app/models")).unwrap();
    std::fs::write(src.path().join("app/models/user.rb"), "class User; end").unwrap();
    std::fs::write(src.path().join("Gemfile"), "source 'x'").unwrap();
    let out = dst.path().join("session");

    copy_tree(src.path(), &out).unwrap();

    assert_eq!(std::fs::read_to_string(out.join("Gemfile")).unwrap(), "source 'x'");
    assert!(out.join("app/models/user.rb").is_file());
    assert!(!out.join(".git").exists());
}

#[cfg(unix)]
#[test]
fn copy_tree_recreates_symlinks() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("real.txt"), "data").unwrap();
    std::os::unix::fs::symlink("real.txt", src.path().join("link.txt")).unwrap();
    let out = dst.path().join("session");

    copy_tree(src.path(), &out).unwrap();

    let link = out.join("link.txt");
    assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(std::fs::read_to_string(link).unwrap(), "data");
}

#[tokio::test]
async fn copy_strategy_resets_base_then_copies() {
    let h = Harness::new(vec![app_config("shop")]);
    let session = session_in(&h, "main-aaaaa");
    let out = h.engine.runtime().handle_filesystem(FilesystemRequest { session: Arc::clone(&session) }).await.unwrap();

    assert_eq!(out, session.folder());
    assert!(out.join("README.md").is_file());
    assert!(!out.join(".git").exists());
    assert_eq!(
        h.git.calls(),
        vec![GitCall::HardReset { repo: h.engine.config().base_folder("shop"), commit: C1.to_string() }]
    );
}

#[tokio::test]
async fn stale_folder_is_replaced() {
    let h = Harness::new(vec![app_config("shop")]);
    let session = session_in(&h, "main-bbbbb");
    std::fs::create_dir_all(session.folder()).unwrap();
    std::fs::write(session.folder().join("leftover.log"), "old").unwrap();

    h.engine.runtime().handle_filesystem(FilesystemRequest { session: Arc::clone(&session) }).await.unwrap();

    assert!(!session.folder().join("leftover.log").exists());
    assert!(session.folder().join("README.md").exists());
}

#[tokio::test]
async fn clone_strategy_clones_fetches_and_resets() {
    let h = Harness::with_config(vec![app_config("shop")], |c| c.filesystem = FilesystemStrategy::Clone);
    let session = session_in(&h, "main-ccccc");
    let out = h.engine.runtime().handle_filesystem(FilesystemRequest { session: Arc::clone(&session) }).await.unwrap();

    let base = h.engine.config().base_folder("shop");
    assert_eq!(
        h.git.calls(),
        vec![
            GitCall::Clone {
                base: Some(base),
                out: out.clone(),
                remote: "https://git.example.com/shop.git".to_string()
            },
            GitCall::FetchAll { repo: out.clone() },
            GitCall::HardReset { repo: out, commit: C1.to_string() },
        ]
    );
}

#[tokio::test]
async fn git_failure_is_reported() {
    let h = Harness::new(vec![app_config("shop")]);
    h.git.fail_reset(Some("fatal: bad object"));
    let session = session_in(&h, "main-ddddd");

    let err = h.engine.runtime().handle_filesystem(FilesystemRequest { session }).await.unwrap_err();
    assert!(matches!(err, FilesystemError::Git(_)));
    assert!(err.to_string().contains("bad object"));
}
