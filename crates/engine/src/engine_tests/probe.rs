// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::mediator::BuildResult;
use crate::runtime::EngineDeps;
use crate::test_helpers::{wait_for_status, C1};
use pv_adapters::{
    FakeCommandRunner, FakeGitClient, FakeRepositoryFetcher, ReqwestHttpProbe, TcpPortRetriever,
};
use pv_core::test_support::{app_config, fast_healthcheck, ref_state};
use pv_core::{FakeClock, SessionStatus};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Answer every connection with `200 OK`, forwarding the raw request head.
fn serve(listener: TcpListener, seen: mpsc::UnboundedSender<String>) {
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap_or(0);
            let _ = seen.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        }
    });
}

#[tokio::test]
async fn real_probe_reaches_session_port() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::new(dir.path().join("storage"));
    let base = config.base_folder("shop");
    std::fs::create_dir_all(base.join(".git")).unwrap();
    std::fs::write(base.join("index.html"), "ok").unwrap();

    let mut app = app_config("shop");
    let mut healthcheck = fast_healthcheck().max_retries(40);
    healthcheck.path = "/health".to_string();
    healthcheck.headers.insert("x-preview".to_string(), "${alias}".to_string());
    app.healthcheck = Some(healthcheck);

    let deps = EngineDeps {
        git: Arc::new(FakeGitClient::new()),
        fetcher: Arc::new(FakeRepositoryFetcher::new()),
        commands: Arc::new(FakeCommandRunner::new()),
        ports: Arc::new(TcpPortRetriever),
        http: Arc::new(ReqwestHttpProbe::new().unwrap()),
    };
    let engine = Engine::start(config, deps, FakeClock::new(), vec![app]).unwrap();
    engine.application("shop").unwrap().set_refs(ref_state(&[("main", C1)], &[]));

    let session = match engine.build_session("shop", "main").await {
        BuildResult::Accepted(session) => session,
        other => panic!("expected accepted build, got {other:?}"),
    };
    let listener = TcpListener::bind(("127.0.0.1", session.port())).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    serve(listener, tx);

    wait_for_status(&session, SessionStatus::Started).await;
    let head = rx.recv().await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /health http/1.1"));
    assert!(head.contains(&format!("x-preview: {}", session.alias().to_ascii_lowercase())));
    engine.shutdown(std::time::Duration::from_secs(1)).await;
}
