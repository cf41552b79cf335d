// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn tcp_retriever_returns_bindable_port() {
    let port = TcpPortRetriever.get_free_port(&[]).await.unwrap();
    assert_ne!(port, 0);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await;
    assert!(listener.is_ok());
}

#[tokio::test]
async fn fake_retriever_skips_excluded_ports() {
    let ports = FakePortRetriever::new();
    assert_eq!(ports.get_free_port(&[]).await.unwrap(), 4000);
    assert_eq!(ports.get_free_port(&[4001, 4002]).await.unwrap(), 4003);
    assert_eq!(ports.clone().get_free_port(&[]).await.unwrap(), 4004);
}
