// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn call_returns_worker_reply() {
    let (queue, mut rx) = Queue::<u32, u32>::new("double");
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let (n, responder) = envelope.into_parts();
            responder.send(n * 2);
        }
    });

    assert_eq!(queue.call(21).await.unwrap(), 42);
    assert_eq!(queue.call(5).await.unwrap(), 10);
}

#[tokio::test]
async fn send_does_not_wait_for_reply() {
    let (queue, mut rx) = Queue::<&'static str, ()>::new("fire");
    queue.send("hello").await.unwrap();

    let (request, responder) = rx.recv().await.unwrap().into_parts();
    assert_eq!(request, "hello");
    // Nobody listens; replying must not panic
    responder.send(());
}

#[tokio::test]
async fn closed_queue_is_an_error() {
    let (queue, rx) = Queue::<u32, u32>::new("gone");
    drop(rx);
    assert_eq!(queue.call(1).await, Err(EngineError::QueueClosed("gone")));
    assert_eq!(queue.send(1).await, Err(EngineError::QueueClosed("gone")));
}

#[tokio::test]
async fn dropped_reply_is_an_error() {
    let (queue, mut rx) = Queue::<u32, u32>::new("dropper");
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            drop(envelope);
        }
    });
    assert_eq!(queue.call(1).await, Err(EngineError::QueueClosed("dropper")));
}

#[tokio::test]
async fn single_slot_blocks_second_sender_until_consumed() {
    let (queue, mut rx) = Queue::<u32, ()>::new("slot");
    queue.send(1).await.unwrap();

    let blocked = tokio::time::timeout(std::time::Duration::from_millis(50), queue.send(2)).await;
    assert!(blocked.is_err());

    assert_eq!(rx.recv().await.unwrap().request, 1);
    queue.send(3).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().request, 3);
}

#[test]
fn mediator_names_every_queue() {
    let (mediator, _rx) = Mediator::new();
    let names = [
        mediator.build_session.name(),
        mediator.destroy_session.name(),
        mediator.session_filesystem.name(),
        mediator.clean_session.name(),
        mediator.start_session.name(),
        mediator.healthcheck_session.name(),
        mediator.application_init.name(),
        mediator.application_fetch.name(),
    ];
    let unique: std::collections::HashSet<_> = names.iter().collect();
    assert_eq!(unique.len(), 8);
}

#[test]
fn retry_request_targets_previous_session() {
    let session = pv_core::test_support::new_session("shop", "main", "abc1234");
    let req = BuildRequest::retry(&session);
    assert_eq!(req.application, "shop");
    assert_eq!(req.checkout, "main");
    assert_eq!(req.previous.as_ref(), Some(session.id()));
    assert!(req.replaces.is_empty());
    assert!(!req.supersede);
}
