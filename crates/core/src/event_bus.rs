// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replayable publish/subscribe log owned by a session or an application.
//!
//! Every published event is appended to the history. A subscriber first
//! receives the full history and then live events, so attaching late still
//! yields the complete timeline. Publishing never waits on a subscriber:
//! each one gets its own unbounded channel.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiving end of a subscription. Ends once the bus is closed.
pub type Subscription<E> = mpsc::UnboundedReceiver<E>;

struct BusState<E> {
    history: Vec<E>,
    subscribers: Vec<mpsc::UnboundedSender<E>>,
    closed: bool,
}

pub struct EventBus<E> {
    state: Arc<Mutex<BusState<E>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                history: Vec::new(),
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventBus")
            .field("history", &state.history.len())
            .field("subscribers", &state.subscribers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and fan it out. Dropped subscribers are pruned.
    /// Publishing on a closed bus is a no-op.
    pub fn publish(&self, event: E) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        state.history.push(event);
    }

    /// Subscribe: the receiver yields the history first, then live events.
    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        for event in &state.history {
            // Receiver is held locally, send cannot fail
            let _ = tx.send(event.clone());
        }
        if !state.closed {
            state.subscribers.push(tx);
        }
        rx
    }

    pub fn history(&self) -> Vec<E> {
        self.state.lock().history.clone()
    }

    /// Close the bus: existing subscriptions end after draining.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
