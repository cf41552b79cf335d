// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named cancellation contexts per session.
//!
//! A build registers its token under [`BUILD`]; destroying the session
//! cancels it. Each registration gets a generation so a finished attempt
//! never clears the token of the attempt that recycled its session.

use parking_lot::Mutex;
use pv_core::SessionId;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

pub const BUILD: &str = "build";

#[derive(Default)]
pub struct ContextRegistry {
    inner: Mutex<ContextState>,
}

#[derive(Default)]
struct ContextState {
    next_generation: u64,
    tokens: HashMap<(SessionId, &'static str), (u64, CancellationToken)>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token`, replacing any earlier one under the same name.
    pub fn register(&self, id: &SessionId, name: &'static str, token: CancellationToken) -> u64 {
        let mut state = self.inner.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.tokens.insert((id.clone(), name), (generation, token));
        generation
    }

    /// Cancel and forget the context. Returns whether one was registered.
    pub fn cancel(&self, id: &SessionId, name: &'static str) -> bool {
        let removed = self.inner.lock().tokens.remove(&(id.clone(), name));
        match removed {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget the context if it is still the given generation.
    pub fn clear(&self, id: &SessionId, name: &'static str, generation: u64) {
        let mut state = self.inner.lock();
        let key = (id.clone(), name);
        if state.tokens.get(&key).is_some_and(|(g, _)| *g == generation) {
            state.tokens.remove(&key);
        }
    }

    pub fn contains(&self, id: &SessionId, name: &'static str) -> bool {
        self.inner.lock().tokens.contains_key(&(id.clone(), name))
    }

    /// Cancel every registered context.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.inner.lock().tokens.drain().collect();
        for (_, (_, token)) in drained {
            token.cancel();
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
