// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session membership and lookups.
//!
//! The store lock guards only membership; each session guards its own fields.
//! Queries that filter on status read each session's lock briefly while the
//! membership read lock is held, never the other way round.

use crate::StoreError;
use parking_lot::RwLock;
use pv_core::{Session, SessionId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct SessionIndex {
    by_id: HashMap<SessionId, Arc<Session>>,
    /// Insertion order, oldest first
    order: Vec<SessionId>,
}

impl SessionIndex {
    fn ordered(&self) -> impl Iterator<Item = &Arc<Session>> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<SessionIndex>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, session: Arc<Session>) -> Result<(), StoreError> {
        let mut index = self.inner.write();
        let id = session.id().clone();
        if index.by_id.contains_key(&id) {
            return Err(StoreError::DuplicateSession(id));
        }
        index.order.push(id.clone());
        index.by_id.insert(id, session);
        Ok(())
    }

    /// Replace the stored entry for an existing session.
    pub fn update(&self, session: Arc<Session>) -> Result<(), StoreError> {
        let mut index = self.inner.write();
        match index.by_id.get_mut(session.id()) {
            Some(slot) => {
                *slot = session;
                Ok(())
            }
            None => Err(StoreError::SessionNotFound(session.id().clone())),
        }
    }

    pub fn get_by_uuid(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Look up by full id or unique prefix (like git commit hashes).
    pub fn find(&self, id_or_prefix: &str) -> Result<Arc<Session>, StoreError> {
        let index = self.inner.read();
        if let Some(session) = index.by_id.get(id_or_prefix) {
            return Ok(Arc::clone(session));
        }
        let mut matches = index.by_id.iter().filter(|(id, _)| id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some((_, session)), None) => Ok(Arc::clone(session)),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousPrefix(id_or_prefix.to_string())),
            (None, _) => Err(StoreError::SessionNotFound(SessionId::from_string(id_or_prefix))),
        }
    }

    pub fn delete(&self, id: &SessionId) -> Option<Arc<Session>> {
        let mut index = self.inner.write();
        let removed = index.by_id.remove(id)?;
        index.order.retain(|o| o != id);
        Some(removed)
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.inner.read().ordered().cloned().collect()
    }

    pub fn by_application(&self, app: &str) -> Vec<Arc<Session>> {
        self.filtered(|s| s.application() == app)
    }

    pub fn get_all_alive_sessions(&self) -> Vec<Arc<Session>> {
        self.filtered(|s| s.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.inner.read().ordered().filter(|s| s.is_alive()).count()
    }

    pub fn alive_by_application_count(&self, app: &str) -> usize {
        self.inner.read().ordered().filter(|s| s.application() == app && s.is_alive()).count()
    }

    pub fn get_alive_application_session_by_commit_id(
        &self,
        app: &str,
        commit: &str,
    ) -> Option<Arc<Session>> {
        self.inner
            .read()
            .ordered()
            .find(|s| s.application() == app && s.is_alive() && s.commit() == commit)
            .cloned()
    }

    /// Alive sessions of `app` built from `checkout`, oldest first
    pub fn alive_by_application_checkout(&self, app: &str, checkout: &str) -> Vec<Arc<Session>> {
        self.filtered(|s| s.application() == app && s.is_alive() && s.checkout() == checkout)
    }

    /// Most recently created session of `app` built from `checkout`, alive or not
    pub fn latest_by_application_checkout(&self, app: &str, checkout: &str) -> Option<Arc<Session>> {
        self.inner
            .read()
            .ordered()
            .filter(|s| s.application() == app && s.checkout() == checkout)
            .last()
            .cloned()
    }

    /// Ports held by alive sessions
    pub fn used_ports(&self) -> Vec<u16> {
        self.inner.read().ordered().filter(|s| s.is_alive()).map(|s| s.port()).collect()
    }

    fn filtered(&self, pred: impl Fn(&Session) -> bool) -> Vec<Arc<Session>> {
        self.inner.read().ordered().filter(|s| pred(s)).cloned().collect()
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
