// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application: a configured repository plus the ref state last fetched for it

use crate::config::ApplicationConfig;
use crate::event::ApplicationEvent;
use crate::event_bus::{EventBus, Subscription};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum length of an abbreviated commit id
pub const MIN_ABBREV_LEN: usize = 7;

/// Branches and tags pointing at one commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefsAtCommit {
    pub branches: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub author: String,
    /// Committer time, seconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
}

/// Snapshot of the remote's refs after a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefState {
    /// Ref name (branch or tag) to commit hash; branches win on a name clash
    pub objects_to_hash: HashMap<String, String>,
    pub hash_to_objects: HashMap<String, RefsAtCommit>,
    pub branches: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub commits: HashMap<String, Commit>,
}

impl RefState {
    /// Build the derived lookup maps from branch and tag tips.
    pub fn from_refs(
        branches: HashMap<String, String>,
        tags: HashMap<String, String>,
        commits: Vec<Commit>,
    ) -> Self {
        let mut objects_to_hash = HashMap::new();
        let mut hash_to_objects: HashMap<String, RefsAtCommit> = HashMap::new();

        for (tag, hash) in &tags {
            objects_to_hash.insert(tag.clone(), hash.clone());
            hash_to_objects.entry(hash.clone()).or_default().tags.push(tag.clone());
        }
        for (branch, hash) in &branches {
            objects_to_hash.insert(branch.clone(), hash.clone());
            hash_to_objects.entry(hash.clone()).or_default().branches.push(branch.clone());
        }
        for refs in hash_to_objects.values_mut() {
            refs.branches.sort();
            refs.tags.sort();
        }

        let commits = commits.into_iter().map(|c| (c.hash.clone(), c)).collect();
        Self { objects_to_hash, hash_to_objects, branches, tags, commits }
    }

    pub fn is_ref(&self, name: &str) -> bool {
        self.objects_to_hash.contains_key(name)
    }

    /// Resolve a branch, tag, full commit id or unambiguous abbreviation.
    pub fn resolve(&self, checkout: &str) -> Option<String> {
        if let Some(hash) = self.objects_to_hash.get(checkout) {
            return Some(hash.clone());
        }
        if checkout.len() < MIN_ABBREV_LEN || !checkout.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let needle = checkout.to_ascii_lowercase();
        if self.commits.contains_key(&needle) || self.hash_to_objects.contains_key(&needle) {
            return Some(needle);
        }
        let mut matches = self
            .commits
            .keys()
            .chain(self.hash_to_objects.keys())
            .filter(|h| h.starts_with(&needle));
        let first = matches.next()?;
        if matches.any(|other| other != first) {
            return None;
        }
        Some(first.clone())
    }

    /// A ref name pointing at `commit`, branches before tags.
    pub fn ref_for_commit(&self, commit: &str) -> Option<String> {
        let refs = self.hash_to_objects.get(commit)?;
        refs.branches.first().or_else(|| refs.tags.first()).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CloneFailed,
    FetchFailed,
}

crate::simple_display! {
    NotificationKind {
        CloneFailed => "clone_failed",
        FetchFailed => "fetch_failed",
    }
}

/// A persistent problem shown to operators until the next success clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub at_ms: u64,
}

#[derive(Debug, Default)]
struct ApplicationState {
    refs: RefState,
    /// Last commit seen per watched ref, recorded by watching fetches only
    observed: HashMap<String, String>,
    notifications: Vec<Notification>,
}

#[derive(Debug)]
pub struct Application {
    config: ApplicationConfig,
    events: EventBus<ApplicationEvent>,
    state: RwLock<ApplicationState>,
}

impl Application {
    pub fn new(config: ApplicationConfig) -> Self {
        Self { config, events: EventBus::new(), state: RwLock::new(ApplicationState::default()) }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus<ApplicationEvent> {
        &self.events
    }

    pub fn subscribe(&self) -> Subscription<ApplicationEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: ApplicationEvent) {
        self.events.publish(event);
    }

    pub fn refs(&self) -> RefState {
        self.state.read().refs.clone()
    }

    pub fn set_refs(&self, refs: RefState) {
        self.state.write().refs = refs;
    }

    pub fn resolve(&self, checkout: &str) -> Option<String> {
        self.state.read().refs.resolve(checkout)
    }

    pub fn ref_for_commit(&self, commit: &str) -> Option<String> {
        self.state.read().refs.ref_for_commit(commit)
    }

    pub fn is_ref(&self, name: &str) -> bool {
        self.state.read().refs.is_ref(name)
    }

    /// Record `commit` as the latest observation of `name`.
    ///
    /// Returns true when it differs from the previous observation
    /// (a first observation counts as a change).
    pub fn observe(&self, name: &str, commit: &str) -> bool {
        let mut state = self.state.write();
        let prev = state.observed.insert(name.to_string(), commit.to_string());
        prev.as_deref() != Some(commit)
    }

    pub fn observed(&self, name: &str) -> Option<String> {
        self.state.read().observed.get(name).cloned()
    }

    /// Add or replace the notification of `kind`.
    pub fn notify(&self, kind: NotificationKind, message: impl Into<String>, at_ms: u64) {
        let mut state = self.state.write();
        state.notifications.retain(|n| n.kind != kind);
        state.notifications.push(Notification { kind, message: message.into(), at_ms });
    }

    pub fn clear_notification(&self, kind: NotificationKind) {
        self.state.write().notifications.retain(|n| n.kind != kind);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.read().notifications.clone()
    }
}

#[cfg(test)]
#[path = "application_tests.rs"]
mod tests;
