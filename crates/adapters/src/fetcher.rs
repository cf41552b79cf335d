// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refreshes the ref state of a base clone from its remote

use crate::subprocess::{run_with_timeout, stderr_of, GIT_NETWORK_TIMEOUT, GIT_TIMEOUT};
use async_trait::async_trait;
use pv_core::{Commit, RefState};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// Commits listed per fetch, newest first
const COMMIT_LIMIT: usize = 500;

/// A problem met while fetching. Critical errors (bad credentials, missing
/// repository, unreadable refs) leave the previous ref state in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
    pub critical: bool,
}

impl FetchError {
    pub fn critical(message: impl Into<String>) -> Self {
        Self { message: message.into(), critical: true }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), critical: false }
    }
}

#[async_trait]
pub trait RepositoryFetcher: Send + Sync + 'static {
    async fn fetch(&self, base: &Path) -> (RefState, Vec<FetchError>);
}

/// Fetcher backed by the `git` CLI
#[derive(Clone, Copy, Debug, Default)]
pub struct GitRepositoryFetcher;

impl GitRepositoryFetcher {
    async fn git(&self, base: &Path, args: &[&str], timeout: std::time::Duration) -> Result<String, FetchError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(base)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE");
        let desc = format!("git {}", args.first().copied().unwrap_or_default());
        let output = run_with_timeout(cmd, timeout, &desc)
            .await
            .map_err(|e| FetchError::transient(e.to_string()))?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            return Err(FetchError {
                critical: crate::git::is_auth_failure(&stderr),
                message: format!("{desc}: {stderr}"),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RepositoryFetcher for GitRepositoryFetcher {
    async fn fetch(&self, base: &Path) -> (RefState, Vec<FetchError>) {
        let mut errors = Vec::new();

        if let Err(e) = self.git(base, &["fetch", "--all", "--prune", "--tags", "--force"], GIT_NETWORK_TIMEOUT).await {
            errors.push(e);
        }

        let refs = match self
            .git(
                base,
                &[
                    "for-each-ref",
                    "--format=%(refname)%09%(objectname)%09%(*objectname)",
                    "refs/remotes/origin",
                    "refs/tags",
                ],
                GIT_TIMEOUT,
            )
            .await
        {
            Ok(out) => out,
            Err(mut e) => {
                e.critical = true;
                errors.push(e);
                return (RefState::default(), errors);
            }
        };
        let (branches, tags) = parse_refs(&refs);

        let limit = format!("--max-count={COMMIT_LIMIT}");
        let commits = match self
            .git(base, &["log", "--all", &limit, "--format=%H%x09%ct%x09%an%x09%s"], GIT_TIMEOUT)
            .await
        {
            Ok(out) => parse_commits(&out),
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        };

        (RefState::from_refs(branches, tags, commits), errors)
    }
}

/// Parse `for-each-ref` lines into branch and tag tips.
///
/// Annotated tags carry the peeled commit in the third column.
pub(crate) fn parse_refs(out: &str) -> (HashMap<String, String>, HashMap<String, String>) {
    let mut branches = HashMap::new();
    let mut tags = HashMap::new();
    for line in out.lines() {
        let mut cols = line.split('\t');
        let (Some(name), Some(object)) = (cols.next(), cols.next()) else {
            continue;
        };
        let peeled = cols.next().filter(|p| !p.is_empty());
        if let Some(branch) = name.strip_prefix("refs/remotes/origin/") {
            if branch != "HEAD" {
                branches.insert(branch.to_string(), object.to_string());
            }
        } else if let Some(tag) = name.strip_prefix("refs/tags/") {
            tags.insert(tag.to_string(), peeled.unwrap_or(object).to_string());
        }
    }
    (branches, tags)
}

pub(crate) fn parse_commits(out: &str) -> Vec<Commit> {
    out.lines()
        .filter_map(|line| {
            let mut cols = line.splitn(4, '\t');
            let hash = cols.next()?.to_string();
            let timestamp = cols.next()?.parse().unwrap_or_default();
            let author = cols.next().unwrap_or_default().to_string();
            let subject = cols.next().unwrap_or_default().to_string();
            Some(Commit { hash, subject, author, timestamp })
        })
        .collect()
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{FetchError, RepositoryFetcher};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pv_core::RefState;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeFetcherState {
        refs: RefState,
        errors: Vec<FetchError>,
        calls: Vec<PathBuf>,
    }

    /// Fake fetcher returning whatever ref state the test installed
    #[derive(Clone, Default)]
    pub struct FakeRepositoryFetcher {
        inner: Arc<Mutex<FakeFetcherState>>,
    }

    impl FakeRepositoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_refs(&self, refs: RefState) {
            self.inner.lock().refs = refs;
        }

        /// Errors returned by every following fetch
        pub fn set_errors(&self, errors: Vec<FetchError>) {
            self.inner.lock().errors = errors;
        }

        pub fn calls(&self) -> Vec<PathBuf> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl RepositoryFetcher for FakeRepositoryFetcher {
        async fn fetch(&self, base: &Path) -> (RefState, Vec<FetchError>) {
            let mut state = self.inner.lock();
            state.calls.push(base.to_path_buf());
            (state.refs.clone(), state.errors.clone())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRepositoryFetcher;

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;
