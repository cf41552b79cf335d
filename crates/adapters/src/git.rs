// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git plumbing used to prepare session folders

use crate::subprocess::{run_with_timeout, stderr_of, SubprocessError, GIT_NETWORK_TIMEOUT, GIT_TIMEOUT};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("git {op} failed: {stderr}")]
    Failed { op: &'static str, stderr: String },
    #[error("git {op} was denied by the remote: {stderr}")]
    Auth { op: &'static str, stderr: String },
}

impl GitError {
    /// Authentication problems need an operator; retrying will not help
    pub fn is_auth(&self) -> bool {
        matches!(self, GitError::Auth { .. })
    }
}

/// Extra settings for a git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOptions {
    /// Extra environment, e.g. `GIT_SSH_COMMAND`
    pub env: HashMap<String, String>,
}

#[async_trait]
pub trait GitClient: Send + Sync + 'static {
    /// Clone `remote` into `out`. When `base` holds a local clone its objects
    /// are shared so the clone does not hit the network for known history.
    async fn clone_repo(
        &self,
        base: Option<&Path>,
        out: &Path,
        remote: &str,
        opts: &GitOptions,
    ) -> Result<(), GitError>;

    async fn fetch_all(&self, repo: &Path, opts: &GitOptions) -> Result<(), GitError>;

    async fn hard_reset(&self, repo: &Path, commit: &str, opts: &GitOptions) -> Result<(), GitError>;
}

/// Markers in git stderr that indicate missing credentials or access
const AUTH_MARKERS: &[&str] = &[
    "Authentication failed",
    "Permission denied",
    "could not read Username",
    "Repository not found",
    "Host key verification failed",
];

pub(crate) fn is_auth_failure(stderr: &str) -> bool {
    AUTH_MARKERS.iter().any(|m| stderr.contains(m))
}

/// `git` CLI implementation
#[derive(Clone, Copy, Debug, Default)]
pub struct CliGitClient;

impl CliGitClient {
    async fn run(
        &self,
        op: &'static str,
        args: &[&str],
        opts: &GitOptions,
        timeout: std::time::Duration,
    ) -> Result<(), GitError> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .envs(&opts.env)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE");
        let output = run_with_timeout(cmd, timeout, &format!("git {op}")).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = stderr_of(&output);
        if is_auth_failure(&stderr) {
            Err(GitError::Auth { op, stderr })
        } else {
            Err(GitError::Failed { op, stderr })
        }
    }
}

#[async_trait]
impl GitClient for CliGitClient {
    async fn clone_repo(
        &self,
        base: Option<&Path>,
        out: &Path,
        remote: &str,
        opts: &GitOptions,
    ) -> Result<(), GitError> {
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| GitError::Failed {
                op: "clone",
                stderr: format!("cannot create {}: {e}", parent.display()),
            })?;
        }
        let out_str = out.display().to_string();
        match base.filter(|b| b.join(".git").exists()) {
            Some(base) => {
                let base_str = base.display().to_string();
                self.run("clone", &["clone", "--shared", "--no-checkout", &base_str, &out_str], opts, GIT_TIMEOUT)
                    .await?;
                self.run("remote", &["-C", &out_str, "remote", "set-url", "origin", remote], opts, GIT_TIMEOUT)
                    .await
            }
            None => {
                self.run("clone", &["clone", "--no-checkout", remote, &out_str], opts, GIT_NETWORK_TIMEOUT)
                    .await
            }
        }
    }

    async fn fetch_all(&self, repo: &Path, opts: &GitOptions) -> Result<(), GitError> {
        let repo = repo.display().to_string();
        self.run(
            "fetch",
            &["-C", &repo, "fetch", "--all", "--prune", "--tags", "--force"],
            opts,
            GIT_NETWORK_TIMEOUT,
        )
        .await
    }

    async fn hard_reset(&self, repo: &Path, commit: &str, opts: &GitOptions) -> Result<(), GitError> {
        let repo = repo.display().to_string();
        self.run("reset", &["-C", &repo, "reset", "--hard", "--quiet", commit], opts, GIT_TIMEOUT).await
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{GitClient, GitError, GitOptions};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Recorded git call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum GitCall {
        Clone { base: Option<PathBuf>, out: PathBuf, remote: String },
        FetchAll { repo: PathBuf },
        HardReset { repo: PathBuf, commit: String },
    }

    #[derive(Default)]
    struct FakeGitState {
        calls: Vec<GitCall>,
        fail_clone: Option<String>,
        fail_fetch: Option<String>,
        fail_reset: Option<String>,
    }

    /// Fake git client.
    ///
    /// A successful clone creates `out/.git` on disk so callers that probe for
    /// an existing clone behave as with real git.
    #[derive(Clone, Default)]
    pub struct FakeGitClient {
        inner: Arc<Mutex<FakeGitState>>,
    }

    impl FakeGitClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_clone(&self, stderr: Option<&str>) {
            self.inner.lock().fail_clone = stderr.map(String::from);
        }

        pub fn fail_fetch(&self, stderr: Option<&str>) {
            self.inner.lock().fail_fetch = stderr.map(String::from);
        }

        pub fn fail_reset(&self, stderr: Option<&str>) {
            self.inner.lock().fail_reset = stderr.map(String::from);
        }

        pub fn calls(&self) -> Vec<GitCall> {
            self.inner.lock().calls.clone()
        }

        fn error(op: &'static str, stderr: String) -> GitError {
            if super::is_auth_failure(&stderr) {
                GitError::Auth { op, stderr }
            } else {
                GitError::Failed { op, stderr }
            }
        }
    }

    #[async_trait]
    impl GitClient for FakeGitClient {
        async fn clone_repo(
            &self,
            base: Option<&Path>,
            out: &Path,
            remote: &str,
            _opts: &GitOptions,
        ) -> Result<(), GitError> {
            let failure = {
                let mut state = self.inner.lock();
                state.calls.push(GitCall::Clone {
                    base: base.map(Path::to_path_buf),
                    out: out.to_path_buf(),
                    remote: remote.to_string(),
                });
                state.fail_clone.clone()
            };
            if let Some(stderr) = failure {
                return Err(Self::error("clone", stderr));
            }
            tokio::fs::create_dir_all(out.join(".git"))
                .await
                .map_err(|e| GitError::Failed { op: "clone", stderr: e.to_string() })
        }

        async fn fetch_all(&self, repo: &Path, _opts: &GitOptions) -> Result<(), GitError> {
            let mut state = self.inner.lock();
            state.calls.push(GitCall::FetchAll { repo: repo.to_path_buf() });
            match state.fail_fetch.clone() {
                Some(stderr) => Err(Self::error("fetch", stderr)),
                None => Ok(()),
            }
        }

        async fn hard_reset(
            &self,
            repo: &Path,
            commit: &str,
            _opts: &GitOptions,
        ) -> Result<(), GitError> {
            let mut state = self.inner.lock();
            state
                .calls
                .push(GitCall::HardReset { repo: repo.to_path_buf(), commit: commit.to_string() });
            match state.fail_reset.clone() {
                Some(stderr) => Err(Self::error("reset", stderr)),
                None => Ok(()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGitClient, GitCall};

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
