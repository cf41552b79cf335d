// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pv-adapters: external collaborators of the session engine

pub mod command;
pub mod fetcher;
pub mod git;
pub mod http;
pub mod port;
pub mod subprocess;

pub use command::{CommandError, CommandRunner, CommandSpec, LineCallback, OutputStream, ShellCommandRunner};
pub use fetcher::{FetchError, GitRepositoryFetcher, RepositoryFetcher};
pub use git::{CliGitClient, GitClient, GitError, GitOptions};
pub use http::{HttpError, HttpProbe, HttpRequest, ReqwestHttpProbe};
pub use port::{PortError, PortRetriever, TcpPortRetriever};
pub use subprocess::SubprocessError;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use command::FakeCommandRunner;
#[cfg(any(test, feature = "test-support"))]
pub use fetcher::FakeRepositoryFetcher;
#[cfg(any(test, feature = "test-support"))]
pub use git::{FakeGitClient, GitCall};
#[cfg(any(test, feature = "test-support"))]
pub use http::FakeHttpProbe;
#[cfg(any(test, feature = "test-support"))]
pub use port::FakePortRetriever;
