// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use pv_adapters::GitError;
use pv_core::{SessionError, SessionId};
use pv_storage::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("session limit reached ({0} alive)")]
    GlobalCapacity(usize),
    #[error("application '{app}' reached its session limit ({limit} alive)")]
    ApplicationCapacity { app: String, limit: usize },
    #[error("unknown application '{0}'")]
    UnknownApplication(String),
    #[error("cannot resolve '{checkout}' in '{app}'")]
    UnresolvableCheckout { app: String, checkout: String },
    #[error("session {0} not found")]
    UnknownSession(SessionId),
    #[error("session {0} is still alive")]
    SessionAlive(SessionId),
    #[error("no free port: {0}")]
    Port(String),
    #[error("failed to initialize '{app}': {reason}")]
    Init { app: String, reason: String },
    #[error("{0} queue is closed")]
    QueueClosed(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Failure while preparing a session folder
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("copy failed: {0}")]
    Copy(String),
    #[error("{0} queue is closed")]
    QueueClosed(&'static str),
}

impl FilesystemError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| FilesystemError::Io { path, source }
    }
}
