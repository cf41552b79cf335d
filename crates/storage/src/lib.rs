// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pv-storage: in-memory session and application stores

mod applications;
mod sessions;

pub use applications::ApplicationStore;
pub use sessions::SessionStore;

use pv_core::SessionId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("session {0} is already stored")]
    DuplicateSession(SessionId),
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("session id prefix '{0}' is ambiguous")]
    AmbiguousPrefix(String),
    #[error("application '{0}' is already registered")]
    DuplicateApplication(String),
}
