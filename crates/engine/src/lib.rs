// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pv-engine: builds, health-checks and retires preview sessions.
//!
//! Work flows through a [`Mediator`] of typed queues, each drained by one
//! worker loop: build, session filesystem, health check, start, destroy,
//! clean, application init and application fetch.

pub mod config;
pub mod context;
mod engine;
pub mod error;
pub mod mediator;
mod runtime;

#[cfg(test)]
mod test_helpers;

pub use config::{EngineConfig, FilesystemStrategy, DEFAULT_DESTROY_TIMEOUT};
pub use context::ContextRegistry;
pub use engine::Engine;
pub use error::{EngineError, FilesystemError};
pub use mediator::{
    BuildRequest, BuildResult, DestroyResult, FetchOutcome, Mediator, StartResult,
};
pub use runtime::EngineDeps;
