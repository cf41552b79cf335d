// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pv-daemon: configuration, logging and lifecycle of the `pvd` process

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod logging;

pub use config::{DaemonConfig, DaemonConfigError, LogConfig};
pub use lifecycle::{startup, startup_with, Daemon, LifecycleError};
