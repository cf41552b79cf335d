// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios through the public engine handle

mod hot_swap;
mod lifecycle;
mod probe;
mod retries;

use pv_core::test_support::{app_config, fast_healthcheck};
use pv_core::ApplicationConfig;

/// Application whose sessions must pass a fast health check
fn checked(name: &str) -> ApplicationConfig {
    let mut config = app_config(name);
    config.healthcheck = Some(fast_healthcheck());
    config
}
