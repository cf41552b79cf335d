// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess helpers with an upper bound on run time

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Upper bound for quick git plumbing (`rev-parse`, `for-each-ref`, `reset`)
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound for network-bound git operations (`clone`, `fetch`)
pub const GIT_NETWORK_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{description} timed out after {}s", timeout.as_secs())]
    TimedOut { description: String, timeout: Duration },
    #[error("{description} failed to run: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `cmd` to completion, killing it if it outlives `timeout`.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Io { description: description.to_string(), source }),
        Err(_) => Err(SubprocessError::TimedOut { description: description.to_string(), timeout }),
    }
}

/// Trimmed, lossy stderr of a finished process
pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
