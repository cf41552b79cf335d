// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command runner with streamed output.
//!
//! Each command runs as `bash -c "set -euo pipefail\n<command>"`. Output lines
//! are handed to a callback as they arrive; the run ends on exit, timeout or
//! cancellation, whichever comes first.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// How long to keep reading pipes after the shell exits.
///
/// Background processes started by a command inherit its stdout; without a
/// bound the reader would wait for them forever.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Called once per output line, in arrival order per stream
pub type LineCallback = Arc<dyn Fn(OutputStream, &str) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command exited with status {code}: {command}")]
    Failed { command: String, code: i32 },
    #[error("command timed out after {}s: {command}", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
    #[error("command cancelled: {0}")]
    Cancelled(String),
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn exec(
        &self,
        cancel: &CancellationToken,
        on_line: LineCallback,
        spec: CommandSpec,
    ) -> Result<(), CommandError>;
}

/// Runs commands through `bash` on the local host
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellCommandRunner;

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
    TimedOut(Duration),
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn exec(
        &self,
        cancel: &CancellationToken,
        on_line: LineCallback,
        spec: CommandSpec,
    ) -> Result<(), CommandError> {
        tracing::debug!(command = %spec.command, cwd = %spec.cwd.display(), "running command");

        let wrapped = format!("set -euo pipefail\n{}", spec.command);
        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(&wrapped)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|source| CommandError::Spawn { command: spec.command.clone(), source })?;

        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(tokio::spawn(pump(out, OutputStream::Stdout, Arc::clone(&on_line))));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(tokio::spawn(pump(err, OutputStream::Stderr, Arc::clone(&on_line))));
        }

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = cancel.cancelled() => Outcome::Cancelled,
            timeout = deadline(spec.timeout) => Outcome::TimedOut(timeout),
        };

        if !matches!(outcome, Outcome::Exited(_)) {
            if let Err(e) = child.kill().await {
                tracing::warn!(command = %spec.command, error = %e, "failed to kill command");
            }
        }
        for reader in readers {
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, reader).await.is_err() {
                tracing::debug!(command = %spec.command, "output still open after exit");
            }
        }

        match outcome {
            Outcome::Exited(Ok(status)) if status.success() => Ok(()),
            Outcome::Exited(Ok(status)) => {
                Err(CommandError::Failed { command: spec.command, code: status.code().unwrap_or(-1) })
            }
            Outcome::Exited(Err(source)) => Err(CommandError::Spawn { command: spec.command, source }),
            Outcome::Cancelled => Err(CommandError::Cancelled(spec.command)),
            Outcome::TimedOut(timeout) => Err(CommandError::TimedOut { command: spec.command, timeout }),
        }
    }
}

async fn pump<R>(reader: R, stream: OutputStream, on_line: LineCallback)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        on_line(stream, &line);
    }
}

/// Resolves after `timeout`, or never when there is none.
async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(t) => {
            tokio::time::sleep(t).await;
            t
        }
        None => std::future::pending().await,
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{CommandError, CommandRunner, CommandSpec, LineCallback, OutputStream};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone)]
    enum Behavior {
        Succeed,
        Fail(i32),
        /// Block until cancelled or timed out
        Hang,
        Delay(Duration),
    }

    #[derive(Debug, Clone)]
    struct Rule {
        pattern: String,
        behavior: Behavior,
        output: Vec<String>,
        /// `None` = applies forever
        remaining: Option<u32>,
    }

    #[derive(Default)]
    struct FakeCommandState {
        calls: Vec<CommandSpec>,
        rules: Vec<Rule>,
    }

    /// Fake command runner: records every command and answers from rules.
    ///
    /// Rules match when their pattern is a substring of the command; the first
    /// live rule wins. Commands without a rule succeed silently.
    #[derive(Clone, Default)]
    pub struct FakeCommandRunner {
        inner: Arc<Mutex<FakeCommandState>>,
    }

    impl FakeCommandRunner {
        pub fn new() -> Self {
            Self::default()
        }

        fn push(&self, pattern: &str, behavior: Behavior, remaining: Option<u32>) {
            self.inner.lock().rules.push(Rule {
                pattern: pattern.to_string(),
                behavior,
                output: Vec::new(),
                remaining,
            });
        }

        /// Every command containing `pattern` exits with status 1
        pub fn fail(&self, pattern: &str) {
            self.push(pattern, Behavior::Fail(1), None);
        }

        /// The next `times` commands containing `pattern` exit with status 1
        pub fn fail_times(&self, pattern: &str, times: u32) {
            self.push(pattern, Behavior::Fail(1), Some(times));
        }

        pub fn hang(&self, pattern: &str) {
            self.push(pattern, Behavior::Hang, None);
        }

        pub fn delay(&self, pattern: &str, delay: Duration) {
            self.push(pattern, Behavior::Delay(delay), None);
        }

        /// Commands containing `pattern` print `lines` to stdout and succeed
        pub fn output(&self, pattern: &str, lines: &[&str]) {
            self.inner.lock().rules.push(Rule {
                pattern: pattern.to_string(),
                behavior: Behavior::Succeed,
                output: lines.iter().map(|l| l.to_string()).collect(),
                remaining: None,
            });
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.inner.lock().calls.clone()
        }

        pub fn commands(&self) -> Vec<String> {
            self.inner.lock().calls.iter().map(|c| c.command.clone()).collect()
        }

        /// Number of recorded commands containing `pattern`
        pub fn count(&self, pattern: &str) -> usize {
            self.inner.lock().calls.iter().filter(|c| c.command.contains(pattern)).count()
        }

        fn next_rule(&self, spec: CommandSpec) -> Option<Rule> {
            let mut state = self.inner.lock();
            let command = spec.command.clone();
            state.calls.push(spec);
            let rule = state
                .rules
                .iter_mut()
                .find(|r| command.contains(&r.pattern) && r.remaining != Some(0))?;
            if let Some(n) = rule.remaining.as_mut() {
                *n -= 1;
            }
            Some(rule.clone())
        }
    }

    #[async_trait]
    impl CommandRunner for FakeCommandRunner {
        async fn exec(
            &self,
            cancel: &CancellationToken,
            on_line: LineCallback,
            spec: CommandSpec,
        ) -> Result<(), CommandError> {
            let command = spec.command.clone();
            let timeout = spec.timeout;
            let Some(rule) = self.next_rule(spec) else {
                return Ok(());
            };
            for line in &rule.output {
                on_line(OutputStream::Stdout, line);
            }
            match rule.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail(code) => Err(CommandError::Failed { command, code }),
                Behavior::Hang => {
                    let limit = timeout.unwrap_or(Duration::from_secs(86_400));
                    tokio::select! {
                        _ = cancel.cancelled() => Err(CommandError::Cancelled(command)),
                        _ = tokio::time::sleep(limit) => {
                            Err(CommandError::TimedOut { command, timeout: limit })
                        }
                    }
                }
                Behavior::Delay(delay) => tokio::select! {
                    _ = cancel.cancelled() => Err(CommandError::Cancelled(command)),
                    _ = tokio::time::sleep(delay) => Ok(()),
                },
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCommandRunner;

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
