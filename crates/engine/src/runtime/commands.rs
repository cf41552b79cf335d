// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running configured command lists inside a session folder.
//!
//! Commands are interpolated with the session's variables right before they
//! run, so a variable captured from one command's output is visible to the
//! next. A line of the form `::set-var key=value` captures a variable.

use super::Runtime;
use pv_adapters::{CommandError, CommandSpec, LineCallback, OutputStream};
use pv_core::template::{interpolate, interpolate_shell, unresolved};
use pv_core::{ApplicationConfig, Clock, CommandConfig, LogLevel, Session, SessionStatus};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[allow(clippy::expect_used)]
static SET_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^::set-var\s+([A-Za-z_][A-Za-z0-9_.-]*)=(.*)$").expect("constant regex pattern is valid")
});

#[derive(Debug, Error)]
pub(crate) enum RunError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("session is {0}; remaining commands skipped")]
    Aborted(SessionStatus),
}

/// Which statuses a command list may keep running in
#[derive(Debug, Clone, Copy)]
pub(crate) enum Guard {
    /// Start commands: stop as soon as the session leaves `starting`/`started`
    Starting,
    /// Stop and clean commands always run to completion
    Always,
}

impl Guard {
    fn allows(self, status: SessionStatus) -> bool {
        match self {
            Guard::Starting => matches!(status, SessionStatus::Starting | SessionStatus::Started),
            Guard::Always => true,
        }
    }
}

/// `key=value` when `line` is a set-var marker
pub(crate) fn parse_set_var(line: &str) -> Option<(String, String)> {
    let caps = SET_VAR.captures(line.trim_end())?;
    Some((caps[1].to_string(), caps[2].trim().to_string()))
}

/// Environment every session command sees, on top of the daemon's own
pub(crate) fn session_env(session: &Session, config: &ApplicationConfig) -> HashMap<String, String> {
    let vars = session.variables();
    let mut env: HashMap<String, String> =
        config.env.iter().map(|(k, v)| (k.clone(), interpolate(v, &vars))).collect();
    env.insert("PORT".into(), session.port().to_string());
    env.insert("SESSION_ID".into(), session.id().to_string());
    env.insert("SESSION_ALIAS".into(), session.alias());
    env.insert("SESSION_FOLDER".into(), session.folder().display().to_string());
    env.insert("CHECKOUT".into(), session.checkout());
    env.insert("COMMIT".into(), session.commit());
    env
}

impl<C: Clock> Runtime<C> {
    /// Run `commands` one after another in the session folder.
    ///
    /// A failing command stops the list unless it is marked
    /// `continue_on_error`. Output lines become session log entries.
    pub(crate) async fn run_commands(
        &self,
        session: &Arc<Session>,
        config: &ApplicationConfig,
        commands: &[CommandConfig],
        cancel: &CancellationToken,
        guard: Guard,
    ) -> Result<(), RunError> {
        for command in commands {
            let status = session.status();
            if !guard.allows(status) {
                return Err(RunError::Aborted(status));
            }

            let vars = session.variables();
            let missing = unresolved(&command.command, &vars);
            if !missing.is_empty() {
                self.log(session, LogLevel::Warn, format!("unset session variables: {}", missing.join(", ")));
            }
            let spec = CommandSpec {
                command: interpolate_shell(&command.command, &vars),
                cwd: session.folder(),
                env: session_env(session, config),
                timeout: command.timeout,
            };
            self.log(session, LogLevel::Info, format!("$ {}", spec.command));

            match self.deps.commands.exec(cancel, self.line_sink(session), spec).await {
                Ok(()) => {}
                Err(e) if command.continue_on_error && !matches!(e, CommandError::Cancelled(_)) => {
                    tracing::warn!(session = %session.id().short(8), error = %e, "command failed, continuing");
                    self.log(session, LogLevel::Warn, format!("{e} (continuing)"));
                }
                Err(e) => {
                    self.log(session, LogLevel::Error, e.to_string());
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    fn line_sink(&self, session: &Arc<Session>) -> LineCallback {
        let session = Arc::clone(session);
        let clock = self.clock.clone();
        Arc::new(move |stream, line| {
            if let Some((key, value)) = parse_set_var(line) {
                tracing::debug!(session = %session.id().short(8), key = %key, "captured variable");
                session.set_variable(key, value);
                return;
            }
            let level = match stream {
                OutputStream::Stdout => LogLevel::Info,
                OutputStream::Stderr => LogLevel::Warn,
            };
            session.log(clock.epoch_ms(), level, line);
        })
    }

    /// Run clean commands and remove the session folder.
    ///
    /// Missing folders are skipped; a session whose folder was never
    /// prepared has nothing to clean.
    pub(crate) async fn cleanup_folder(
        &self,
        session: &Arc<Session>,
        config: &ApplicationConfig,
    ) -> Result<(), RunError> {
        let folder = session.folder();
        if !folder.exists() {
            return Ok(());
        }
        let result = self
            .run_commands(session, config, &config.clean, &CancellationToken::new(), Guard::Always)
            .await;

        if self.config.remove_folders && self.config.owns(&folder) {
            if let Err(e) = tokio::fs::remove_dir_all(&folder).await {
                tracing::warn!(folder = %folder.display(), error = %e, "failed to remove session folder");
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
