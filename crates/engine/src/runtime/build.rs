// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build worker: admission, the build pipeline, and retries.
//!
//! Admission runs inside the worker loop, so capacity checks, deduplication
//! and port allocation never race with each other. The pipeline itself runs
//! in a spawned task bound to a cancellable build context.

use super::commands::Guard;
use super::healthcheck::probe_request;
use super::Runtime;
use crate::context::BUILD;
use crate::error::EngineError;
use crate::mediator::{
    BuildRequest, BuildResult, CleanRequest, CleanResult, FilesystemRequest, HealthcheckRequest,
    HealthcheckResult, StartRequest, StartResult,
};
use pv_core::duration::format_duration;
use pv_core::{
    Application, ApplicationConfig, ApplicationEvent, Clock, KillReason, LogLevel, NewSession,
    Session, SessionEvent, SessionId, SessionStatus, WarmupsConfig,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Characters of the session id appended to its alias
const ALIAS_ID_LEN: usize = 5;

/// Lowercase, dash-separated form of a checkout name for folder aliases
pub(crate) fn slug(checkout: &str) -> String {
    let mut out = String::with_capacity(checkout.len());
    for c in checkout.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "session".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Values available to `${...}` interpolation in commands and probes
pub(crate) struct SessionVars<'a> {
    pub id: &'a SessionId,
    pub application: &'a str,
    pub alias: &'a str,
    pub checkout: &'a str,
    pub commit: &'a str,
    pub port: u16,
    pub folder: &'a Path,
    pub base_folder: &'a Path,
}

impl SessionVars<'_> {
    pub(crate) fn into_map(self) -> HashMap<String, String> {
        HashMap::from([
            ("id".to_string(), self.id.to_string()),
            ("app".to_string(), self.application.to_string()),
            ("alias".to_string(), self.alias.to_string()),
            ("checkout".to_string(), self.checkout.to_string()),
            ("commit".to_string(), self.commit.to_string()),
            ("port".to_string(), self.port.to_string()),
            ("folder".to_string(), self.folder.display().to_string()),
            ("base_folder".to_string(), self.base_folder.display().to_string()),
        ])
    }
}

impl<C: Clock> Runtime<C> {
    pub(crate) async fn handle_build(self: &Arc<Self>, req: BuildRequest) -> BuildResult {
        let result = match self.admit(&req).await {
            Ok(result) => result,
            Err(e) => BuildResult::Failed(e),
        };
        match &result {
            BuildResult::Accepted(session) => {
                tracing::info!(
                    app = %req.application,
                    session = %session.id().short(8),
                    checkout = %session.checkout(),
                    commit = %pv_core::short(&session.commit(), 8),
                    "build accepted"
                );
                let rt = Arc::clone(self);
                let session = Arc::clone(session);
                self.spawn(async move { rt.run_pipeline(session).await });
            }
            BuildResult::Existing(session) => {
                tracing::info!(
                    app = %req.application,
                    session = %session.id().short(8),
                    "commit already served"
                );
            }
            BuildResult::Failed(e) => {
                tracing::warn!(app = %req.application, checkout = %req.checkout, error = %e, "build rejected");
            }
        }
        result
    }

    async fn admit(&self, req: &BuildRequest) -> Result<BuildResult, EngineError> {
        let app = self
            .applications
            .get(&req.application)
            .ok_or_else(|| EngineError::UnknownApplication(req.application.clone()))?;

        if let Some(limit) = self.config.max_sessions {
            if self.sessions.alive_count() >= limit {
                return Err(EngineError::GlobalCapacity(limit));
            }
        }
        if let Some(limit) = app.config().max_sessions {
            if self.sessions.alive_by_application_count(app.name()) >= limit {
                return Err(EngineError::ApplicationCapacity { app: app.name().to_string(), limit });
            }
        }

        let previous = req
            .previous
            .as_ref()
            .and_then(|id| self.sessions.get_by_uuid(id))
            .filter(|s| s.kill_reason().allows_recycle());
        if let Some(previous) = previous {
            return self.recycle(&app, previous).await;
        }

        let commit = app.resolve(&req.checkout).ok_or_else(|| EngineError::UnresolvableCheckout {
            app: app.name().to_string(),
            checkout: req.checkout.clone(),
        })?;
        let checkout = if req.detect_branch_or_tag && !app.is_ref(&req.checkout) {
            app.ref_for_commit(&commit).unwrap_or_else(|| req.checkout.clone())
        } else {
            req.checkout.clone()
        };

        if let Some(existing) =
            self.sessions.get_alive_application_session_by_commit_id(app.name(), &commit)
        {
            return Ok(BuildResult::Existing(existing));
        }

        let session = self.allocate(&app, &checkout, &commit, req).await?;
        Ok(BuildResult::Accepted(session))
    }

    /// Reuse a failed session for another attempt at the same commit.
    async fn recycle(
        &self,
        app: &Application,
        previous: Arc<Session>,
    ) -> Result<BuildResult, EngineError> {
        let commit = previous.commit();
        if let Some(existing) = self.sessions.get_alive_application_session_by_commit_id(app.name(), &commit) {
            return Ok(BuildResult::Existing(existing));
        }
        let port = self.free_port(app).await?;
        let alias = previous.alias();
        let folder = previous.folder();
        let base_folder = self.config.base_folder(app.name());
        let variables = SessionVars {
            id: previous.id(),
            application: app.name(),
            alias: &alias,
            checkout: &previous.checkout(),
            commit: &commit,
            port,
            folder: &folder,
            base_folder: &base_folder,
        }
        .into_map();
        let attempt = previous.recycle(port, variables)?;
        tracing::info!(session = %previous.id().short(8), retry = attempt, "recycling failed session");
        Ok(BuildResult::Accepted(previous))
    }

    async fn allocate(
        &self,
        app: &Application,
        checkout: &str,
        commit: &str,
        req: &BuildRequest,
    ) -> Result<Arc<Session>, EngineError> {
        let id = SessionId::new();
        let alias = format!("{}-{}", slug(checkout), id.short(ALIAS_ID_LEN));
        let folder = self.config.session_folder(app.name(), &alias);
        let base_folder = self.config.base_folder(app.name());
        let port = self.free_port(app).await?;

        let mut replaces = req.replaces.clone();
        if req.supersede {
            for other in self.sessions.by_application(app.name()) {
                let retryable = other.status() == SessionStatus::StartFailed
                    && other.replaced_by().is_none()
                    && other.kill_reason().allows_recycle();
                if other.checkout() == checkout
                    && other.commit() != commit
                    && (other.is_alive() || retryable)
                    && !replaces.contains(other.id())
                {
                    replaces.push(other.id().clone());
                }
            }
        }

        let variables = SessionVars {
            id: &id,
            application: app.name(),
            alias: &alias,
            checkout,
            commit,
            port,
            folder: &folder,
            base_folder: &base_folder,
        }
        .into_map();

        let session = Arc::new(Session::new(NewSession {
            id: id.clone(),
            application: app.name().to_string(),
            alias,
            checkout: checkout.to_string(),
            commit: commit.to_string(),
            port,
            folder,
            variables,
            watched: app.config().is_watched(checkout),
            replaces: replaces.clone(),
            created_at_ms: self.clock.epoch_ms(),
        }));
        self.sessions.add(Arc::clone(&session))?;
        for old in replaces.iter().filter_map(|old| self.sessions.get_by_uuid(old)) {
            old.set_replaced_by(id.clone());
        }

        app.publish(ApplicationEvent::SessionBuild { session: id, checkout: checkout.to_string() });
        Ok(session)
    }

    async fn free_port(&self, app: &Application) -> Result<u16, EngineError> {
        let mut except = app.config().ports.except.clone();
        except.extend(self.sessions.used_ports());
        self.deps.ports.get_free_port(&except).await.map_err(|e| EngineError::Port(e.to_string()))
    }

    /// One build attempt.
    ///
    /// Exactly one of the pipeline and its watcher (cancellation or
    /// deadline) claims the outcome, so a failed attempt is cleaned once.
    async fn run_pipeline(self: Arc<Self>, session: Arc<Session>) {
        let Some(app) = self.application_of(&session) else {
            return;
        };
        let config = app.config().for_checkout(&session.checkout());
        let token = CancellationToken::new();
        let generation = self.contexts.register(session.id(), BUILD, token.clone());
        let claimed = Arc::new(AtomicBool::new(false));
        let done = CancellationToken::new();

        let attempt = session.startup_retries() + 1;
        let now = self.clock.epoch_ms();
        session.update_metrics(|m| {
            m.build_attempts += 1;
            m.build_started_at_ms = Some(now);
        });
        session.publish(SessionEvent::BuildStarted { attempt });
        self.log(
            &session,
            LogLevel::Info,
            format!("build attempt {attempt} of {} at {}", session.checkout(), session.commit()),
        );

        {
            let rt = Arc::clone(&self);
            let session = Arc::clone(&session);
            let token = token.clone();
            let claimed = Arc::clone(&claimed);
            let done = done.clone();
            let timeout = config.startup.timeout;
            self.spawn(async move {
                let reason = tokio::select! {
                    _ = done.cancelled() => return,
                    _ = token.cancelled() => "build cancelled".to_string(),
                    _ = tokio::time::sleep(timeout) => {
                        token.cancel();
                        format!("build timed out after {}", format_duration(timeout))
                    }
                };
                if !claimed.swap(true, Ordering::SeqCst) {
                    rt.fail_build(&session, generation, reason).await;
                }
            });
        }

        let result = self.build_steps(&session, &config, &token).await;
        done.cancel();
        if claimed.swap(true, Ordering::SeqCst) {
            return;
        }
        match result {
            Ok(()) => self.contexts.clear(session.id(), BUILD, generation),
            Err(reason) => self.fail_build(&session, generation, reason).await,
        }
    }

    async fn build_steps(
        &self,
        session: &Arc<Session>,
        config: &ApplicationConfig,
        token: &CancellationToken,
    ) -> Result<(), String> {
        session.publish(SessionEvent::PreparingFolders);
        self.mediator
            .session_filesystem
            .call(FilesystemRequest { session: Arc::clone(session) })
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| format!("preparing session folder failed: {e}"))?;
        ensure_building(session, token)?;

        session.publish(SessionEvent::CommandsExecutionStarted);
        self.run_commands(session, config, &config.start, token, Guard::Starting)
            .await
            .map_err(|e| format!("start commands failed: {e}"))?;
        ensure_building(session, token)?;

        if let Some(warmups) = config.warmups.as_ref().filter(|w| !w.urls.is_empty()) {
            session.publish(SessionEvent::WarmupStarted);
            self.warm_up(session, warmups, token).await?;
            session.publish(SessionEvent::WarmupSucceeded);
            ensure_building(session, token)?;
        }

        match &config.healthcheck {
            Some(healthcheck) => {
                let request =
                    HealthcheckRequest { session: Arc::clone(session), config: healthcheck.clone() };
                match self.mediator.healthcheck_session.call(request).await.map_err(|e| e.to_string())? {
                    HealthcheckResult::Registered => {}
                    HealthcheckResult::AlreadyRegistered => {
                        return Err("health check already running for this session".to_string())
                    }
                }
            }
            None => {
                let request = StartRequest { session: Arc::clone(session) };
                match self.mediator.start_session.call(request).await.map_err(|e| e.to_string())? {
                    StartResult::Started => {}
                    StartResult::Ignored(status) => return Err(format!("session is {status}, not started")),
                }
            }
        }
        Ok(())
    }

    /// Request every warm-up URL until it answers with its expected status.
    async fn warm_up(
        &self,
        session: &Session,
        warmups: &WarmupsConfig,
        token: &CancellationToken,
    ) -> Result<(), String> {
        let attempts = warmups.max_retries.max(1);
        for url in &warmups.urls {
            let mut failures = 0;
            loop {
                let mut request = probe_request(session, &url.path, &url.headers, None, warmups.timeout);
                request.method = url.method.clone();
                let error = match self.deps.http.request(request).await {
                    Ok(status) if status == url.status => break,
                    Ok(status) => format!("status {status}, expected {}", url.status),
                    Err(e) => e.to_string(),
                };
                failures += 1;
                self.log(
                    session,
                    LogLevel::Warn,
                    format!("warm-up {} failed ({failures}/{attempts}): {error}", url.path),
                );
                if failures >= attempts {
                    return Err(format!("warm-up {} failed: {error}", url.path));
                }
                tokio::select! {
                    _ = token.cancelled() => return Err("build cancelled".to_string()),
                    _ = tokio::time::sleep(warmups.retry_interval) => {}
                }
            }
        }
        Ok(())
    }

    async fn fail_build(&self, session: &Arc<Session>, generation: u64, reason: String) {
        tracing::warn!(session = %session.id().short(8), reason = %reason, "build failed");
        self.log(session, LogLevel::Error, reason);
        self.contexts.clear(session.id(), BUILD, generation);

        let clean = CleanRequest {
            session: Arc::clone(session),
            status: SessionStatus::StartFailed,
            kill_reason: KillReason::BuildFailed,
        };
        match self.mediator.clean_session.call(clean).await {
            Ok(CleanResult::Cleaned) => self.after_failure(session, false).await,
            // Destroyed mid-build: teardown owns the status, the build still failed
            Ok(CleanResult::Unchanged(status)) => {
                if session.kill_reason() == KillReason::Stopped {
                    session.set_kill_reason(KillReason::BuildFailed);
                }
                tracing::debug!(session = %session.id().short(8), %status, "failed build left to teardown");
            }
            Err(e) => {
                tracing::warn!(session = %session.id().short(8), error = %e, "could not clean failed build");
            }
        }
    }

    /// Retry a failed attempt while the retry budget lasts; otherwise
    /// clean the folder and announce the failure.
    ///
    /// Sessions stopped or replaced meanwhile are left to whoever stopped them.
    pub(crate) async fn after_failure(&self, session: &Arc<Session>, folder_cleaned: bool) {
        if session.status() != SessionStatus::StartFailed || !session.kill_reason().allows_recycle() {
            return;
        }
        let Some(app) = self.application_of(session) else {
            return;
        };
        let config = app.config().for_checkout(&session.checkout());
        let retries = session.startup_retries();
        let mut superseded = session.replaced_by().is_some();

        if !superseded && retries < config.startup.retries {
            tracing::info!(
                session = %session.id().short(8),
                retry = retries + 1,
                of = config.startup.retries,
                "retrying build"
            );
            match self.mediator.build_session.call(BuildRequest::retry(session)).await {
                Ok(BuildResult::Accepted(_)) => return,
                Ok(BuildResult::Existing(other)) => {
                    self.log(session, LogLevel::Info, format!("commit is served by {}", other.id()));
                    superseded = true;
                }
                Ok(BuildResult::Failed(e)) => {
                    self.log(session, LogLevel::Error, format!("retry rejected: {e}"));
                }
                Err(e) => {
                    tracing::warn!(session = %session.id().short(8), error = %e, "retry not enqueued");
                }
            }
        }

        if !folder_cleaned {
            if let Err(e) = self.cleanup_folder(session, &config).await {
                tracing::warn!(session = %session.id().short(8), error = %e, "clean commands failed");
            }
        }
        if superseded || session.replaced_by().is_some() {
            return;
        }
        self.log(
            session,
            LogLevel::Error,
            format!("giving up after {} attempts", session.metrics().build_attempts),
        );
        app.publish(ApplicationEvent::SessionBuildFailed { session: session.id().clone() });
    }
}

fn ensure_building(session: &Session, token: &CancellationToken) -> Result<(), String> {
    if token.is_cancelled() {
        return Err("build cancelled".to_string());
    }
    match session.status() {
        SessionStatus::Starting => Ok(()),
        status => Err(format!("session is {status}")),
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
