// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Public handle over the worker runtime

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::mediator::{
    AppFetchRequest, AppInitRequest, BuildRequest, BuildResult, DestroyRequest, DestroyResult,
    FetchResult, Mediator,
};
use crate::runtime::{EngineDeps, Runtime};
use pv_core::{validate_applications, Application, ApplicationConfig, Clock, KillReason, Session, SessionId, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// The session engine. Cloning shares the same runtime.
#[derive(Clone)]
pub struct Engine<C: Clock = SystemClock> {
    runtime: Arc<Runtime<C>>,
}

impl<C: Clock> Engine<C> {
    /// Register `applications` and start the worker loops.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: EngineConfig,
        deps: EngineDeps,
        clock: C,
        applications: Vec<ApplicationConfig>,
    ) -> Result<Self, EngineError> {
        validate_applications(&applications).map_err(|e| EngineError::Config(e.to_string()))?;
        let (mediator, receivers) = Mediator::new();
        let runtime = Arc::new(Runtime::new(config, deps, clock, mediator));
        for app in applications {
            runtime.applications.add(Arc::new(Application::new(app)))?;
        }
        runtime.spawn_workers(receivers);
        tracing::info!(
            applications = runtime.applications.all().len(),
            storage = %runtime.config.storage_folder.display(),
            "engine started"
        );
        Ok(Self { runtime })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.runtime.config
    }

    /// Initialize every application in configuration order.
    ///
    /// A failing application does not stop the others.
    pub async fn init_applications(&self) -> Vec<(String, Result<(), EngineError>)> {
        let mut results = Vec::new();
        for app in self.runtime.applications.all() {
            let name = app.name().to_string();
            let result = self.init_application(&name).await;
            results.push((name, result));
        }
        results
    }

    pub async fn init_application(&self, name: &str) -> Result<(), EngineError> {
        self.runtime
            .mediator
            .application_init
            .call(AppInitRequest { application: name.to_string() })
            .await?
    }

    /// Build `checkout` of `application`, recording the branch or tag that
    /// points at it when `checkout` is a commit.
    pub async fn build_session(&self, application: &str, checkout: &str) -> BuildResult {
        let mut request = BuildRequest::new(application, checkout);
        request.detect_branch_or_tag = true;
        self.build(request).await
    }

    pub async fn build(&self, request: BuildRequest) -> BuildResult {
        match self.runtime.mediator.build_session.call(request).await {
            Ok(result) => result,
            Err(e) => BuildResult::Failed(e),
        }
    }

    pub async fn destroy_session(&self, id: &SessionId) -> Result<DestroyResult, EngineError> {
        self.runtime
            .mediator
            .destroy_session
            .call(DestroyRequest::new(id.clone(), KillReason::Stopped))
            .await
    }

    pub async fn fetch(&self, application: &str, watch: bool) -> FetchResult {
        self.runtime
            .mediator
            .application_fetch
            .call(AppFetchRequest { application: application.to_string(), watch })
            .await?
    }

    /// Note traffic for a session, postponing its inactivity expiry.
    pub fn record_traffic(&self, id: &SessionId) -> bool {
        match self.runtime.sessions.get_by_uuid(id) {
            Some(session) if session.is_alive() => {
                session.touch();
                true
            }
            _ => false,
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.runtime.sessions.get_by_uuid(id)
    }

    /// Look up a session by id or unique id prefix
    pub fn find_session(&self, id_or_prefix: &str) -> Result<Arc<Session>, EngineError> {
        Ok(self.runtime.sessions.find(id_or_prefix)?)
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.runtime.sessions.all()
    }

    pub fn sessions_of(&self, application: &str) -> Vec<Arc<Session>> {
        self.runtime.sessions.by_application(application)
    }

    pub fn application(&self, name: &str) -> Option<Arc<Application>> {
        self.runtime.applications.get(name)
    }

    pub fn applications(&self) -> Vec<Arc<Application>> {
        self.runtime.applications.all()
    }

    /// Forget a session that is no longer alive and close its event bus.
    pub fn delete_session(&self, id: &SessionId) -> Result<Arc<Session>, EngineError> {
        let session =
            self.runtime.sessions.get_by_uuid(id).ok_or_else(|| EngineError::UnknownSession(id.clone()))?;
        if session.is_alive() || session.status() == pv_core::SessionStatus::Stopping {
            return Err(EngineError::SessionAlive(id.clone()));
        }
        self.runtime.sessions.delete(id);
        session.events().close();
        Ok(session)
    }

    /// Stop the worker loops, cancel running builds, wait up to `drain` for
    /// in-flight tasks, then close the application buses. Returns false when
    /// tasks were still running.
    pub async fn shutdown(&self, drain: Duration) -> bool {
        tracing::info!("engine shutting down");
        self.runtime.shutdown.cancel();
        self.runtime.contexts.cancel_all();
        self.runtime.tasks.close();
        let drained = tokio::time::timeout(drain, self.runtime.tasks.wait()).await.is_ok();
        if !drained {
            tracing::warn!(drain_ms = drain.as_millis() as u64, "tasks still running after drain timeout");
        }
        for app in self.runtime.applications.all() {
            app.events().close();
        }
        drained
    }

    #[cfg(test)]
    pub(crate) fn runtime(&self) -> &Arc<Runtime<C>> {
        &self.runtime
    }
}

#[cfg(test)]
#[path = "engine_tests/mod.rs"]
mod tests;
