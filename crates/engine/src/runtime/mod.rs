// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared state behind the worker loops.
//!
//! Each worker is a method set on [`Runtime`] in its own module. A loop owns
//! one queue receiver and handles one request at a time; anything long-running
//! is spawned on the task tracker so the loop can take the next request.

mod app_fetch;
mod app_init;
mod build;
mod clean;
mod commands;
mod destroy;
mod filesystem;
mod healthcheck;
mod inactivity;
mod start;

pub(crate) use commands::RunError;

use crate::config::EngineConfig;
use crate::context::ContextRegistry;
use crate::mediator::{Envelope, Mediator, MediatorReceivers, QueueReceiver};
use parking_lot::Mutex;
use pv_adapters::{CommandRunner, GitClient, HttpProbe, PortRetriever, RepositoryFetcher};
use pv_core::{Application, Clock, LogLevel, Session, SessionId};
use pv_storage::{ApplicationStore, SessionStore};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// External collaborators, shared by every worker
#[derive(Clone)]
pub struct EngineDeps {
    pub git: Arc<dyn GitClient>,
    pub fetcher: Arc<dyn RepositoryFetcher>,
    pub commands: Arc<dyn CommandRunner>,
    pub ports: Arc<dyn PortRetriever>,
    pub http: Arc<dyn HttpProbe>,
}

pub(crate) struct Runtime<C: Clock> {
    pub(crate) config: EngineConfig,
    pub(crate) deps: EngineDeps,
    pub(crate) clock: C,
    pub(crate) sessions: SessionStore,
    pub(crate) applications: ApplicationStore,
    pub(crate) mediator: Mediator,
    pub(crate) contexts: ContextRegistry,
    /// Sessions with a running health-check poll loop
    pub(crate) healthchecks: Mutex<HashSet<SessionId>>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) tasks: TaskTracker,
}

impl<C: Clock> Runtime<C> {
    pub(crate) fn new(config: EngineConfig, deps: EngineDeps, clock: C, mediator: Mediator) -> Self {
        Self {
            config,
            deps,
            clock,
            sessions: SessionStore::new(),
            applications: ApplicationStore::new(),
            mediator,
            contexts: ContextRegistry::new(),
            healthchecks: Mutex::new(HashSet::new()),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Start one consumer loop per queue.
    pub(crate) fn spawn_workers(self: &Arc<Self>, rx: MediatorReceivers) {
        let MediatorReceivers {
            build_session,
            destroy_session,
            session_filesystem,
            clean_session,
            start_session,
            healthcheck_session,
            application_init,
            application_fetch,
        } = rx;

        let rt = Arc::clone(self);
        self.serve(build_session, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_build(req).await }
        });
        let rt = Arc::clone(self);
        self.serve(destroy_session, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_destroy(req) }
        });
        let rt = Arc::clone(self);
        self.serve(session_filesystem, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_filesystem(req).await }
        });
        let rt = Arc::clone(self);
        self.serve(clean_session, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_clean(req) }
        });
        let rt = Arc::clone(self);
        self.serve(start_session, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_start(req).await }
        });
        let rt = Arc::clone(self);
        self.serve(healthcheck_session, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_healthcheck(req) }
        });
        let rt = Arc::clone(self);
        self.serve(application_init, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_app_init(req).await }
        });
        let rt = Arc::clone(self);
        self.serve(application_fetch, move |req| {
            let rt = Arc::clone(&rt);
            async move { rt.handle_app_fetch(req).await }
        });
    }

    /// Consume `rx` until shutdown, answering each request with `handle`.
    fn serve<Req, Resp, F, Fut>(&self, mut rx: QueueReceiver<Req, Resp>, mut handle: F)
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: FnMut(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Resp> + Send,
    {
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            loop {
                let envelope: Envelope<Req, Resp> = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };
                let (request, responder) = envelope.into_parts();
                responder.send(handle(request).await);
            }
        });
    }

    /// Run `fut` on the engine's task tracker so shutdown can wait for it.
    pub(crate) fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(fut);
    }

    pub(crate) fn log(&self, session: &Session, level: LogLevel, message: impl Into<String>) {
        session.log(self.clock.epoch_ms(), level, message);
    }

    pub(crate) fn application_of(&self, session: &Session) -> Option<Arc<Application>> {
        self.applications.get(session.application())
    }
}
