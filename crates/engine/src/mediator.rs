// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed request queues between engine workers.
//!
//! Every queue is a single-slot channel with exactly one consumer loop, so a
//! producer waits until the worker is ready for it. A request may carry a
//! reply slot; fire-and-forget senders leave it empty.

use crate::error::{EngineError, FilesystemError};
use pv_core::{HealthcheckConfig, KillReason, Session, SessionId, SessionStatus};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A request plus the optional slot its answer goes to
pub struct Envelope<Req, Resp> {
    pub request: Req,
    reply: Option<oneshot::Sender<Resp>>,
}

impl<Req, Resp> Envelope<Req, Resp> {
    pub fn into_parts(self) -> (Req, Responder<Resp>) {
        (self.request, Responder(self.reply))
    }
}

/// Reply half of an [`Envelope`] split with `into_parts`
pub struct Responder<Resp>(Option<oneshot::Sender<Resp>>);

impl<Resp> Responder<Resp> {
    /// Answer the sender. Dropped silently when nobody is waiting.
    pub fn send(self, response: Resp) {
        if let Some(tx) = self.0 {
            let _ = tx.send(response);
        }
    }
}

pub type QueueReceiver<Req, Resp> = mpsc::Receiver<Envelope<Req, Resp>>;

pub struct Queue<Req, Resp> {
    name: &'static str,
    tx: mpsc::Sender<Envelope<Req, Resp>>,
}

impl<Req, Resp> Clone for Queue<Req, Resp> {
    fn clone(&self) -> Self {
        Self { name: self.name, tx: self.tx.clone() }
    }
}

impl<Req, Resp> fmt::Debug for Queue<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("name", &self.name).finish()
    }
}

impl<Req, Resp> Queue<Req, Resp> {
    pub fn new(name: &'static str) -> (Self, QueueReceiver<Req, Resp>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { name, tx }, rx)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue and wait for the worker's answer.
    pub async fn call(&self, request: Req) -> Result<Resp, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply: Some(reply) })
            .await
            .map_err(|_| EngineError::QueueClosed(self.name))?;
        rx.await.map_err(|_| EngineError::QueueClosed(self.name))
    }

    /// Enqueue without waiting for an answer.
    pub async fn send(&self, request: Req) -> Result<(), EngineError> {
        self.tx
            .send(Envelope { request, reply: None })
            .await
            .map_err(|_| EngineError::QueueClosed(self.name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
    pub application: String,
    /// Branch, tag or commit (full or abbreviated)
    pub checkout: String,
    /// Failed session to recycle for a retry
    pub previous: Option<SessionId>,
    /// Sessions the new one retires once it is available
    pub replaces: Vec<SessionId>,
    /// Record the branch or tag pointing at the resolved commit as the checkout
    pub detect_branch_or_tag: bool,
    /// Also retire every other session of this checkout built from another
    /// commit, including failed ones still waiting for a retry
    pub supersede: bool,
}

impl BuildRequest {
    pub fn new(application: impl Into<String>, checkout: impl Into<String>) -> Self {
        Self { application: application.into(), checkout: checkout.into(), ..Self::default() }
    }

    pub fn retry(session: &Session) -> Self {
        Self {
            application: session.application().to_string(),
            checkout: session.checkout(),
            previous: Some(session.id().clone()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub enum BuildResult {
    /// A build was started for this session (fresh or recycled)
    Accepted(Arc<Session>),
    /// An alive session already serves the commit
    Existing(Arc<Session>),
    Failed(EngineError),
}

impl BuildResult {
    pub fn session(&self) -> Option<&Arc<Session>> {
        match self {
            BuildResult::Accepted(s) | BuildResult::Existing(s) => Some(s),
            BuildResult::Failed(_) => None,
        }
    }
}

/// Runs once teardown has settled the session's final status
pub type DestroyCallback = Box<dyn FnOnce(Arc<Session>) + Send + 'static>;

pub struct DestroyRequest {
    pub session: SessionId,
    /// Recorded unless the session already has a kill reason
    pub kill_reason: KillReason,
    pub callback: Option<DestroyCallback>,
}

impl DestroyRequest {
    pub fn new(session: SessionId, kill_reason: KillReason) -> Self {
        Self { session, kill_reason, callback: None }
    }

    pub fn on_done(mut self, callback: impl FnOnce(Arc<Session>) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for DestroyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyRequest")
            .field("session", &self.session)
            .field("kill_reason", &self.kill_reason)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyResult {
    /// The session is stopping; teardown continues in the background
    Accepted,
    NotAlive(SessionStatus),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct FilesystemRequest {
    pub session: Arc<Session>,
}

pub type FilesystemResult = Result<PathBuf, FilesystemError>;

#[derive(Debug, Clone)]
pub struct CleanRequest {
    pub session: Arc<Session>,
    pub status: SessionStatus,
    pub kill_reason: KillReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanResult {
    Cleaned,
    /// Session was already past the point of cleaning; carries its status
    Unchanged(SessionStatus),
}

#[derive(Debug, Clone)]
pub struct StartRequest {
    pub session: Arc<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartResult {
    Started,
    /// Only `starting` sessions can be started
    Ignored(SessionStatus),
}

#[derive(Debug, Clone)]
pub struct HealthcheckRequest {
    pub session: Arc<Session>,
    pub config: HealthcheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthcheckResult {
    Registered,
    AlreadyRegistered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInitRequest {
    pub application: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppFetchRequest {
    pub application: String,
    /// Detect ref changes and trigger hot-swaps and auto-starts
    pub watch: bool,
}

/// What a fetch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub errors: Vec<String>,
    /// The refs were left untouched because of a critical error
    pub critical: bool,
    pub hot_swaps: Vec<String>,
    pub auto_starts: Vec<String>,
}

pub type FetchResult = Result<FetchOutcome, EngineError>;

/// Producer side of every engine queue
#[derive(Clone, Debug)]
pub struct Mediator {
    pub build_session: Queue<BuildRequest, BuildResult>,
    pub destroy_session: Queue<DestroyRequest, DestroyResult>,
    pub session_filesystem: Queue<FilesystemRequest, FilesystemResult>,
    pub clean_session: Queue<CleanRequest, CleanResult>,
    pub start_session: Queue<StartRequest, StartResult>,
    pub healthcheck_session: Queue<HealthcheckRequest, HealthcheckResult>,
    pub application_init: Queue<AppInitRequest, Result<(), EngineError>>,
    pub application_fetch: Queue<AppFetchRequest, FetchResult>,
}

/// Consumer side, handed to the worker loops once
pub struct MediatorReceivers {
    pub build_session: QueueReceiver<BuildRequest, BuildResult>,
    pub destroy_session: QueueReceiver<DestroyRequest, DestroyResult>,
    pub session_filesystem: QueueReceiver<FilesystemRequest, FilesystemResult>,
    pub clean_session: QueueReceiver<CleanRequest, CleanResult>,
    pub start_session: QueueReceiver<StartRequest, StartResult>,
    pub healthcheck_session: QueueReceiver<HealthcheckRequest, HealthcheckResult>,
    pub application_init: QueueReceiver<AppInitRequest, Result<(), EngineError>>,
    pub application_fetch: QueueReceiver<AppFetchRequest, FetchResult>,
}

impl Mediator {
    pub fn new() -> (Self, MediatorReceivers) {
        let (build_session, build_rx) = Queue::new("build_session");
        let (destroy_session, destroy_rx) = Queue::new("destroy_session");
        let (session_filesystem, filesystem_rx) = Queue::new("session_filesystem");
        let (clean_session, clean_rx) = Queue::new("clean_session");
        let (start_session, start_rx) = Queue::new("start_session");
        let (healthcheck_session, healthcheck_rx) = Queue::new("healthcheck_session");
        let (application_init, init_rx) = Queue::new("application_init");
        let (application_fetch, fetch_rx) = Queue::new("application_fetch");
        (
            Self {
                build_session,
                destroy_session,
                session_filesystem,
                clean_session,
                start_session,
                healthcheck_session,
                application_init,
                application_fetch,
            },
            MediatorReceivers {
                build_session: build_rx,
                destroy_session: destroy_rx,
                session_filesystem: filesystem_rx,
                clean_session: clean_rx,
                start_session: start_rx,
                healthcheck_session: healthcheck_rx,
                application_init: init_rx,
                application_fetch: fetch_rx,
            },
        )
    }
}

#[cfg(test)]
#[path = "mediator_tests.rs"]
mod tests;
