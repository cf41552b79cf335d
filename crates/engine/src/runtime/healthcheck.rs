// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health-check worker.
//!
//! Registering a session starts one poll loop for it; the loop runs until
//! the session is no longer alive or it gives up after too many failures.

use super::Runtime;
use crate::mediator::{DestroyRequest, HealthcheckRequest, HealthcheckResult, StartRequest};
use pv_adapters::HttpRequest;
use pv_core::template::interpolate;
use pv_core::{Clock, HealthcheckConfig, KillReason, LogLevel, Session, SessionEvent, SessionStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Request against the session's port with `${...}` placeholders filled in
pub(crate) fn probe_request(
    session: &Session,
    path: &str,
    headers: &BTreeMap<String, String>,
    host: Option<&str>,
    timeout: Duration,
) -> HttpRequest {
    let vars = session.variables();
    let path = interpolate(path, &vars);
    let sep = if path.starts_with('/') { "" } else { "/" };
    let mut request = HttpRequest::get(format!("http://127.0.0.1:{}{sep}{path}", session.port()), timeout);
    request.headers = headers.iter().map(|(k, v)| (k.clone(), interpolate(v, &vars))).collect();
    request.host = host.map(|h| interpolate(h, &vars));
    request
}

impl<C: Clock> Runtime<C> {
    pub(crate) fn handle_healthcheck(self: &Arc<Self>, req: HealthcheckRequest) -> HealthcheckResult {
        let session = req.session;
        if !self.healthchecks.lock().insert(session.id().clone()) {
            return HealthcheckResult::AlreadyRegistered;
        }
        session.publish(SessionEvent::HealthcheckStarted);
        tracing::debug!(session = %session.id().short(8), path = %req.config.path, "health check registered");

        let rt = Arc::clone(self);
        self.spawn(async move {
            let gave_up = rt.poll_health(&session, &req.config).await;
            // Deregister first so a retry of this session can register again
            rt.healthchecks.lock().remove(session.id());
            if gave_up {
                rt.give_up_health(&session).await;
            }
        });
        HealthcheckResult::Registered
    }

    /// Poll until the session dies or shutdown. Returns true when the
    /// failure budget ran out.
    async fn poll_health(&self, session: &Arc<Session>, config: &HealthcheckConfig) -> bool {
        if !self.pause(config.initial_delay).await {
            return false;
        }
        let max_failures = config.max_retries.max(1);
        let mut failures = 0;
        let mut start_requested = false;

        while session.is_alive() {
            let request = probe_request(
                session,
                &config.path,
                &config.headers,
                config.host.as_deref(),
                config.retry_timeout,
            );
            let error = match self.deps.http.request(request).await {
                Ok(status) if status == config.status => None,
                Ok(status) => Some(format!("status {status}, expected {}", config.status)),
                Err(e) => Some(e.to_string()),
            };

            match error {
                None => {
                    failures = 0;
                    match session.status() {
                        SessionStatus::Starting if !start_requested => {
                            start_requested = true;
                            session.publish(SessionEvent::HealthcheckSucceeded);
                            let request = StartRequest { session: Arc::clone(session) };
                            if let Err(e) = self.mediator.start_session.call(request).await {
                                tracing::warn!(session = %session.id().short(8), error = %e, "start not enqueued");
                                return false;
                            }
                        }
                        SessionStatus::Degraded => {
                            if let Err(e) = session.transition_from(&[SessionStatus::Degraded], SessionStatus::Started) {
                                tracing::debug!(session = %session.id().short(8), error = %e, "recovery skipped");
                            }
                        }
                        _ => {}
                    }
                }
                Some(error) => {
                    failures += 1;
                    tracing::info!(session = %session.id().short(8), failures, error = %error, "health check failed");
                    self.log(session, LogLevel::Warn, format!("health check failed ({failures}/{max_failures}): {error}"));
                    session.publish(SessionEvent::HealthcheckFailed { failures, error });
                    if let Err(e) = session.transition_from(&[SessionStatus::Started], SessionStatus::Degraded) {
                        tracing::debug!(session = %session.id().short(8), error = %e, "degrade skipped");
                    }
                    if failures >= max_failures {
                        return true;
                    }
                }
            }

            if !self.pause(config.retry_interval).await {
                return false;
            }
        }
        false
    }

    /// Destroy a session whose health check kept failing. A session that
    /// never became available is retried through the build worker.
    async fn give_up_health(self: &Arc<Self>, session: &Arc<Session>) {
        let never_started = session.status() == SessionStatus::Starting;
        let mut request = DestroyRequest::new(session.id().clone(), KillReason::Stopped);
        if never_started {
            session.set_kill_reason_if_none(KillReason::HealthcheckFailed);
            let rt = Arc::clone(self);
            request = request.on_done(move |session| {
                let task = Arc::clone(&rt);
                rt.spawn(async move { task.after_failure(&session, true).await });
            });
        }
        tracing::warn!(session = %session.id().short(8), never_started, "health check gave up");
        if let Err(e) = self.mediator.destroy_session.send(request).await {
            tracing::warn!(session = %session.id().short(8), error = %e, "destroy not enqueued");
        }
    }

    /// Sleep unless shutting down. Returns false on shutdown.
    pub(crate) async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
#[path = "healthcheck_tests.rs"]
mod tests;
