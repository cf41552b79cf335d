// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destroy worker.
//!
//! The loop only flips the session to `stopping` and cancels its build;
//! stop and clean commands run in a teardown task bounded by the destroy
//! timeout so one slow teardown never holds up the queue.

use super::commands::Guard;
use super::{RunError, Runtime};
use crate::context::BUILD;
use crate::mediator::{DestroyCallback, DestroyRequest, DestroyResult};
use pv_core::{ApplicationConfig, Clock, LogLevel, Session, SessionStatus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

impl<C: Clock> Runtime<C> {
    pub(crate) fn handle_destroy(self: &Arc<Self>, req: DestroyRequest) -> DestroyResult {
        let Some(session) = self.sessions.get_by_uuid(&req.session) else {
            return DestroyResult::NotFound;
        };
        if !session.is_alive() {
            return DestroyResult::NotAlive(session.status());
        }
        session.set_kill_reason_if_none(req.kill_reason);
        let was_available = session.metrics().available_at_ms.is_some();
        if let Err(e) = session.transition(SessionStatus::Stopping) {
            tracing::warn!(session = %session.id().short(8), error = %e, "destroy refused");
            return DestroyResult::NotAlive(session.status());
        }
        self.contexts.cancel(session.id(), BUILD);
        tracing::info!(
            session = %session.id().short(8),
            reason = %session.kill_reason(),
            "stopping session"
        );

        let rt = Arc::clone(self);
        self.spawn(async move { rt.teardown(session, was_available, req.callback).await });
        DestroyResult::Accepted
    }

    async fn teardown(&self, session: Arc<Session>, was_available: bool, callback: Option<DestroyCallback>) {
        let outcome = match self.application_of(&session) {
            Some(app) => {
                let config = app.config().for_checkout(&session.checkout());
                match tokio::time::timeout(self.config.destroy_timeout, self.stop_and_clean(&session, &config)).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err("teardown timed out".to_string()),
                }
            }
            None => Ok(()),
        };

        let final_status = match &outcome {
            Err(e) => {
                self.log(&session, LogLevel::Error, format!("stop failed: {e}"));
                SessionStatus::StopFailed
            }
            Ok(()) if was_available => SessionStatus::Stopped,
            Ok(()) => SessionStatus::StartFailed,
        };
        let now = self.clock.epoch_ms();
        session.update_metrics(|m| m.stopped_at_ms = Some(now));
        if let Err(e) = session.transition(final_status) {
            tracing::warn!(session = %session.id().short(8), error = %e, "final transition refused");
        }
        tracing::info!(session = %session.id().short(8), status = %session.status(), "session torn down");

        if let Some(callback) = callback {
            callback(session);
        }
    }
}

impl<C: Clock> Runtime<C> {
    /// Stop commands, then clean commands and folder removal. Cleaning runs
    /// even when a stop command failed; the first error is returned.
    async fn stop_and_clean(&self, session: &Arc<Session>, config: &ApplicationConfig) -> Result<(), RunError> {
        let stopped = if session.folder().exists() {
            self.run_commands(session, config, &config.stop, &CancellationToken::new(), Guard::Always)
                .await
        } else {
            Ok(())
        };
        let cleaned = self.cleanup_folder(session, config).await;
        stopped.and(cleaned)
    }
}

#[cfg(test)]
#[path = "destroy_tests.rs"]
mod tests;
