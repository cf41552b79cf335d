// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Start worker: makes a built session available and retires what it replaces

use super::Runtime;
use crate::mediator::{DestroyRequest, StartRequest, StartResult};
use pv_core::{ApplicationEvent, Clock, KillReason, LogLevel, SessionEvent, SessionStatus};
use std::sync::Arc;

impl<C: Clock> Runtime<C> {
    pub(crate) async fn handle_start(self: &Arc<Self>, req: StartRequest) -> StartResult {
        let session = req.session;
        match session.transition_from(&[SessionStatus::Starting], SessionStatus::Started) {
            Ok(true) => {}
            Ok(false) => return StartResult::Ignored(session.status()),
            Err(e) => {
                tracing::warn!(session = %session.id().short(8), error = %e, "start refused");
                return StartResult::Ignored(session.status());
            }
        }
        session.reset_startup_retries();
        session.touch();

        let now = self.clock.epoch_ms();
        session.update_metrics(|m| {
            m.build_duration_ms = m.build_started_at_ms.map(|at| now.saturating_sub(at));
            m.available_at_ms = Some(now);
            if m.time_to_available_ms.is_none() {
                m.time_to_available_ms = Some(now.saturating_sub(m.created_at_ms));
            }
        });
        self.log(&session, LogLevel::Info, format!("available on port {}", session.port()));
        tracing::info!(
            app = %session.application(),
            session = %session.id().short(8),
            port = session.port(),
            "session available"
        );
        if let Some(app) = self.application_of(&session) {
            app.publish(ApplicationEvent::SessionBuildSucceeded { session: session.id().clone() });
            if !session.watched() {
                self.arm_inactivity(Arc::clone(&session), app.config().recycle.inactivity_timeout);
            }
        }

        for old in session.replaces().iter().filter_map(|id| self.sessions.get_by_uuid(id)) {
            old.publish(SessionEvent::SessionReplaced { by: session.id().clone() });
            if !old.is_alive() {
                continue;
            }
            old.set_kill_reason(KillReason::Replaced);
            tracing::info!(
                session = %old.id().short(8),
                by = %session.id().short(8),
                "retiring replaced session"
            );
            let request = DestroyRequest::new(old.id().clone(), KillReason::Replaced);
            if let Err(e) = self.mediator.destroy_session.call(request).await {
                tracing::warn!(session = %old.id().short(8), error = %e, "destroy not enqueued");
            }
        }
        StartResult::Started
    }
}

#[cfg(test)]
#[path = "start_tests.rs"]
mod tests;
