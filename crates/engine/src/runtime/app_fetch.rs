// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application fetch worker: ref refresh, hot-swap and auto-start.
//!
//! Only watching fetches compare refs with what was observed before. The
//! watch set is the configured refs plus every ref an alive session was
//! built from.

use super::Runtime;
use crate::error::EngineError;
use crate::mediator::{AppFetchRequest, BuildRequest, BuildResult, FetchOutcome, FetchResult};
use pv_core::{Application, ApplicationEvent, Clock, NotificationKind};
use std::collections::BTreeSet;
use std::sync::Arc;

impl<C: Clock> Runtime<C> {
    pub(crate) async fn handle_app_fetch(&self, req: AppFetchRequest) -> FetchResult {
        let app = self
            .applications
            .get(&req.application)
            .ok_or_else(|| EngineError::UnknownApplication(req.application.clone()))?;
        app.publish(ApplicationEvent::FetchStarted);

        let base = self.config.base_folder(app.name());
        let (refs, errors) = self.deps.fetcher.fetch(&base).await;
        let mut outcome = FetchOutcome {
            errors: errors.iter().map(|e| e.message.clone()).collect(),
            critical: errors.iter().any(|e| e.critical),
            ..FetchOutcome::default()
        };
        for error in &errors {
            tracing::warn!(app = %app.name(), critical = error.critical, error = %error.message, "fetch problem");
        }

        if let Some(critical) = errors.iter().find(|e| e.critical) {
            app.notify(NotificationKind::FetchFailed, critical.message.clone(), self.clock.epoch_ms());
            app.publish(ApplicationEvent::FetchFailed { error: critical.message.clone() });
        } else {
            app.clear_notification(NotificationKind::FetchFailed);
            app.set_refs(refs);
            if req.watch {
                self.detect_changes(&app, &mut outcome).await;
            }
        }

        app.publish(ApplicationEvent::FetchCompleted);
        Ok(outcome)
    }

    async fn detect_changes(&self, app: &Arc<Application>, outcome: &mut FetchOutcome) {
        let refs = app.refs();
        let mut watched: BTreeSet<String> = app.config().watch.iter().cloned().collect();
        watched.extend(
            self.sessions
                .by_application(app.name())
                .into_iter()
                .filter(|s| s.is_alive())
                .map(|s| s.checkout())
                .filter(|checkout| refs.is_ref(checkout)),
        );

        for name in watched {
            let Some(commit) = refs.resolve(&name) else {
                continue;
            };
            if !app.observe(&name, &commit) {
                continue;
            }

            let alive = self.sessions.alive_by_application_checkout(app.name(), &name);
            if alive.iter().any(|s| s.commit() == commit) {
                continue;
            }

            let mut request = BuildRequest::new(app.name(), name.clone());
            request.supersede = true;
            if alive.is_empty() {
                if let Some(latest) = self.sessions.latest_by_application_checkout(app.name(), &name) {
                    if latest.commit() == commit && latest.kill_reason().prevents_rebuild() {
                        continue;
                    }
                }
                tracing::info!(app = %app.name(), checkout = %name, commit = %pv_core::short(&commit, 8), "auto-start");
                app.publish(ApplicationEvent::AutoStart { checkout: name.clone(), commit: commit.clone() });
                outcome.auto_starts.push(name.clone());
            } else {
                request.replaces = alive.iter().map(|s| s.id().clone()).collect();
                tracing::info!(app = %app.name(), checkout = %name, commit = %pv_core::short(&commit, 8), "hot-swap");
                app.publish(ApplicationEvent::HotSwap {
                    checkout: name.clone(),
                    commit: commit.clone(),
                    replaces: request.replaces.clone(),
                });
                outcome.hot_swaps.push(name.clone());
            }

            match self.mediator.build_session.call(request).await {
                Ok(BuildResult::Failed(e)) => {
                    tracing::warn!(app = %app.name(), checkout = %name, error = %e, "automatic build rejected");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(app = %app.name(), error = %e, "build not enqueued");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "app_fetch_tests.rs"]
mod tests;
