// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application init worker: base clone plus the periodic fetch loop

use super::Runtime;
use crate::error::EngineError;
use crate::mediator::{AppFetchRequest, AppInitRequest};
use pv_adapters::GitOptions;
use pv_core::{Application, ApplicationEvent, Clock, NotificationKind};
use std::sync::Arc;

impl<C: Clock> Runtime<C> {
    pub(crate) async fn handle_app_init(self: &Arc<Self>, req: AppInitRequest) -> Result<(), EngineError> {
        let app = self
            .applications
            .get(&req.application)
            .ok_or_else(|| EngineError::UnknownApplication(req.application.clone()))?;
        app.publish(ApplicationEvent::InitStarted);

        if let Err(reason) = self.prepare_base(&app).await {
            tracing::error!(app = %app.name(), error = %reason, "application init failed");
            app.notify(NotificationKind::CloneFailed, reason.clone(), self.clock.epoch_ms());
            app.publish(ApplicationEvent::InitFailed { error: reason.clone() });
            return Err(EngineError::Init { app: app.name().to_string(), reason });
        }
        app.clear_notification(NotificationKind::CloneFailed);
        app.publish(ApplicationEvent::InitCompleted);
        tracing::info!(app = %app.name(), "application initialized");

        self.spawn_fetch_loop(&app);
        Ok(())
    }

    async fn prepare_base(&self, app: &Application) -> Result<(), String> {
        let sessions = self.config.sessions_folder(app.name());
        tokio::fs::create_dir_all(&sessions)
            .await
            .map_err(|e| format!("cannot create {}: {e}", sessions.display()))?;

        let base = self.config.base_folder(app.name());
        if base.join(".git").exists() {
            return Ok(());
        }
        tracing::info!(app = %app.name(), remote = %app.config().remote, "cloning base repository");
        self.deps
            .git
            .clone_repo(None, &base, &app.config().remote, &GitOptions::default())
            .await
            .map_err(|e| e.to_string())
    }

    /// One non-watching fetch now, then a watching fetch every interval.
    fn spawn_fetch_loop(self: &Arc<Self>, app: &Application) {
        let rt = Arc::clone(self);
        let name = app.name().to_string();
        let interval = app.config().fetch.interval;
        self.spawn(async move {
            let mut watch = false;
            loop {
                let request = AppFetchRequest { application: name.clone(), watch };
                match rt.mediator.application_fetch.call(request).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!(app = %name, error = %e, "fetch failed"),
                    Err(_) => return,
                }
                if !rt.pause(interval).await {
                    return;
                }
                watch = true;
            }
        });
    }
}

#[cfg(test)]
#[path = "app_init_tests.rs"]
mod tests;
