// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inactivity expiry for unwatched sessions

use super::Runtime;
use crate::mediator::DestroyRequest;
use pv_core::{Clock, KillReason, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

impl<C: Clock> Runtime<C> {
    /// Destroy `session` once no traffic has been recorded for `window`.
    ///
    /// The timer re-arms from the last access each time it fires, so
    /// traffic recorded while it sleeps pushes expiry back.
    pub(crate) fn arm_inactivity(self: &Arc<Self>, session: Arc<Session>, window: Duration) {
        let rt = Arc::clone(self);
        self.spawn(async move {
            loop {
                let deadline = session.last_access() + window;
                tokio::select! {
                    _ = rt.shutdown.cancelled() => return,
                    _ = tokio::time::sleep_until(deadline) => {}
                }
                if !session.is_alive() {
                    return;
                }
                if session.last_access() + window <= Instant::now() {
                    break;
                }
            }
            tracing::info!(session = %session.id().short(8), "session expired after inactivity");
            let request = DestroyRequest::new(session.id().clone(), KillReason::Stopped);
            if let Err(e) = rt.mediator.destroy_session.send(request).await {
                tracing::warn!(session = %session.id().short(8), error = %e, "destroy not enqueued");
            }
        });
    }
}
