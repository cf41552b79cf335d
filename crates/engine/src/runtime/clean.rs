// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clean worker: settles a failed build's status and kill reason

use super::Runtime;
use crate::mediator::{CleanRequest, CleanResult};
use pv_core::Clock;

impl<C: Clock> Runtime<C> {
    /// Idempotent: only an alive session that may enter the requested
    /// status is changed; anything stopping or finished keeps its status.
    pub(crate) fn handle_clean(&self, req: CleanRequest) -> CleanResult {
        let session = req.session;
        let status = session.status();
        if !status.is_alive() || !status.can_transition_to(req.status) {
            return CleanResult::Unchanged(status);
        }
        session.set_kill_reason_if_none(req.kill_reason);
        match session.transition_from(&[status], req.status) {
            Ok(true) => CleanResult::Cleaned,
            Ok(false) => CleanResult::Unchanged(session.status()),
            Err(e) => {
                tracing::warn!(session = %session.id().short(8), error = %e, "clean skipped");
                CleanResult::Unchanged(session.status())
            }
        }
    }
}

#[cfg(test)]
#[path = "clean_tests.rs"]
mod tests;
