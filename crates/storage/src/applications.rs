// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::StoreError;
use parking_lot::RwLock;
use pv_core::Application;
use std::sync::Arc;

/// Registered applications, in configuration order
#[derive(Default)]
pub struct ApplicationStore {
    inner: RwLock<Vec<Arc<Application>>>,
}

impl ApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, app: Arc<Application>) -> Result<(), StoreError> {
        let mut apps = self.inner.write();
        if apps.iter().any(|a| a.name() == app.name()) {
            return Err(StoreError::DuplicateApplication(app.name().to_string()));
        }
        apps.push(app);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Application>> {
        self.inner.read().iter().find(|a| a.name() == name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Application>> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
#[path = "applications_tests.rs"]
mod tests;
