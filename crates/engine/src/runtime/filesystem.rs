// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session folder preparation.
//!
//! Requests are handled one at a time: the copy strategy resets the shared
//! base clone, so two preparations of the same application must not overlap.

use super::Runtime;
use crate::config::FilesystemStrategy;
use crate::error::FilesystemError;
use crate::mediator::{FilesystemRequest, FilesystemResult};
use pv_adapters::GitOptions;
use pv_core::{Clock, LogLevel};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

impl<C: Clock> Runtime<C> {
    pub(crate) async fn handle_filesystem(&self, req: FilesystemRequest) -> FilesystemResult {
        let session = req.session;
        let app = session.application().to_string();
        let base = self.config.base_folder(&app);
        let out = session.folder();
        let commit = session.commit();
        let opts = GitOptions::default();

        tracing::info!(
            session = %session.id().short(8),
            strategy = %self.config.filesystem,
            folder = %out.display(),
            "preparing session folder"
        );
        if out.exists() {
            tokio::fs::remove_dir_all(&out).await.map_err(FilesystemError::io(&out))?;
        }
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(FilesystemError::io(parent))?;
        }

        match self.config.filesystem {
            FilesystemStrategy::Copy => {
                self.deps.git.hard_reset(&base, &commit, &opts).await?;
                let (from, to) = (base.clone(), out.clone());
                tokio::task::spawn_blocking(move || copy_tree(&from, &to))
                    .await
                    .map_err(|e| FilesystemError::Copy(e.to_string()))??;
            }
            FilesystemStrategy::Clone => {
                let remote = self
                    .application_of(&session)
                    .map(|a| a.config().remote.clone())
                    .unwrap_or_default();
                self.deps.git.clone_repo(Some(&base), &out, &remote, &opts).await?;
                self.deps.git.fetch_all(&out, &opts).await?;
                self.deps.git.hard_reset(&out, &commit, &opts).await?;
            }
        }
        self.log(&session, LogLevel::Info, format!("prepared {}", out.display()));
        Ok(out)
    }
}

/// Copy the working tree at `from` into `to`, skipping `.git`.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(to).map_err(FilesystemError::io(to))?;
    let walker = WalkDir::new(from).min_depth(1).into_iter().filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| FilesystemError::Copy(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| FilesystemError::Copy(e.to_string()))?;
        let target: PathBuf = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(FilesystemError::io(&target))?;
        } else if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path()).map_err(FilesystemError::io(entry.path()))?;
            symlink(&link, &target).map_err(FilesystemError::io(&target))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(FilesystemError::io(&target))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::copy(original, link).map(|_| ())
}

#[cfg(test)]
#[path = "filesystem_tests.rs"]
mod tests;
