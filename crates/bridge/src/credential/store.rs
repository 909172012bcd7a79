// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh-token persistence: a small JSON file with atomic writes.
//!
//! Loading never fails: a missing file is created empty and an unreadable or
//! corrupt file is logged and treated as empty. Save failures are logged and
//! swallowed; the only cost is an interactive login on the next start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;

/// The only durable state the bridge owns.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Fields written by other tools are carried through a save untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl std::fmt::Debug for PersistedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStorage")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Durable storage for [`PersistedStorage`].
pub trait TokenStore: Send + Sync {
    fn load(&self) -> PersistedStorage;
    fn save(&self, storage: &PersistedStorage);
}

/// [`TokenStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<PersistedStorage>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Some(PersistedStorage::default()));
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Write tmp + rename so a crash never leaves a truncated file behind.
    fn write(&self, storage: &PersistedStorage) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string(storage)?;
        let tmp_name = format!(
            "{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> PersistedStorage {
        debug!(path = %self.path.display(), "loading token storage");
        match self.read() {
            Ok(Some(storage)) => storage,
            Ok(None) => {
                debug!(path = %self.path.display(), "no storage file found, creating");
                if let Err(e) = self.write(&PersistedStorage::default()) {
                    warn!(path = %self.path.display(), err = %e, "failed to create storage file");
                }
                PersistedStorage::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), err = %e, "ignoring unreadable storage file");
                PersistedStorage::default()
            }
        }
    }

    fn save(&self, storage: &PersistedStorage) {
        debug!(path = %self.path.display(), "saving token storage");
        match self.write(storage) {
            Ok(()) => debug!("token storage saved"),
            Err(e) => warn!(path = %self.path.display(), err = %e, "failed to save token storage"),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
