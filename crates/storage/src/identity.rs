// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker identity file: the one piece of state that survives a
//! restart (spec §3: "Worker. Identity persisted across restarts").

use crate::atomic::atomic_write;
use crate::error::StorageError;
use oja_core::WorkerId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityFile {
    worker_id: String,
}

/// Loaded once at startup, written once after a successful `CreateWorker`,
/// read-only thereafter (spec §3 invariant: "a worker with persisted id
/// skips directly to AssumeFleetRoleForWorker").
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    path: PathBuf,
}

impl WorkerIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` when no identity has been persisted yet: the agent must run
    /// the full bootstrap workflow.
    pub fn load(&self) -> Result<Option<WorkerId>, StorageError> {
        load(&self.path)
    }

    pub fn save(&self, worker_id: &WorkerId) -> Result<(), StorageError> {
        let contents = serde_json::to_vec_pretty(&IdentityFile { worker_id: worker_id.as_str().into() })
            .map_err(|source| StorageError::Json { path: self.path.clone(), source })?;
        atomic_write(&self.path, &contents)
    }

    /// Removes the persisted identity, forcing the next [`load`](Self::load)
    /// to return `None` so the agent re-runs the full bootstrap workflow
    /// (spec §7: "NotFound (worker)" under the restart policy).
    pub fn clear(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|source| StorageError::Io { path: self.path.clone(), source })?;
        }
        Ok(())
    }
}

fn load(path: &Path) -> Result<Option<WorkerId>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    let identity: IdentityFile = serde_json::from_slice(&bytes)
        .map_err(|source| StorageError::Json { path: path.to_path_buf(), source })?;
    Ok(Some(WorkerId::new(identity.worker_id)))
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
