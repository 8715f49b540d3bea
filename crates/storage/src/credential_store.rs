// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential file stores (spec §3/§6): a single JSON file for the agent's
//! own credentials, and a per-queue subdirectory for queue credentials plus
//! the AWS config/credentials-process file pair subprocesses read.

use crate::atomic::atomic_write;
use crate::error::StorageError;
use oja_core::credentials::CredentialSet;
use std::path::{Path, PathBuf};

fn read_set(path: &Path) -> Result<CredentialSet, StorageError> {
    let bytes = std::fs::read(path).map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Json { path: path.to_path_buf(), source })
}

fn write_set(path: &Path, set: &CredentialSet) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(set)
        .map_err(|source| StorageError::Json { path: path.to_path_buf(), source })?;
    atomic_write(path, &bytes)
}

/// Single JSON file holding the agent's own credentials.
#[derive(Debug, Clone)]
pub struct AgentCredentialStore {
    path: PathBuf,
}

impl AgentCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write_atomic(&self, set: &CredentialSet) -> Result<(), StorageError> {
        write_set(&self.path, set)
    }

    pub fn read(&self) -> Result<CredentialSet, StorageError> {
        read_set(&self.path)
    }
}

/// Per-queue subdirectory: `credentials.json`, the AWS `config`/`credentials`
/// text files pointing at a credential-process, and the credential-process
/// script itself. Only the JSON ever needs atomic replace — the process
/// re-execs the script on every read, so the script and text files are
/// written once, at creation.
#[derive(Debug, Clone)]
pub struct QueueCredentialStore {
    dir: PathBuf,
}

impl QueueCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn json_path(&self) -> PathBuf {
        self.dir.join("credentials.json")
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join("config")
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join("credentials")
    }

    fn script_path(&self) -> PathBuf {
        self.dir.join("credential-process.sh")
    }

    pub fn env_vars(&self) -> [(&'static str, PathBuf); 2] {
        [("AWS_CONFIG_FILE", self.config_path()), ("AWS_SHARED_CREDENTIALS_FILE", self.credentials_path())]
    }

    /// Create the subdirectory and write the script/text files once, plus
    /// the initial JSON.
    pub fn create(&self, profile: &str, set: &CredentialSet) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|source| StorageError::Io { path: self.dir.clone(), source })?;

        let script = self.script_path();
        let script_contents =
            format!("#!/bin/sh\nexec cat {}\n", self.json_path().to_string_lossy());
        std::fs::write(&script, script_contents)
            .map_err(|source| StorageError::Io { path: script.clone(), source })?;
        set_executable(&script)?;

        let config_contents =
            format!("[profile {profile}]\ncredential_process = {}\n", script.to_string_lossy());
        std::fs::write(self.config_path(), config_contents)
            .map_err(|source| StorageError::Io { path: self.config_path(), source })?;

        std::fs::write(self.credentials_path(), format!("[{profile}]\n"))
            .map_err(|source| StorageError::Io { path: self.credentials_path(), source })?;

        self.write_atomic(set)
    }

    pub fn write_atomic(&self, set: &CredentialSet) -> Result<(), StorageError> {
        write_set(&self.json_path(), set)
    }

    pub fn read(&self) -> Result<CredentialSet, StorageError> {
        read_set(&self.json_path())
    }

    /// Remove the whole subdirectory: called when the last Session for this
    /// queue ends (spec §4.2).
    pub fn purge(&self) -> Result<(), StorageError> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .map_err(|source| StorageError::Io { path: self.dir.clone(), source })?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)
        .map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?
        .permissions();
    perms.set_mode(0o700);
    std::fs::set_permissions(path, perms)
        .map_err(|source| StorageError::Io { path: path.to_path_buf(), source })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

#[cfg(test)]
#[path = "credential_store_tests.rs"]
mod tests;
