// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration file: the knobs spec.md leaves as open questions,
//! resolved here with explicit defaults (see DESIGN.md).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file at {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What the agent does when `UpdateWorkerSchedule`/`UpdateWorker` comes back
/// `NotFound` for this worker (spec §7: "re-run startup workflow or exit
/// (configurable)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerNotFoundPolicy {
    /// Discard the persisted worker id and re-run the bootstrap workflow,
    /// re-registering under a new one.
    #[default]
    Restart,
    /// Exit the process and leave re-registration to whatever manages it
    /// externally (a supervisor, an autoscaling group, a systemd unit).
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `DeleteWorker` on a clean, operator-triggered shutdown rather than
    /// leaving the worker STOPPED for the service to reap on its own
    /// schedule.
    pub delete_worker_on_shutdown: bool,
    /// Attempts before a `BatchGetJobEntity` call gives up on a requested
    /// entity and fails the Session Actions that needed it.
    pub entity_retry_limit: u32,
    /// Keep Session-scoped temporary directories after teardown instead of
    /// deleting them (spec §4.4: "deleted unless the agent is configured to
    /// retain them").
    pub retain_session_dirs: bool,
    /// What to do when the service no longer recognizes this worker.
    pub worker_not_found_policy: WorkerNotFoundPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delete_worker_on_shutdown: false,
            entity_retry_limit: 3,
            retain_session_dirs: false,
            worker_not_found_policy: WorkerNotFoundPolicy::Restart,
        }
    }
}

impl Config {
    /// Loads `path` if given, falling back to all-defaults otherwise — a
    /// config file is convenience, not a requirement, since every knob it
    /// carries has a documented default.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else { return Ok(Self::default()) };
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let config: Config = toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_retry_limit == 0 {
            return Err(ConfigError::Invalid("entity_retry_limit must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
