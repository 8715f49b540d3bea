// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ActionRunner` capability: the only place `oja-engine` touches the
//! job-execution sandbox, and it doesn't touch it directly — subprocess
//! management lives behind this trait entirely (spec §1/§4.4).

use async_trait::async_trait;
use oja_core::{Action, ActionId};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn action {action_id}: {reason}")]
    SpawnFailed { action_id: ActionId, reason: String },
}

/// How a run ended, as reported back through a [`RunHandle`]'s outcome
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed(String),
    Canceled,
    /// Ran past its allotted time; the runtime reports this as Failed with
    /// a distinguishable message (spec §4.4).
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub status: RunStatus,
}

/// A started action in flight. `outcome` resolves exactly once, when the
/// runner considers the action terminal.
pub struct RunHandle {
    pub action_id: ActionId,
    pub outcome: oneshot::Receiver<RunOutcome>,
}

/// External capability that, given an Action and OS user, executes it as a
/// subprocess and reports lifecycle events back to the Session runtime
/// (GLOSSARY: ActionRunner). Object-safe so `SessionRuntime` can hold
/// `Arc<dyn ActionRunner>` without knowing the concrete sandbox.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn start(
        &self,
        action: &Action,
        os_user: &str,
        env: &HashMap<String, String>,
    ) -> Result<RunHandle, RunnerError>;

    /// Request cancellation of an in-flight run with the given grace
    /// period. Returns once the signal has been issued; the run's actual
    /// termination still arrives through `RunHandle::outcome`.
    async fn cancel(&self, action_id: &ActionId, grace: Duration);
}

#[cfg(test)]
#[path = "action_runner_tests.rs"]
mod tests;
