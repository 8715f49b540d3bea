// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ProcessActionRunner`: the real (if deliberately narrow) `ActionRunner`,
//! grounded in the teacher's coop spawn-then-reap pattern — spawn a child,
//! hand the wait off to a detached reaper task, and signal it on cancel
//! rather than blocking the caller for the process's lifetime.

use async_trait::async_trait;
use oja_core::{Action, ActionId, ActionKind};
use oja_engine::{ActionRunner, RunHandle, RunOutcome, RunStatus, RunnerError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Resolves an Action to the argv it should run. The real job sandbox — the
/// thing that actually knows how to turn a `TaskRun`'s step/task ids into a
/// script, or an `EnvEnter`'s env id into setup commands — is out of scope
/// for this agent (spec §1); this trait is the seam a production deployment
/// plugs a sandbox into.
pub trait CommandResolver: Send + Sync {
    /// Returns `program` followed by its arguments. An empty vec fails the
    /// action with `RunnerError::SpawnFailed`.
    fn resolve(&self, action: &Action) -> Vec<String>;
}

/// A `CommandResolver` that runs a fixed shell command per `ActionKind`,
/// regardless of which step/task/env the Action names. Good enough to drive
/// a real process through spawn/exit/cancel for local runs and integration
/// tests; not a sandbox.
#[derive(Debug, Clone)]
pub struct ShellCommandResolver {
    pub env_enter_command: String,
    pub task_run_command: String,
    pub env_exit_command: String,
}

impl Default for ShellCommandResolver {
    fn default() -> Self {
        Self {
            env_enter_command: "true".into(),
            task_run_command: "true".into(),
            env_exit_command: "true".into(),
        }
    }
}

impl CommandResolver for ShellCommandResolver {
    fn resolve(&self, action: &Action) -> Vec<String> {
        let command = match &action.kind {
            // Handled as an immediate success before `start` ever consults
            // the resolver; included here only so the match stays exhaustive.
            ActionKind::SyncInputJobAttachments => "true",
            ActionKind::EnvEnter { .. } => self.env_enter_command.as_str(),
            ActionKind::TaskRun { .. } => self.task_run_command.as_str(),
            ActionKind::EnvExit { .. } => self.env_exit_command.as_str(),
        };
        vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()]
    }
}

/// The live pid behind an in-flight Action, cleared once its reaper task
/// observes exit. Held separately from the `oneshot` so `cancel` can signal
/// a process without racing the reaper for ownership of the `Child`.
struct Tracked {
    pid: Mutex<Option<nix::unistd::Pid>>,
}

/// `ActionRunner` backed by real child processes (spec §4.4). Does not
/// impersonate `os_user` — that's the sandbox's job — but forwards it via
/// `OJA_OS_USER` so a resolver-supplied command can act on it if it chooses
/// to.
pub struct ProcessActionRunner<R: CommandResolver> {
    resolver: R,
    running: Arc<Mutex<HashMap<ActionId, Arc<Tracked>>>>,
}

impl<R: CommandResolver> ProcessActionRunner<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver, running: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl ProcessActionRunner<ShellCommandResolver> {
    /// A runner good for local exploration: every action kind runs `true`.
    pub fn with_default_resolver() -> Self {
        Self::new(ShellCommandResolver::default())
    }
}

/// Whether `status` looks like the process was terminated by a signal we
/// sent it (as opposed to failing on its own), so `cancel`'s SIGTERM/SIGKILL
/// surfaces as `Canceled` rather than `Failed`.
fn was_signaled(status: &std::process::ExitStatus) -> bool {
    status.signal().is_some()
}

#[async_trait]
impl<R: CommandResolver + 'static> ActionRunner for ProcessActionRunner<R> {
    async fn start(
        &self,
        action: &Action,
        os_user: &str,
        env: &HashMap<String, String>,
    ) -> Result<RunHandle, RunnerError> {
        if matches!(action.kind, ActionKind::SyncInputJobAttachments) {
            // File-attachment sync is explicitly out of scope (spec §1); a
            // no-op success lets the pipeline exercise end-to-end.
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(RunOutcome { exit_code: Some(0), status: RunStatus::Succeeded });
            return Ok(RunHandle { action_id: action.action_id.clone(), outcome: rx });
        }

        let argv = self.resolver.resolve(action);
        let Some((program, args)) = argv.split_first() else {
            return Err(RunnerError::SpawnFailed {
                action_id: action.action_id.clone(),
                reason: "command resolver returned an empty argv".into(),
            });
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .envs(env)
            .env("OJA_OS_USER", os_user)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| RunnerError::SpawnFailed {
            action_id: action.action_id.clone(),
            reason: source.to_string(),
        })?;

        let pid = child.id().map(|id| nix::unistd::Pid::from_raw(id as i32));
        let tracked = Arc::new(Tracked { pid: Mutex::new(pid) });
        self.running.lock().insert(action.action_id.clone(), Arc::clone(&tracked));

        let (tx, rx) = oneshot::channel();
        let action_id = action.action_id.clone();
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let outcome = match child.wait_with_output().await {
                Ok(output) => {
                    let exit_code = output.status.code();
                    if output.status.success() {
                        RunOutcome { exit_code, status: RunStatus::Succeeded }
                    } else if was_signaled(&output.status) {
                        RunOutcome { exit_code, status: RunStatus::Canceled }
                    } else {
                        RunOutcome { exit_code, status: RunStatus::Failed(format!("exited with {}", output.status)) }
                    }
                }
                Err(e) => {
                    tracing::error!(%action_id, error = %e, "failed to wait on child process");
                    RunOutcome { exit_code: None, status: RunStatus::Failed(format!("wait failed: {e}")) }
                }
            };
            *tracked.pid.lock() = None;
            running.lock().remove(&action_id);
            let _ = tx.send(outcome);
        });

        Ok(RunHandle { action_id: action.action_id.clone(), outcome: rx })
    }

    async fn cancel(&self, action_id: &ActionId, grace: Duration) {
        let Some(tracked) = self.running.lock().get(action_id).cloned() else {
            return;
        };
        let Some(pid) = *tracked.pid.lock() else {
            return;
        };
        if let Err(e) = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM) {
            tracing::warn!(%action_id, %pid, error = %e, "failed to deliver SIGTERM");
            return;
        }
        tracing::info!(%action_id, %pid, ?grace, "sent SIGTERM, escalating to SIGKILL after grace");

        let action_id = action_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(pid) = *tracked.pid.lock() {
                tracing::warn!(%action_id, %pid, "grace period elapsed without exit, sending SIGKILL");
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
            }
        });
    }
}

#[cfg(test)]
#[path = "process_action_runner_tests.rs"]
mod tests;
