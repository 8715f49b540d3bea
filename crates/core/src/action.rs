// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Actions: the unit of work a [`Session`](crate::session::Session)
//! runs one at a time. Transitions are enforced by construction so the
//! monotone-status invariant (spec invariant 1/2) cannot be violated by a
//! caller reaching in and setting a field directly.

use crate::id::{EnvId, StepId, TaskId};
use serde::{Deserialize, Serialize};

crate::define_ext_id! {
    /// Identifier of a single Action within a Session's pipeline.
    pub struct ActionId;
}

/// What an Action does. A tagged union, exhaustively matched everywhere the
/// pipeline interprets an Action instead of leaning on dynamic dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActionKind {
    SyncInputJobAttachments,
    EnvEnter { env_id: EnvId },
    TaskRun { step_id: StepId, task_id: TaskId },
    EnvExit { env_id: EnvId },
}

impl ActionKind {
    /// `envExit` actions are exempt from the "fail everything behind me"
    /// propagation rule in spec §4.4/§8 edge cases.
    pub fn is_env_exit(&self) -> bool {
        matches!(self, ActionKind::EnvExit { .. })
    }

    pub fn env_id(&self) -> Option<&EnvId> {
        match self {
            ActionKind::EnvEnter { env_id } | ActionKind::EnvExit { env_id } => Some(env_id),
            _ => None,
        }
    }
}

/// Where an Action currently sits in its lifecycle (spec §3/§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Queued,
    Running,
    Canceling,
    Succeeded,
    Failed,
    Canceled,
    Interrupted,
    NeverAttempted,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Succeeded
                | ActionStatus::Failed
                | ActionStatus::Canceled
                | ActionStatus::Interrupted
                | ActionStatus::NeverAttempted
        )
    }

    pub fn is_unsuccessful(self) -> bool {
        matches!(
            self,
            ActionStatus::Failed | ActionStatus::Canceled | ActionStatus::Interrupted
        )
    }
}

crate::simple_display! {
    ActionStatus {
        Queued => "QUEUED",
        Running => "RUNNING",
        Canceling => "CANCELING",
        Succeeded => "SUCCEEDED",
        Failed => "FAILED",
        Canceled => "CANCELED",
        Interrupted => "INTERRUPTED",
        NeverAttempted => "NEVER_ATTEMPTED",
    }
}

/// A Session Action. `started_at`/`ended_at` are `None` until [`Action::start`]
/// / a terminal transition runs; a `NeverAttempted` action never gets either
/// (invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_id: ActionId,
    pub kind: ActionKind,
    pub status: ActionStatus,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub process_exit_code: Option<i32>,
    pub progress: Option<f32>,
    pub message: Option<String>,
}

impl Action {
    /// A freshly queued Action, as inserted by the scheduler.
    pub fn queued(action_id: ActionId, kind: ActionKind) -> Self {
        Self {
            action_id,
            kind,
            status: ActionStatus::Queued,
            started_at: None,
            ended_at: None,
            process_exit_code: None,
            progress: None,
            message: None,
        }
    }

    /// Queued → Running. Panics (via `debug_assert`) if called on anything
    /// but a Queued action; the pipeline only ever calls this on the head.
    pub fn start(&mut self, now: i64) {
        debug_assert_eq!(self.status, ActionStatus::Queued, "start() requires Queued");
        self.status = ActionStatus::Running;
        self.started_at = Some(now);
    }

    /// Running → Canceling, the soft-signal waypoint before Canceled.
    pub fn begin_cancel(&mut self) {
        if self.status == ActionStatus::Running {
            self.status = ActionStatus::Canceling;
        }
    }

    pub fn set_progress(&mut self, progress: f32, message: Option<String>) {
        debug_assert_eq!(self.status, ActionStatus::Running);
        self.progress = Some(progress);
        if message.is_some() {
            self.message = message;
        }
    }

    /// Running/Canceling → Succeeded, with the subprocess exit code.
    pub fn succeed(&mut self, now: i64, exit_code: i32) {
        self.finish(now, ActionStatus::Succeeded, Some(exit_code), None);
    }

    /// Running/Canceling → Failed, with an explanatory message (spec §7:
    /// every terminal Failed must carry a message).
    pub fn fail(&mut self, now: i64, message: impl Into<String>, exit_code: Option<i32>) {
        self.finish(now, ActionStatus::Failed, exit_code, Some(message.into()));
    }

    /// Running/Canceling → Canceled.
    pub fn cancel_complete(&mut self, now: i64) {
        self.finish(now, ActionStatus::Canceled, None, None);
    }

    /// Running/Canceling → Interrupted (expedited drain, spec §5).
    pub fn interrupt(&mut self, now: i64, message: impl Into<String>) {
        self.finish(now, ActionStatus::Interrupted, None, Some(message.into()));
    }

    /// Queued → NeverAttempted. `started_at`/`ended_at` stay `None` forever,
    /// per invariant 1. A no-op if already terminal (cancel idempotency,
    /// spec §8 edge cases).
    pub fn never_attempt(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        debug_assert_eq!(self.status, ActionStatus::Queued, "never_attempt() requires Queued");
        self.status = ActionStatus::NeverAttempted;
        self.message = Some(message.into());
    }

    /// Cancel a still-Queued action directly, bypassing NeverAttempted
    /// (used when no failure propagation applies — spec §8 edge case).
    pub fn cancel_queued(&mut self) {
        if self.status == ActionStatus::Queued {
            self.status = ActionStatus::Canceled;
        }
    }

    fn finish(
        &mut self,
        now: i64,
        status: ActionStatus,
        exit_code: Option<i32>,
        message: Option<String>,
    ) {
        debug_assert!(
            matches!(self.status, ActionStatus::Running | ActionStatus::Canceling),
            "finish() requires Running or Canceling, got {:?}",
            self.status,
        );
        self.status = status;
        self.ended_at = Some(now);
        if exit_code.is_some() {
            self.process_exit_code = exit_code;
        }
        if message.is_some() {
            self.message = message;
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
