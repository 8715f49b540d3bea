// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A Session: a host-local execution context for an ordered pipeline of
//! Actions belonging to one job of one queue (spec §3, GLOSSARY).

use crate::action::{Action, ActionId};
use crate::id::{JobId, QueueId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

crate::define_ext_id! {
    /// Identifier of a Session, assigned by the service.
    pub struct SessionId;
}

/// Coarse lifecycle state of a Session (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Normal operation: actions are started in order as they reach the head.
    Running,
    /// An unsuccessful action has set a terminal reason; only envExit
    /// actions for already-entered environments may still run.
    Cleaning,
    /// Pipeline fully drained; the Session is ready for teardown.
    Done,
}

crate::simple_display! {
    SessionState {
        Running => "RUNNING",
        Cleaning => "CLEANING",
        Done => "DONE",
    }
}

/// A Session's action pipeline and metadata. `queue_id` is immutable for the
/// Session's lifetime (invariant 4); all Actions in the pipeline share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub queue_id: QueueId,
    pub job_id: JobId,
    pub os_user: String,
    /// Insertion order == queue order; actions run head-first.
    pub actions: IndexMap<ActionId, Action>,
    pub state: SessionState,
    /// Set once an unsuccessful action triggers propagation; `None` while
    /// every action so far has succeeded.
    pub terminal_reason: Option<String>,
}

impl Session {
    pub fn new(session_id: SessionId, queue_id: QueueId, job_id: JobId, os_user: String) -> Self {
        Self {
            session_id,
            queue_id,
            job_id,
            os_user,
            actions: IndexMap::new(),
            state: SessionState::Running,
            terminal_reason: None,
        }
    }

    /// Append an Action at the tail, preserving queue order (spec §4.5:
    /// "append any newly-listed actions, order preserved").
    pub fn push(&mut self, action: Action) {
        self.actions.insert(action.action_id.clone(), action);
    }

    /// The Action at the head of the pipeline not yet terminal, if any.
    pub fn head(&self) -> Option<&Action> {
        self.actions.values().find(|a| !a.status.is_terminal())
    }

    pub fn head_mut(&mut self) -> Option<&mut Action> {
        self.actions.values_mut().find(|a| !a.status.is_terminal())
    }

    /// Mark the Session as entering cleanup: every action queued *after*
    /// `from`, other than envExit actions for environments already entered,
    /// is set NeverAttempted (spec §4.4, "unsuccessful action" propagation).
    /// Returns the ids of actions this call actually transitioned, so a
    /// caller reporting status changes doesn't re-report actions that were
    /// already terminal before this call.
    pub fn propagate_failure(&mut self, from: &ActionId, reason: impl Into<String>) -> Vec<ActionId> {
        let reason = reason.into();
        self.terminal_reason = Some(reason.clone());
        self.state = SessionState::Cleaning;

        let from_idx = self.actions.get_index_of(from);
        let Some(from_idx) = from_idx else { return Vec::new() };

        // Any envEnter that reached a terminal state keeps its envExit (spec
        // §4.4 bullet 2) — including Failed/Canceled/Interrupted, not just
        // Succeeded, since the envExit is what tears down whatever partial
        // environment state the envEnter left behind.
        let entered_envs: std::collections::HashSet<_> = self
            .actions
            .values()
            .take(from_idx + 1)
            .filter_map(|a| match &a.kind {
                crate::action::ActionKind::EnvEnter { env_id } if a.status.is_terminal() => {
                    Some(env_id.clone())
                }
                _ => None,
            })
            .collect();

        let mut affected = Vec::new();
        for action in self.actions.values_mut().skip(from_idx + 1) {
            if action.kind.is_env_exit() {
                if let Some(env_id) = action.kind.env_id() {
                    if entered_envs.contains(env_id) {
                        continue;
                    }
                }
            }
            if !action.status.is_terminal() {
                affected.push(action.action_id.clone());
            }
            action.never_attempt(reason.clone());
        }
        affected
    }

    /// Whether the pipeline has no further actions to run.
    pub fn is_drained(&self) -> bool {
        self.actions.values().all(|a| a.status.is_terminal())
    }

    /// Actions whose terminal status or progress has not yet been reported
    /// back to the service. Callers clear reporting state externally; this
    /// is a pure query over the current snapshot.
    pub fn terminal_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values().filter(|a| a.status.is_terminal())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
