// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `ActionRunner` for tests: scriptable outcomes per `ActionId`,
//! same role as `oja-wire`'s `FakeServiceClient`.

use async_trait::async_trait;
use oja_core::{Action, ActionId};
use oja_engine::{ActionRunner, RunHandle, RunOutcome, RunnerError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::oneshot;

/// Resolves every `start` immediately (no real subprocess, no delay) using
/// a queued outcome for that `ActionId`, falling back to a shared default
/// if one is set. Records every call so a test can assert on ordering.
#[derive(Default)]
pub struct FakeActionRunner {
    outcomes: Mutex<HashMap<ActionId, VecDeque<RunOutcome>>>,
    default_outcome: Mutex<Option<RunOutcome>>,
    pub started: Mutex<Vec<ActionId>>,
    pub canceled: Mutex<Vec<(ActionId, Duration)>>,
}

impl FakeActionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome the next `start` for `action_id` resolves to.
    pub fn push_outcome(&self, action_id: ActionId, outcome: RunOutcome) {
        self.outcomes.lock().entry(action_id).or_default().push_back(outcome);
    }

    /// Outcome used for any `start` whose `action_id` has no queued entry.
    pub fn set_default_outcome(&self, outcome: RunOutcome) {
        *self.default_outcome.lock() = Some(outcome);
    }
}

#[async_trait]
impl ActionRunner for FakeActionRunner {
    async fn start(
        &self,
        action: &Action,
        _os_user: &str,
        _env: &HashMap<String, String>,
    ) -> Result<RunHandle, RunnerError> {
        self.started.lock().push(action.action_id.clone());

        let outcome = self
            .outcomes
            .lock()
            .get_mut(&action.action_id)
            .and_then(|queue| queue.pop_front())
            .or_else(|| self.default_outcome.lock().clone())
            .unwrap_or_else(|| {
                panic!(
                    "FakeActionRunner::start({}) called with no queued or default outcome",
                    action.action_id
                )
            });

        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Ok(RunHandle { action_id: action.action_id.clone(), outcome: rx })
    }

    async fn cancel(&self, action_id: &ActionId, grace: Duration) {
        self.canceled.lock().push((action_id.clone(), grace));
    }
}

#[cfg(test)]
#[path = "fake_action_runner_tests.rs"]
mod tests;
