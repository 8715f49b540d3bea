// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Session runtime (spec §4.4): the single logical pipeline worker that
//! serially runs an owned [`Session`]'s Actions, fetching their entity
//! details, applying failure propagation and cancel mechanics, and handing
//! back status-change events for the scheduler to report.

use crate::action_runner::{ActionRunner, RunStatus};
use crate::entity_cache::{EntityCache, EntityCacheEntry};
use oja_core::{Action, ActionId, ActionKind, ActionStatus, ApiError, Clock, Session, SessionId};
use oja_wire::EntityRef;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A status transition the scheduler needs to know about, either to
/// include in the next `updated_session_actions` or to act on (e.g. begin
/// propagating to the next action). Carries enough of the Action snapshot
/// (spec §4.5 "outgoing updates") that the scheduler never has to reach
/// back into a Session it doesn't own.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStatusChanged {
    pub session_id: SessionId,
    pub action_id: ActionId,
    pub status: ActionStatus,
    pub progress: Option<f32>,
    pub message: Option<String>,
    pub process_exit_code: Option<i32>,
}

fn changed(session_id: &SessionId, action: &Action) -> ActionStatusChanged {
    ActionStatusChanged {
        session_id: session_id.clone(),
        action_id: action.action_id.clone(),
        status: action.status,
        progress: action.progress,
        message: action.message.clone(),
        process_exit_code: action.process_exit_code,
    }
}

/// Returned by [`SessionRuntime::step`] to tell the caller what happened,
/// and in particular whether it needs to go fetch entities before the next
/// call can make progress.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No action was ready to run (pipeline empty or head entity pending).
    Idle,
    /// The head action needs one or more entity refs the cache doesn't have
    /// yet; the caller should fetch them and call `apply_entities` before
    /// calling `step` again.
    AwaitingEntities(Vec<EntityRef>),
    /// A status transition happened.
    Changed(Vec<ActionStatusChanged>),
    /// Every action in the pipeline is terminal.
    Drained,
}

/// The entity ref a given action kind depends on, per spec §6: "jobDetails
/// ... jobAttachmentDetails ... environmentDetails ... stepDetails".
fn required_entity(kind: &ActionKind) -> EntityRef {
    match kind {
        ActionKind::SyncInputJobAttachments => EntityRef::JobAttachmentDetails,
        ActionKind::EnvEnter { env_id } | ActionKind::EnvExit { env_id } => {
            EntityRef::EnvironmentDetails { env_id: env_id.as_str().to_string() }
        }
        ActionKind::TaskRun { step_id, .. } => {
            EntityRef::StepDetails { step_id: step_id.as_str().to_string() }
        }
    }
}

pub struct SessionRuntime<R: ActionRunner, C: Clock> {
    session: Session,
    runner: Arc<R>,
    clock: C,
    entity_cache: EntityCache,
    in_flight: Option<(ActionId, tokio::sync::oneshot::Receiver<crate::action_runner::RunOutcome>)>,
    teardown_requested: bool,
    /// Environment handed to every `ActionRunner::start` call for this
    /// Session — in practice the queue-credential-process env vars (spec
    /// §6), fixed for the Session's lifetime since only the file contents
    /// they point at are refreshed. Empty until [`set_env`](Self::set_env)
    /// is called.
    env: HashMap<String, String>,
}

impl<R: ActionRunner, C: Clock> SessionRuntime<R, C> {
    pub fn new(session: Session, runner: Arc<R>, clock: C) -> Self {
        Self {
            session,
            runner,
            clock,
            entity_cache: EntityCache::new(),
            in_flight: None,
            teardown_requested: false,
            env: HashMap::new(),
        }
    }

    /// Sets the environment passed to every subsequent `ActionRunner::start`
    /// call. Intended to be called once, right after construction.
    pub fn set_env(&mut self, env: HashMap<String, String>) {
        self.env = env;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn queue_id(&self) -> &oja_core::QueueId {
        &self.session.queue_id
    }

    /// Append newly-assigned actions at the tail, order preserved (spec
    /// §4.5).
    pub fn push_actions(&mut self, actions: Vec<Action>) {
        for action in actions {
            self.session.push(action);
        }
    }

    /// Feed a `BatchGetJobEntity` response into the entity cache.
    pub fn apply_entities(&mut self, results: Vec<(EntityRef, oja_wire::EntityResult)>) {
        self.entity_cache.apply_results(results);
    }

    pub fn pending_entity_batch(&mut self) -> Vec<EntityRef> {
        self.entity_cache.drain_batch()
    }

    /// Cancel mechanics (spec §4.4/§5): a Queued action is removed/marked
    /// Canceled directly; a Running action gets a soft signal through the
    /// runner with `grace`, visible immediately as Canceling — its terminal
    /// status arrives through a later `step()` call. Idempotent.
    pub async fn cancel(&mut self, action_id: &ActionId, grace: Duration) -> Option<ActionStatusChanged> {
        let action = self.session.actions.get_mut(action_id)?;
        match action.status {
            ActionStatus::Queued => {
                action.cancel_queued();
                Some(changed(&self.session.session_id, action))
            }
            ActionStatus::Running => {
                action.begin_cancel();
                let event = changed(&self.session.session_id, action);
                self.runner.cancel(action_id, grace).await;
                Some(event)
            }
            _ => None,
        }
    }

    /// Mark the Session for teardown: no further actions should be started
    /// once drained (scheduler response no longer lists this Session).
    pub fn request_teardown(&mut self) {
        self.teardown_requested = true;
    }

    /// Externally fails the Session's next not-yet-started Action with
    /// `reason`, propagating as any other unsuccessful action would (spec
    /// §4.4). Used when this Session's queue credentials couldn't be
    /// obtained — an initial acquire failure or a retry-exhausted refresh
    /// failure — so that fails the next Action instead of crashing the
    /// agent (spec §4.2/§7). A no-op if the head isn't `Queued` (already
    /// running, or the pipeline is empty/drained).
    pub fn fail_head(&mut self, reason: impl Into<String>) -> Vec<ActionStatusChanged> {
        let Some(head) = self.session.head() else { return Vec::new() };
        if head.status != ActionStatus::Queued {
            return Vec::new();
        }
        let action_id = head.action_id.clone();
        let now = self.clock.epoch_ms() as i64;
        let action = self.session.actions.get_mut(&action_id).expect("head exists");
        action.start(now);
        action.fail(now, reason.into(), None);
        match self.propagate_if_unsuccessful(&action_id) {
            StepOutcome::Changed(events) => events,
            _ => Vec::new(),
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.teardown_requested && self.session.is_drained()
    }

    /// Drive the pipeline forward by one unit of work. Call repeatedly
    /// (typically in a loop that awaits the in-flight run's outcome between
    /// calls) until it returns `Drained`.
    pub async fn step(&mut self) -> StepOutcome {
        if self.in_flight.is_some() {
            return self.finish_in_flight().await;
        }

        if self.session.is_drained() {
            return StepOutcome::Drained;
        }

        let Some(head) = self.session.head() else {
            return StepOutcome::Drained;
        };

        if head.status != ActionStatus::Queued {
            return StepOutcome::Idle;
        }

        let action_id = head.action_id.clone();
        let kind = head.kind.clone();

        // jobDetails gates Session setup (spec §4.3/§8): every Queued head
        // waits on it before even its own required entity is requested, and
        // a jobDetails failure fails this head specifically rather than
        // whichever action kind actually needed an entity.
        match self.entity_cache.get(&EntityRef::JobDetails) {
            None => {
                self.entity_cache.request(EntityRef::JobDetails);
                return StepOutcome::AwaitingEntities(vec![EntityRef::JobDetails]);
            }
            Some(EntityCacheEntry::Pending) => return StepOutcome::AwaitingEntities(vec![]),
            Some(EntityCacheEntry::Errored(err)) => {
                let err = err.clone();
                return self.fail_head_and_propagate(&action_id, &EntityRef::JobDetails, err);
            }
            Some(EntityCacheEntry::Ready(_)) => {}
        }

        let entity_ref = required_entity(&kind);

        match self.entity_cache.get(&entity_ref) {
            None => {
                self.entity_cache.request(entity_ref.clone());
                StepOutcome::AwaitingEntities(vec![entity_ref])
            }
            Some(EntityCacheEntry::Pending) => StepOutcome::AwaitingEntities(vec![]),
            Some(EntityCacheEntry::Errored(err)) => {
                let err = err.clone();
                self.fail_head_and_propagate(&action_id, &entity_ref, err)
            }
            Some(EntityCacheEntry::Ready(_)) => self.start_head(action_id).await,
        }
    }

    async fn start_head(&mut self, action_id: ActionId) -> StepOutcome {
        let now = self.clock.epoch_ms() as i64;
        let os_user = self.session.os_user.clone();

        let action = self.session.actions.get(&action_id).expect("head exists");
        match self.runner.start(action, &os_user, &self.env).await {
            Ok(handle) => {
                let action = self.session.actions.get_mut(&action_id).expect("head exists");
                action.start(now);
                let event = changed(&self.session.session_id, action);
                self.in_flight = Some((action_id, handle.outcome));
                StepOutcome::Changed(vec![event])
            }
            Err(err) => {
                let message = err.to_string();
                let action = self.session.actions.get_mut(&action_id).expect("head exists");
                action.start(now);
                action.fail(now, message, None);
                self.propagate_if_unsuccessful(&action_id)
            }
        }
    }

    /// Awaits the in-flight outcome by mutable reference rather than taking
    /// `self.in_flight` first: this is the branch of a `tokio::select!` in
    /// the caller's drive loop, and if a command arrives first the `step()`
    /// future (and this `.await`) is dropped mid-poll. Leaving `in_flight`
    /// in place until the receiver actually resolves means the next `step()`
    /// call resumes waiting on the same run instead of losing track of it.
    async fn finish_in_flight(&mut self) -> StepOutcome {
        let now = self.clock.epoch_ms() as i64;
        let outcome = {
            let (_, rx) = self.in_flight.as_mut().expect("checked Some by caller");
            rx.await.unwrap_or(crate::action_runner::RunOutcome {
                exit_code: None,
                status: RunStatus::Failed("runner dropped outcome channel".into()),
            })
        };
        let (action_id, _) = self.in_flight.take().expect("still Some after await");

        let action = self.session.actions.get_mut(&action_id).expect("in-flight action exists");
        match outcome.status {
            RunStatus::Succeeded => action.succeed(now, outcome.exit_code.unwrap_or(0)),
            RunStatus::Failed(msg) => action.fail(now, msg, outcome.exit_code),
            RunStatus::Canceled => action.cancel_complete(now),
            RunStatus::TimedOut => action.fail(now, "action timed out", outcome.exit_code),
        }

        self.propagate_if_unsuccessful(&action_id)
    }

    fn propagate_if_unsuccessful(&mut self, action_id: &ActionId) -> StepOutcome {
        let action = self.session.actions.get(action_id).expect("action exists");
        let status = action.status;
        let mut events = vec![changed(&self.session.session_id, action)];

        if status.is_unsuccessful() {
            let affected =
                self.session.propagate_failure(action_id, format!("upstream action {action_id} {status}"));
            events.extend(
                affected.iter().filter_map(|id| self.session.actions.get(id)).map(|a| changed(&self.session.session_id, a)),
            );
        }

        StepOutcome::Changed(events)
    }

    fn fail_head_and_propagate(
        &mut self,
        action_id: &ActionId,
        entity_ref: &EntityRef,
        err: ApiError,
    ) -> StepOutcome {
        let now = self.clock.epoch_ms() as i64;
        let message = if entity_ref.is_job_details() {
            format!("jobDetails unavailable: {err}")
        } else {
            format!("entity fetch failed: {err}")
        };
        let action = self.session.actions.get_mut(action_id).expect("head exists");
        action.start(now);
        action.fail(now, message, None);
        self.propagate_if_unsuccessful(action_id)
    }
}

#[cfg(test)]
#[path = "session_runtime_tests.rs"]
mod tests;
