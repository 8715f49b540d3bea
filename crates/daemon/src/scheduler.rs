// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler main loop (spec §4.5): the `UpdateWorkerSchedule` cadence,
//! assignment diffing against locally-running Sessions, and outgoing status
//! assembly.

use crate::credentials::{CredentialError, QueueCredentialManager};
use crate::lifecycle::FarmFleet;
use oja_core::{Action, ApiError, Backoff, Clock, CredentialSource, QueueId, Session, SessionId, WorkerId, WorkerStatus};
use oja_engine::{ActionRunner, SessionEvent, SessionHandle};
use oja_wire::{
    BatchGetJobEntityInput, EntityError, EntityRef, ServiceClient, SessionActionUpdate,
    UpdateWorkerScheduleInput, UpdateWorkerScheduleOutput,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Grace given to a single service-directed action cancel (`cancel_session_actions`),
/// distinct from the whole-Session grace periods `oja-daemon::drain` uses.
const ACTION_CANCEL_GRACE: Duration = Duration::from_secs(30);
/// Default attempts before a `BatchGetJobEntity` call gives up and fails
/// every requested entity instead of leaving the Session stuck waiting
/// forever. Overridable via [`Scheduler::new`]'s `entity_retry_limit`
/// (the agent's `entity_retry_limit` config knob).
const DEFAULT_ENTITY_RETRY_LIMIT: u32 = 3;
/// Backoff floor/ceiling for a failed `UpdateWorkerSchedule` call.
const SCHEDULE_RETRY_BASE: Duration = Duration::from_millis(500);
const SCHEDULE_RETRY_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("remote call failed: {0}")]
    Api(#[from] ApiError),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
}

/// Why [`Scheduler::run`] returned control to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The service directed a stop (`desired_worker_status = STOPPED` with
    /// `assigned_sessions` empty, spec §4.5): run the service-drain
    /// procedure.
    ServiceStopRequested,
}

struct SessionEntry {
    handle: SessionHandle,
    queue_id: QueueId,
}

/// Owns the set of live Sessions and drives the `UpdateWorkerSchedule`
/// cadence. Generic over the same `(ActionRunner, ServiceClient, Clock)`
/// triple the rest of the agent is built from.
pub struct Scheduler<R: ActionRunner, S: ServiceClient, C: Clock> {
    client: Arc<S>,
    clock: C,
    runner: Arc<R>,
    farm_fleet: FarmFleet,
    worker_id: WorkerId,
    queue_credentials: Arc<QueueCredentialManager<S, C>>,
    sessions: HashMap<SessionId, SessionEntry>,
    /// The one queue this worker is currently allowed to hold Sessions for
    /// (spec invariant: "never holds sessions from multiple queues
    /// simultaneously"). `None` once the last Session for a queue tears down.
    active_queue: Option<QueueId>,
    event_tx: mpsc::UnboundedSender<(SessionId, SessionEvent)>,
    event_rx: mpsc::UnboundedReceiver<(SessionId, SessionEvent)>,
    pending_updates: Vec<SessionActionUpdate>,
    /// Set on construction (trigger 1: "first iteration"), on any terminal
    /// Action status (triggers 3 and 4 — a Succeeded action that drains a
    /// Session is as much "exhausted its actions" as a Failed one), and once
    /// `update_interval` elapses (trigger 2).
    force_call: bool,
    update_interval: Duration,
    entity_retry_limit: u32,
}

impl<R, S, C> Scheduler<R, S, C>
where
    R: ActionRunner + 'static,
    S: ServiceClient + 'static,
    C: Clock + 'static,
{
    pub fn new(
        client: Arc<S>,
        clock: C,
        runner: Arc<R>,
        farm_fleet: FarmFleet,
        worker_id: WorkerId,
        queue_credentials: Arc<QueueCredentialManager<S, C>>,
    ) -> Self {
        Self::with_entity_retry_limit(
            client,
            clock,
            runner,
            farm_fleet,
            worker_id,
            queue_credentials,
            DEFAULT_ENTITY_RETRY_LIMIT,
        )
    }

    /// Same as [`Self::new`] but with the agent's `entity_retry_limit`
    /// config knob threaded through instead of the default.
    #[allow(clippy::too_many_arguments)]
    pub fn with_entity_retry_limit(
        client: Arc<S>,
        clock: C,
        runner: Arc<R>,
        farm_fleet: FarmFleet,
        worker_id: WorkerId,
        queue_credentials: Arc<QueueCredentialManager<S, C>>,
        entity_retry_limit: u32,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            client,
            clock,
            runner,
            farm_fleet,
            worker_id,
            queue_credentials,
            sessions: HashMap::new(),
            active_queue: None,
            event_tx,
            event_rx,
            pending_updates: Vec::new(),
            force_call: true,
            update_interval: Duration::from_secs(5),
            entity_retry_limit,
        }
    }

    /// Runs the cadence loop until the service directs a stop. Returns as
    /// soon as that happens; `oja-daemon::drain` takes it from there.
    pub async fn run(&mut self) -> Result<LoopExit, SchedulerError> {
        loop {
            self.wait_until_due().await?;
            if let Some(exit) = self.call_update_worker_schedule().await? {
                return Ok(exit);
            }
        }
    }

    /// One `UpdateWorkerSchedule` round trip plus assignment diffing,
    /// exposed separately from [`run`](Self::run) so `drain`'s final flush
    /// can reuse it without the cadence wait.
    pub(crate) async fn flush_updates(&mut self) -> Result<Option<LoopExit>, SchedulerError> {
        self.force_call = true;
        self.call_update_worker_schedule().await
    }

    pub(crate) fn session_handles(&self) -> impl Iterator<Item = &SessionHandle> {
        self.sessions.values().map(|entry| &entry.handle)
    }

    pub(crate) fn has_sessions(&self) -> bool {
        !self.sessions.is_empty()
    }

    pub(crate) fn client(&self) -> &Arc<S> {
        &self.client
    }

    pub(crate) fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub(crate) fn farm_fleet(&self) -> &FarmFleet {
        &self.farm_fleet
    }

    /// Drains any scheduler events already available — or arriving within a
    /// short quiet period — without issuing another `UpdateWorkerSchedule`
    /// call. Used by `drain` to let in-flight cancels surface their
    /// resulting status before the final flush.
    pub(crate) async fn settle(&mut self, quiet: Duration) -> Result<(), SchedulerError> {
        loop {
            tokio::select! {
                Some((session_id, event)) = self.event_rx.recv() => {
                    self.handle_session_event(session_id, event).await?;
                }
                _ = tokio::time::sleep(quiet) => return Ok(()),
            }
        }
    }

    pub(crate) async fn wait_until_due(&mut self) -> Result<(), SchedulerError> {
        while !self.force_call {
            tokio::select! {
                _ = tokio::time::sleep(self.update_interval) => {
                    self.apply_queue_credential_failures();
                    self.force_call = true;
                }
                Some((session_id, event)) = self.event_rx.recv() => {
                    self.handle_session_event(session_id, event).await?;
                }
            }
        }
        Ok(())
    }

    /// Surfaces a retry-exhausted queue-credential refresh failure (spec
    /// §4.2/§7) recorded against the currently active queue, if any: fails
    /// the next Action of every Session on that queue instead of crashing
    /// the agent. A no-op when there's no active queue or nothing has
    /// failed since the last check.
    fn apply_queue_credential_failures(&mut self) {
        let Some(queue_id) = self.active_queue.clone() else { return };
        let Some(reason) = self.queue_credentials.take_failure(&queue_id) else { return };
        for entry in self.sessions.values() {
            if entry.queue_id == queue_id {
                entry.handle.fail_head(reason.clone());
            }
        }
    }

    async fn handle_session_event(&mut self, session_id: SessionId, event: SessionEvent) -> Result<(), SchedulerError> {
        match event {
            SessionEvent::StatusChanged(change) => {
                if change.status.is_terminal() {
                    self.force_call = true;
                }
                self.pending_updates.push(SessionActionUpdate {
                    session_id: change.session_id,
                    action_id: change.action_id,
                    status: change.status,
                    progress: change.progress,
                    message: change.message,
                    process_exit_code: change.process_exit_code,
                });
            }
            SessionEvent::EntityBatchNeeded(refs) => self.fetch_entities(&session_id, refs).await?,
            SessionEvent::TornDown => {
                if let Some(entry) = self.sessions.remove(&session_id) {
                    self.queue_credentials.release(&entry.queue_id)?;
                    let still_in_use = self.sessions.values().any(|e| e.queue_id == entry.queue_id);
                    if !still_in_use && self.active_queue.as_ref() == Some(&entry.queue_id) {
                        self.active_queue = None;
                    }
                }
            }
        }
        Ok(())
    }

    /// Fetches entities for one Session's pending batch, retrying transient
    /// failures with backoff; on exhaustion, fails every requested entity
    /// rather than leaving the Session's pipeline stuck waiting forever.
    async fn fetch_entities(&mut self, session_id: &SessionId, refs: Vec<EntityRef>) -> Result<(), SchedulerError> {
        if refs.is_empty() {
            return Ok(());
        }

        let backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(10));
        let mut attempt = 0u32;
        let results = loop {
            let result = self
                .client
                .batch_get_job_entity(
                    BatchGetJobEntityInput {
                        farm_id: self.farm_fleet.farm_id.clone(),
                        fleet_id: self.farm_fleet.fleet_id.clone(),
                        worker_id: self.worker_id.clone(),
                        entity_refs: refs.clone(),
                    },
                    CredentialSource::Agent,
                )
                .await;

            match result {
                Ok(output) => break output.results,
                Err(err) if attempt < self.entity_retry_limit => {
                    attempt += 1;
                    tokio::time::sleep(backoff.next_delay(attempt)).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "BatchGetJobEntity exhausted retries, failing requested entities");
                    break refs
                        .into_iter()
                        .map(|r| (r, oja_wire::EntityResult::Error(EntityError::InternalServerError)))
                        .collect();
                }
            }
        };

        if let Some(entry) = self.sessions.get(session_id) {
            entry.handle.supply_entities(results);
        }
        Ok(())
    }

    pub(crate) async fn call_update_worker_schedule(&mut self) -> Result<Option<LoopExit>, SchedulerError> {
        self.force_call = false;
        let updates = std::mem::take(&mut self.pending_updates);

        let result = self
            .client
            .update_worker_schedule(
                UpdateWorkerScheduleInput {
                    farm_id: self.farm_fleet.farm_id.clone(),
                    fleet_id: self.farm_fleet.fleet_id.clone(),
                    worker_id: self.worker_id.clone(),
                    updated_session_actions: updates.clone(),
                },
                CredentialSource::Agent,
            )
            .await;

        let output = match result {
            Ok(output) => output,
            // UpdateWorkerSchedule only ever names the worker itself, so a
            // NotFound here is unambiguously "the service no longer knows
            // this worker" (spec §7's "NotFound (worker)" row) — surface it
            // rather than retrying forever, so the caller can apply its
            // configured worker-not-found policy (re-register or exit).
            Err(err @ ApiError::NotFound(_)) => {
                self.pending_updates = updates;
                self.force_call = true;
                return Err(err.into());
            }
            Err(err) => {
                // Surfacing rule (spec §4.5): a terminal status may never be
                // dropped, so keep it queued for the retried call.
                self.pending_updates = updates;
                self.force_call = true;
                tracing::warn!(error = %err, "UpdateWorkerSchedule failed, retrying");
                let backoff = Backoff::new(SCHEDULE_RETRY_BASE, SCHEDULE_RETRY_MAX);
                tokio::time::sleep(backoff.next_delay(1)).await;
                return Ok(None);
            }
        };

        self.apply_schedule(output).await
    }

    async fn apply_schedule(&mut self, output: UpdateWorkerScheduleOutput) -> Result<Option<LoopExit>, SchedulerError> {
        self.update_interval = Duration::from_secs(output.update_interval_seconds.max(1));
        let assigned_empty = output.assigned_sessions.is_empty();
        let assigned_ids: HashSet<SessionId> =
            output.assigned_sessions.iter().map(|s| s.session_id.clone()).collect();

        for assigned in output.assigned_sessions {
            let new_actions: Vec<Action> =
                assigned.new_actions.into_iter().map(|a| Action::queued(a.action_id, a.kind)).collect();

            if let Some(entry) = self.sessions.get(&assigned.session_id) {
                if !new_actions.is_empty() {
                    entry.handle.push_actions(new_actions);
                }
                continue;
            }

            if let Some(active) = &self.active_queue {
                if *active != assigned.queue_id {
                    tracing::error!(
                        queue_id = %assigned.queue_id,
                        active_queue_id = %active,
                        "service assigned a session for a second queue while one is still active, ignoring",
                    );
                    continue;
                }
            }

            // A retry-exhausted failure to obtain queue credentials does not
            // crash the agent (spec §4.2/§7): the Session is still created
            // so the service's assignment is honored, but its head Action
            // fails immediately with the reason instead of the pipeline
            // waiting forever on credentials it'll never get.
            let credential_failure = self
                .queue_credentials
                .acquire(assigned.queue_id.clone())
                .await
                .err()
                .map(|err| format!("failed to obtain queue credentials: {err}"));
            let env: HashMap<String, String> = self
                .queue_credentials
                .env_vars(&assigned.queue_id)
                .map(|vars| vars.into_iter().map(|(k, v)| (k.to_string(), v.to_string_lossy().into_owned())).collect())
                .unwrap_or_default();

            let session = Session::new(assigned.session_id.clone(), assigned.queue_id.clone(), assigned.job_id, assigned.os_user);
            let (handle, events) = SessionHandle::spawn_with_env(session, Arc::clone(&self.runner), self.clock.clone(), env);
            if !new_actions.is_empty() {
                handle.push_actions(new_actions);
            }
            if let Some(reason) = credential_failure {
                handle.fail_head(reason);
            }
            self.spawn_forwarder(assigned.session_id.clone(), events);
            self.active_queue = Some(assigned.queue_id.clone());
            self.sessions.insert(assigned.session_id, SessionEntry { handle, queue_id: assigned.queue_id });
        }

        for cancel in output.cancel_session_actions {
            if let Some(entry) = self.sessions.get(&cancel.session_id) {
                entry.handle.cancel(cancel.action_id, ACTION_CANCEL_GRACE);
            }
        }

        // A Session known locally but no longer listed is a service-initiated
        // cancel of whatever remains of it (spec §4.5).
        for (session_id, entry) in self.sessions.iter() {
            if !assigned_ids.contains(session_id) {
                entry.handle.request_teardown();
            }
        }

        if output.desired_worker_status == Some(WorkerStatus::Stopped) && assigned_empty {
            return Ok(Some(LoopExit::ServiceStopRequested));
        }

        Ok(None)
    }

    fn spawn_forwarder(&self, session_id: SessionId, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send((session_id.clone(), event)).is_err() {
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
