// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler-facing view of a running Session: a cheaply-cloneable
//! handle backed by a spawned task that owns the actual
//! [`SessionRuntime`](crate::session_runtime::SessionRuntime).

use crate::action_runner::ActionRunner;
use crate::session_runtime::{ActionStatusChanged, SessionRuntime, StepOutcome};
use oja_core::{Action, ActionId, Clock, Session, SessionId};
use oja_wire::{EntityRef, EntityResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

enum SessionCommand {
    PushActions(Vec<Action>),
    Cancel(ActionId, Duration),
    SupplyEntities(Vec<(EntityRef, EntityResult)>),
    RequestTeardown,
    FailHead(String),
    Snapshot(tokio::sync::oneshot::Sender<Session>),
}

/// Everything the scheduler needs to react to from one Session's pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged(ActionStatusChanged),
    /// The runtime needs these entities fetched via `BatchGetJobEntity`;
    /// feed the response back through [`SessionHandle::supply_entities`].
    EntityBatchNeeded(Vec<EntityRef>),
    /// The pipeline is drained and teardown was requested: safe to purge
    /// credentials refcounts, the log destination, and the temp dir.
    TornDown,
}

/// A live Session's control surface. Dropping every clone of the sender
/// side (i.e. this handle) stops the backing task.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Spawn a task owning `session` and return a handle to it plus the
    /// event stream it emits.
    pub fn spawn<R, C>(session: Session, runner: Arc<R>, clock: C) -> (Self, mpsc::UnboundedReceiver<SessionEvent>)
    where
        R: ActionRunner + 'static,
        C: Clock + 'static,
    {
        Self::spawn_with_env(session, runner, clock, std::collections::HashMap::new())
    }

    /// Same as [`spawn`](Self::spawn), but with the subprocess environment
    /// (the queue-credential-process env vars, spec §6) set before the
    /// pipeline starts.
    pub fn spawn_with_env<R, C>(
        session: Session,
        runner: Arc<R>,
        clock: C,
        env: std::collections::HashMap<String, String>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>)
    where
        R: ActionRunner + 'static,
        C: Clock + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let session_id = session.session_id.clone();
        let mut runtime = SessionRuntime::new(session, runner, clock);
        runtime.set_env(env);
        tokio::spawn(drive(runtime, cmd_rx, ev_tx));
        (Self { session_id, cmd_tx }, ev_rx)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn push_actions(&self, actions: Vec<Action>) {
        let _ = self.cmd_tx.send(SessionCommand::PushActions(actions));
    }

    pub fn cancel(&self, action_id: ActionId, grace: Duration) {
        let _ = self.cmd_tx.send(SessionCommand::Cancel(action_id, grace));
    }

    pub fn supply_entities(&self, results: Vec<(EntityRef, EntityResult)>) {
        let _ = self.cmd_tx.send(SessionCommand::SupplyEntities(results));
    }

    pub fn request_teardown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::RequestTeardown);
    }

    /// Fails this Session's next not-yet-started Action with `reason`
    /// (spec §4.2/§7: a queue-credential failure fails the next Session
    /// Action for that queue rather than crashing the agent). A no-op if
    /// the head isn't currently `Queued`.
    pub fn fail_head(&self, reason: impl Into<String>) {
        let _ = self.cmd_tx.send(SessionCommand::FailHead(reason.into()));
    }

    /// A point-in-time copy of the Session this handle drives, for callers
    /// (drain procedures) that need to inspect current Action statuses
    /// directly rather than reacting to events. `None` if the backing task
    /// has already exited (torn down and dropped).
    pub async fn snapshot(&self) -> Option<Session> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.cmd_tx.send(SessionCommand::Snapshot(reply_tx)).ok()?;
        reply_rx.await.ok()
    }
}

async fn drive<R, C>(
    mut runtime: SessionRuntime<R, C>,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    ev_tx: mpsc::UnboundedSender<SessionEvent>,
) where
    R: ActionRunner + 'static,
    C: Clock + 'static,
{
    let mut blocked = false;

    loop {
        if runtime.session().is_drained() {
            if runtime.is_torn_down() {
                let _ = ev_tx.send(SessionEvent::TornDown);
                return;
            }
            match cmd_rx.recv().await {
                Some(cmd) => handle_command(&mut runtime, cmd, &ev_tx).await,
                None => return,
            }
            continue;
        }

        if blocked {
            match cmd_rx.recv().await {
                Some(cmd) => {
                    handle_command(&mut runtime, cmd, &ev_tx).await;
                    blocked = false;
                }
                None => return,
            }
            continue;
        }

        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => handle_command(&mut runtime, cmd, &ev_tx).await,
                    None => return,
                }
            }
            outcome = runtime.step() => {
                blocked = handle_step_outcome(outcome, &ev_tx);
            }
        }
    }
}

async fn handle_command<R, C>(
    runtime: &mut SessionRuntime<R, C>,
    cmd: SessionCommand,
    ev_tx: &mpsc::UnboundedSender<SessionEvent>,
) where
    R: ActionRunner + 'static,
    C: Clock + 'static,
{
    match cmd {
        SessionCommand::PushActions(actions) => runtime.push_actions(actions),
        SessionCommand::Cancel(action_id, grace) => {
            if let Some(changed) = runtime.cancel(&action_id, grace).await {
                let _ = ev_tx.send(SessionEvent::StatusChanged(changed));
            }
        }
        SessionCommand::SupplyEntities(results) => runtime.apply_entities(results),
        SessionCommand::RequestTeardown => runtime.request_teardown(),
        SessionCommand::FailHead(reason) => {
            for event in runtime.fail_head(reason) {
                let _ = ev_tx.send(SessionEvent::StatusChanged(event));
            }
        }
        SessionCommand::Snapshot(reply) => {
            let _ = reply.send(runtime.session().clone());
        }
    }
}

/// Returns whether the driver should now block on the command channel
/// alone, rather than keep polling `step()` (which would otherwise spin
/// while a request is outstanding or the pipeline is momentarily idle).
fn handle_step_outcome(outcome: StepOutcome, ev_tx: &mpsc::UnboundedSender<SessionEvent>) -> bool {
    match outcome {
        StepOutcome::Idle => true,
        StepOutcome::AwaitingEntities(refs) => {
            if !refs.is_empty() {
                let _ = ev_tx.send(SessionEvent::EntityBatchNeeded(refs));
            }
            true
        }
        StepOutcome::Changed(events) => {
            for event in events {
                let _ = ev_tx.send(SessionEvent::StatusChanged(event));
            }
            false
        }
        StepOutcome::Drained => false,
    }
}

#[cfg(test)]
#[path = "session_handle_tests.rs"]
mod tests;
