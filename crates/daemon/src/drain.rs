// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown procedures (spec §4.5): regular, expedited, and service drains,
//! and the signal mapping that picks between the first two.

use crate::lifecycle::{set_worker_status, LifecycleError};
use crate::scheduler::{Scheduler, SchedulerError};
use oja_core::{ActionStatus, Clock, WorkerStatus};
use oja_engine::ActionRunner;
use oja_wire::{CredentialSource, ServiceClient, SessionActionUpdate, UpdateWorkerScheduleInput};
use std::time::Duration;
use thiserror::Error;

/// Grace given to a Running action canceled by a regular drain — enough for
/// a well-behaved job process to flush and exit on its own.
const MODERATE_GRACE: Duration = Duration::from_secs(20);
/// Grace given to a Running action canceled by an expedited drain — just
/// enough to deliver the signal; the agent doesn't wait around for it.
const MINIMUM_GRACE: Duration = Duration::from_millis(100);
/// Past this wall-clock budget a regular drain gives up and escalates to
/// expedited (spec §4.5 "<10s wall-clock budget").
const REGULAR_DRAIN_BUDGET: Duration = Duration::from_secs(10);
/// How long a regular drain waits for cancels it just issued to surface
/// their resulting status before the final flush.
const SETTLE_QUIET: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Which shutdown procedure to run (spec §4.5). `Service` is what follows a
/// [`crate::scheduler::LoopExit::ServiceStopRequested`]; `Regular`/`Expedited`
/// are driven by the external triggers in [`signals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    Regular,
    Expedited,
    Service,
}

/// Runs `mode`'s shutdown procedure to completion. A `Regular` drain that
/// exceeds [`REGULAR_DRAIN_BUDGET`] escalates itself to `Expedited`.
pub async fn drain<R, S, C>(scheduler: &mut Scheduler<R, S, C>, mode: DrainMode) -> Result<(), DrainError>
where
    R: ActionRunner + 'static,
    S: ServiceClient + 'static,
    C: Clock + 'static,
{
    match mode {
        DrainMode::Regular => match tokio::time::timeout(REGULAR_DRAIN_BUDGET, regular_drain(scheduler)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(budget = ?REGULAR_DRAIN_BUDGET, "regular drain over budget, escalating to expedited");
                expedited_drain(scheduler).await
            }
        },
        DrainMode::Expedited => expedited_drain(scheduler).await,
        DrainMode::Service => service_drain(scheduler).await,
    }
}

async fn regular_drain<R, S, C>(scheduler: &mut Scheduler<R, S, C>) -> Result<(), DrainError>
where
    R: ActionRunner + 'static,
    S: ServiceClient + 'static,
    C: Clock + 'static,
{
    stop(scheduler, WorkerStatus::Stopping).await?;

    let handles: Vec<_> = scheduler.session_handles().cloned().collect();
    for handle in &handles {
        let Some(session) = handle.snapshot().await else { continue };
        for action in session.actions.values() {
            let cancelable = matches!(action.status, ActionStatus::Running | ActionStatus::Queued) && !action.kind.is_env_exit();
            if cancelable {
                handle.cancel(action.action_id.clone(), MODERATE_GRACE);
            }
        }
        handle.request_teardown();
    }

    scheduler.settle(SETTLE_QUIET).await?;
    scheduler.flush_updates().await?;
    stop(scheduler, WorkerStatus::Stopped).await?;
    Ok(())
}

/// Reports every Running action as Interrupted and every Queued action as
/// NeverAttempted in one call, without waiting for the cancel signal to take
/// effect (spec §4.5 "expedited drain").
async fn expedited_drain<R, S, C>(scheduler: &mut Scheduler<R, S, C>) -> Result<(), DrainError>
where
    R: ActionRunner + 'static,
    S: ServiceClient + 'static,
    C: Clock + 'static,
{
    let _ = set_worker_status(scheduler.client().as_ref(), scheduler.worker_id(), scheduler.farm_fleet(), WorkerStatus::Stopping).await;

    let handles: Vec<_> = scheduler.session_handles().cloned().collect();
    let mut updates = Vec::new();
    for handle in &handles {
        let Some(session) = handle.snapshot().await else { continue };
        for action in session.actions.values() {
            match action.status {
                ActionStatus::Running => {
                    updates.push(SessionActionUpdate {
                        session_id: session.session_id.clone(),
                        action_id: action.action_id.clone(),
                        status: ActionStatus::Interrupted,
                        progress: action.progress,
                        message: Some("interrupted by expedited shutdown".into()),
                        process_exit_code: None,
                    });
                    handle.cancel(action.action_id.clone(), MINIMUM_GRACE);
                }
                ActionStatus::Queued => updates.push(SessionActionUpdate {
                    session_id: session.session_id.clone(),
                    action_id: action.action_id.clone(),
                    status: ActionStatus::NeverAttempted,
                    progress: None,
                    message: Some("never attempted, expedited shutdown".into()),
                    process_exit_code: None,
                }),
                _ => {}
            }
        }
        handle.request_teardown();
    }

    if !updates.is_empty() {
        let _ = scheduler
            .client()
            .update_worker_schedule(
                UpdateWorkerScheduleInput {
                    farm_id: scheduler.farm_fleet().farm_id.clone(),
                    fleet_id: scheduler.farm_fleet().fleet_id.clone(),
                    worker_id: scheduler.worker_id().clone(),
                    updated_session_actions: updates,
                },
                CredentialSource::Agent,
            )
            .await;
    }

    let _ = set_worker_status(scheduler.client().as_ref(), scheduler.worker_id(), scheduler.farm_fleet(), WorkerStatus::Stopped).await;
    Ok(())
}

/// The service already drove the cancels and the STOPPED transition via the
/// normal assignment diffing; the agent only needs to acknowledge it.
async fn service_drain<R, S, C>(scheduler: &mut Scheduler<R, S, C>) -> Result<(), DrainError>
where
    R: ActionRunner + 'static,
    S: ServiceClient + 'static,
    C: Clock + 'static,
{
    stop(scheduler, WorkerStatus::Stopping).await?;
    stop(scheduler, WorkerStatus::Stopped).await?;
    Ok(())
}

async fn stop<R, S, C>(scheduler: &Scheduler<R, S, C>, target: WorkerStatus) -> Result<(), DrainError>
where
    R: ActionRunner + 'static,
    S: ServiceClient + 'static,
    C: Clock + 'static,
{
    set_worker_status(scheduler.client().as_ref(), scheduler.worker_id(), scheduler.farm_fleet(), target)
        .await
        .map_err(DrainError::from)
}

/// maps SIGTERM/SIGINT/imminent host-termination-notice to a [`DrainMode`]
/// (spec §4.5 "signals").
pub mod signals {
    use super::DrainMode;
    use tokio::signal::unix::{signal, SignalKind};

    /// Waits for the first external drain trigger and returns the mode it
    /// maps to: SIGTERM and an imminent host termination notice both map to
    /// `Regular`; an interactive interrupt maps to `Expedited`. The host
    /// termination notice is stood in here by SIGUSR1 — wiring the real
    /// source (a cloud metadata endpoint poller, typically) is left to
    /// whatever embeds this agent, the same seam `oja-wire`'s transport is.
    pub async fn wait_for_drain_trigger() -> std::io::Result<DrainMode> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;

        Ok(tokio::select! {
            _ = sigterm.recv() => DrainMode::Regular,
            _ = sigusr1.recv() => DrainMode::Regular,
            _ = tokio::signal::ctrl_c() => DrainMode::Expedited,
        })
    }
}

#[cfg(test)]
#[path = "drain_tests.rs"]
mod tests;
