// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level control flow: bootstrap, credential refresh, the scheduler
//! cadence, and shutdown, wired together the way spec §4.5 describes the
//! worker lifecycle end to end. Generic over the same
//! `(ActionRunner, ServiceClient, Clock)` triple as the rest of the agent so
//! tests can drive it with fakes.

use crate::config::{Config, WorkerNotFoundPolicy};
use oja_core::{ApiError, Clock, WorkerId};
use oja_daemon::credentials::{AgentCredentialManager, CredentialError};
use oja_daemon::drain::{drain, signals, DrainError, DrainMode};
use oja_daemon::lifecycle::{self, FarmFleet, LifecycleError};
use oja_daemon::scheduler::{LoopExit, Scheduler, SchedulerError};
use oja_daemon::QueueCredentialManager;
use oja_engine::ActionRunner;
use oja_storage::{AgentCredentialStore, StorageError, WorkerIdentity};
use oja_wire::{CredentialSource, DeleteWorkerInput, ServiceClient};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Drain(#[from] DrainError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// `worker_not_found_policy = exit` (spec §7: "NotFound (worker)").
    #[error("worker not found by service, exiting per configured policy: {0}")]
    WorkerNotFoundExit(String),
    #[error("failed to wait for a drain signal: {0}")]
    Signal(#[from] std::io::Error),
}

enum RoundOutcome {
    Scheduler(Result<LoopExit, SchedulerError>),
    Signal(std::io::Result<DrainMode>),
}

/// Runs the agent to completion: bootstrap, serve the scheduler cadence
/// until the service or an external signal asks for a stop, drain, and
/// return. Restarts bootstrap in place on a `NotFound(worker)` response when
/// `config.worker_not_found_policy` is `Restart`, without the caller having
/// to re-invoke this function.
pub async fn run<R, S, C>(
    client: Arc<S>,
    clock: C,
    runner: Arc<R>,
    farm_fleet: FarmFleet,
    identity: &WorkerIdentity,
    agent_credential_path: PathBuf,
    queue_credentials_dir: PathBuf,
    config: &Config,
) -> Result<(), AgentError>
where
    R: ActionRunner + 'static,
    S: ServiceClient + 'static,
    C: Clock + 'static,
{
    loop {
        let (worker_id, agent_credentials) =
            lifecycle::run_startup(client.as_ref(), identity, &farm_fleet).await?;

        let agent_credential_manager = Arc::new(AgentCredentialManager::new(
            Arc::clone(&client),
            clock.clone(),
            AgentCredentialStore::new(agent_credential_path.clone()),
            farm_fleet.farm_id.clone(),
            farm_fleet.fleet_id.clone(),
            worker_id.clone(),
            agent_credentials,
        )?);
        let refresh_task = tokio::spawn({
            let manager = Arc::clone(&agent_credential_manager);
            async move { manager.run().await }
        });

        let queue_credentials = Arc::new(QueueCredentialManager::new(
            Arc::clone(&client),
            clock.clone(),
            queue_credentials_dir.clone(),
            farm_fleet.farm_id.clone(),
            farm_fleet.fleet_id.clone(),
            worker_id.clone(),
        ));

        let mut scheduler = Scheduler::with_entity_retry_limit(
            Arc::clone(&client),
            clock.clone(),
            Arc::clone(&runner),
            farm_fleet.clone(),
            worker_id.clone(),
            Arc::clone(&queue_credentials),
            config.entity_retry_limit,
        );

        let outcome = tokio::select! {
            result = scheduler.run() => RoundOutcome::Scheduler(result),
            trigger = signals::wait_for_drain_trigger() => RoundOutcome::Signal(trigger),
        };

        refresh_task.abort();

        match outcome {
            RoundOutcome::Scheduler(Ok(LoopExit::ServiceStopRequested)) => {
                drain(&mut scheduler, DrainMode::Service).await?;
                maybe_delete_worker(client.as_ref(), &farm_fleet, &worker_id, config).await;
                return Ok(());
            }
            RoundOutcome::Scheduler(Err(SchedulerError::Api(ApiError::NotFound(reason)))) => {
                tracing::warn!(%reason, "worker not found by service");
                match config.worker_not_found_policy {
                    WorkerNotFoundPolicy::Restart => {
                        identity.clear()?;
                        continue;
                    }
                    WorkerNotFoundPolicy::Exit => return Err(AgentError::WorkerNotFoundExit(reason)),
                }
            }
            RoundOutcome::Scheduler(Err(err)) => return Err(err.into()),
            RoundOutcome::Signal(Ok(mode)) => {
                drain(&mut scheduler, mode).await?;
                maybe_delete_worker(client.as_ref(), &farm_fleet, &worker_id, config).await;
                return Ok(());
            }
            RoundOutcome::Signal(Err(err)) => return Err(err.into()),
        }
    }
}

/// Best-effort `DeleteWorker` on a clean shutdown when configured to
/// (spec's open question on worker cleanup); failures are logged, not
/// fatal — the process is already on its way out.
async fn maybe_delete_worker<S: ServiceClient>(
    client: &S,
    farm_fleet: &FarmFleet,
    worker_id: &WorkerId,
    config: &Config,
) {
    if !config.delete_worker_on_shutdown {
        return;
    }
    let result = client
        .delete_worker(
            DeleteWorkerInput {
                farm_id: farm_fleet.farm_id.clone(),
                fleet_id: farm_fleet.fleet_id.clone(),
                worker_id: worker_id.clone(),
            },
            CredentialSource::Agent,
        )
        .await;
    if let Err(err) = result {
        tracing::warn!(error = %err, "DeleteWorker failed during shutdown, worker left STOPPED");
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
