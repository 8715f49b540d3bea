// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle: the startup workflow and the `UpdateWorker` state
//! machine of spec §4.5, including its conflict-handling table.

use oja_core::{AgentCredentials, ApiError, Backoff, ConflictReason, CredentialSource, WorkerId, WorkerStatus};
use oja_storage::{StorageError, WorkerIdentity};
use oja_wire::{
    AssumeFleetRoleForWorkerInput, CreateWorkerInput, CreateWorkerOutput, ServiceClient,
    UpdateWorkerInput,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("remote call failed: {0}")]
    Api(#[from] ApiError),
    #[error("worker identity storage error: {0}")]
    Storage(#[from] StorageError),
    /// Bootstrap cannot proceed and the process must exit (spec §7: "abort;
    /// process exits").
    #[error("bootstrap aborted: {0}")]
    Aborted(String),
}

/// Identity the worker registers under; constant for the process lifetime.
#[derive(Debug, Clone)]
pub struct FarmFleet {
    pub farm_id: String,
    pub fleet_id: String,
}

/// Caps the `UpdateWorker(STARTED)` retry loop so a persistently-conflicting
/// worker doesn't spin forever inside bootstrap; the main loop re-runs
/// startup on a later `STATUS_CONFLICT` regardless.
const MAX_START_ATTEMPTS: u32 = 20;

/// `CreateWorker`-or-skip, `AssumeFleetRoleForWorker`, then
/// `UpdateWorker(STARTED)` (spec §4.5 "Worker lifecycle state machine").
/// A worker with a persisted id skips straight to assuming the fleet role.
pub async fn run_startup<C: ServiceClient>(
    client: &C,
    identity: &WorkerIdentity,
    farm_fleet: &FarmFleet,
) -> Result<(WorkerId, AgentCredentials), LifecycleError> {
    let worker_id = match identity.load()? {
        Some(id) => id,
        None => {
            let result = client
                .create_worker(
                    CreateWorkerInput {
                        farm_id: farm_fleet.farm_id.clone(),
                        fleet_id: farm_fleet.fleet_id.clone(),
                    },
                    CredentialSource::Bootstrap,
                )
                .await;
            let CreateWorkerOutput { worker_id } = match result {
                Ok(output) => output,
                Err(ApiError::Conflict { reason: ConflictReason::ResourceAlreadyExists, .. }) => {
                    return Err(LifecycleError::Aborted(
                        "CreateWorker: a worker already exists for this identity".into(),
                    ));
                }
                Err(ApiError::AccessDenied) => {
                    return Err(LifecycleError::Aborted("CreateWorker: access denied".into()));
                }
                Err(other) => return Err(other.into()),
            };
            identity.save(&worker_id)?;
            worker_id
        }
    };

    let agent_credentials = client
        .assume_fleet_role_for_worker(
            AssumeFleetRoleForWorkerInput {
                farm_id: farm_fleet.farm_id.clone(),
                fleet_id: farm_fleet.fleet_id.clone(),
                worker_id: worker_id.clone(),
            },
            CredentialSource::Bootstrap,
        )
        .await
        .map_err(abort_on_access_denied)?;

    set_worker_status(client, &worker_id, farm_fleet, WorkerStatus::Started).await?;

    Ok((worker_id, agent_credentials))
}

fn abort_on_access_denied(err: ApiError) -> LifecycleError {
    match err {
        ApiError::AccessDenied => LifecycleError::Aborted("access denied during bootstrap".into()),
        other => other.into(),
    }
}

/// `UpdateWorker(target)` with the conflict table of spec §4.5/§7:
/// `STATUS_CONFLICT`/`CONCURRENT_MODIFICATION` retry with backoff;
/// `STOPPING`/`NOT_COMPATIBLE` require calling `UpdateWorker(STOPPED)` first,
/// then retrying the original target.
pub async fn set_worker_status<C: ServiceClient>(
    client: &C,
    worker_id: &WorkerId,
    farm_fleet: &FarmFleet,
    target: WorkerStatus,
) -> Result<(), LifecycleError> {
    let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(30));
    let mut attempt = 0u32;

    loop {
        let result = client
            .update_worker(
                UpdateWorkerInput {
                    farm_id: farm_fleet.farm_id.clone(),
                    fleet_id: farm_fleet.fleet_id.clone(),
                    worker_id: worker_id.clone(),
                    target_status: target,
                },
                CredentialSource::Agent,
            )
            .await;

        match result {
            Ok(()) => return Ok(()),
            Err(ApiError::AccessDenied) => {
                return Err(LifecycleError::Aborted(format!("UpdateWorker({target}): access denied")));
            }
            Err(ApiError::Conflict { reason: ConflictReason::Stopping, .. })
            | Err(ApiError::Conflict { reason: ConflictReason::NotCompatible, .. })
                if target == WorkerStatus::Started =>
            {
                let _ = client
                    .update_worker(
                        UpdateWorkerInput {
                            farm_id: farm_fleet.farm_id.clone(),
                            fleet_id: farm_fleet.fleet_id.clone(),
                            worker_id: worker_id.clone(),
                            target_status: WorkerStatus::Stopped,
                        },
                        CredentialSource::Agent,
                    )
                    .await;
                attempt = bump(attempt)?;
            }
            Err(ApiError::Conflict { reason: ConflictReason::StatusConflict, .. })
            | Err(ApiError::Conflict { reason: ConflictReason::ConcurrentModification, .. })
            | Err(ApiError::Throttled)
            | Err(ApiError::InternalServerError) => {
                tokio::time::sleep(backoff.next_delay(attempt)).await;
                attempt = bump(attempt)?;
            }
            Err(other) => return Err(other.into()),
        }
    }
}

fn bump(attempt: u32) -> Result<u32, LifecycleError> {
    if attempt + 1 >= MAX_START_ATTEMPTS {
        return Err(LifecycleError::Aborted(format!(
            "UpdateWorker did not settle after {MAX_START_ATTEMPTS} attempts"
        )));
    }
    Ok(attempt + 1)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
