// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ServiceClient` trait: the agent's sole window onto the remote
//! scheduling service (spec §4.1).

use crate::requests::{
    AssumeFleetRoleForWorkerInput, AssumeQueueRoleForWorkerInput, BatchGetJobEntityInput,
    BatchGetJobEntityOutput, CreateWorkerInput, CreateWorkerOutput, DeleteWorkerInput,
    UpdateWorkerInput, UpdateWorkerScheduleInput, UpdateWorkerScheduleOutput,
};
use crate::ApiResult;
use async_trait::async_trait;
use oja_core::{AgentCredentials, CredentialSource, QueueCredentials};

/// Every operation takes an explicit [`CredentialSource`] so a caller cannot
/// accidentally authenticate a call with the wrong credential set — the
/// invariant from spec §4.1 ("the client never mixes them in one call") is
/// enforced by the function signature, not by convention.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    async fn create_worker(
        &self,
        input: CreateWorkerInput,
        source: CredentialSource,
    ) -> ApiResult<CreateWorkerOutput>;

    async fn assume_fleet_role_for_worker(
        &self,
        input: AssumeFleetRoleForWorkerInput,
        source: CredentialSource,
    ) -> ApiResult<AgentCredentials>;

    /// `None` when the queue grants no credentials for this worker (spec
    /// §4.1: "QueueCredentials or empty").
    async fn assume_queue_role_for_worker(
        &self,
        input: AssumeQueueRoleForWorkerInput,
        source: CredentialSource,
    ) -> ApiResult<Option<QueueCredentials>>;

    async fn update_worker(
        &self,
        input: UpdateWorkerInput,
        source: CredentialSource,
    ) -> ApiResult<()>;

    async fn update_worker_schedule(
        &self,
        input: UpdateWorkerScheduleInput,
        source: CredentialSource,
    ) -> ApiResult<UpdateWorkerScheduleOutput>;

    async fn batch_get_job_entity(
        &self,
        input: BatchGetJobEntityInput,
        source: CredentialSource,
    ) -> ApiResult<BatchGetJobEntityOutput>;

    async fn delete_worker(
        &self,
        input: DeleteWorkerInput,
        source: CredentialSource,
    ) -> ApiResult<()>;
}
