// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The real `ServiceClient` transport (an HTTP client against the farm
//! scheduling service) is out of scope for this crate — it lives in
//! whatever embeds the agent. [`UnwiredServiceClient`] is the documented
//! stand-in: it implements the trait so the rest of the agent composes, and
//! fails fast and loud on every call rather than pretending to talk to a
//! service that was never configured.

use async_trait::async_trait;
use oja_core::{AgentCredentials, ApiError, CredentialSource, QueueCredentials};
use oja_wire::{
    ApiResult, AssumeFleetRoleForWorkerInput, AssumeQueueRoleForWorkerInput, BatchGetJobEntityInput,
    BatchGetJobEntityOutput, CreateWorkerInput, CreateWorkerOutput, DeleteWorkerInput, ServiceClient,
    UpdateWorkerInput, UpdateWorkerScheduleInput, UpdateWorkerScheduleOutput,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct UnwiredServiceClient;

fn unwired(operation: &str) -> ApiError {
    tracing::error!(operation, "no ServiceClient transport configured for this build");
    ApiError::InternalServerError
}

#[async_trait]
impl ServiceClient for UnwiredServiceClient {
    async fn create_worker(&self, _input: CreateWorkerInput, _source: CredentialSource) -> ApiResult<CreateWorkerOutput> {
        Err(unwired("CreateWorker"))
    }

    async fn assume_fleet_role_for_worker(
        &self,
        _input: AssumeFleetRoleForWorkerInput,
        _source: CredentialSource,
    ) -> ApiResult<AgentCredentials> {
        Err(unwired("AssumeFleetRoleForWorker"))
    }

    async fn assume_queue_role_for_worker(
        &self,
        _input: AssumeQueueRoleForWorkerInput,
        _source: CredentialSource,
    ) -> ApiResult<Option<QueueCredentials>> {
        Err(unwired("AssumeQueueRoleForWorker"))
    }

    async fn update_worker(&self, _input: UpdateWorkerInput, _source: CredentialSource) -> ApiResult<()> {
        Err(unwired("UpdateWorker"))
    }

    async fn update_worker_schedule(
        &self,
        _input: UpdateWorkerScheduleInput,
        _source: CredentialSource,
    ) -> ApiResult<UpdateWorkerScheduleOutput> {
        Err(unwired("UpdateWorkerSchedule"))
    }

    async fn batch_get_job_entity(
        &self,
        _input: BatchGetJobEntityInput,
        _source: CredentialSource,
    ) -> ApiResult<BatchGetJobEntityOutput> {
        Err(unwired("BatchGetJobEntity"))
    }

    async fn delete_worker(&self, _input: DeleteWorkerInput, _source: CredentialSource) -> ApiResult<()> {
        Err(unwired("DeleteWorker"))
    }
}
