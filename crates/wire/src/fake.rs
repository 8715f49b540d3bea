// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `ServiceClient` for tests. Scriptable via queued responses so
//! a test can assert the exact sequence of calls a scenario makes (spec §8
//! scenarios), same pattern as `oja-adapters`' `FakeActionRunner`.

use crate::client::ServiceClient;
use crate::requests::{
    AssumeFleetRoleForWorkerInput, AssumeQueueRoleForWorkerInput, BatchGetJobEntityInput,
    BatchGetJobEntityOutput, CreateWorkerInput, CreateWorkerOutput, DeleteWorkerInput,
    UpdateWorkerInput, UpdateWorkerScheduleInput, UpdateWorkerScheduleOutput,
};
use crate::ApiResult;
use async_trait::async_trait;
use oja_core::{AgentCredentials, CredentialSource, QueueCredentials};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Records every call made to it and returns queued canned responses in
/// FIFO order. A call with no queued response panics, so tests fail loudly
/// instead of silently hanging.
#[derive(Default)]
pub struct FakeServiceClient {
    create_worker: Mutex<VecDeque<ApiResult<CreateWorkerOutput>>>,
    assume_fleet_role: Mutex<VecDeque<ApiResult<AgentCredentials>>>,
    assume_queue_role: Mutex<VecDeque<ApiResult<Option<QueueCredentials>>>>,
    update_worker: Mutex<VecDeque<ApiResult<()>>>,
    update_worker_schedule: Mutex<VecDeque<ApiResult<UpdateWorkerScheduleOutput>>>,
    batch_get_job_entity: Mutex<VecDeque<ApiResult<BatchGetJobEntityOutput>>>,
    delete_worker: Mutex<VecDeque<ApiResult<()>>>,
    pub calls: Mutex<Vec<&'static str>>,
    /// Every `update_worker_schedule` input, in call order — lets a test
    /// assert on the exact `updated_session_actions` a scenario sends
    /// without threading a channel through the scheduler just for that.
    pub update_worker_schedule_inputs: Mutex<Vec<UpdateWorkerScheduleInput>>,
    /// The `CredentialSource` passed to every `assume_fleet_role_for_worker`
    /// call, in call order — lets a test assert a refresh chose bootstrap vs.
    /// agent credentials without needing a real `AssumeFleetRoleForWorker`.
    pub assume_fleet_role_sources: Mutex<Vec<CredentialSource>>,
}

impl FakeServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create_worker(&self, result: ApiResult<CreateWorkerOutput>) {
        self.create_worker.lock().push_back(result);
    }

    pub fn push_assume_fleet_role(&self, result: ApiResult<AgentCredentials>) {
        self.assume_fleet_role.lock().push_back(result);
    }

    pub fn push_assume_queue_role(&self, result: ApiResult<Option<QueueCredentials>>) {
        self.assume_queue_role.lock().push_back(result);
    }

    pub fn push_update_worker(&self, result: ApiResult<()>) {
        self.update_worker.lock().push_back(result);
    }

    pub fn push_update_worker_schedule(&self, result: ApiResult<UpdateWorkerScheduleOutput>) {
        self.update_worker_schedule.lock().push_back(result);
    }

    pub fn push_batch_get_job_entity(&self, result: ApiResult<BatchGetJobEntityOutput>) {
        self.batch_get_job_entity.lock().push_back(result);
    }

    pub fn push_delete_worker(&self, result: ApiResult<()>) {
        self.delete_worker.lock().push_back(result);
    }

    fn pop<T>(queue: &Mutex<VecDeque<ApiResult<T>>>, op: &'static str) -> ApiResult<T> {
        queue.lock().pop_front().unwrap_or_else(|| {
            panic!("FakeServiceClient::{op} called with no queued response")
        })
    }
}

#[async_trait]
impl ServiceClient for FakeServiceClient {
    async fn create_worker(
        &self,
        _input: CreateWorkerInput,
        _source: CredentialSource,
    ) -> ApiResult<CreateWorkerOutput> {
        self.calls.lock().push("create_worker");
        Self::pop(&self.create_worker, "create_worker")
    }

    async fn assume_fleet_role_for_worker(
        &self,
        _input: AssumeFleetRoleForWorkerInput,
        source: CredentialSource,
    ) -> ApiResult<AgentCredentials> {
        self.calls.lock().push("assume_fleet_role_for_worker");
        self.assume_fleet_role_sources.lock().push(source);
        Self::pop(&self.assume_fleet_role, "assume_fleet_role_for_worker")
    }

    async fn assume_queue_role_for_worker(
        &self,
        _input: AssumeQueueRoleForWorkerInput,
        _source: CredentialSource,
    ) -> ApiResult<Option<QueueCredentials>> {
        self.calls.lock().push("assume_queue_role_for_worker");
        Self::pop(&self.assume_queue_role, "assume_queue_role_for_worker")
    }

    async fn update_worker(
        &self,
        _input: UpdateWorkerInput,
        _source: CredentialSource,
    ) -> ApiResult<()> {
        self.calls.lock().push("update_worker");
        Self::pop(&self.update_worker, "update_worker")
    }

    async fn update_worker_schedule(
        &self,
        input: UpdateWorkerScheduleInput,
        _source: CredentialSource,
    ) -> ApiResult<UpdateWorkerScheduleOutput> {
        self.calls.lock().push("update_worker_schedule");
        self.update_worker_schedule_inputs.lock().push(input);
        Self::pop(&self.update_worker_schedule, "update_worker_schedule")
    }

    async fn batch_get_job_entity(
        &self,
        _input: BatchGetJobEntityInput,
        _source: CredentialSource,
    ) -> ApiResult<BatchGetJobEntityOutput> {
        self.calls.lock().push("batch_get_job_entity");
        Self::pop(&self.batch_get_job_entity, "batch_get_job_entity")
    }

    async fn delete_worker(
        &self,
        _input: DeleteWorkerInput,
        _source: CredentialSource,
    ) -> ApiResult<()> {
        self.calls.lock().push("delete_worker");
        Self::pop(&self.delete_worker, "delete_worker")
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
