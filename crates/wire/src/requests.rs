// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response DTOs for the seven `ServiceClient` operations
//! (spec §4.1).

use crate::entity::EntityRef;
use oja_core::{ActionId, ActionKind, ActionStatus, JobId, QueueId, SessionId, WorkerId, WorkerStatus};
use serde::{Deserialize, Serialize};

/// A newly-assigned Action as the service describes it: enough to build
/// an `Action::queued` locally without a separate entity fetch for kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAction {
    pub action_id: ActionId,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkerInput {
    pub farm_id: String,
    pub fleet_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkerOutput {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssumeFleetRoleForWorkerInput {
    pub farm_id: String,
    pub fleet_id: String,
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssumeQueueRoleForWorkerInput {
    pub farm_id: String,
    pub fleet_id: String,
    pub worker_id: WorkerId,
    pub queue_id: QueueId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWorkerInput {
    pub farm_id: String,
    pub fleet_id: String,
    pub worker_id: WorkerId,
    pub target_status: WorkerStatus,
}

/// One Action's status as reported back in `updated_session_actions`
/// (spec §4.5: "assembled from every terminal transition ... plus changes
/// to Running action progress/message").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionActionUpdate {
    pub session_id: SessionId,
    pub action_id: ActionId,
    pub status: ActionStatus,
    pub progress: Option<f32>,
    pub message: Option<String>,
    pub process_exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateWorkerScheduleInput {
    pub farm_id: String,
    pub fleet_id: String,
    pub worker_id: WorkerId,
    pub updated_session_actions: Vec<SessionActionUpdate>,
}

/// A Session the service currently assigns to this worker, with any newly
/// queued actions (spec §4.5: "append any newly-listed actions, order
/// preserved").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedSession {
    pub session_id: SessionId,
    pub queue_id: QueueId,
    pub job_id: JobId,
    pub os_user: String,
    pub new_actions: Vec<NewAction>,
}

/// A cancel target within an assigned Session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCancel {
    pub session_id: SessionId,
    pub action_id: ActionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateWorkerScheduleOutput {
    pub assigned_sessions: Vec<AssignedSession>,
    pub cancel_session_actions: Vec<AssignmentCancel>,
    pub desired_worker_status: Option<WorkerStatus>,
    pub update_interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGetJobEntityInput {
    pub farm_id: String,
    pub fleet_id: String,
    pub worker_id: WorkerId,
    pub entity_refs: Vec<EntityRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetJobEntityOutput {
    pub results: Vec<(EntityRef, crate::entity::EntityResult)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteWorkerInput {
    pub farm_id: String,
    pub fleet_id: String,
    pub worker_id: WorkerId,
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod tests;
