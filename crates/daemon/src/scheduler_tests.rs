// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::credentials::QueueCredentialManager;
use oja_core::test_support::fake_queue_credentials;
use oja_core::{ActionId, ActionKind, ActionStatus, EnvId, FakeClock, JobId, QueueId, SessionId, StepId, TaskId, WorkerId};
use oja_engine::{RunHandle, RunOutcome, RunStatus, RunnerError};
use oja_wire::{
    AssignedSession, AssignmentCancel, BatchGetJobEntityOutput, EntityRef, EntityResult, FakeServiceClient, NewAction,
};
use std::time::Duration as StdDuration;
use tempfile::tempdir;

struct AlwaysSucceeds;

#[async_trait::async_trait]
impl ActionRunner for AlwaysSucceeds {
    async fn start(
        &self,
        action: &Action,
        _os_user: &str,
        _env: &std::collections::HashMap<String, String>,
    ) -> Result<RunHandle, RunnerError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _ = tx.send(RunOutcome { exit_code: Some(0), status: RunStatus::Succeeded });
        Ok(RunHandle { action_id: action.action_id.clone(), outcome: rx })
    }

    async fn cancel(&self, _action_id: &ActionId, _grace: StdDuration) {}
}

fn farm_fleet() -> FarmFleet {
    FarmFleet { farm_id: "farm-1".into(), fleet_id: "fleet-1".into() }
}

fn new_scheduler(
    client: Arc<FakeServiceClient>,
    dir: &std::path::Path,
) -> Scheduler<AlwaysSucceeds, FakeServiceClient, FakeClock> {
    let queue_credentials = Arc::new(QueueCredentialManager::new(
        Arc::clone(&client),
        FakeClock::new(),
        dir.to_path_buf(),
        "farm-1".into(),
        "fleet-1".into(),
        WorkerId::new("worker-1"),
    ));
    Scheduler::new(client, FakeClock::new(), Arc::new(AlwaysSucceeds), farm_fleet(), WorkerId::new("worker-1"), queue_credentials)
}

#[tokio::test]
async fn first_iteration_calls_immediately_and_honors_service_stop() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![],
        cancel_session_actions: vec![],
        desired_worker_status: Some(WorkerStatus::Stopped),
        update_interval_seconds: 5,
    }));
    let mut scheduler = new_scheduler(client.clone(), dir.path());

    let exit = tokio::time::timeout(StdDuration::from_secs(1), scheduler.run()).await.unwrap().unwrap();

    assert_eq!(exit, LoopExit::ServiceStopRequested);
    assert_eq!(*client.calls.lock(), vec!["update_worker_schedule"]);
}

#[tokio::test]
async fn assigned_session_runs_its_action_and_reports_completion_before_stop() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());

    let session_id = SessionId::new("session-A");
    let queue_id = QueueId::new("queue-Q");
    let action_id = ActionId::new("action-1");
    let step_id = StepId::new("step-1");
    let task_id = TaskId::new("task-1");

    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![AssignedSession {
            session_id: session_id.clone(),
            queue_id: queue_id.clone(),
            job_id: JobId::new("job-1"),
            os_user: "job-user".into(),
            new_actions: vec![NewAction {
                action_id: action_id.clone(),
                kind: ActionKind::TaskRun { step_id: step_id.clone(), task_id: task_id.clone() },
            }],
        }],
        cancel_session_actions: vec![],
        desired_worker_status: None,
        update_interval_seconds: 5,
    }));
    client.push_assume_queue_role(Ok(Some(fake_queue_credentials(0, 3_600_000))));
    // jobDetails gates Session setup (spec §4.3), so it's fetched in its own
    // batch ahead of the action's own required entity.
    client.push_batch_get_job_entity(Ok(BatchGetJobEntityOutput {
        results: vec![(EntityRef::JobDetails, EntityResult::Data(serde_json::json!({})))],
    }));
    client.push_batch_get_job_entity(Ok(BatchGetJobEntityOutput {
        results: vec![(
            EntityRef::StepDetails { step_id: step_id.as_str().to_string() },
            EntityResult::Data(serde_json::json!({})),
        )],
    }));
    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![],
        cancel_session_actions: vec![],
        desired_worker_status: Some(WorkerStatus::Stopped),
        update_interval_seconds: 5,
    }));

    let mut scheduler = new_scheduler(client.clone(), dir.path());

    let exit = tokio::time::timeout(StdDuration::from_secs(2), scheduler.run()).await.unwrap().unwrap();

    assert_eq!(exit, LoopExit::ServiceStopRequested);
    assert_eq!(
        *client.calls.lock(),
        vec![
            "update_worker_schedule",
            "assume_queue_role_for_worker",
            "batch_get_job_entity",
            "batch_get_job_entity",
            "update_worker_schedule",
        ],
    );
}

#[tokio::test]
async fn queue_credential_acquire_failure_fails_head_instead_of_erroring_the_loop() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    let session_id = SessionId::new("session-A");
    let action_id = ActionId::new("action-1");

    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![AssignedSession {
            session_id: session_id.clone(),
            queue_id: QueueId::new("queue-Q"),
            job_id: JobId::new("job-1"),
            os_user: "job-user".into(),
            new_actions: vec![NewAction {
                action_id: action_id.clone(),
                kind: ActionKind::TaskRun { step_id: StepId::new("step-1"), task_id: TaskId::new("task-1") },
            }],
        }],
        cancel_session_actions: vec![],
        desired_worker_status: None,
        update_interval_seconds: 5,
    }));
    client.push_assume_queue_role(Err(oja_core::ApiError::AccessDenied));

    let mut scheduler = new_scheduler(client.clone(), dir.path());
    scheduler.wait_until_due().await.unwrap();
    // Must not tear down the scheduler loop (spec §4.2/§7): a retry-exhausted
    // queue-credential failure fails the assigned session's head action
    // instead of propagating as a `SchedulerError`.
    scheduler.call_update_worker_schedule().await.unwrap();

    assert!(scheduler.sessions.contains_key(&session_id));
    let event = tokio::time::timeout(StdDuration::from_secs(1), scheduler.event_rx.recv()).await.unwrap().unwrap();
    match event {
        (sid, SessionEvent::StatusChanged(change)) => {
            assert_eq!(sid, session_id);
            assert_eq!(change.action_id, action_id);
            assert_eq!(change.status, ActionStatus::Failed);
            assert!(change.message.as_deref().is_some_and(|m| m.contains("queue credentials")));
        }
        other => panic!("expected a fail-head StatusChanged, got {other:?}"),
    }
}

#[tokio::test]
async fn second_queue_is_refused_while_first_is_still_active() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());

    let first = SessionId::new("session-A");
    let second = SessionId::new("session-B");

    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![
            AssignedSession {
                session_id: first.clone(),
                queue_id: QueueId::new("queue-1"),
                job_id: JobId::new("job-1"),
                os_user: "job-user".into(),
                new_actions: vec![],
            },
            AssignedSession {
                session_id: second.clone(),
                queue_id: QueueId::new("queue-2"),
                job_id: JobId::new("job-2"),
                os_user: "job-user".into(),
                new_actions: vec![],
            },
        ],
        cancel_session_actions: vec![],
        desired_worker_status: None,
        update_interval_seconds: 5,
    }));
    client.push_assume_queue_role(Ok(Some(fake_queue_credentials(0, 3_600_000))));

    let mut scheduler = new_scheduler(client.clone(), dir.path());
    scheduler.wait_until_due().await.unwrap();
    scheduler.call_update_worker_schedule().await.unwrap();

    assert!(scheduler.sessions.contains_key(&first));
    assert!(!scheduler.sessions.contains_key(&second));
    assert_eq!(client.calls.lock().iter().filter(|c| **c == "assume_queue_role_for_worker").count(), 1);
}

#[tokio::test]
async fn cancel_target_routes_to_its_session() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    let session_id = SessionId::new("session-A");
    let action_id = ActionId::new("action-1");
    let env_id = EnvId::new("env-1");

    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![AssignedSession {
            session_id: session_id.clone(),
            queue_id: QueueId::new("queue-Q"),
            job_id: JobId::new("job-1"),
            os_user: "job-user".into(),
            new_actions: vec![NewAction { action_id: action_id.clone(), kind: ActionKind::EnvEnter { env_id } }],
        }],
        cancel_session_actions: vec![AssignmentCancel { session_id: session_id.clone(), action_id: action_id.clone() }],
        desired_worker_status: None,
        update_interval_seconds: 5,
    }));
    client.push_assume_queue_role(Ok(Some(fake_queue_credentials(0, 3_600_000))));

    let mut scheduler = new_scheduler(client.clone(), dir.path());
    scheduler.wait_until_due().await.unwrap();
    scheduler.call_update_worker_schedule().await.unwrap();

    assert!(scheduler.sessions.contains_key(&session_id));
    let event = tokio::time::timeout(StdDuration::from_secs(1), scheduler.event_rx.recv()).await.unwrap().unwrap();
    match event {
        (sid, SessionEvent::StatusChanged(change)) => {
            assert_eq!(sid, session_id);
            assert_eq!(change.action_id, action_id);
            assert_eq!(change.status, ActionStatus::Canceled);
        }
        other => panic!("expected a cancel StatusChanged, got {other:?}"),
    }
}
