// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::credentials::QueueCredentialManager;
use crate::lifecycle::FarmFleet;
use crate::scheduler::Scheduler;
use oja_core::test_support::fake_queue_credentials;
use oja_core::{Action, ActionId, ActionKind, EnvId, FakeClock, JobId, QueueId, SessionId, WorkerId};
use oja_engine::{RunHandle, RunOutcome, RunStatus, RunnerError};
use oja_wire::{AssignedSession, FakeServiceClient, NewAction, UpdateWorkerScheduleOutput};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tempfile::tempdir;

/// Never settles on its own: the outcome sender is held rather than
/// dropped, so a started action's `RunHandle::outcome` stays pending
/// indefinitely — exactly the state a drain has to act on without waiting
/// for the subprocess to exit on its own (spec §4.4/§4.5).
#[derive(Default)]
struct NeverSettles {
    held: parking_lot::Mutex<std::collections::HashMap<ActionId, tokio::sync::oneshot::Sender<RunOutcome>>>,
}

#[async_trait::async_trait]
impl ActionRunner for NeverSettles {
    async fn start(
        &self,
        action: &Action,
        _os_user: &str,
        _env: &std::collections::HashMap<String, String>,
    ) -> Result<RunHandle, RunnerError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.held.lock().insert(action.action_id.clone(), tx);
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
) -> Scheduler<NeverSettles, FakeServiceClient, FakeClock> {
    let queue_credentials = Arc::new(QueueCredentialManager::new(
        Arc::clone(&client),
        FakeClock::new(),
        dir.to_path_buf(),
        "farm-1".into(),
        "fleet-1".into(),
        WorkerId::new("worker-1"),
    ));
    Scheduler::new(client, FakeClock::new(), Arc::new(NeverSettles::default()), farm_fleet(), WorkerId::new("worker-1"), queue_credentials)
}

/// Assigns one Session with a Running action (never-settling) and a Queued
/// action behind it, plus a Queued envExit at the tail, matching the
/// pipeline shape used in spec §8 scenarios 3/4.
async fn assign_session_with_running_and_queued(
    scheduler: &mut Scheduler<NeverSettles, FakeServiceClient, FakeClock>,
    client: &Arc<FakeServiceClient>,
    session_id: &SessionId,
    running_action: &ActionId,
    queued_action: &ActionId,
    env_exit_action: &ActionId,
    env_id: &EnvId,
) {
    client.push_assume_queue_role(Ok(Some(fake_queue_credentials(0, 3_600_000))));
    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![AssignedSession {
            session_id: session_id.clone(),
            queue_id: QueueId::new("queue-Q"),
            job_id: JobId::new("job-1"),
            os_user: "job-user".into(),
            new_actions: vec![
                NewAction {
                    action_id: running_action.clone(),
                    kind: ActionKind::TaskRun {
                        step_id: oja_core::StepId::new("step-1"),
                        task_id: oja_core::TaskId::new("task-1"),
                    },
                },
                NewAction {
                    action_id: queued_action.clone(),
                    kind: ActionKind::TaskRun {
                        step_id: oja_core::StepId::new("step-2"),
                        task_id: oja_core::TaskId::new("task-2"),
                    },
                },
                NewAction { action_id: env_exit_action.clone(), kind: ActionKind::EnvExit { env_id: env_id.clone() } },
            ],
        }],
        cancel_session_actions: vec![],
        desired_worker_status: None,
        update_interval_seconds: 5,
    }));
    // jobDetails gates Session setup (spec §4.3), fetched in its own batch
    // ahead of the head action's own required entity.
    client.push_batch_get_job_entity(Ok(oja_wire::BatchGetJobEntityOutput {
        results: vec![(oja_wire::EntityRef::JobDetails, oja_wire::EntityResult::Data(serde_json::json!({})))],
    }));
    client.push_batch_get_job_entity(Ok(oja_wire::BatchGetJobEntityOutput {
        results: vec![(
            oja_wire::EntityRef::StepDetails { step_id: "step-1".into() },
            oja_wire::EntityResult::Data(serde_json::json!({})),
        )],
    }));

    scheduler.wait_until_due().await.unwrap();
    scheduler.call_update_worker_schedule().await.unwrap();

    // Drive the scheduler's event loop (without issuing another
    // `UpdateWorkerSchedule` call) until the spawned Session task has
    // fetched entities and started the head action.
    tokio::time::timeout(StdDuration::from_secs(2), async {
        loop {
            scheduler.settle(StdDuration::from_millis(20)).await.unwrap();
            if let Some(session) = scheduler.session_handles().next().unwrap().snapshot().await {
                if session.actions.get(running_action).map(|a| a.status) == Some(ActionStatus::Running) {
                    return;
                }
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn expedited_drain_reports_running_interrupted_and_queued_never_attempted_in_one_batch() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    let session_id = SessionId::new("session-A");
    let running_action = ActionId::new("task1-run");
    let queued_action = ActionId::new("task2-run");
    let env_exit_action = ActionId::new("env1-exit");
    let env_id = EnvId::new("env1");

    let mut scheduler = new_scheduler(client.clone(), dir.path());
    assign_session_with_running_and_queued(
        &mut scheduler,
        &client,
        &session_id,
        &running_action,
        &queued_action,
        &env_exit_action,
        &env_id,
    )
    .await;

    client.push_update_worker(Ok(())); // STOPPING
    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![],
        cancel_session_actions: vec![],
        desired_worker_status: None,
        update_interval_seconds: 5,
    }));
    client.push_update_worker(Ok(())); // STOPPED

    drain(&mut scheduler, DrainMode::Expedited).await.unwrap();

    let calls = client.calls.lock().clone();
    assert_eq!(
        calls.iter().filter(|c| **c == "update_worker_schedule").count(),
        2,
        "one schedule call to assign, one to flush the expedited-drain batch: {calls:?}",
    );
    assert_eq!(calls.iter().filter(|c| **c == "update_worker").count(), 2, "STOPPING then STOPPED: {calls:?}");

    let update_calls = client.update_worker_schedule_inputs.lock();
    let flush = update_calls.last().expect("flush call recorded");
    let by_action: std::collections::HashMap<_, _> =
        flush.updated_session_actions.iter().map(|u| (u.action_id.clone(), u.status)).collect();
    assert_eq!(by_action.get(&running_action), Some(&ActionStatus::Interrupted));
    assert_eq!(by_action.get(&queued_action), Some(&ActionStatus::NeverAttempted));
    // envExit was still Queued (never started), so it too is reported
    // NeverAttempted by the expedited batch rather than being left to run.
    assert_eq!(by_action.get(&env_exit_action), Some(&ActionStatus::NeverAttempted));
}

#[tokio::test]
async fn regular_drain_cancels_running_lets_env_exit_run_then_stops() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    let session_id = SessionId::new("session-A");
    let running_action = ActionId::new("task1-run");
    let queued_action = ActionId::new("task2-run");
    let env_exit_action = ActionId::new("env1-exit");
    let env_id = EnvId::new("env1");

    let mut scheduler = new_scheduler(client.clone(), dir.path());
    assign_session_with_running_and_queued(
        &mut scheduler,
        &client,
        &session_id,
        &running_action,
        &queued_action,
        &env_exit_action,
        &env_id,
    )
    .await;

    client.push_update_worker(Ok(())); // STOPPING
    client.push_update_worker_schedule(Ok(UpdateWorkerScheduleOutput {
        assigned_sessions: vec![],
        cancel_session_actions: vec![],
        desired_worker_status: None,
        update_interval_seconds: 5,
    }));
    client.push_update_worker(Ok(())); // STOPPED

    drain(&mut scheduler, DrainMode::Regular).await.unwrap();

    assert_eq!(client.calls.lock().iter().filter(|c| **c == "update_worker").count(), 2);

    let update_calls = client.update_worker_schedule_inputs.lock();
    let flush = update_calls.last().expect("flush call recorded");
    let by_action: std::collections::HashMap<_, _> =
        flush.updated_session_actions.iter().map(|u| (u.action_id.clone(), u.status)).collect();
    // NeverSettles' cancel() never resolves the oneshot, so by flush time the
    // Running action has only reached the Canceling waypoint, not a false
    // terminal status.
    assert_eq!(by_action.get(&running_action), Some(&ActionStatus::Canceling));
    // The bare Queued non-envExit action is canceled directly (no failure
    // propagation applies), landing on Canceled rather than NeverAttempted.
    assert_eq!(by_action.get(&queued_action), Some(&ActionStatus::Canceled));
    // envExit never got a chance to run (the pipeline is still blocked on
    // the still-in-flight Running action ahead of it), so it's simply not
    // part of this flush at all.
    assert_eq!(by_action.get(&env_exit_action), None);
}

#[tokio::test]
async fn service_drain_only_acknowledges_stopping_then_stopped() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    let mut scheduler = new_scheduler(client.clone(), dir.path());

    client.push_update_worker(Ok(()));
    client.push_update_worker(Ok(()));

    drain(&mut scheduler, DrainMode::Service).await.unwrap();

    assert_eq!(*client.calls.lock(), vec!["update_worker", "update_worker"]);
}
