// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::action::{Action, ActionKind, ActionStatus};
use crate::id::{EnvId, StepId, TaskId};

fn session() -> Session {
    Session::new(
        SessionId::new("session-A"),
        QueueId::new("queue-Q"),
        JobId::new("job-1"),
        "job-user".into(),
    )
}

fn push(s: &mut Session, id: &str, kind: ActionKind) {
    s.push(Action::queued(ActionId::new(id), kind));
}

#[test]
fn head_returns_first_non_terminal() {
    let mut s = session();
    push(&mut s, "a1", ActionKind::EnvEnter { env_id: EnvId::new("env1") });
    push(&mut s, "a2", ActionKind::TaskRun { step_id: StepId::new("s1"), task_id: TaskId::new("t1") });
    assert_eq!(s.head().unwrap().action_id, ActionId::new("a1"));

    s.head_mut().unwrap().start(0);
    s.head_mut().unwrap().succeed(1, 0);
    assert_eq!(s.head().unwrap().action_id, ActionId::new("a2"));
}

#[test]
fn propagate_failure_never_attempts_subsequent_task_runs() {
    let mut s = session();
    push(&mut s, "a1", ActionKind::EnvEnter { env_id: EnvId::new("env1") });
    push(&mut s, "a2", ActionKind::TaskRun { step_id: StepId::new("s1"), task_id: TaskId::new("t1") });
    push(&mut s, "a3", ActionKind::TaskRun { step_id: StepId::new("s2"), task_id: TaskId::new("t2") });
    push(&mut s, "a4", ActionKind::EnvExit { env_id: EnvId::new("env1") });

    s.actions[0].start(0);
    s.actions[0].succeed(1, 0);
    s.actions[1].start(2);
    s.actions[1].fail(3, "boom", Some(1));

    s.propagate_failure(&ActionId::new("a2"), "upstream failure");

    assert_eq!(s.actions[&ActionId::new("a3")].status, ActionStatus::NeverAttempted);
    // a4 is envExit for env1, which successfully entered: it must stay queued.
    assert_eq!(s.actions[&ActionId::new("a4")].status, ActionStatus::Queued);
    assert_eq!(s.state, SessionState::Cleaning);
}

#[test]
fn propagate_failure_still_runs_env_exit_for_an_env_enter_that_failed() {
    let mut s = session();
    push(&mut s, "a1", ActionKind::EnvEnter { env_id: EnvId::new("env1") });
    push(&mut s, "a2", ActionKind::EnvExit { env_id: EnvId::new("env1") });

    s.actions[0].start(0);
    s.actions[0].fail(1, "boom", Some(1));

    s.propagate_failure(&ActionId::new("a1"), "upstream failure");

    // env1 was entered (the envEnter reached a terminal state, even though it
    // failed), so its envExit is kept queued to tear down whatever partial
    // state the failed envEnter left behind, not skipped as NeverAttempted.
    assert_eq!(s.actions[&ActionId::new("a2")].status, ActionStatus::Queued);
}

#[test]
fn propagate_failure_also_never_attempts_env_exit_for_unentered_env() {
    let mut s = session();
    push(&mut s, "a1", ActionKind::TaskRun { step_id: StepId::new("s1"), task_id: TaskId::new("t1") });
    push(&mut s, "a2", ActionKind::EnvExit { env_id: EnvId::new("env-never-entered") });

    s.actions[0].start(0);
    s.actions[0].fail(1, "boom", Some(1));
    s.propagate_failure(&ActionId::new("a1"), "upstream failure");

    assert_eq!(s.actions[&ActionId::new("a2")].status, ActionStatus::NeverAttempted);
}

#[test]
fn is_drained_true_only_when_all_terminal() {
    let mut s = session();
    push(&mut s, "a1", ActionKind::TaskRun { step_id: StepId::new("s1"), task_id: TaskId::new("t1") });
    assert!(!s.is_drained());
    s.actions[0].start(0);
    s.actions[0].succeed(1, 0);
    assert!(s.is_drained());
}

#[test]
fn queue_id_is_immutable_field() {
    let s = session();
    assert_eq!(s.queue_id, QueueId::new("queue-Q"));
}
