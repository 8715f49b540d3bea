// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures, available in-crate under `#[cfg(test)]` and to
//! downstream crates under the `test-support` feature.

use crate::action::{Action, ActionId, ActionKind};
use crate::credentials::{AgentCredentials, CredentialSet, QueueCredentials};
use crate::id::{EnvId, JobId, QueueId, StepId, TaskId};
use crate::session::{Session, SessionId};

/// A `CredentialSet` expiring `ttl_ms` after `now_ms`.
pub fn fake_credential_set(now_ms: u64, ttl_ms: u64) -> CredentialSet {
    CredentialSet {
        version: 1,
        access_key_id: "AKIAFAKE".into(),
        secret_access_key: "fake-secret".into(),
        session_token: "fake-token".into(),
        expiration: "2026-01-01T00:00:00Z".into(),
        expiration_epoch_ms: now_ms + ttl_ms,
    }
}

pub fn fake_agent_credentials(now_ms: u64, ttl_ms: u64) -> AgentCredentials {
    AgentCredentials::new(fake_credential_set(now_ms, ttl_ms))
}

pub fn fake_queue_credentials(now_ms: u64, ttl_ms: u64) -> QueueCredentials {
    QueueCredentials::new(fake_credential_set(now_ms, ttl_ms))
}

/// A Session with one `EnvEnter`/`TaskRun`/`EnvExit` pipeline, matching the
/// happy-path scenario: session-A in queue-Q running job-1 as job-user.
pub fn sample_session() -> Session {
    let mut session = Session::new(
        SessionId::new("session-A"),
        QueueId::new("queue-Q"),
        JobId::new("job-1"),
        "job-user".into(),
    );
    session.push(Action::queued(
        ActionId::new("env1-enter"),
        ActionKind::EnvEnter { env_id: EnvId::new("env1") },
    ));
    session.push(Action::queued(
        ActionId::new("task1-run"),
        ActionKind::TaskRun { step_id: StepId::new("step1"), task_id: TaskId::new("task1") },
    ));
    session.push(Action::queued(
        ActionId::new("env1-exit"),
        ActionKind::EnvExit { env_id: EnvId::new("env1") },
    ));
    session
}
