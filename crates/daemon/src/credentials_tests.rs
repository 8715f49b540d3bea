// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oja_core::test_support::{fake_agent_credentials, fake_queue_credentials};
use oja_core::{ConflictReason, FakeClock};
use oja_wire::FakeServiceClient;
use tempfile::tempdir;

fn worker_id() -> WorkerId {
    WorkerId::new("worker-1")
}

#[tokio::test]
async fn new_persists_initial_credentials_and_snapshot_matches() {
    let dir = tempdir().unwrap();
    let store = AgentCredentialStore::new(dir.path().join("agent.json"));
    let client = Arc::new(FakeServiceClient::new());
    let initial = fake_agent_credentials(1_000_000, 3_600_000);

    let manager = AgentCredentialManager::new(
        client,
        FakeClock::new(),
        store.clone(),
        "farm-1".into(),
        "fleet-1".into(),
        worker_id(),
        initial.clone(),
    )
    .unwrap();

    assert_eq!(manager.snapshot(), initial);
    assert_eq!(store.read().unwrap(), initial.set);
}

#[tokio::test]
async fn refresh_once_replaces_snapshot_and_rewrites_file() {
    let dir = tempdir().unwrap();
    let store = AgentCredentialStore::new(dir.path().join("agent.json"));
    let client = Arc::new(FakeServiceClient::new());
    let fresh = fake_agent_credentials(2_000_000, 3_600_000);
    client.push_assume_fleet_role(Ok(fresh.clone()));

    let manager = AgentCredentialManager::new(
        client,
        FakeClock::new(),
        store.clone(),
        "farm-1".into(),
        "fleet-1".into(),
        worker_id(),
        fake_agent_credentials(0, 60_000),
    )
    .unwrap();

    manager.refresh_once().await.unwrap();

    assert_eq!(manager.snapshot(), fresh);
    assert_eq!(store.read().unwrap(), fresh.set);
}

#[tokio::test]
async fn refresh_once_on_matching_worker_conflict_keeps_cached() {
    let dir = tempdir().unwrap();
    let store = AgentCredentialStore::new(dir.path().join("agent.json"));
    let client = Arc::new(FakeServiceClient::new());
    client.push_assume_fleet_role(Err(ApiError::Conflict {
        reason: ConflictReason::StatusConflict,
        resource_id: "worker-1".into(),
        context: "mid transition".into(),
    }));
    let initial = fake_agent_credentials(0, 60_000);

    let manager = AgentCredentialManager::new(
        client,
        FakeClock::new(),
        store,
        "farm-1".into(),
        "fleet-1".into(),
        worker_id(),
        initial.clone(),
    )
    .unwrap();

    manager.refresh_once().await.unwrap();
    assert_eq!(manager.snapshot(), initial);
}

#[tokio::test]
async fn refresh_once_uses_agent_credentials_while_current_set_is_still_valid() {
    let dir = tempdir().unwrap();
    let store = AgentCredentialStore::new(dir.path().join("agent.json"));
    let client = Arc::new(FakeServiceClient::new());
    let clock = FakeClock::new();
    client.push_assume_fleet_role(Ok(fake_agent_credentials(clock.epoch_ms(), 3_600_000)));

    let manager = AgentCredentialManager::new(
        client.clone(),
        clock.clone(),
        store,
        "farm-1".into(),
        "fleet-1".into(),
        worker_id(),
        fake_agent_credentials(clock.epoch_ms(), 3_600_000),
    )
    .unwrap();

    manager.refresh_once().await.unwrap();

    assert_eq!(*client.assume_fleet_role_sources.lock(), vec![oja_core::CredentialSource::Agent]);
}

#[tokio::test]
async fn refresh_once_falls_back_to_bootstrap_once_current_set_has_expired() {
    let dir = tempdir().unwrap();
    let store = AgentCredentialStore::new(dir.path().join("agent.json"));
    let client = Arc::new(FakeServiceClient::new());
    let clock = FakeClock::new();
    client.push_assume_fleet_role(Ok(fake_agent_credentials(clock.epoch_ms(), 3_600_000)));

    let manager = AgentCredentialManager::new(
        client.clone(),
        clock.clone(),
        store,
        "farm-1".into(),
        "fleet-1".into(),
        worker_id(),
        // Already expired relative to the clock: the initial set's
        // expiration is in the past.
        fake_agent_credentials(0, 1),
    )
    .unwrap();

    manager.refresh_once().await.unwrap();

    assert_eq!(*client.assume_fleet_role_sources.lock(), vec![oja_core::CredentialSource::Bootstrap]);
}

#[tokio::test]
async fn refresh_once_propagates_other_errors() {
    let dir = tempdir().unwrap();
    let store = AgentCredentialStore::new(dir.path().join("agent.json"));
    let client = Arc::new(FakeServiceClient::new());
    client.push_assume_fleet_role(Err(ApiError::AccessDenied));

    let manager = AgentCredentialManager::new(
        client,
        FakeClock::new(),
        store,
        "farm-1".into(),
        "fleet-1".into(),
        worker_id(),
        fake_agent_credentials(0, 60_000),
    )
    .unwrap();

    let err = manager.refresh_once().await.unwrap_err();
    assert!(matches!(err, CredentialError::Api(ApiError::AccessDenied)));
}

fn queue_manager(client: Arc<FakeServiceClient>, dir: &std::path::Path) -> Arc<QueueCredentialManager<FakeServiceClient, FakeClock>> {
    Arc::new(QueueCredentialManager::new(
        client,
        FakeClock::new(),
        dir.to_path_buf(),
        "farm-1".into(),
        "fleet-1".into(),
        worker_id(),
    ))
}

#[tokio::test]
async fn acquire_fetches_once_then_reuses_for_later_acquires() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    client.push_assume_queue_role(Ok(Some(fake_queue_credentials(0, 3_600_000))));
    let manager = queue_manager(client.clone(), dir.path());
    let queue_id = QueueId::new("queue-Q");

    manager.acquire(queue_id.clone()).await.unwrap();
    manager.acquire(queue_id.clone()).await.unwrap();

    assert_eq!(client.calls.lock().len(), 1);
    assert!(manager.env_vars(&queue_id).is_some());
}

#[tokio::test]
async fn release_down_to_zero_purges_store() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    client.push_assume_queue_role(Ok(Some(fake_queue_credentials(0, 3_600_000))));
    let manager = queue_manager(client, dir.path());
    let queue_id = QueueId::new("queue-Q");

    manager.acquire(queue_id.clone()).await.unwrap();
    assert!(dir.path().join("queue-Q").exists());

    manager.release(&queue_id).unwrap();
    assert!(!dir.path().join("queue-Q").exists());
    assert!(manager.env_vars(&queue_id).is_none());
}

#[tokio::test]
async fn acquire_with_no_granted_credentials_tracks_refcount_without_store() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    client.push_assume_queue_role(Ok(None));
    let manager = queue_manager(client, dir.path());
    let queue_id = QueueId::new("queue-Q");

    manager.acquire(queue_id.clone()).await.unwrap();
    assert!(manager.env_vars(&queue_id).is_none());
    manager.release(&queue_id).unwrap();
}

#[tokio::test(start_paused = true)]
async fn refresh_with_retry_records_failure_after_exhausting_attempts() {
    let dir = tempdir().unwrap();
    let client = Arc::new(FakeServiceClient::new());
    client.push_assume_queue_role(Ok(Some(fake_queue_credentials(0, 3_600_000))));
    for _ in 0..MAX_QUEUE_REFRESH_ATTEMPTS {
        client.push_assume_queue_role(Err(ApiError::Throttled));
    }
    let manager = queue_manager(client, dir.path());
    let queue_id = QueueId::new("queue-Q");
    manager.acquire(queue_id.clone()).await.unwrap();

    manager.refresh_with_retry(&queue_id).await;

    let failure = manager.take_failure(&queue_id);
    assert!(failure.is_some_and(|message| message.contains("exhausted")));
    assert!(manager.take_failure(&queue_id).is_none());
}
