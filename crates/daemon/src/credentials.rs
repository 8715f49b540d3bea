// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential lifecycle management (spec §4.2): a single refresh timer for
//! the agent's own credentials, and a refcounted per-queue manager with its
//! own timer per queue, both backed by atomic file writes.

use oja_core::{
    AgentCredentials, ApiError, Backoff, Clock, CredentialSource, QueueCredentials, QueueId, WorkerId,
};
use oja_storage::{AgentCredentialStore, QueueCredentialStore, StorageError};
use oja_wire::{AssumeFleetRoleForWorkerInput, AssumeQueueRoleForWorkerInput, ServiceClient};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How far ahead of expiry a refresh is attempted (spec §4.2).
const REFRESH_LEAD_MS: u64 = 15 * 60 * 1000;
/// Floor under the computed delay so a near-expiry credential set or clock
/// skew can't spin the refresh loop.
const MIN_REFRESH_DELAY_MS: u64 = 30_000;
/// Refresh attempts for a single queue before giving up for this cycle and
/// recording a failure instead of retrying forever.
const MAX_QUEUE_REFRESH_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("remote call failed: {0}")]
    Api(#[from] ApiError),
    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),
}

fn refresh_delay_ms<C: Clock>(clock: &C, expiration_epoch_ms: u64) -> Duration {
    let now = clock.epoch_ms();
    let target = expiration_epoch_ms.saturating_sub(REFRESH_LEAD_MS);
    Duration::from_millis(target.saturating_sub(now).max(MIN_REFRESH_DELAY_MS))
}

/// The agent's own credentials: one refresh timer for the process lifetime
/// and a non-blocking [`snapshot`](Self::snapshot) for every caller that
/// needs to authenticate a remote call.
pub struct AgentCredentialManager<S: ServiceClient, C: Clock> {
    client: Arc<S>,
    clock: C,
    store: AgentCredentialStore,
    farm_id: String,
    fleet_id: String,
    worker_id: WorkerId,
    current: RwLock<AgentCredentials>,
}

impl<S: ServiceClient, C: Clock> AgentCredentialManager<S, C> {
    pub fn new(
        client: Arc<S>,
        clock: C,
        store: AgentCredentialStore,
        farm_id: String,
        fleet_id: String,
        worker_id: WorkerId,
        initial: AgentCredentials,
    ) -> Result<Self, CredentialError> {
        store.write_atomic(&initial.set)?;
        Ok(Self { client, clock, store, farm_id, fleet_id, worker_id, current: RwLock::new(initial) })
    }

    pub fn snapshot(&self) -> AgentCredentials {
        self.current.read().clone()
    }

    /// Drives the single refresh timer. Intended to run for the process
    /// lifetime in its own task; never returns on its own.
    pub async fn run(&self) {
        loop {
            let delay = refresh_delay_ms(&self.clock, self.current.read().set.expiration_epoch_ms);
            tokio::time::sleep(delay).await;
            if let Err(err) = self.refresh_once().await {
                tracing::warn!(error = %err, "agent credential refresh failed, keeping cached credentials");
            }
        }
    }

    /// One refresh attempt, exposed separately so tests can drive it without
    /// the timer loop. Authenticates with the current agent credentials, not
    /// bootstrap credentials, unless those current ones have already expired
    /// — an online agent never falls back to bootstrap once it holds
    /// credentials of its own (spec §4.2).
    pub async fn refresh_once(&self) -> Result<(), CredentialError> {
        let source = if self.current.read().set.expiration_epoch_ms <= self.clock.epoch_ms() {
            CredentialSource::Bootstrap
        } else {
            CredentialSource::Agent
        };
        let result = self
            .client
            .assume_fleet_role_for_worker(
                AssumeFleetRoleForWorkerInput {
                    farm_id: self.farm_id.clone(),
                    fleet_id: self.fleet_id.clone(),
                    worker_id: self.worker_id.clone(),
                },
                source,
            )
            .await;

        match result {
            Ok(fresh) => {
                self.store.write_atomic(&fresh.set)?;
                *self.current.write() = fresh;
                Ok(())
            }
            Err(ApiError::Conflict { ref resource_id, .. }) if resource_id == self.worker_id.as_str() => {
                // This worker exists but is transiently conflicted (e.g. mid
                // status transition). Keep serving the cached credentials and
                // retry on the next tick rather than giving up on them.
                Ok(())
            }
            Err(other) => Err(other.into()),
        }
    }
}

struct QueueEntry {
    store: Option<QueueCredentialStore>,
    refcount: usize,
    expiration_epoch_ms: u64,
    failure: Option<String>,
    refresh_task: Option<tokio::task::JoinHandle<()>>,
}

/// Per-queue credentials, refcounted by the Sessions that reference them.
/// The first `acquire` for a queue fetches and persists credentials and
/// starts that queue's own refresh timer; the matching number of `release`
/// calls tears the timer and files down (spec §4.2: "purge on last Session
/// end").
pub struct QueueCredentialManager<S: ServiceClient, C: Clock> {
    client: Arc<S>,
    clock: C,
    state_dir: PathBuf,
    farm_id: String,
    fleet_id: String,
    worker_id: WorkerId,
    entries: RwLock<HashMap<QueueId, QueueEntry>>,
}

impl<S: ServiceClient + 'static, C: Clock + 'static> QueueCredentialManager<S, C> {
    pub fn new(
        client: Arc<S>,
        clock: C,
        state_dir: PathBuf,
        farm_id: String,
        fleet_id: String,
        worker_id: WorkerId,
    ) -> Self {
        Self { client, clock, state_dir, farm_id, fleet_id, worker_id, entries: RwLock::new(HashMap::new()) }
    }

    /// Registers one more Session's interest in `queue_id`'s credentials.
    /// Fetches and persists credentials on the first call for a queue;
    /// later calls for the same queue just bump the refcount.
    pub async fn acquire(self: &Arc<Self>, queue_id: QueueId) -> Result<(), CredentialError> {
        if let Some(entry) = self.entries.write().get_mut(&queue_id) {
            entry.refcount += 1;
            return Ok(());
        }

        let fetched = self.assume_queue_role(&queue_id).await?;
        let (store, expiration_epoch_ms, refresh_task) = match fetched {
            Some(credentials) => {
                let store = QueueCredentialStore::new(self.state_dir.join(queue_id.as_str()));
                store.create(queue_id.as_str(), &credentials.set)?;
                let expiration_epoch_ms = credentials.set.expiration_epoch_ms;
                let task = {
                    let manager = Arc::clone(self);
                    let queue_id = queue_id.clone();
                    tokio::spawn(async move { manager.run_refresh_loop(queue_id).await })
                };
                (Some(store), expiration_epoch_ms, Some(task))
            }
            // The queue grants no credentials for this worker (spec §4.1).
            // Still track the refcount so release() balances, with nothing
            // on disk and no timer to run.
            None => (None, u64::MAX, None),
        };

        self.entries.write().insert(
            queue_id,
            QueueEntry { store, refcount: 1, expiration_epoch_ms, failure: None, refresh_task },
        );
        Ok(())
    }

    /// Releases one Session's interest in `queue_id`'s credentials; purges
    /// the on-disk files and stops the refresh timer once the refcount
    /// reaches zero.
    pub fn release(&self, queue_id: &QueueId) -> Result<(), CredentialError> {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(queue_id) else { return Ok(()) };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount == 0 {
            let entry = entries.remove(queue_id).expect("just checked present");
            if let Some(task) = entry.refresh_task {
                task.abort();
            }
            if let Some(store) = entry.store {
                store.purge()?;
            }
        }
        Ok(())
    }

    /// Environment variables a job subprocess running under `queue_id`
    /// should see so its AWS SDK resolves the queue's credential-process
    /// file. `None` if the queue has no active credentials (never acquired,
    /// or the queue granted none).
    pub fn env_vars(&self, queue_id: &QueueId) -> Option<[(&'static str, PathBuf); 2]> {
        self.entries.read().get(queue_id).and_then(|entry| entry.store.as_ref().map(|s| s.env_vars()))
    }

    /// A retry-exhausted refresh failure recorded for `queue_id`, if any,
    /// cleared on read. The Scheduler surfaces this as the reason the next
    /// Session Action for this queue fails, instead of crashing the agent
    /// (spec §4.2).
    pub fn take_failure(&self, queue_id: &QueueId) -> Option<String> {
        self.entries.write().get_mut(queue_id).and_then(|entry| entry.failure.take())
    }

    async fn run_refresh_loop(self: Arc<Self>, queue_id: QueueId) {
        loop {
            let delay = {
                let entries = self.entries.read();
                let Some(entry) = entries.get(&queue_id) else { return };
                refresh_delay_ms(&self.clock, entry.expiration_epoch_ms)
            };
            tokio::time::sleep(delay).await;
            if !self.entries.read().contains_key(&queue_id) {
                return;
            }
            self.refresh_with_retry(&queue_id).await;
        }
    }

    /// Refreshes `queue_id`'s credentials, retrying with backoff up to
    /// [`MAX_QUEUE_REFRESH_ATTEMPTS`] before recording a failure for
    /// [`take_failure`](Self::take_failure) to surface. Split out from
    /// [`run_refresh_loop`](Self::run_refresh_loop) so it can be driven
    /// directly without waiting on the timer.
    async fn refresh_with_retry(&self, queue_id: &QueueId) {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let mut attempt = 0u32;
        loop {
            match self.assume_queue_role(queue_id).await {
                Ok(fetched) => {
                    let mut entries = self.entries.write();
                    let Some(entry) = entries.get_mut(queue_id) else { return };
                    if let (Some(store), Some(fresh)) = (&entry.store, &fetched) {
                        if store.write_atomic(&fresh.set).is_ok() {
                            entry.expiration_epoch_ms = fresh.set.expiration_epoch_ms;
                        }
                    }
                    entry.failure = None;
                    return;
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_QUEUE_REFRESH_ATTEMPTS {
                        let mut entries = self.entries.write();
                        if let Some(entry) = entries.get_mut(queue_id) {
                            entry.failure =
                                Some(format!("queue credential refresh exhausted retries: {err}"));
                        }
                        return;
                    }
                    tokio::time::sleep(backoff.next_delay(attempt)).await;
                }
            }
        }
    }

    async fn assume_queue_role(
        &self,
        queue_id: &QueueId,
    ) -> Result<Option<QueueCredentials>, CredentialError> {
        self.client
            .assume_queue_role_for_worker(
                AssumeQueueRoleForWorkerInput {
                    farm_id: self.farm_id.clone(),
                    fleet_id: self.fleet_id.clone(),
                    worker_id: self.worker_id.clone(),
                    queue_id: queue_id.clone(),
                },
                CredentialSource::Agent,
            )
            .await
            .map_err(CredentialError::from)
    }
}

impl<S: ServiceClient, C: Clock> Drop for QueueCredentialManager<S, C> {
    fn drop(&mut self) {
        for (_, entry) in self.entries.get_mut().drain() {
            if let Some(task) = entry.refresh_task {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
