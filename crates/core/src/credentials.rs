// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Temporary credential sets the agent holds for itself (`AgentCredentials`)
//! and on behalf of queues (`QueueCredentials`), per spec §3/§4.2/§6.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};

/// Which remote call produced a credential set, threaded through so a
/// caller can retry against the right operation without the credential
/// manager needing two near-identical call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `AssumeFleetRoleForWorker`.
    Bootstrap,
    /// `AssumeQueueRoleForWorker`.
    Agent,
}

/// The on-disk/JSON shape shared by both credential flavors: `{ Version,
/// AccessKeyId, SecretAccessKey, SessionToken, Expiration }` (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
    #[serde(rename = "Expiration")]
    pub expiration: String,
    /// Unix millis parsed from `expiration`, used for in-memory expiry
    /// comparisons without a repeated RFC3339 parse.
    #[serde(skip)]
    pub expiration_epoch_ms: u64,
}

impl CredentialSet {
    pub fn is_expired<C: Clock>(&self, clock: &C) -> bool {
        clock.epoch_ms() >= self.expiration_epoch_ms
    }

    /// True once inside the refresh window: the caller should proactively
    /// refresh rather than wait for full expiry (spec §4.2: "refreshes
    /// ahead of expiry").
    pub fn needs_refresh<C: Clock>(&self, clock: &C, lead_ms: u64) -> bool {
        clock.epoch_ms() + lead_ms >= self.expiration_epoch_ms
    }
}

/// The agent's own credentials. Exactly one active instance exists after a
/// successful bootstrap; never exposed to job subprocesses (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCredentials {
    #[serde(flatten)]
    pub set: CredentialSet,
}

impl AgentCredentials {
    pub fn new(set: CredentialSet) -> Self {
        Self { set }
    }

    pub fn is_expired<C: Clock>(&self, clock: &C) -> bool {
        self.set.is_expired(clock)
    }
}

/// Per-queue credentials. At most one active instance per `queue_id`;
/// exposed to job subprocesses through the credentials-process files
/// (spec §3/§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCredentials {
    #[serde(flatten)]
    pub set: CredentialSet,
}

impl QueueCredentials {
    pub fn new(set: CredentialSet) -> Self {
        Self { set }
    }

    pub fn is_expired<C: Clock>(&self, clock: &C) -> bool {
        self.set.is_expired(clock)
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
