// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk persistence: the worker identity file and the credential files
//! subprocesses read (spec §3/§6). Nothing else is persisted — per the
//! spec's explicit non-goal, there is no queue/session/action journal here.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod atomic;
mod credential_store;
mod error;
mod identity;

pub use atomic::atomic_write;
pub use credential_store::{AgentCredentialStore, QueueCredentialStore};
pub use error::StorageError;
pub use identity::WorkerIdentity;
