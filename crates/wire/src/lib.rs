// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remote scheduling service contract (spec §4.1): the seven operations
//! the agent calls, their request/response shapes, and the closed
//! `ApiResult` every one of them returns.
//!
//! No concrete HTTP transport ships from this crate — the teacher's daemon
//! dials a transport of its own; this agent leaves that wiring to whatever
//! embeds it and ships a `FakeServiceClient` behind `test-support` so every
//! higher-level crate can test against the contract without a network.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod entity;
mod requests;

pub use client::ServiceClient;
pub use entity::{EntityError, EntityRef, EntityResult};
pub use requests::{
    AssignedSession, AssignmentCancel, AssumeFleetRoleForWorkerInput, AssumeQueueRoleForWorkerInput,
    BatchGetJobEntityInput, BatchGetJobEntityOutput, CreateWorkerInput, CreateWorkerOutput,
    DeleteWorkerInput, NewAction, SessionActionUpdate, UpdateWorkerInput, UpdateWorkerScheduleInput,
    UpdateWorkerScheduleOutput,
};

#[cfg(feature = "test-support")]
mod fake;
#[cfg(feature = "test-support")]
pub use fake::FakeServiceClient;

/// The result type every `ServiceClient` operation returns.
pub type ApiResult<T> = Result<T, oja_core::ApiError>;
