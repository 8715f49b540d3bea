// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed error taxonomy returned by every remote operation (spec §4.1,
//! §7). Every other crate matches on this enum exhaustively rather than
//! inventing its own remote-error shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a `Conflict` was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictReason {
    /// The service no longer considers the resource in the expected state
    /// (e.g. worker not STARTED, fleet not ACTIVE).
    StatusConflict,
    /// Two callers raced to update the same resource.
    ConcurrentModification,
    /// `CreateWorker` was called for an identity that already exists.
    ResourceAlreadyExists,
    /// The requested target status is not reachable from the current one.
    NotCompatible,
    /// The resource is mid-transition to STOPPED.
    Stopping,
}

crate::simple_display! {
    ConflictReason {
        StatusConflict => "STATUS_CONFLICT",
        ConcurrentModification => "CONCURRENT_MODIFICATION",
        ResourceAlreadyExists => "RESOURCE_ALREADY_EXISTS",
        NotCompatible => "NOT_COMPATIBLE",
        Stopping => "STOPPING",
    }
}

/// The closed set of error kinds any `ServiceClient` operation can return.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("throttled")]
    Throttled,

    #[error("internal server error")]
    InternalServerError,

    #[error("access denied")]
    AccessDenied,

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict ({reason}) on {resource_id}: {context}")]
    Conflict { reason: ConflictReason, resource_id: String, context: String },
}

impl ApiError {
    /// Throttled/InternalServerError are the only two kinds the core retries
    /// on its own (spec §4.1: "the core retries only on Throttled and
    /// InternalServerError per the policies below").
    pub fn is_retryable_in_loop(&self) -> bool {
        matches!(self, ApiError::Throttled | ApiError::InternalServerError)
    }

    pub fn is_status_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { reason: ConflictReason::StatusConflict, .. })
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
