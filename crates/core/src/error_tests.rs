// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn throttled_and_ise_are_retryable() {
    assert!(ApiError::Throttled.is_retryable_in_loop());
    assert!(ApiError::InternalServerError.is_retryable_in_loop());
}

#[test]
fn other_kinds_are_not_retryable() {
    assert!(!ApiError::AccessDenied.is_retryable_in_loop());
    assert!(!ApiError::ValidationError("bad".into()).is_retryable_in_loop());
    assert!(!ApiError::NotFound("w-1".into()).is_retryable_in_loop());
    assert!(!ApiError::Conflict {
        reason: ConflictReason::StatusConflict,
        resource_id: "w-1".into(),
        context: "not started".into(),
    }
    .is_retryable_in_loop());
}

#[test]
fn is_status_conflict_matches_only_that_reason() {
    let status = ApiError::Conflict {
        reason: ConflictReason::StatusConflict,
        resource_id: "w-1".into(),
        context: "".into(),
    };
    assert!(status.is_status_conflict());

    let other = ApiError::Conflict {
        reason: ConflictReason::ConcurrentModification,
        resource_id: "w-1".into(),
        context: "".into(),
    };
    assert!(!other.is_status_conflict());
}

#[test]
fn conflict_reason_display() {
    assert_eq!(ConflictReason::StatusConflict.to_string(), "STATUS_CONFLICT");
    assert_eq!(ConflictReason::Stopping.to_string(), "STOPPING");
}
