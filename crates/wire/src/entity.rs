// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity references and results for `BatchGetJobEntity` (spec §4.3/§6).

use oja_core::ApiError;
use serde::{Deserialize, Serialize};

/// One of the four entity kinds a Session may request, per spec §6: "the
/// entity_refs a Session may request ... jobDetails, jobAttachmentDetails,
/// environmentDetails, stepDetails".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EntityRef {
    JobDetails,
    JobAttachmentDetails,
    EnvironmentDetails { env_id: String },
    StepDetails { step_id: String },
}

impl EntityRef {
    /// `jobDetails` gates Session setup: a failure here fails the *next*
    /// action to reach the head of the pipeline rather than just the
    /// action that requested it (spec §4.3).
    pub fn is_job_details(&self) -> bool {
        matches!(self, EntityRef::JobDetails)
    }
}

/// A narrowed, serializable subset of `ApiError`, for the per-entity errors
/// spec §4.3 allows `BatchGetJobEntity` to cache (NotFound, Validation,
/// InternalServerError).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityError {
    NotFound(String),
    ValidationError(String),
    InternalServerError,
}

impl From<&EntityError> for ApiError {
    fn from(e: &EntityError) -> Self {
        match e {
            EntityError::NotFound(s) => ApiError::NotFound(s.clone()),
            EntityError::ValidationError(s) => ApiError::ValidationError(s.clone()),
            EntityError::InternalServerError => ApiError::InternalServerError,
        }
    }
}

/// Per-entity outcome: either the raw detail payload or a cached error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntityResult {
    Data(serde_json::Value),
    Error(EntityError),
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
