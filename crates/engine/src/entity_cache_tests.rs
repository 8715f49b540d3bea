// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn request_queues_then_drain_batch_empties_it() {
    let mut cache = EntityCache::new();
    cache.request(EntityRef::JobDetails);
    cache.request(EntityRef::EnvironmentDetails { env_id: "env1".into() });
    let batch = cache.drain_batch();
    assert_eq!(batch.len(), 2);
    assert!(cache.drain_batch().is_empty());
}

#[test]
fn request_is_idempotent_for_known_entities() {
    let mut cache = EntityCache::new();
    cache.request(EntityRef::JobDetails);
    cache.request(EntityRef::JobDetails);
    assert_eq!(cache.drain_batch().len(), 1);
}

#[test]
fn apply_results_settles_data_as_ready() {
    let mut cache = EntityCache::new();
    cache.request(EntityRef::JobDetails);
    cache.drain_batch();
    cache.apply_results(vec![(
        EntityRef::JobDetails,
        EntityResult::Data(serde_json::json!({"osUser": "job-user"})),
    )]);
    assert!(cache.is_ready_or_errored(&EntityRef::JobDetails));
    match cache.get(&EntityRef::JobDetails).unwrap() {
        EntityCacheEntry::Ready(v) => assert_eq!(v["osUser"], "job-user"),
        other => panic!("expected Ready, got {other:?}"),
    }
}

#[test]
fn apply_results_caches_not_found_as_errored() {
    let mut cache = EntityCache::new();
    let step = EntityRef::StepDetails { step_id: "step-1".into() };
    cache.request(step.clone());
    cache.drain_batch();
    cache.apply_results(vec![(step.clone(), EntityResult::Error(EntityError::NotFound("step-1".into())))]);
    assert!(matches!(cache.get(&step), Some(EntityCacheEntry::Errored(ApiError::NotFound(_)))));
}

#[test]
fn max_payload_size_exceeded_requeues_instead_of_settling() {
    let mut cache = EntityCache::new();
    let step = EntityRef::StepDetails { step_id: "step-1".into() };
    cache.request(step.clone());
    cache.drain_batch();
    cache.apply_results(vec![(
        step.clone(),
        EntityResult::Error(EntityError::ValidationError(MAX_PAYLOAD_SIZE_EXCEEDED.into())),
    )]);

    // Not settled: still absent from the ready/errored view...
    assert!(!cache.is_ready_or_errored(&step));
    // ...but requeued for the next batch.
    let next_batch = cache.drain_batch();
    assert_eq!(next_batch, vec![step]);
}
