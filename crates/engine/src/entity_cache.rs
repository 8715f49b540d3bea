// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-Session entity cache (spec §3/§4.3): batches `BatchGetJobEntity`
//! requests and memoizes results. Scoped to one Session, cleared on
//! teardown, never shared across Sessions.

use oja_core::ApiError;
use oja_wire::{EntityError, EntityRef, EntityResult};
use std::collections::{HashMap, VecDeque};

/// One cache slot. Immutable once it reaches `Ready`/`Errored` (spec §3:
/// "each entry immutable once written") — except for the
/// `MaxPayloadSizeExceeded` case, which re-queues rather than settling.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityCacheEntry {
    Pending,
    Ready(serde_json::Value),
    Errored(ApiError),
}

/// The string a response tags a requeue-this-entity validation error with.
/// Not a distinct `ApiError` variant (the taxonomy in spec §4.1/§7 is
/// closed) — recognized here as a context marker instead, per the Open
/// Question resolution in DESIGN.md.
pub const MAX_PAYLOAD_SIZE_EXCEEDED: &str = "MaxPayloadSizeExceeded";

#[derive(Default)]
pub struct EntityCache {
    entries: HashMap<EntityRef, EntityCacheEntry>,
    pending: VecDeque<EntityRef>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reference for fetch if it isn't already known. A no-op if
    /// the entity is already Pending/Ready/Errored.
    pub fn request(&mut self, entity_ref: EntityRef) {
        if self.entries.contains_key(&entity_ref) {
            return;
        }
        self.entries.insert(entity_ref.clone(), EntityCacheEntry::Pending);
        self.pending.push_back(entity_ref);
    }

    /// Take every currently pending reference, for the batching task to
    /// issue as one `BatchGetJobEntity` call.
    pub fn drain_batch(&mut self) -> Vec<EntityRef> {
        self.pending.drain(..).collect()
    }

    /// Apply a batch response. A `MaxPayloadSizeExceeded` entity is
    /// re-queued into the next batch instead of settling as Errored (spec
    /// §4.3).
    pub fn apply_results(&mut self, results: Vec<(EntityRef, EntityResult)>) {
        for (entity_ref, result) in results {
            match result {
                EntityResult::Data(value) => {
                    self.entries.insert(entity_ref, EntityCacheEntry::Ready(value));
                }
                EntityResult::Error(EntityError::ValidationError(ref msg))
                    if msg == MAX_PAYLOAD_SIZE_EXCEEDED =>
                {
                    self.pending.push_back(entity_ref);
                }
                EntityResult::Error(err) => {
                    self.entries.insert(entity_ref, EntityCacheEntry::Errored((&err).into()));
                }
            }
        }
    }

    pub fn get(&self, entity_ref: &EntityRef) -> Option<&EntityCacheEntry> {
        self.entries.get(entity_ref)
    }

    pub fn is_ready_or_errored(&self, entity_ref: &EntityRef) -> bool {
        matches!(
            self.entries.get(entity_ref),
            Some(EntityCacheEntry::Ready(_)) | Some(EntityCacheEntry::Errored(_))
        )
    }
}

#[cfg(test)]
#[path = "entity_cache_tests.rs"]
mod tests;
