// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured log events emitted to an abstract sink (spec §3/§6:
//! "for each agent and each Session, the core emits structured events to an
//! abstract sink"). The taxonomy of event kinds is fixed; unknown kinds are
//! forbidden by construction since this is a closed enum, not a string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

crate::simple_display! {
    LogLevel {
        Debug => "DEBUG",
        Info => "INFO",
        Warn => "WARN",
        Error => "ERROR",
    }
}

/// The closed set of structured event kinds the agent may emit. Mirrors the
/// `type`/`subtype` pair from spec §6; `Agent`/`Session`/`Queue`/`Job`
/// group by the entity the event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEventKind {
    AgentLifecycle,
    AgentCredentialRefresh,
    SessionStarted,
    SessionTeardown,
    SessionActionStatusChanged,
    QueueCredentialRefresh,
    JobEntityFetch,
}

crate::simple_display! {
    LogEventKind {
        AgentLifecycle => "agent.lifecycle",
        AgentCredentialRefresh => "agent.credential_refresh",
        SessionStarted => "session.started",
        SessionTeardown => "session.teardown",
        SessionActionStatusChanged => "session.action_status_changed",
        QueueCredentialRefresh => "queue.credential_refresh",
        JobEntityFetch => "job.entity_fetch",
    }
}

/// A single structured event: level, fixed kind, and a free-form field map
/// for the type-specific payload (action/session/queue/job ids, operation
/// name, timings, exit code, message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub kind: LogEventKind,
    pub fields: BTreeMap<String, Value>,
}

impl LogEvent {
    pub fn new(level: LogLevel, kind: LogEventKind) -> Self {
        Self { level, kind, fields: BTreeMap::new() }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Destination for structured events. Implemented by `TracingSink` in this
/// crate and by per-Session log-shipping sinks further up the stack.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Default sink: forwards every event through `tracing`, one target field
/// per log-event field, at the event's own level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let fields = serde_json::to_string(&event.fields).unwrap_or_default();
        match event.level {
            LogLevel::Debug => tracing::debug!(kind = %event.kind, fields = %fields, "event"),
            LogLevel::Info => tracing::info!(kind = %event.kind, fields = %fields, "event"),
            LogLevel::Warn => tracing::warn!(kind = %event.kind, fields = %fields, "event"),
            LogLevel::Error => tracing::error!(kind = %event.kind, fields = %fields, "event"),
        }
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
