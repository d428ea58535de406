//! Task Event Logger
//!
//! Lifecycle events of per-chat tasks, emitted under the `task_events` target
//! so they can be filtered into their own stream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    Begun,
    Accepted {
        message_id: i32,
        size: u64,
        committed: u64,
    },
    Rejected {
        message_id: i32,
        size: u64,
        committed: u64,
    },
    Omitted {
        name: String,
        reason: String,
    },
    Finalized {
        archive: String,
        files: usize,
        omitted: usize,
    },
    Failed {
        error: String,
    },
    Cancelled,
    Evicted,
    Extracted {
        archive: String,
        files: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct TaskEventEntry {
    pub session: i64,
    pub timestamp: DateTime<Utc>,
    pub event: TaskEvent,
}

impl TaskEventEntry {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskEventLogger;

impl TaskEventLogger {
    /// Emit one event. Free-text fields are redacted first.
    pub fn log(&self, session: i64, mut event: TaskEvent) -> TaskEventEntry {
        match &mut event {
            TaskEvent::Omitted { reason, .. } => *reason = redact_sensitive_data(reason),
            TaskEvent::Failed { error } => *error = redact_sensitive_data(error),
            _ => {}
        }

        let entry = TaskEventEntry {
            session,
            timestamp: Utc::now(),
            event,
        };
        info!(target: "task_events", session, event = %entry.to_json(), "Task event");
        entry
    }
}
