//! Event port for reporting notable things that happened to an object.

use serde::{Deserialize, Serialize};

use crate::resource::ObjectKey;

/// Severity of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Routine progress.
    Normal,
    /// Something went wrong and may need attention.
    Warning,
}

/// A notable occurrence attached to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Severity.
    pub kind: EventKind,
    /// Short machine-readable reason, e.g. `IssueCreated`.
    pub reason: String,
    /// Human-readable detail.
    pub message: String,
}

impl Event {
    /// Builds a [`EventKind::Normal`] event.
    pub fn normal(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: EventKind::Normal, reason: reason.into(), message: message.into() }
    }

    /// Builds a [`EventKind::Warning`] event.
    pub fn warning(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: EventKind::Warning, reason: reason.into(), message: message.into() }
    }
}

/// Records events about objects. Recording never fails the caller.
pub trait EventRecorder: Send + Sync {
    /// Records an event for the object identified by `key`.
    fn record(&self, key: &ObjectKey, event: Event);
}
