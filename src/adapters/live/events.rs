//! Live event recorder that emits events as structured log lines.

use tracing::{info, warn};

use crate::ports::events::{Event, EventKind, EventRecorder};
use crate::resource::ObjectKey;

/// Writes every event to the `tracing` subscriber.
pub struct TracingEventRecorder;

impl EventRecorder for TracingEventRecorder {
    fn record(&self, key: &ObjectKey, event: Event) {
        match event.kind {
            EventKind::Normal => {
                info!(target: "issuesync::events", %key, reason = %event.reason, "{}", event.message);
            }
            EventKind::Warning => {
                warn!(target: "issuesync::events", %key, reason = %event.reason, "{}", event.message);
            }
        }
    }
}
