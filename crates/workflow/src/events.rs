use tracing::{info, warn};

use voyage_core::events::{EventOutcome, EventSink, WorkflowEvent};

/// Forwards workflow events to the log. Rejected outcomes log at `warn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: WorkflowEvent) {
        let metadata = event
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");

        match event.outcome {
            EventOutcome::Success => info!(
                event_name = %event.name,
                event_id = %event.event_id,
                entity_id = %event.entity_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                metadata = %metadata,
                "workflow event"
            ),
            EventOutcome::Rejected => warn!(
                event_name = %event.name,
                event_id = %event.event_id,
                entity_id = %event.entity_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                metadata = %metadata,
                "workflow event rejected"
            ),
        }
    }
}
