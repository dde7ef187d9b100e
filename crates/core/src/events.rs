use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Success,
    Rejected,
}

/// Fire-and-forget notification for downstream email/chat delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_id: String,
    pub name: String,
    pub entity_id: String,
    pub correlation_id: String,
    pub actor: String,
    pub outcome: EventOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn new(
        name: impl Into<String>,
        entity_id: impl Into<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            name: name.into(),
            entity_id: entity_id.into(),
            correlation_id: correlation_id.into(),
            actor: actor.into(),
            outcome: EventOutcome::Success,
            metadata: BTreeMap::new(),
            occurred_at,
        }
    }

    pub fn rejected(mut self) -> Self {
        self.outcome = EventOutcome::Rejected;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Who is emitting, and on whose behalf. Sweeps use `system` as the actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub entity_id: String,
    pub correlation_id: String,
    pub actor: String,
}

impl EventContext {
    pub fn new(
        entity_id: impl Into<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            correlation_id: correlation_id.into(),
            actor: actor.into(),
        }
    }
}

/// Delivery must not block or fail the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WorkflowEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.name).collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: WorkflowEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: WorkflowEvent) {}
}
