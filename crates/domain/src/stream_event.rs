use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventId, Version};

use crate::aggregate::DomainEvent;
use crate::error::DomainError;
use crate::registry::EventRegistry;

/// A stored record decoded into its domain event.
///
/// This is what replay folds and what projections receive.
#[derive(Debug, Clone)]
pub struct StreamEvent<E> {
    pub event_id: EventId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// Aggregate version after this event (1-based).
    pub version: Version,
    /// Position in the global log.
    pub position: u64,
    pub timestamp: DateTime<Utc>,
    pub event: E,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl<E: DomainEvent> StreamEvent<E> {
    /// Decodes an envelope through `registry`.
    pub fn decode(envelope: EventEnvelope, registry: &EventRegistry<E>) -> Result<Self, DomainError> {
        let event = registry.decode(&envelope.event_type, envelope.payload)?;
        Ok(Self {
            event_id: envelope.event_id,
            aggregate_id: envelope.aggregate_id,
            aggregate_type: envelope.aggregate_type,
            version: envelope.version,
            position: envelope.position,
            timestamp: envelope.timestamp,
            event,
            metadata: envelope.metadata,
        })
    }
}

impl<E> StreamEvent<E> {
    /// 0-based index of the event within its stream.
    pub fn sequence_number(&self) -> i64 {
        self.version.as_i64() - 1
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|value| value.as_str())
    }
}
