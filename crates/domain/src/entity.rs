//! Identity shared by every aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, StreamId};
use serde::{Deserialize, Serialize};

/// Identity, type tag and timestamps of an aggregate.
///
/// Timestamps are owned by the aggregate's own state transitions: they are
/// stamped from the events being applied, never from the wall clock at load
/// time, so a replayed aggregate reports the same times as the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: AggregateId,
    entity_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(id: AggregateId, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type: entity_type.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    /// The aggregate type name, e.g. `"Order"`.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Name of the stream holding this entity's events.
    pub fn stream_id(&self) -> StreamId {
        StreamId::new(self.entity_type.clone(), self.id)
    }

    /// Records the creation time (and resets the update time to it).
    pub fn mark_created(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
        self.updated_at = at;
    }

    /// Records a state change at `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}
