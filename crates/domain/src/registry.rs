//! Wire type name to event constructor mapping.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::aggregate::DomainEvent;
use crate::error::DomainError;

type Decoder<E> = Box<dyn Fn(serde_json::Value) -> serde_json::Result<E> + Send + Sync>;

/// Explicit set of event types a reader accepts.
///
/// Built once by the composition root and shared (usually behind an `Arc`)
/// by the aggregate store and subscription drivers. A record whose type is
/// not registered is rejected with [`DomainError::InvalidEventType`] instead
/// of being guessed at.
pub struct EventRegistry<E> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E: DomainEvent> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `name` with a payload type and the function lifting it into `E`.
    pub fn register<P, F>(mut self, name: impl Into<String>, lift: F) -> Self
    where
        P: DeserializeOwned + 'static,
        F: Fn(P) -> E + Send + Sync + 'static,
    {
        self.decoders.insert(
            name.into(),
            Box::new(move |payload| serde_json::from_value::<P>(payload).map(&lift)),
        );
        self
    }

    /// Registers `name` for payloads that are the serialized event itself.
    pub fn register_serde(self, name: impl Into<String>) -> Self {
        self.register(name, |event: E| event)
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decodes a stored payload recorded under `event_type`.
    pub fn decode(&self, event_type: &str, payload: serde_json::Value) -> Result<E, DomainError> {
        let decoder = self.decoders.get(event_type).ok_or_else(|| {
            DomainError::invalid_event_type(event_type, "not registered")
        })?;

        let event = decoder(payload)
            .map_err(|e| DomainError::invalid_event_type(event_type, e.to_string()))?;

        if event.event_type() != event_type {
            return Err(DomainError::invalid_event_type(
                event_type,
                format!("payload decodes as {}", event.event_type()),
            ));
        }

        Ok(event)
    }
}

impl<E: DomainEvent> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("EventRegistry")
            .field("event_types", &names)
            .finish()
    }
}
