//! Domain error types.

use common::StreamId;
use event_store::{EventStoreError, ExpectedVersion, Version};
use thiserror::Error;

use crate::order::OrderError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The stream holds no events and there is no snapshot to start from.
    #[error("Aggregate not found: {stream}")]
    NotFound { stream: StreamId },

    /// The stream head did not match the expected version at append time.
    #[error("Concurrency conflict on {stream}: expected {expected}, actual {actual}")]
    Conflict {
        stream: StreamId,
        expected: ExpectedVersion,
        actual: Version,
    },

    /// The caller asked for something the aggregate refuses as a matter of input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A stored record names an event type the registry or aggregate cannot handle.
    #[error("Invalid event type '{event_type}': {reason}")]
    InvalidEventType { event_type: String, reason: String },

    /// Serialization failure, corrupted stream or transient I/O.
    #[error("Internal error: {context}")]
    Internal {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// An error occurred in the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn invalid_event_type(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::InvalidEventType {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }

    /// Internal error wrapping a lower-level cause.
    pub fn internal(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DomainError::Internal {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Internal error with no underlying cause (e.g. a version gap in a stream).
    pub fn corrupted(context: impl Into<String>) -> Self {
        DomainError::Internal {
            context: context.into(),
            source: None,
        }
    }

    /// Maps a log failure to the same-kind domain error, using `stream` as context.
    pub fn from_store(stream: &StreamId, err: EventStoreError) -> Self {
        match err {
            EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            } => DomainError::Conflict {
                stream: stream.clone(),
                expected,
                actual,
            },
            EventStoreError::InvalidAppend(message) => DomainError::Validation(message),
            other => DomainError::internal(format!("event store failure on {stream}"), other),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;

    #[test]
    fn conflict_keeps_stream_context() {
        let id = AggregateId::new();
        let stream = StreamId::new("Order", id);
        let err = DomainError::from_store(
            &stream,
            EventStoreError::ConcurrencyConflict {
                aggregate_id: id,
                expected: ExpectedVersion::exact(2),
                actual: Version::new(3),
            },
        );

        assert!(err.is_conflict());
        assert!(err.to_string().contains(&format!("Order-{id}")));
    }

    #[test]
    fn serialization_failures_become_internal() {
        let stream = StreamId::new("Order", AggregateId::new());
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = DomainError::from_store(&stream, EventStoreError::Serialization(json_err));

        assert!(matches!(err, DomainError::Internal { source: Some(_), .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
