//! Projection error types.

use domain::DomainError;
use event_store::{EventId, EventStoreError};
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Reading the log or the checkpoint failed.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A stored record could not be decoded into a domain event.
    #[error("Event decoding error: {0}")]
    Decode(#[from] DomainError),

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),

    /// A registered projection failed while an event was being published.
    #[error("projection {projection} (#{index}) failed on event {event_id}: {source}")]
    Publish {
        projection: String,
        index: usize,
        event_id: EventId,
        #[source]
        source: Box<ProjectionError>,
    },
}

impl ProjectionError {
    pub fn projection(message: impl Into<String>) -> Self {
        ProjectionError::Projection(message.into())
    }

    /// Name of the projection that failed, if this is a publish failure.
    pub fn failed_projection(&self) -> Option<&str> {
        match self {
            ProjectionError::Publish { projection, .. } => Some(projection),
            _ => None,
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
