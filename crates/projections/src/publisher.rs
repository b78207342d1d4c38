//! Fan-out of committed events to registered projections.

use std::sync::Arc;
use std::time::Instant;

use domain::{DomainEvent, StreamEvent};

use crate::projection::Projection;
use crate::{ProjectionError, Result};

/// Delivers each event to every registered projection, in registration order.
pub struct ProjectionPublisher<E: DomainEvent> {
    projections: Vec<Arc<dyn Projection<E>>>,
}

impl<E: DomainEvent> ProjectionPublisher<E> {
    pub fn new() -> Self {
        Self {
            projections: Vec::new(),
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, projection: Arc<dyn Projection<E>>) -> Self {
        self.register(projection);
        self
    }

    pub fn register(&mut self, projection: Arc<dyn Projection<E>>) {
        tracing::debug!(projection = projection.name(), "projection registered");
        self.projections.push(projection);
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.projections.iter().map(|p| p.name()).collect()
    }

    /// Hands `event` to each projection in turn.
    ///
    /// Stops at the first failure. Projections before the failing one keep
    /// whatever they applied; later ones are not invoked.
    #[tracing::instrument(
        skip(self, event),
        fields(
            event_id = %event.event_id,
            event_type = event.event.event_type(),
            position = event.position
        )
    )]
    pub async fn publish(&self, event: &StreamEvent<E>) -> Result<()> {
        if self.projections.is_empty() {
            return Ok(());
        }

        let started = Instant::now();

        for (index, projection) in self.projections.iter().enumerate() {
            if let Err(source) = projection.process_event(event).await {
                metrics::counter!(
                    "projections_failures_total",
                    "projection" => projection.name().to_string()
                )
                .increment(1);
                tracing::warn!(
                    projection = projection.name(),
                    index,
                    error = %source,
                    "projection failed"
                );
                return Err(ProjectionError::Publish {
                    projection: projection.name().to_string(),
                    index,
                    event_id: event.event_id,
                    source: Box::new(source),
                });
            }
        }

        metrics::counter!("projections_events_processed").increment(1);
        metrics::histogram!("projections_publish_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        Ok(())
    }
}

impl<E: DomainEvent> Default for ProjectionPublisher<E> {
    fn default() -> Self {
        Self::new()
    }
}
