//! Core projection trait and position tracking.

use async_trait::async_trait;
use domain::{DomainEvent, StreamEvent};

use crate::Result;

/// How far a projection has applied the global log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Global position of the last event applied, 0 if none.
    pub last_position: u64,
    /// Number of events applied.
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns true if the event at `position` was already applied.
    ///
    /// Position 0 marks an event that never went through the global log;
    /// such events are always applied.
    pub fn has_applied(&self, position: u64) -> bool {
        position != 0 && position <= self.last_position
    }

    /// Records an applied event.
    pub fn advance(&self, position: u64) -> Self {
        Self {
            last_position: self.last_position.max(position),
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position({}, processed {})",
            self.last_position, self.events_processed
        )
    }
}

/// A consumer of committed events, typically maintaining a read model.
///
/// Delivery is at-least-once: the same event can arrive again after a
/// failure, so implementations must tolerate re-delivery.
#[async_trait]
pub trait Projection<E: DomainEvent>: Send + Sync {
    fn name(&self) -> &str;

    /// Applies a single event.
    async fn process_event(&self, event: &StreamEvent<E>) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all projected state.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_starts_at_zero() {
        let pos = ProjectionPosition::zero();
        assert_eq!(pos.last_position, 0);
        assert_eq!(pos.events_processed, 0);
    }

    #[test]
    fn position_advances() {
        let pos = ProjectionPosition::zero().advance(4).advance(9);
        assert_eq!(pos.last_position, 9);
        assert_eq!(pos.events_processed, 2);
        assert!(pos.has_applied(4));
        assert!(pos.has_applied(9));
        assert!(!pos.has_applied(10));
    }

    #[test]
    fn unpositioned_events_are_never_considered_applied() {
        let pos = ProjectionPosition::zero().advance(3);
        assert!(!pos.has_applied(0));

        let pos = pos.advance(0);
        assert_eq!(pos.last_position, 3);
        assert_eq!(pos.events_processed, 2);
    }

    #[test]
    fn position_display() {
        let pos = ProjectionPosition {
            last_position: 42,
            events_processed: 40,
        };
        assert_eq!(pos.to_string(), "position(42, processed 40)");
    }
}
