//! Core aggregate and domain event traits.

use std::fmt::Debug;

use common::{AggregateId, StreamId};
use event_store::Version;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::entity::Entity;
use crate::error::DomainError;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static
{
    /// Returns the event type name.
    ///
    /// This is the wire name stored with each record and the key the
    /// [`EventRegistry`](crate::EventRegistry) decodes by.
    fn event_type(&self) -> &'static str;
}

/// State every event-sourced aggregate carries besides its domain fields.
///
/// `original_version` is the stream revision the aggregate was loaded at (0
/// for a brand-new aggregate); `uncommitted` holds events applied since then
/// that have not been appended yet. The buffer is never serialized, so a
/// snapshot only ever captures committed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AggregateRoot<E> {
    entity: Entity,
    original_version: Version,
    #[serde(skip)]
    uncommitted: Vec<E>,
    #[serde(default)]
    snapshot_version: Version,
}

impl<E> AggregateRoot<E> {
    pub fn new(id: AggregateId, aggregate_type: impl Into<String>) -> Self {
        Self {
            entity: Entity::new(id, aggregate_type),
            original_version: Version::initial(),
            uncommitted: Vec::new(),
            snapshot_version: Version::initial(),
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    pub fn original_version(&self) -> Version {
        self.original_version
    }

    pub fn snapshot_version(&self) -> Version {
        self.snapshot_version
    }

    pub fn uncommitted_events(&self) -> &[E] {
        &self.uncommitted
    }

    /// Records that a snapshot was persisted at `version`.
    pub fn set_snapshot_version(&mut self, version: Version) {
        self.snapshot_version = version;
    }

    /// Resets version bookkeeping after restoring state from a snapshot.
    pub fn restored_at(&mut self, version: Version) {
        self.original_version = version;
        self.snapshot_version = version;
        self.uncommitted.clear();
    }

    fn push_uncommitted(&mut self, event: E) {
        self.uncommitted.push(event);
    }

    fn advance_original_version(&mut self) {
        self.original_version = self.original_version.next();
    }

    fn commit(&mut self) -> usize {
        let committed = self.uncommitted.len();
        self.original_version = self.original_version.advance(committed);
        self.uncommitted.clear();
        committed
    }
}

/// Capability trait for event-sourced aggregates.
///
/// A concrete aggregate owns an [`AggregateRoot`] and exposes it through
/// [`root`](Self::root) / [`root_mut`](Self::root_mut); everything else about
/// versioning and the uncommitted buffer is provided here.
///
/// State changes flow through [`apply`](Self::apply) only:
/// - business methods call `apply(event, true)`, which runs the transition
///   and buffers the event for the next store;
/// - replay calls `apply(event, false)`, which runs the transition and moves
///   the loaded version forward.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    ///
    /// Used as the stream prefix and as the type tag on every record.
    fn aggregate_type() -> &'static str;

    /// Creates an empty aggregate that events are replayed onto.
    fn new(id: AggregateId) -> Self;

    fn root(&self) -> &AggregateRoot<Self::Event>;

    fn root_mut(&mut self) -> &mut AggregateRoot<Self::Event>;

    /// State transition for a single event.
    ///
    /// Must be deterministic and must not look at anything but `self` and
    /// the event. Returns `InvalidEventType` for an event the aggregate
    /// refuses to fold.
    fn when(&mut self, event: &Self::Event) -> Result<(), DomainError>;

    /// Applies an event, either as a new fact (`is_new`) or during replay.
    fn apply(&mut self, event: Self::Event, is_new: bool) -> Result<(), DomainError> {
        if !is_new {
            self.when(&event)?;
            self.root_mut().advance_original_version();
            return Ok(());
        }

        if self.root().uncommitted_events().contains(&event) {
            return Err(DomainError::validation(format!(
                "event {} already pending on {}",
                event.event_type(),
                self.stream_id()
            )));
        }

        self.when(&event)?;
        self.root_mut().push_uncommitted(event);
        Ok(())
    }

    fn id(&self) -> AggregateId {
        self.root().entity().id()
    }

    fn stream_id(&self) -> StreamId {
        StreamId::new(Self::aggregate_type(), self.id())
    }

    fn original_version(&self) -> Version {
        self.root().original_version()
    }

    /// Version the stream will have once the pending events are stored.
    fn version(&self) -> Version {
        let root = self.root();
        root.original_version()
            .advance(root.uncommitted_events().len())
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        self.root().uncommitted_events()
    }

    fn has_uncommitted_events(&self) -> bool {
        !self.root().uncommitted_events().is_empty()
    }

    /// Clears the buffer after a successful append and returns how many
    /// events it held. `original_version` advances by that count.
    fn mark_uncommitted_events_as_committed(&mut self) -> usize {
        self.root_mut().commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum CounterEvent {
        Opened,
        Incremented { by: i32 },
        Foreign { owner: AggregateId },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened => "CounterOpened",
                CounterEvent::Incremented { .. } => "CounterIncremented",
                CounterEvent::Foreign { .. } => "CounterForeign",
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counter {
        root: AggregateRoot<CounterEvent>,
        value: i32,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn new(id: AggregateId) -> Self {
            Self {
                root: AggregateRoot::new(id, Self::aggregate_type()),
                value: 0,
            }
        }

        fn root(&self) -> &AggregateRoot<CounterEvent> {
            &self.root
        }

        fn root_mut(&mut self) -> &mut AggregateRoot<CounterEvent> {
            &mut self.root
        }

        fn when(&mut self, event: &CounterEvent) -> Result<(), DomainError> {
            match event {
                CounterEvent::Opened => {}
                CounterEvent::Incremented { by } => self.value += by,
                CounterEvent::Foreign { owner } => {
                    return Err(DomainError::invalid_event_type(
                        event.event_type(),
                        format!("belongs to {owner}"),
                    ));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn new_events_are_buffered_and_folded() {
        let mut counter = Counter::new(AggregateId::new());
        counter.apply(CounterEvent::Opened, true).unwrap();
        counter
            .apply(CounterEvent::Incremented { by: 3 }, true)
            .unwrap();

        assert_eq!(counter.value, 3);
        assert_eq!(counter.uncommitted_events().len(), 2);
        assert_eq!(counter.original_version(), Version::initial());
        assert_eq!(counter.version(), Version::new(2));
    }

    #[test]
    fn replayed_events_advance_original_version_only() {
        let mut counter = Counter::new(AggregateId::new());
        counter.apply(CounterEvent::Opened, false).unwrap();
        counter
            .apply(CounterEvent::Incremented { by: 5 }, false)
            .unwrap();

        assert!(!counter.has_uncommitted_events());
        assert_eq!(counter.original_version(), Version::new(2));
        assert_eq!(counter.version(), Version::new(2));
        assert_eq!(counter.value, 5);
    }

    #[test]
    fn duplicate_pending_event_is_rejected() {
        let mut counter = Counter::new(AggregateId::new());
        counter
            .apply(CounterEvent::Incremented { by: 1 }, true)
            .unwrap();

        let result = counter.apply(CounterEvent::Incremented { by: 1 }, true);

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(counter.value, 1);
        assert_eq!(counter.uncommitted_events().len(), 1);
    }

    #[test]
    fn refused_event_is_not_buffered() {
        let mut counter = Counter::new(AggregateId::new());
        let result = counter.apply(
            CounterEvent::Foreign {
                owner: AggregateId::new(),
            },
            true,
        );

        assert!(matches!(result, Err(DomainError::InvalidEventType { .. })));
        assert!(!counter.has_uncommitted_events());
    }

    #[test]
    fn commit_moves_pending_into_original_version() {
        let mut counter = Counter::new(AggregateId::new());
        counter.apply(CounterEvent::Opened, true).unwrap();
        counter
            .apply(CounterEvent::Incremented { by: 2 }, true)
            .unwrap();

        assert_eq!(counter.mark_uncommitted_events_as_committed(), 2);
        assert_eq!(counter.original_version(), Version::new(2));
        assert_eq!(counter.version(), Version::new(2));

        // Same value is accepted again once the previous one is committed.
        counter
            .apply(CounterEvent::Incremented { by: 2 }, true)
            .unwrap();
        assert_eq!(counter.version(), Version::new(3));
    }

    #[test]
    fn snapshot_state_omits_pending_events() {
        let mut counter = Counter::new(AggregateId::new());
        counter.apply(CounterEvent::Opened, false).unwrap();
        counter
            .apply(CounterEvent::Incremented { by: 7 }, true)
            .unwrap();

        let json = serde_json::to_value(&counter).unwrap();
        let mut restored: Counter = serde_json::from_value(json).unwrap();
        restored.root_mut().restored_at(Version::new(1));

        assert_eq!(restored.value, 7);
        assert!(!restored.has_uncommitted_events());
        assert_eq!(restored.root().snapshot_version(), Version::new(1));
    }
}
