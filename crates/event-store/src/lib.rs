//! Append-only event log, snapshot storage and subscription checkpoints.
//!
//! Two interchangeable backends implement the same traits:
//! - [`InMemoryEventStore`] / [`InMemoryCheckpointStore`] for tests and local runs
//! - [`PostgresEventStore`] / [`PostgresCheckpointStore`] for durable deployments

pub mod checkpoint;
pub mod error;
pub mod event;
pub mod expected_version;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore};
pub use common::{AggregateId, StreamId};
pub use error::{EventStoreError, Result};
pub use event::{
    CAUSATION_ID, CORRELATION_ID, EventEnvelope, EventEnvelopeBuilder, EventId, Version,
};
pub use expected_version::{ExpectedVersion, InvalidExpectedVersion};
pub use memory::InMemoryEventStore;
pub use postgres::{PostgresCheckpointStore, PostgresEventStore};
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt};
