//! Loading and storing event-sourced aggregates.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use common::{AggregateId, StreamId};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreExt, ExpectedVersion, Snapshot, Version,
};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;
use crate::registry::EventRegistry;
use crate::snapshot::SnapshotPolicy;

/// Metadata attached to every record of one store call.
pub type EventMetadata = HashMap<String, serde_json::Value>;

/// Persists aggregates as event streams.
///
/// The store is responsible for:
/// 1. Rebuilding an aggregate from its nearest snapshot plus the events after it
/// 2. Appending an aggregate's uncommitted events under an expected version
/// 3. Saving a snapshot when the [`SnapshotPolicy`] says so
///
/// It never retries: a [`DomainError::Conflict`] goes back to the caller,
/// who reloads and re-evaluates.
pub struct AggregateStore<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    registry: Arc<EventRegistry<A::Event>>,
    policy: SnapshotPolicy,
    _aggregate: PhantomData<fn() -> A>,
}

impl<S, A> AggregateStore<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S, registry: Arc<EventRegistry<A::Event>>, policy: SnapshotPolicy) -> Self {
        Self {
            store,
            registry,
            policy,
            _aggregate: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn event_store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Arc<EventRegistry<A::Event>> {
        &self.registry
    }

    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    fn stream_id(aggregate_id: AggregateId) -> StreamId {
        StreamId::new(A::aggregate_type(), aggregate_id)
    }

    /// Rebuilds an aggregate from its stream.
    ///
    /// Fails with `NotFound` when the stream is empty and no snapshot exists.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let started = Instant::now();
        let stream = Self::stream_id(aggregate_id);

        let (snapshot, events) = self
            .store
            .load_aggregate(aggregate_id)
            .await
            .map_err(|e| DomainError::from_store(&stream, e))?;

        if snapshot.is_none() && events.is_empty() {
            return Err(DomainError::NotFound { stream });
        }

        let mut aggregate = match snapshot {
            Some(snapshot) => self.restore(&stream, snapshot)?,
            None => A::new(aggregate_id),
        };

        let replayed = events.len();
        for envelope in events {
            let expected = aggregate.version().next();
            if envelope.version != expected {
                return Err(DomainError::corrupted(format!(
                    "{stream} is out of order: expected version {expected}, found {}",
                    envelope.version
                )));
            }

            let event = self
                .registry
                .decode(&envelope.event_type, envelope.payload)?;
            aggregate.apply(event, false)?;
        }

        metrics::counter!("aggregate_store_loads_total").increment(1);
        metrics::histogram!("aggregate_store_events_replayed").record(replayed as f64);
        metrics::histogram!("aggregate_store_load_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        tracing::debug!(
            %stream,
            version = %aggregate.version(),
            replayed,
            "aggregate loaded"
        );

        Ok(aggregate)
    }

    /// Returns true if the aggregate's stream holds any events.
    pub async fn exists(&self, aggregate_id: AggregateId) -> Result<bool, DomainError> {
        self.store
            .aggregate_exists(aggregate_id)
            .await
            .map_err(|e| DomainError::from_store(&Self::stream_id(aggregate_id), e))
    }

    /// Appends the aggregate's uncommitted events.
    ///
    /// `expected` defaults to the version the aggregate was loaded at.
    /// Returns the stream version after the append.
    pub async fn store(
        &self,
        aggregate: &mut A,
        expected: Option<ExpectedVersion>,
    ) -> Result<Version, DomainError> {
        self.store_with_metadata(aggregate, expected, EventMetadata::new())
            .await
    }

    /// Like [`store`](Self::store), attaching `metadata` to every appended record.
    #[tracing::instrument(
        skip(self, aggregate, metadata),
        fields(aggregate_type = A::aggregate_type(), aggregate_id = %aggregate.id())
    )]
    pub async fn store_with_metadata(
        &self,
        aggregate: &mut A,
        expected: Option<ExpectedVersion>,
        metadata: EventMetadata,
    ) -> Result<Version, DomainError> {
        if !aggregate.has_uncommitted_events() {
            return Ok(aggregate.version());
        }

        let started = Instant::now();
        let stream = aggregate.stream_id();
        let expected =
            expected.unwrap_or_else(|| ExpectedVersion::from(aggregate.original_version()));

        let envelopes = Self::build_envelopes(aggregate, &stream, &metadata)?;
        let appended = envelopes.len();

        let new_version = match self
            .store
            .append(envelopes, AppendOptions::with_expected(expected))
            .await
        {
            Ok(version) => version,
            Err(e) => {
                let err = DomainError::from_store(&stream, e);
                if err.is_conflict() {
                    metrics::counter!("aggregate_store_conflicts_total").increment(1);
                    tracing::info!(%stream, %expected, "append rejected by expected version");
                }
                return Err(err);
            }
        };

        aggregate.mark_uncommitted_events_as_committed();

        metrics::counter!("aggregate_store_events_appended_total").increment(appended as u64);
        metrics::histogram!("aggregate_store_store_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        tracing::info!(%stream, %new_version, appended, "events stored");

        // With Any/StreamExists another writer may have appended first; the
        // in-memory state then no longer describes `new_version`.
        if aggregate.version() != new_version {
            tracing::warn!(
                %stream,
                local_version = %aggregate.version(),
                %new_version,
                "stream advanced concurrently; reload before the next store"
            );
            return Ok(new_version);
        }

        self.maybe_snapshot(aggregate, &stream, new_version).await;

        Ok(new_version)
    }

    fn build_envelopes(
        aggregate: &A,
        stream: &StreamId,
        metadata: &EventMetadata,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let base = aggregate.original_version();

        aggregate
            .uncommitted_events()
            .iter()
            .enumerate()
            .map(|(offset, event)| {
                let payload = serde_json::to_value(event).map_err(|e| {
                    DomainError::internal(
                        format!("failed to serialize {} for {stream}", event.event_type()),
                        e,
                    )
                })?;

                EventEnvelope::builder()
                    .aggregate_id(aggregate.id())
                    .aggregate_type(A::aggregate_type())
                    .event_type(event.event_type())
                    .version(base.advance(offset + 1))
                    .payload_raw(payload)
                    .extend_metadata(metadata.clone())
                    .try_build()
                    .map_err(|e| DomainError::from_store(stream, e))
            })
            .collect()
    }

    /// Saves a snapshot if the policy asks for one. Failures are logged only:
    /// the events are already durable and retrying the store would conflict.
    async fn maybe_snapshot(&self, aggregate: &mut A, stream: &StreamId, version: Version) {
        if !self
            .policy
            .should_snapshot(version, aggregate.root().snapshot_version())
        {
            return;
        }

        let snapshot =
            match Snapshot::from_state(aggregate.id(), A::aggregate_type(), version, &*aggregate) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(%stream, %version, error = %e, "failed to serialize snapshot");
                    return;
                }
            };

        match self.store.save_snapshot(snapshot).await {
            Ok(()) => {
                aggregate.root_mut().set_snapshot_version(version);
                metrics::counter!("aggregate_store_snapshots_total").increment(1);
                tracing::debug!(%stream, %version, "snapshot saved");
            }
            Err(e) => {
                tracing::warn!(%stream, %version, error = %e, "failed to save snapshot");
            }
        }
    }

    fn restore(&self, stream: &StreamId, snapshot: Snapshot) -> Result<A, DomainError> {
        if snapshot.aggregate_type != A::aggregate_type() {
            return Err(DomainError::corrupted(format!(
                "snapshot for {stream} has aggregate type {}",
                snapshot.aggregate_type
            )));
        }

        let mut aggregate: A = snapshot.restore().map_err(|e| {
            DomainError::internal(format!("failed to restore snapshot for {stream}"), e)
        })?;
        aggregate.root_mut().restored_at(snapshot.version);

        tracing::debug!(%stream, version = %snapshot.version, "restored from snapshot");
        Ok(aggregate)
    }
}
