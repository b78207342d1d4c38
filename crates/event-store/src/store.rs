use async_trait::async_trait;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, ExpectedVersion, Result, Snapshot, Version,
};

/// Options for appending events to the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Precondition on the stream head, checked atomically with the append.
    pub expected_version: ExpectedVersion,
}

impl AppendOptions {
    /// Creates options with no version check (use with caution).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self::with_expected(ExpectedVersion::Exact(version))
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self::with_expected(ExpectedVersion::NoStream)
    }

    /// Creates options expecting the aggregate to already hold events.
    pub fn expect_exists() -> Self {
        Self::with_expected(ExpectedVersion::StreamExists)
    }

    pub fn with_expected(expected_version: ExpectedVersion) -> Self {
        Self { expected_version }
    }
}

/// Core trait for the backing append-only log.
///
/// Every appended record belongs to exactly one aggregate stream and is also
/// assigned a strictly increasing position in the global log, which
/// catch-up subscriptions consume through [`read_all_from`](Self::read_all_from).
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to one aggregate stream.
    ///
    /// Events are appended atomically - either all succeed or none do. The
    /// expected version is checked against the stream head inside the same
    /// atomic section, and a mismatch fails with `ConcurrencyConflict`.
    /// The store numbers the appended records `head + 1 ..= head + n`.
    ///
    /// Returns the new version of the aggregate after appending.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Retrieves all events for a specific aggregate.
    ///
    /// Events are returned in version order (oldest first).
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves all events for an aggregate starting from a specific version (inclusive).
    ///
    /// Useful when replaying from a snapshot.
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Reads up to `limit` records of the global log whose position is
    /// strictly greater than `after`, in position order.
    ///
    /// `after = 0` starts from the beginning of the log.
    async fn read_all_from(&self, after: u64, limit: usize) -> Result<Vec<EventEnvelope>>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Saves a snapshot of an aggregate's state.
    ///
    /// If a snapshot already exists for this aggregate, it is replaced.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the latest snapshot for an aggregate.
    ///
    /// Returns None if no snapshot exists.
    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to the store.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads an aggregate's events, optionally starting from a snapshot.
    ///
    /// If a snapshot exists at or below the stream head, returns the
    /// snapshot and the events after it. Otherwise, returns None and all
    /// events.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(aggregate_id).await? {
            let events = self
                .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                .await?;
            if !events.is_empty() {
                return Ok((Some(snapshot), events));
            }

            // Nothing after the snapshot: only trust it if the stream still
            // reaches its version.
            let head = self
                .get_aggregate_version(aggregate_id)
                .await?
                .unwrap_or(Version::initial());
            if snapshot.is_usable_at(head) {
                return Ok((Some(snapshot), events));
            }
            tracing::warn!(
                %aggregate_id,
                snapshot_version = %snapshot.version,
                %head,
                "ignoring snapshot ahead of the stream head"
            );
        }

        let events = self.get_events_for_aggregate(aggregate_id).await?;
        Ok((None, events))
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending.
///
/// The batch must be non-empty, target a single aggregate and carry
/// contiguous versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "All events must have the same aggregate type".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event versions must be sequential. Expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}

/// Renumbers a validated batch onto the stream head.
///
/// Called by backends inside their atomic section once the expected version
/// has been checked.
pub(crate) fn rebase_onto(events: &mut [EventEnvelope], head: Version) {
    for (offset, event) in events.iter_mut().enumerate() {
        event.version = head.advance(offset + 1);
    }
}
