use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, rebase_onto, validate_events_for_append},
};

/// In-memory event store implementation for testing.
///
/// Stores the global log as a single vector whose index + 1 is the record's
/// position, and provides the same interface as the PostgreSQL
/// implementation. It also counts appends and stream reads so tests can
/// assert how much I/O an operation performed.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
    append_calls: Arc<AtomicU64>,
    events_read: Arc<AtomicU64>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Number of `append` calls that reached the store, successful or not.
    pub fn append_calls(&self) -> u64 {
        self.append_calls.load(Ordering::Relaxed)
    }

    /// Number of records returned by aggregate stream reads so far.
    pub fn events_read(&self) -> u64 {
        self.events_read.load(Ordering::Relaxed)
    }

    /// Resets the I/O counters without touching stored data.
    pub fn reset_counters(&self) {
        self.append_calls.store(0, Ordering::Relaxed);
        self.events_read.store(0, Ordering::Relaxed);
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        self.events.write().await.clear();
        self.snapshots.write().await.clear();
        self.reset_counters();
    }

    fn head_of(log: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
        log.iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial())
    }

    fn read_stream(
        &self,
        log: &[EventEnvelope],
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Vec<EventEnvelope> {
        let mut events: Vec<_> = log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        self.events_read
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        events
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        mut events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Version> {
        self.append_calls.fetch_add(1, Ordering::Relaxed);
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;

        // The write lock is held across check and insert, so the expected
        // version is validated atomically with the append.
        let mut log = self.events.write().await;
        let current_version = Self::head_of(&log, aggregate_id);

        if !options.expected_version.is_satisfied_by(current_version) {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version,
                actual: current_version,
            });
        }

        rebase_onto(&mut events, current_version);
        let first_position = log.len() as u64 + 1;
        for (offset, event) in events.iter_mut().enumerate() {
            event.position = first_position + offset as u64;
        }

        let new_version = current_version.advance(events.len());
        log.extend(events);

        Ok(new_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.events.read().await;
        Ok(self.read_stream(&log, aggregate_id, Version::first()))
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.events.read().await;
        Ok(self.read_stream(&log, aggregate_id, from_version))
    }

    async fn read_all_from(&self, after: u64, limit: usize) -> Result<Vec<EventEnvelope>> {
        let log = self.events.read().await;
        Ok(log
            .iter()
            .skip(after as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.events.read().await;
        let version = Self::head_of(&log, aggregate_id);
        Ok((!version.is_initial()).then_some(version))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&aggregate_id).cloned())
    }
}
