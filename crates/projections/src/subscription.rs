//! Catch-up subscription over the global log.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domain::{DomainEvent, EventRegistry, StreamEvent};
use event_store::{CheckpointStore, EventStore};

use crate::publisher::ProjectionPublisher;
use crate::Result;

pub const DEFAULT_BATCH_SIZE: usize = 256;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Reads the global log from a stored checkpoint and publishes each event.
///
/// The checkpoint advances after every record, so a restart resumes right
/// after the last record that was fully handled. Delivery is at-least-once:
/// a record whose publish failed is delivered again on the next run.
pub struct CatchUpSubscription<S, C, E>
where
    S: EventStore,
    C: CheckpointStore,
    E: DomainEvent,
{
    subscription_id: String,
    store: S,
    checkpoints: C,
    registry: Arc<EventRegistry<E>>,
    publisher: ProjectionPublisher<E>,
    aggregate_type: Option<String>,
    batch_size: usize,
    poll_interval: Duration,
}

impl<S, C, E> CatchUpSubscription<S, C, E>
where
    S: EventStore,
    C: CheckpointStore,
    E: DomainEvent,
{
    pub fn new(
        subscription_id: impl Into<String>,
        store: S,
        checkpoints: C,
        registry: Arc<EventRegistry<E>>,
        publisher: ProjectionPublisher<E>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            store,
            checkpoints,
            registry,
            publisher,
            aggregate_type: None,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Only publish records of this aggregate type. Other records still
    /// advance the checkpoint.
    pub fn with_aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Records read per batch. Values below 1 are raised to 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn publisher(&self) -> &ProjectionPublisher<E> {
        &self.publisher
    }

    /// The stored checkpoint: global position of the last handled record.
    pub async fn checkpoint(&self) -> Result<u64> {
        Ok(self.checkpoints.load(&self.subscription_id).await?)
    }

    fn accepts(&self, aggregate_type: &str) -> bool {
        self.aggregate_type
            .as_deref()
            .is_none_or(|wanted| wanted == aggregate_type)
    }

    /// Processes at most one batch. Returns the number of records consumed,
    /// filtered ones included.
    #[tracing::instrument(skip(self), fields(subscription_id = %self.subscription_id))]
    pub async fn run_once(&self) -> Result<usize> {
        let checkpoint = self.checkpoint().await?;
        let records = self
            .store
            .read_all_from(checkpoint, self.batch_size)
            .await?;

        let mut consumed = 0;
        for envelope in records {
            let position = envelope.position;

            if self.accepts(&envelope.aggregate_type) {
                let event = StreamEvent::decode(envelope, &self.registry)?;
                self.publisher.publish(&event).await?;
            }

            self.checkpoints
                .store(&self.subscription_id, position)
                .await?;
            consumed += 1;
        }

        if consumed > 0 {
            metrics::counter!("subscription_events_consumed_total").increment(consumed as u64);
            tracing::debug!(consumed, from = checkpoint, "batch processed");
        }

        Ok(consumed)
    }

    /// Keeps the projections caught up until `shutdown` resolves.
    ///
    /// Sleeps `poll_interval` whenever the log is drained. A batch in progress
    /// is finished before shutdown is honoured. Errors end the loop and are
    /// returned; retrying is up to the caller.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            subscription_id = %self.subscription_id,
            projections = ?self.publisher.names(),
            batch_size = self.batch_size,
            "subscription started"
        );

        loop {
            let consumed = match self.run_once().await {
                Ok(consumed) => consumed,
                Err(e) => {
                    metrics::counter!("subscription_failures_total").increment(1);
                    tracing::error!(
                        subscription_id = %self.subscription_id,
                        error = %e,
                        "subscription stopped"
                    );
                    return Err(e);
                }
            };

            let wait = if consumed < self.batch_size {
                self.poll_interval
            } else {
                Duration::ZERO
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!(subscription_id = %self.subscription_id, "subscription stopped on shutdown");
        Ok(())
    }
}

impl<S, C, E> std::fmt::Debug for CatchUpSubscription<S, C, E>
where
    S: EventStore,
    C: CheckpointStore,
    E: DomainEvent,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchUpSubscription")
            .field("subscription_id", &self.subscription_id)
            .field("aggregate_type", &self.aggregate_type)
            .field("batch_size", &self.batch_size)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
