//! Projector worker: keeps the order read models caught up with the event log.
//!
//! The binary in `main.rs` is the composition root; this library holds the
//! pieces it wires together so they can be driven from tests.

pub mod config;
pub mod error;
pub mod telemetry;

use std::future::Future;
use std::sync::Arc;

use common::AggregateId;
use domain::{CustomerId, Money, OrderEvent, OrderItem, OrderService};
use event_store::{CheckpointStore, EventStore};
use projections::{
    CatchUpSubscription, CurrentOrdersView, OrderHistoryView, Projection, ProjectionPublisher,
    ReadModel,
};

pub use config::{Config, LogFormat};
pub use error::{ProjectorError, Result};

/// The read models this worker maintains.
#[derive(Clone, Default)]
pub struct OrderViews {
    pub current: CurrentOrdersView,
    pub history: OrderHistoryView,
}

impl OrderViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher delivering to every view, current orders first.
    pub fn publisher(&self) -> ProjectionPublisher<OrderEvent> {
        ProjectionPublisher::new()
            .with(Arc::new(self.current.clone()))
            .with(Arc::new(self.history.clone()))
    }

    /// Highest global position every view has applied.
    pub async fn applied_position(&self) -> u64 {
        let current = Projection::<OrderEvent>::position(&self.current).await;
        let history = Projection::<OrderEvent>::position(&self.history).await;
        current.last_position.min(history.last_position)
    }

    pub async fn log_counts(&self) {
        for view in [&self.current as &dyn ReadModel, &self.history] {
            let count = view.count().await;
            metrics::gauge!("projections_read_model_entries", "view" => view.name())
                .set(count as f64);
            tracing::info!(view = view.name(), count, "read model size");
        }
    }
}

/// Runs the order-view subscription over `store` until `shutdown` resolves.
///
/// The views live in memory, so a stored checkpoint ahead of what they have
/// applied is rewound to the views' position before catching up.
#[tracing::instrument(skip_all, fields(subscription_id = %config.subscription_id))]
pub async fn run_projector<S, C, F>(
    config: &Config,
    store: S,
    checkpoints: C,
    views: &OrderViews,
    shutdown: F,
) -> Result<()>
where
    S: EventStore,
    C: CheckpointStore,
    F: Future<Output = ()>,
{
    let stored = checkpoints.load(&config.subscription_id).await?;
    let resume_from = stored.min(views.applied_position().await);
    if resume_from < stored {
        tracing::info!(stored, resume_from, "views behind checkpoint, replaying");
        checkpoints
            .store(&config.subscription_id, resume_from)
            .await?;
    }
    tracing::info!(resume_from, "resuming order views");

    let subscription = CatchUpSubscription::new(
        config.subscription_id.clone(),
        store,
        checkpoints,
        Arc::new(OrderEvent::registry()),
        views.publisher(),
    )
    .with_aggregate_type("Order")
    .with_batch_size(config.batch_size)
    .with_poll_interval(config.poll_interval);

    subscription.run_until(shutdown).await?;
    views.log_counts().await;
    Ok(())
}

/// Writes `count` small orders through `service`, half of them completed.
/// Returns the ids in creation order.
pub async fn seed_orders<S: EventStore>(
    service: &OrderService<S>,
    count: u64,
) -> Result<Vec<AggregateId>> {
    let mut ids = Vec::new();

    for n in 0..count {
        let order_id = AggregateId::new();
        service.create_order(order_id, CustomerId::new()).await?;
        service
            .add_item(
                order_id,
                OrderItem::new(
                    format!("SKU-{:03}", n % 7 + 1),
                    "Sample item",
                    (n % 3 + 1) as u32,
                    Money::from_cents(1250),
                ),
            )
            .await?;
        service.submit_order(order_id).await?;

        if n % 2 == 1 {
            service.mark_reserved(order_id, None).await?;
            service.start_processing(order_id, None).await?;
            service.complete_order(order_id, None).await?;
        }
        ids.push(order_id);
    }

    tracing::info!(count, "seeded demo orders");
    Ok(ids)
}
