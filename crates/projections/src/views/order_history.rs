//! Order history read model: completed and cancelled orders.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{CustomerId, Money, OrderEvent, OrderState, ProductId, StreamEvent};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// An item in a historical order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItemSummary {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Summary of a completed or cancelled order.
#[derive(Debug, Clone)]
pub struct OrderHistorySummary {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub state: OrderState,
    pub item_count: usize,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub items: HashMap<ProductId, HistoryItemSummary>,
}

/// An order still in progress, kept until it reaches a terminal state.
#[derive(Debug, Clone)]
struct StagingOrder {
    customer_id: CustomerId,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    items: HashMap<ProductId, HistoryItemSummary>,
}

impl StagingOrder {
    fn total_amount(&self) -> Money {
        self.items.values().fold(Money::ZERO, |acc, item| {
            acc + item.unit_price.times(item.quantity)
        })
    }

    fn finish(self, order_id: AggregateId, state: OrderState) -> OrderHistorySummary {
        OrderHistorySummary {
            order_id,
            customer_id: self.customer_id,
            state,
            item_count: self.items.len(),
            total_amount: self.total_amount(),
            created_at: self.created_at,
            submitted_at: self.submitted_at,
            completed_at: None,
            cancelled_at: None,
            tracking_number: None,
            cancellation_reason: None,
            cancelled_by: None,
            items: self.items,
        }
    }
}

#[derive(Default)]
struct OrderHistoryState {
    staging: HashMap<AggregateId, StagingOrder>,
    history: HashMap<AggregateId, OrderHistorySummary>,
    position: ProjectionPosition,
}

/// Read model view for completed and cancelled orders.
///
/// Orders are staged while in progress and moved to history when they
/// reach a terminal state.
#[derive(Clone, Default)]
pub struct OrderHistoryView {
    state: Arc<RwLock<OrderHistoryState>>,
}

impl OrderHistoryView {
    pub const NAME: &'static str = "OrderHistoryView";

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Option<OrderHistorySummary> {
        self.state.read().await.history.get(&order_id).cloned()
    }

    pub async fn get_all_history(&self) -> Vec<OrderHistorySummary> {
        self.state.read().await.history.values().cloned().collect()
    }

    pub async fn get_completed_orders(&self) -> Vec<OrderHistorySummary> {
        self.in_state(OrderState::Completed).await
    }

    pub async fn get_cancelled_orders(&self) -> Vec<OrderHistorySummary> {
        self.in_state(OrderState::Cancelled).await
    }

    pub async fn get_history_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Vec<OrderHistorySummary> {
        self.state
            .read()
            .await
            .history
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect()
    }

    async fn in_state(&self, state: OrderState) -> Vec<OrderHistorySummary> {
        self.state
            .read()
            .await
            .history
            .values()
            .filter(|o| o.state == state)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Projection<OrderEvent> for OrderHistoryView {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process_event(&self, event: &StreamEvent<OrderEvent>) -> Result<()> {
        let mut state = self.state.write().await;
        if state.position.has_applied(event.position) {
            tracing::trace!(position = event.position, "already applied");
            return Ok(());
        }

        let order_id = event.aggregate_id;

        match &event.event {
            OrderEvent::OrderCreated(data) => {
                state.staging.insert(
                    order_id,
                    StagingOrder {
                        customer_id: data.customer_id,
                        created_at: data.created_at,
                        submitted_at: None,
                        items: HashMap::new(),
                    },
                );
            }
            OrderEvent::ItemAdded(data) => {
                if let Some(staging) = state.staging.get_mut(&order_id) {
                    staging.items.insert(
                        data.product_id.clone(),
                        HistoryItemSummary {
                            product_id: data.product_id.clone(),
                            product_name: data.product_name.clone(),
                            quantity: data.quantity,
                            unit_price: data.unit_price,
                        },
                    );
                }
            }
            OrderEvent::ItemRemoved(data) => {
                if let Some(staging) = state.staging.get_mut(&order_id) {
                    staging.items.remove(&data.product_id);
                }
            }
            OrderEvent::ItemQuantityUpdated(data) => {
                if let Some(staging) = state.staging.get_mut(&order_id)
                    && let Some(item) = staging.items.get_mut(&data.product_id)
                {
                    item.quantity = data.new_quantity;
                }
            }
            OrderEvent::OrderSubmitted(data) => {
                if let Some(staging) = state.staging.get_mut(&order_id) {
                    staging.submitted_at = Some(data.submitted_at);
                }
            }
            OrderEvent::OrderCompleted(data) => {
                if let Some(staging) = state.staging.remove(&order_id) {
                    let mut summary = staging.finish(order_id, OrderState::Completed);
                    summary.completed_at = Some(data.completed_at);
                    summary.tracking_number = data.tracking_number.clone();
                    state.history.insert(order_id, summary);
                }
            }
            OrderEvent::OrderCancelled(data) => {
                if let Some(staging) = state.staging.remove(&order_id) {
                    let mut summary = staging.finish(order_id, OrderState::Cancelled);
                    summary.cancelled_at = Some(data.cancelled_at);
                    summary.cancellation_reason = Some(data.reason.clone());
                    summary.cancelled_by = data.cancelled_by.clone();
                    state.history.insert(order_id, summary);
                }
            }
            // Intermediate states don't affect history
            OrderEvent::OrderReserved(_) | OrderEvent::OrderProcessing(_) => {}
        }

        state.position = state.position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = OrderHistoryState::default();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for OrderHistoryView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn count(&self) -> usize {
        self.state.read().await.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderItem;
    use event_store::{EventId, Version};

    /// Feeds events to a view with increasing global positions.
    struct Feed {
        view: OrderHistoryView,
        position: u64,
    }

    impl Feed {
        fn new() -> Self {
            Self {
                view: OrderHistoryView::new(),
                position: 0,
            }
        }

        async fn push(&mut self, order_id: AggregateId, event: OrderEvent) {
            self.position += 1;
            let event = StreamEvent {
                event_id: EventId::new(),
                aggregate_id: order_id,
                aggregate_type: "Order".to_string(),
                version: Version::first(),
                position: self.position,
                timestamp: Utc::now(),
                event,
                metadata: Default::default(),
            };
            self.view.process_event(&event).await.unwrap();
        }

        async fn order_with_items(&mut self, order_id: AggregateId, customer_id: CustomerId) {
            self.push(order_id, OrderEvent::order_created(order_id, customer_id))
                .await;
            let item = OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000));
            self.push(order_id, OrderEvent::item_added(&item)).await;
        }
    }

    #[tokio::test]
    async fn test_completed_order_appears_in_history() {
        let mut feed = Feed::new();
        let order_id = AggregateId::new();
        let customer_id = CustomerId::new();

        feed.order_with_items(order_id, customer_id).await;
        feed.push(order_id, OrderEvent::order_submitted(Money::from_cents(2000), 1))
            .await;
        feed.push(order_id, OrderEvent::order_completed(Some("TRACK-123".into())))
            .await;

        let history = feed.view.get_order(order_id).await.unwrap();
        assert_eq!(history.state, OrderState::Completed);
        assert_eq!(history.customer_id, customer_id);
        assert_eq!(history.item_count, 1);
        assert_eq!(history.total_amount.cents(), 2000);
        assert_eq!(history.tracking_number.as_deref(), Some("TRACK-123"));
        assert!(history.submitted_at.is_some());
        assert!(history.completed_at.is_some());
        assert!(history.cancelled_at.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_order_appears_in_history() {
        let mut feed = Feed::new();
        let order_id = AggregateId::new();

        feed.order_with_items(order_id, CustomerId::new()).await;
        feed.push(
            order_id,
            OrderEvent::order_cancelled("Out of stock", Some("system".to_string())),
        )
        .await;

        let history = feed.view.get_order(order_id).await.unwrap();
        assert_eq!(history.state, OrderState::Cancelled);
        assert_eq!(history.cancellation_reason.as_deref(), Some("Out of stock"));
        assert_eq!(history.cancelled_by.as_deref(), Some("system"));
        assert!(history.cancelled_at.is_some());
        assert!(history.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_active_order_not_in_history() {
        let mut feed = Feed::new();
        let order_id = AggregateId::new();

        feed.order_with_items(order_id, CustomerId::new()).await;

        assert!(feed.view.get_order(order_id).await.is_none());
        assert_eq!(feed.view.count().await, 0);
    }

    #[tokio::test]
    async fn test_filters() {
        let mut feed = Feed::new();
        let customer1 = CustomerId::new();
        let customer2 = CustomerId::new();
        let order1 = AggregateId::new();
        let order2 = AggregateId::new();

        feed.order_with_items(order1, customer1).await;
        feed.order_with_items(order2, customer2).await;
        feed.push(order1, OrderEvent::order_completed(None)).await;
        feed.push(order2, OrderEvent::order_cancelled("Cancelled", None))
            .await;

        assert_eq!(feed.view.get_completed_orders().await.len(), 1);
        assert_eq!(feed.view.get_cancelled_orders().await.len(), 1);
        assert_eq!(feed.view.get_all_history().await.len(), 2);

        let c1_history = feed.view.get_history_by_customer(customer1).await;
        assert_eq!(c1_history.len(), 1);
        assert_eq!(c1_history[0].order_id, order1);
    }

    #[tokio::test]
    async fn test_item_quantity_update_reflected_in_history() {
        let mut feed = Feed::new();
        let order_id = AggregateId::new();

        feed.order_with_items(order_id, CustomerId::new()).await;
        feed.push(
            order_id,
            OrderEvent::item_quantity_updated(ProductId::new("SKU-001"), 2, 5),
        )
        .await;
        feed.push(order_id, OrderEvent::order_completed(None)).await;

        let history = feed.view.get_order(order_id).await.unwrap();
        assert_eq!(history.total_amount.cents(), 5000);
    }

    #[tokio::test]
    async fn test_reset() {
        let mut feed = Feed::new();
        let order_id = AggregateId::new();

        feed.order_with_items(order_id, CustomerId::new()).await;
        feed.push(order_id, OrderEvent::order_completed(None)).await;
        assert_eq!(feed.view.count().await, 1);

        feed.view.reset().await.unwrap();

        assert_eq!(feed.view.count().await, 0);
        assert_eq!(feed.view.position().await.events_processed, 0);
    }
}
