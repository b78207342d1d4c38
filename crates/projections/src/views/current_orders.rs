//! Current orders read model: active (non-terminal) orders.

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

/// Summary of an active order item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemSummary {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Summary of an active order in the current orders view.
#[derive(Debug, Clone)]
pub struct CurrentOrderSummary {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub state: OrderState,
    pub submitted: bool,
    pub item_count: usize,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: HashMap<ProductId, OrderItemSummary>,
}

impl CurrentOrderSummary {
    fn recalculate_totals(&mut self) {
        self.item_count = self.items.len();
        self.total_amount = self.items.values().fold(Money::ZERO, |acc, item| {
            acc + item.unit_price.times(item.quantity)
        });
    }
}

#[derive(Default)]
struct CurrentOrdersState {
    orders: HashMap<AggregateId, CurrentOrderSummary>,
    position: ProjectionPosition,
}

/// Read model view for active (non-terminal) orders.
///
/// Orders are removed from this view when they reach a terminal state
/// (Completed or Cancelled).
#[derive(Clone, Default)]
pub struct CurrentOrdersView {
    state: Arc<RwLock<CurrentOrdersState>>,
}

impl CurrentOrdersView {
    pub const NAME: &'static str = "CurrentOrdersView";

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Option<CurrentOrderSummary> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    pub async fn get_all_orders(&self) -> Vec<CurrentOrderSummary> {
        self.state.read().await.orders.values().cloned().collect()
    }

    pub async fn get_orders_by_state(&self, state: OrderState) -> Vec<CurrentOrderSummary> {
        self.state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.state == state)
            .cloned()
            .collect()
    }

    pub async fn get_orders_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Vec<CurrentOrderSummary> {
        self.state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Projection<OrderEvent> for CurrentOrdersView {
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
        let at = event.event.occurred_at();

        match &event.event {
            OrderEvent::OrderCreated(data) => {
                state.orders.insert(
                    order_id,
                    CurrentOrderSummary {
                        order_id,
                        customer_id: data.customer_id,
                        state: OrderState::Draft,
                        submitted: false,
                        item_count: 0,
                        total_amount: Money::ZERO,
                        created_at: data.created_at,
                        updated_at: data.created_at,
                        items: HashMap::new(),
                    },
                );
            }
            OrderEvent::OrderCompleted(_) | OrderEvent::OrderCancelled(_) => {
                state.orders.remove(&order_id);
            }
            other => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    match other {
                        OrderEvent::ItemAdded(data) => {
                            order.items.insert(
                                data.product_id.clone(),
                                OrderItemSummary {
                                    product_id: data.product_id.clone(),
                                    product_name: data.product_name.clone(),
                                    quantity: data.quantity,
                                    unit_price: data.unit_price,
                                },
                            );
                        }
                        OrderEvent::ItemRemoved(data) => {
                            order.items.remove(&data.product_id);
                        }
                        OrderEvent::ItemQuantityUpdated(data) => {
                            if let Some(item) = order.items.get_mut(&data.product_id) {
                                item.quantity = data.new_quantity;
                            }
                        }
                        OrderEvent::OrderSubmitted(_) => order.submitted = true,
                        OrderEvent::OrderReserved(_) => order.state = OrderState::Reserved,
                        OrderEvent::OrderProcessing(_) => order.state = OrderState::Processing,
                        _ => {}
                    }
                    order.recalculate_totals();
                    order.updated_at = at;
                }
            }
        }

        state.position = state.position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = CurrentOrdersState::default();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for CurrentOrdersView {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}
