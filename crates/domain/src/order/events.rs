//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::registry::EventRegistry;

use super::{CustomerId, Money, OrderItem, ProductId};

/// Events recorded on an order stream.
///
/// Stored as `{"type": <variant>, "data": {...}}`; the `type` tag equals
/// [`DomainEvent::event_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderCreated(OrderCreatedData),
    ItemAdded(ItemAddedData),
    ItemRemoved(ItemRemovedData),
    ItemQuantityUpdated(ItemQuantityUpdatedData),
    OrderSubmitted(OrderSubmittedData),
    OrderReserved(OrderReservedData),
    OrderProcessing(OrderProcessingData),
    OrderCompleted(OrderCompletedData),
    OrderCancelled(OrderCancelledData),
}

impl OrderEvent {
    pub const EVENT_TYPES: [&'static str; 9] = [
        "OrderCreated",
        "ItemAdded",
        "ItemRemoved",
        "ItemQuantityUpdated",
        "OrderSubmitted",
        "OrderReserved",
        "OrderProcessing",
        "OrderCompleted",
        "OrderCancelled",
    ];

    /// Registry accepting every order event type.
    pub fn registry() -> EventRegistry<OrderEvent> {
        Self::EVENT_TYPES
            .into_iter()
            .fold(EventRegistry::new(), |registry, name| {
                registry.register_serde(name)
            })
    }

    /// When the fact happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(d) => d.created_at,
            OrderEvent::ItemAdded(d) => d.at,
            OrderEvent::ItemRemoved(d) => d.at,
            OrderEvent::ItemQuantityUpdated(d) => d.at,
            OrderEvent::OrderSubmitted(d) => d.submitted_at,
            OrderEvent::OrderReserved(d) => d.reserved_at,
            OrderEvent::OrderProcessing(d) => d.started_at,
            OrderEvent::OrderCompleted(d) => d.completed_at,
            OrderEvent::OrderCancelled(d) => d.cancelled_at,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::ItemAdded(_) => "ItemAdded",
            OrderEvent::ItemRemoved(_) => "ItemRemoved",
            OrderEvent::ItemQuantityUpdated(_) => "ItemQuantityUpdated",
            OrderEvent::OrderSubmitted(_) => "OrderSubmitted",
            OrderEvent::OrderReserved(_) => "OrderReserved",
            OrderEvent::OrderProcessing(_) => "OrderProcessing",
            OrderEvent::OrderCompleted(_) => "OrderCompleted",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAddedData {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Unit price at the time of adding.
    pub unit_price: Money,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRemovedData {
    pub product_id: ProductId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemQuantityUpdatedData {
    pub product_id: ProductId,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmittedData {
    pub submitted_at: DateTime<Utc>,
    pub total_amount: Money,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReservedData {
    pub reserved_at: DateTime<Utc>,
    /// Reference handed out by the inventory service.
    pub reservation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderProcessingData {
    pub started_at: DateTime<Utc>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompletedData {
    pub completed_at: DateTime<Utc>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
    pub cancelled_by: Option<String>,
}

// Constructors stamped with the current time.
impl OrderEvent {
    pub fn order_created(order_id: AggregateId, customer_id: CustomerId) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            customer_id,
            created_at: Utc::now(),
        })
    }

    pub fn item_added(item: &OrderItem) -> Self {
        OrderEvent::ItemAdded(ItemAddedData {
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            at: Utc::now(),
        })
    }

    pub fn item_removed(product_id: ProductId) -> Self {
        OrderEvent::ItemRemoved(ItemRemovedData {
            product_id,
            at: Utc::now(),
        })
    }

    pub fn item_quantity_updated(
        product_id: ProductId,
        old_quantity: u32,
        new_quantity: u32,
    ) -> Self {
        OrderEvent::ItemQuantityUpdated(ItemQuantityUpdatedData {
            product_id,
            old_quantity,
            new_quantity,
            at: Utc::now(),
        })
    }

    pub fn order_submitted(total_amount: Money, item_count: usize) -> Self {
        OrderEvent::OrderSubmitted(OrderSubmittedData {
            submitted_at: Utc::now(),
            total_amount,
            item_count,
        })
    }

    pub fn order_reserved(reservation_id: Option<String>) -> Self {
        OrderEvent::OrderReserved(OrderReservedData {
            reserved_at: Utc::now(),
            reservation_id,
        })
    }

    pub fn order_processing(payment_id: Option<String>) -> Self {
        OrderEvent::OrderProcessing(OrderProcessingData {
            started_at: Utc::now(),
            payment_id,
        })
    }

    pub fn order_completed(tracking_number: Option<String>) -> Self {
        OrderEvent::OrderCompleted(OrderCompletedData {
            completed_at: Utc::now(),
            tracking_number,
        })
    }

    pub fn order_cancelled(reason: impl Into<String>, cancelled_by: Option<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            cancelled_at: Utc::now(),
            reason: reason.into(),
            cancelled_by,
        })
    }
}
