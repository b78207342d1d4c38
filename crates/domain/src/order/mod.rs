//! Order aggregate and related types.

mod aggregate;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use events::{
    ItemAddedData, ItemQuantityUpdatedData, ItemRemovedData, OrderCancelledData,
    OrderCompletedData, OrderCreatedData, OrderEvent, OrderProcessingData, OrderReservedData,
    OrderSubmittedData,
};
pub use service::OrderService;
pub use state::{OrderAction, OrderState};
pub use value_objects::{CustomerId, Money, OrderItem, ProductId};

use thiserror::Error;

/// Business-rule rejections raised by the order aggregate.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    #[error("Item not found: {product_id}")]
    ItemNotFound { product_id: String },

    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("Invalid price: {price}")]
    InvalidPrice { price: i64 },

    #[error("Order has no items")]
    NoItems,

    #[error("Order was already submitted")]
    AlreadySubmitted,

    #[error("Order must be submitted first")]
    NotSubmitted,
}
