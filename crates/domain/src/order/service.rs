//! Order service providing a simplified API for order operations.

use std::sync::Arc;

use common::AggregateId;
use event_store::{CAUSATION_ID, CORRELATION_ID, EventStore, ExpectedVersion, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::snapshot::SnapshotPolicy;
use crate::store::{AggregateStore, EventMetadata};

use super::{CustomerId, Order, OrderEvent, OrderItem, ProductId};

/// Command-handler-shaped entry points for orders.
///
/// Every operation is load → business method → store, with the expected
/// version taken from the load. A [`DomainError::Conflict`] is returned as-is;
/// callers reload and retry if they want to.
pub struct OrderService<S: EventStore> {
    orders: AggregateStore<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S, policy: SnapshotPolicy) -> Self {
        Self {
            orders: AggregateStore::new(store, Arc::new(OrderEvent::registry()), policy),
        }
    }

    pub fn from_store(orders: AggregateStore<S, Order>) -> Self {
        Self { orders }
    }

    /// Returns a reference to the underlying aggregate store.
    pub fn orders(&self) -> &AggregateStore<S, Order> {
        &self.orders
    }

    /// Opens a new order stream. Fails with `Conflict` if `order_id` is taken.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
    ) -> Result<Order, DomainError> {
        let mut order = Order::create(order_id, customer_id)?;
        self.orders
            .store(&mut order, Some(ExpectedVersion::NoStream))
            .await?;
        Ok(order)
    }

    /// Creates an order and adds `items` in a single append.
    pub async fn create_order_with_items(
        &self,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
    ) -> Result<Order, DomainError> {
        let mut order = Order::create(AggregateId::new(), customer_id)?;
        for item in items {
            order.add_item(item)?;
        }
        self.orders
            .store(&mut order, Some(ExpectedVersion::NoStream))
            .await?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        order_id: AggregateId,
        item: OrderItem,
    ) -> Result<Order, DomainError> {
        self.execute(order_id, |order| order.add_item(item)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        order_id: AggregateId,
        product_id: ProductId,
    ) -> Result<Order, DomainError> {
        self.execute(order_id, |order| order.remove_item(product_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        order_id: AggregateId,
        product_id: ProductId,
        new_quantity: u32,
    ) -> Result<Order, DomainError> {
        self.execute(order_id, |order| {
            order.update_item_quantity(product_id, new_quantity)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn submit_order(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.execute(order_id, |order| order.submit()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_reserved(
        &self,
        order_id: AggregateId,
        reservation_id: Option<String>,
    ) -> Result<Order, DomainError> {
        self.execute(order_id, |order| order.mark_reserved(reservation_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn start_processing(
        &self,
        order_id: AggregateId,
        payment_id: Option<String>,
    ) -> Result<Order, DomainError> {
        self.execute(order_id, |order| order.start_processing(payment_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_order(
        &self,
        order_id: AggregateId,
        tracking_number: Option<String>,
    ) -> Result<Order, DomainError> {
        self.execute(order_id, |order| order.complete(tracking_number))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: AggregateId,
        reason: String,
        cancelled_by: Option<String>,
    ) -> Result<Order, DomainError> {
        self.execute(order_id, |order| order.cancel(reason, cancelled_by))
            .await
    }

    /// Loads an order by ID, returning `None` if it doesn't exist.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        match self.orders.load(order_id).await {
            Ok(order) => Ok(Some(order)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like the single-step methods, but tags every stored record with a
    /// correlation id (and optional causation id).
    pub async fn execute_correlated<F>(
        &self,
        order_id: AggregateId,
        correlation_id: &str,
        causation_id: Option<&str>,
        command: F,
    ) -> Result<(Order, Version), DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), DomainError>,
    {
        let mut metadata = EventMetadata::new();
        metadata.insert(CORRELATION_ID.to_string(), correlation_id.into());
        if let Some(causation_id) = causation_id {
            metadata.insert(CAUSATION_ID.to_string(), causation_id.into());
        }

        let mut order = self.orders.load(order_id).await?;
        command(&mut order)?;
        let version = self
            .orders
            .store_with_metadata(&mut order, None, metadata)
            .await?;
        Ok((order, version))
    }

    async fn execute<F>(&self, order_id: AggregateId, command: F) -> Result<Order, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), DomainError>,
    {
        let mut order = self.orders.load(order_id).await?;
        command(&mut order)?;
        self.orders.store(&mut order, None).await?;

        tracing::debug!(
            %order_id,
            version = %order.version(),
            state = %order.state(),
            "order updated"
        );
        Ok(order)
    }
}
