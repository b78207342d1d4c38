//! Order aggregate implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::error::DomainError;

use super::{
    CustomerId, Money, OrderAction, OrderError, OrderEvent, OrderItem, OrderState, ProductId,
    events::{ItemAddedData, ItemQuantityUpdatedData, OrderCreatedData},
};

/// Order aggregate root.
///
/// Represents an order in the system with its full lifecycle from creation
/// to completion or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    root: AggregateRoot<OrderEvent>,
    customer_id: Option<CustomerId>,
    state: OrderState,
    items: BTreeMap<ProductId, OrderItem>,
    total_amount: Money,
    submitted_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn new(id: AggregateId) -> Self {
        Self {
            root: AggregateRoot::new(id, Self::aggregate_type()),
            customer_id: None,
            state: OrderState::Draft,
            items: BTreeMap::new(),
            total_amount: Money::ZERO,
            submitted_at: None,
        }
    }

    fn root(&self) -> &AggregateRoot<OrderEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<OrderEvent> {
        &mut self.root
    }

    fn when(&mut self, event: &OrderEvent) -> Result<(), DomainError> {
        match event {
            OrderEvent::OrderCreated(data) => return self.when_created(data),
            OrderEvent::ItemAdded(data) => self.when_item_added(data),
            OrderEvent::ItemRemoved(data) => {
                if let Some(item) = self.items.remove(&data.product_id) {
                    self.total_amount -= item.line_total();
                }
            }
            OrderEvent::ItemQuantityUpdated(data) => self.when_quantity_updated(data),
            OrderEvent::OrderSubmitted(data) => self.submitted_at = Some(data.submitted_at),
            OrderEvent::OrderReserved(_) => self.state = OrderState::Reserved,
            OrderEvent::OrderProcessing(_) => self.state = OrderState::Processing,
            OrderEvent::OrderCompleted(_) => self.state = OrderState::Completed,
            OrderEvent::OrderCancelled(_) => self.state = OrderState::Cancelled,
        }

        self.root.entity_mut().touch(event.occurred_at());
        Ok(())
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Items ordered by product id.
    pub fn items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.values()
    }

    pub fn get_item(&self, product_id: &ProductId) -> Option<&OrderItem> {
        self.items.get(product_id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.values().map(|item| item.quantity).sum()
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.root.entity().created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.root.entity().updated_at()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Business methods. Each validates against current state, then applies
// the resulting events as new facts.
impl Order {
    /// Starts a new order stream with `OrderCreated`.
    pub fn create(order_id: AggregateId, customer_id: CustomerId) -> Result<Self, DomainError> {
        let mut order = Self::new(order_id);
        order.apply(OrderEvent::order_created(order_id, customer_id), true)?;
        Ok(order)
    }

    /// Adds an item, or raises the quantity if the product is already present.
    pub fn add_item(&mut self, item: OrderItem) -> Result<(), DomainError> {
        self.ensure_items_editable()?;

        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity: 0 }.into());
        }
        if !item.unit_price.is_positive() {
            return Err(OrderError::InvalidPrice {
                price: item.unit_price.cents(),
            }
            .into());
        }

        let (quantity, unit_price, event) = match self.items.get(&item.product_id) {
            Some(existing) => {
                let quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(OrderError::InvalidQuantity {
                        quantity: item.quantity,
                    })?;
                let event = OrderEvent::item_quantity_updated(
                    item.product_id.clone(),
                    existing.quantity,
                    quantity,
                );
                (quantity, existing.unit_price, event)
            }
            None => (item.quantity, item.unit_price, OrderEvent::item_added(&item)),
        };
        self.ensure_total_fits(&item.product_id, quantity, unit_price)?;
        self.apply(event, true)
    }

    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), DomainError> {
        self.ensure_items_editable()?;
        self.require_item(&product_id)?;
        self.apply(OrderEvent::item_removed(product_id), true)
    }

    /// Sets an item's quantity. Zero removes the item; an unchanged quantity
    /// records nothing.
    pub fn update_item_quantity(
        &mut self,
        product_id: ProductId,
        new_quantity: u32,
    ) -> Result<(), DomainError> {
        self.ensure_items_editable()?;
        let current = self.require_item(&product_id)?.quantity;

        if new_quantity == 0 {
            return self.apply(OrderEvent::item_removed(product_id), true);
        }
        if new_quantity == current {
            return Ok(());
        }
        let unit_price = self.require_item(&product_id)?.unit_price;
        self.ensure_total_fits(&product_id, new_quantity, unit_price)?;

        self.apply(
            OrderEvent::item_quantity_updated(product_id, current, new_quantity),
            true,
        )
    }

    pub fn submit(&mut self) -> Result<(), DomainError> {
        self.state.ensure(OrderAction::Submit)?;
        if self.is_submitted() {
            return Err(OrderError::AlreadySubmitted.into());
        }
        if !self.has_items() {
            return Err(OrderError::NoItems.into());
        }

        let event = OrderEvent::order_submitted(self.total_amount, self.items.len());
        self.apply(event, true)
    }

    pub fn mark_reserved(&mut self, reservation_id: Option<String>) -> Result<(), DomainError> {
        self.state.ensure(OrderAction::Reserve)?;
        if !self.is_submitted() {
            return Err(OrderError::NotSubmitted.into());
        }
        self.apply(OrderEvent::order_reserved(reservation_id), true)
    }

    pub fn start_processing(&mut self, payment_id: Option<String>) -> Result<(), DomainError> {
        self.state.ensure(OrderAction::StartProcessing)?;
        self.apply(OrderEvent::order_processing(payment_id), true)
    }

    pub fn complete(&mut self, tracking_number: Option<String>) -> Result<(), DomainError> {
        self.state.ensure(OrderAction::Complete)?;
        self.apply(OrderEvent::order_completed(tracking_number), true)
    }

    pub fn cancel(
        &mut self,
        reason: impl Into<String>,
        cancelled_by: Option<String>,
    ) -> Result<(), DomainError> {
        self.state.ensure(OrderAction::Cancel)?;
        self.apply(OrderEvent::order_cancelled(reason, cancelled_by), true)
    }

    fn ensure_items_editable(&self) -> Result<(), OrderError> {
        self.state.ensure(OrderAction::ChangeItems)?;
        if self.is_submitted() {
            return Err(OrderError::AlreadySubmitted);
        }
        Ok(())
    }

    /// Fails unless the order total, with `product_id` at `quantity` units,
    /// fits in [`Money`].
    fn ensure_total_fits(
        &self,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), OrderError> {
        let line = unit_price
            .checked_times(quantity)
            .ok_or(OrderError::InvalidQuantity { quantity })?;
        self.items
            .values()
            .filter(|item| &item.product_id != product_id)
            .try_fold(line, |total, item| total.checked_add(item.line_total()))
            .map(|_| ())
            .ok_or(OrderError::InvalidPrice {
                price: unit_price.cents(),
            })
    }

    fn require_item(&self, product_id: &ProductId) -> Result<&OrderItem, OrderError> {
        self.items
            .get(product_id)
            .ok_or_else(|| OrderError::ItemNotFound {
                product_id: product_id.to_string(),
            })
    }
}

// Transitions
impl Order {
    fn when_created(&mut self, data: &OrderCreatedData) -> Result<(), DomainError> {
        if data.order_id != self.id() {
            return Err(DomainError::invalid_event_type(
                "OrderCreated",
                format!("created order {} on stream of {}", data.order_id, self.id()),
            ));
        }
        if self.customer_id.is_some() {
            return Err(DomainError::invalid_event_type(
                "OrderCreated",
                format!("order {} is already created", self.id()),
            ));
        }

        self.customer_id = Some(data.customer_id);
        self.state = OrderState::Draft;
        self.root.entity_mut().mark_created(data.created_at);
        Ok(())
    }

    fn when_item_added(&mut self, data: &ItemAddedData) {
        let item = OrderItem::new(
            data.product_id.clone(),
            data.product_name.clone(),
            data.quantity,
            data.unit_price,
        );
        self.total_amount += item.line_total();
        self.items.insert(data.product_id.clone(), item);
    }

    fn when_quantity_updated(&mut self, data: &ItemQuantityUpdatedData) {
        if let Some(item) = self.items.get_mut(&data.product_id) {
            self.total_amount -= item.line_total();
            item.quantity = data.new_quantity;
            self.total_amount += item.line_total();
        }
    }
}
