//! Domain layer for the event-sourcing system.
//!
//! This crate provides:
//! - the [`Aggregate`] capability trait and the [`AggregateRoot`] state it manages
//! - [`EventRegistry`], the explicit wire-name to event mapping
//! - [`AggregateStore`], which loads aggregates by replay and stores them
//!   under optimistic concurrency, snapshotting per [`SnapshotPolicy`]
//! - the Order aggregate, used as the reference aggregate

pub mod aggregate;
pub mod config;
pub mod entity;
pub mod error;
pub mod order;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod stream_event;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent};
pub use config::{ConfigError, StoreConfig};
pub use entity::Entity;
pub use error::DomainError;
pub use order::{
    CustomerId, Money, Order, OrderAction, OrderError, OrderEvent, OrderItem, OrderService,
    OrderState, ProductId,
};
pub use registry::EventRegistry;
pub use snapshot::SnapshotPolicy;
pub use store::{AggregateStore, EventMetadata};
pub use stream_event::StreamEvent;
