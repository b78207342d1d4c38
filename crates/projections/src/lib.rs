//! Read models and projections for the query side.
//!
//! This crate provides:
//! - [`Projection`] trait for processing committed events into read models
//! - [`ProjectionPublisher`] for fanning an event out to registered projections
//! - [`CatchUpSubscription`] for driving a publisher from the global log,
//!   resuming from a stored checkpoint
//! - Two order views: current orders and order history

pub mod error;
pub mod projection;
pub mod publisher;
pub mod read_model;
pub mod subscription;
pub mod views;

pub use error::{ProjectionError, Result};
pub use projection::{Projection, ProjectionPosition};
pub use publisher::ProjectionPublisher;
pub use read_model::ReadModel;
pub use subscription::{CatchUpSubscription, DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL};
pub use views::{CurrentOrdersView, OrderHistoryView};
