//! Identifier types shared by every layer of the event-sourcing engine.

mod types;

pub use types::{AggregateId, StreamId};
