//! Read model trait for query-side views.

use async_trait::async_trait;

/// A read model providing query access to denormalized data.
#[async_trait]
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries currently held.
    async fn count(&self) -> usize;
}
