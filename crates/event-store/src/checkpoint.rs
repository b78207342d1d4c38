//! Durable "how far has this subscription read the global log" markers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;

/// Storage for subscription checkpoints.
///
/// A checkpoint is the global-log position of the last event a subscription
/// finished processing. Position 0 means the subscription never checkpointed
/// and should start from the beginning of the log.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the stored position, or 0 for an unknown subscription.
    async fn load(&self, subscription_id: &str) -> Result<u64>;

    /// Overwrites the stored position.
    ///
    /// There is no optimistic check: a single driver owns each subscription.
    async fn store(&self, subscription_id: &str, position: u64) -> Result<()>;
}

/// In-memory checkpoint store for tests and single-process runs.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    positions: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, subscription_id: &str) -> Result<u64> {
        Ok(self
            .positions
            .read()
            .await
            .get(subscription_id)
            .copied()
            .unwrap_or(0))
    }

    async fn store(&self, subscription_id: &str, position: u64) -> Result<()> {
        self.positions
            .write()
            .await
            .insert(subscription_id.to_string(), position);
        Ok(())
    }
}
