//! When the aggregate store persists snapshots.

use event_store::Version;

use crate::config::StoreConfig;

/// Snapshot every `frequency` events; 0 disables snapshotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotPolicy {
    frequency: u64,
}

impl SnapshotPolicy {
    pub fn every(frequency: u64) -> Self {
        Self { frequency }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::every(config.snapshot_frequency)
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn is_enabled(&self) -> bool {
        self.frequency > 0
    }

    /// True once `new_version` is at least `frequency` events past the last snapshot.
    pub fn should_snapshot(&self, new_version: Version, last_snapshot: Version) -> bool {
        self.is_enabled() && new_version.distance_from(last_snapshot) >= self.frequency
    }
}
