//! In-memory `StateStore`.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::governance::state::SystemStateSnapshot;
use crate::store::traits::StateStore;

/// Keeps the latest snapshot in memory and counts writes.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    latest: RwLock<Option<SystemStateSnapshot>>,
    writes: RwLock<u64>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `persist` calls.
    pub async fn write_count(&self) -> u64 {
        *self.writes.read().await
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn persist(&self, snapshot: SystemStateSnapshot) -> Result<(), DatabaseError> {
        *self.latest.write().await = Some(snapshot);
        *self.writes.write().await += 1;
        Ok(())
    }

    async fn load_latest(&self) -> Result<Option<SystemStateSnapshot>, DatabaseError> {
        Ok(self.latest.read().await.clone())
    }
}
