//! `StateStore` trait, the persistence collaborator for governance state.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::governance::state::SystemStateSnapshot;

/// Durable, keyed store holding at most one snapshot per governance context.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist a snapshot, replacing the context's previous one.
    async fn persist(&self, snapshot: SystemStateSnapshot) -> Result<(), DatabaseError>;

    /// The most recently persisted snapshot, if any.
    async fn load_latest(&self) -> Result<Option<SystemStateSnapshot>, DatabaseError>;
}
