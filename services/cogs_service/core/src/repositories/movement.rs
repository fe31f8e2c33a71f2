//! Repository trait for the append-only inventory journal

use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::cogs::InventoryMovement;
use crate::Result;

#[async_trait]
pub trait MovementRepository: Send + Sync {
    /// Append journal entries; entries are never mutated or deleted
    async fn append(&self, tenant_id: Uuid, movements: &[InventoryMovement]) -> Result<()>;

    /// Read a run's journal in original emission order
    async fn find_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<InventoryMovement>>;
}
