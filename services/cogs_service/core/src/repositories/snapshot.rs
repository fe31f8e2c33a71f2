//! Repository trait for pre-run inventory snapshots

use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::cogs::InventorySnapshot;
use crate::Result;

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Write the immutable pre-run capture for `run_id`
    async fn write_snapshot(
        &self,
        tenant_id: Uuid,
        snapshots: &[InventorySnapshot],
    ) -> Result<()>;

    /// Read the pre-run capture of `run_id`
    async fn read_snapshot(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<InventorySnapshot>>;

    /// Read the rows currently flagged `is_current` for the tenant
    async fn current_snapshot(&self, tenant_id: Uuid) -> Result<Vec<InventorySnapshot>>;
}
