//! Repository trait for COGS attributions

use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::cogs::AttributionWithDetails;
use crate::Result;

#[async_trait]
pub trait AttributionRepository: Send + Sync {
    async fn write_all(
        &self,
        tenant_id: Uuid,
        attributions: &[AttributionWithDetails],
    ) -> Result<()>;

    /// Page through a run's attributions in sale order
    async fn find_by_run(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AttributionWithDetails>>;

    async fn count_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<u64>;

    /// Flag a run's attributions `is_valid = false` (rollback)
    async fn invalidate_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<()>;
}
