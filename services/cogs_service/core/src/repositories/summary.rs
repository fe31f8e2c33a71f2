//! Repository trait for monthly COGS summaries

use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::cogs::CogsSummary;
use crate::Result;

#[async_trait]
pub trait SummaryRepository: Send + Sync {
    async fn write_all(&self, tenant_id: Uuid, summaries: &[CogsSummary]) -> Result<()>;

    async fn find_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<CogsSummary>>;

    /// Flag a run's summaries `is_valid = false` (rollback)
    async fn invalidate_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<()>;
}
