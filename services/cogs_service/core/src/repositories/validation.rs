//! Repository trait for persisted validation issues

use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::cogs::ValidationIssue;
use crate::Result;

#[async_trait]
pub trait ValidationIssueRepository: Send + Sync {
    async fn write_all(&self, tenant_id: Uuid, issues: &[ValidationIssue]) -> Result<()>;

    async fn find_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<ValidationIssue>>;
}
