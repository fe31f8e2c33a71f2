//! Rollback service trait

use async_trait::async_trait;
use uuid::Uuid;

use shared_types::TenantContext;

use crate::dto::run::RunResponse;
use crate::Result;

/// Losslessly reverses a completed run
#[async_trait]
pub trait RollbackService: Send + Sync {
    /// Reverse `run_id`'s inventory effects and invalidate its artifacts
    ///
    /// Idempotent: rolling back an already rolled-back run is a no-op
    /// success.
    ///
    /// # Errors
    /// - `NotFound` when the run is unknown to this tenant
    /// - `IllegalState` when the run is not `completed`
    /// - `ConcurrentRunInProgress` when the tenant lock is held
    async fn rollback_run(&self, tenant: TenantContext, run_id: Uuid) -> Result<RunResponse>;
}
