//! Run coordinator service trait

use async_trait::async_trait;

use shared_types::TenantContext;

use crate::dto::run::{ExecuteRunRequest, RunResponse};
use crate::Result;

/// Drives a single run from request to terminal status
///
/// A run ends `completed` if and only if all of its side effects are durably
/// visible, and `failed` otherwise.
#[async_trait]
pub trait RunCoordinatorService: Send + Sync {
    /// Execute one journaled allocation run for the tenant
    ///
    /// # Errors
    /// - `ValidationError` on structural input violations (no state change)
    /// - `ConcurrentRunInProgress` when the tenant lock is held
    /// - `IllegalState` when a reused run id is in a terminal failure state
    async fn execute_run(
        &self,
        tenant: TenantContext,
        request: ExecuteRunRequest,
    ) -> Result<RunResponse>;
}
