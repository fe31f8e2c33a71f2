//! Repository trait for run records and the atomic commit composites
//!
//! Run status changes are compare-and-set: the transition applies only when
//! the stored status matches `from`, so no partial-commit state is ever
//! observable as `completed`. The two commit composites bundle every write of
//! a run's terminal phase into one unit of atomicity; implementations without
//! multi-statement transactions must sequence compensating writes so the run
//! record transitions last.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domains::cogs::{
    AttributionWithDetails, CogsRun, CogsSummary, InventoryMovement, RunCounters, RunStatus,
    ValidationIssue,
};
use crate::Result;

/// Listing filter for run records
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Everything a successful run persists in one atomic block
#[derive(Debug, Clone)]
pub struct CompletedRunCommit {
    pub run_id: Uuid,
    pub movements: Vec<InventoryMovement>,
    pub attributions: Vec<AttributionWithDetails>,
    pub summaries: Vec<CogsSummary>,
    pub issues: Vec<ValidationIssue>,
    /// `(lot_id, new_remaining_quantity)` bulk set
    pub lot_updates: Vec<(Uuid, i64)>,
    pub counters: RunCounters,
    pub completed_at: DateTime<Utc>,
}

/// Everything a rollback persists in one atomic block
#[derive(Debug, Clone)]
pub struct RollbackCommit {
    pub run_id: Uuid,
    /// Inverse journal entries, `kind = rollback`
    pub movements: Vec<InventoryMovement>,
    /// `(lot_id, restored_remaining_quantity)` bulk set
    pub lot_restores: Vec<(Uuid, i64)>,
    pub rolled_back_at: DateTime<Utc>,
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a new run record; rejects duplicate run ids
    async fn create(&self, run: &CogsRun) -> Result<CogsRun>;

    /// Compare-and-set status transition
    ///
    /// Returns the updated run, or `IllegalState` when the stored status no
    /// longer matches `from`.
    async fn transition(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
        error_message: Option<String>,
    ) -> Result<CogsRun>;

    /// Fetch a run; `NotFound` when the id is unknown to this tenant
    async fn get(&self, tenant_id: Uuid, run_id: Uuid) -> Result<CogsRun>;

    async fn list(&self, tenant_id: Uuid, filter: &RunFilter) -> Result<Vec<CogsRun>>;

    /// Atomically persist a run's results and transition `running -> completed`
    ///
    /// Also moves the snapshot `is_current` pointers of the touched lots to
    /// this run's rows.
    async fn commit_completed_run(
        &self,
        tenant_id: Uuid,
        commit: CompletedRunCommit,
    ) -> Result<CogsRun>;

    /// Atomically reverse a run and transition `completed -> rolled_back`
    ///
    /// Appends the rollback journal entries, restores lot quantities, flags
    /// the run's attributions and summaries invalid.
    async fn commit_rollback(&self, tenant_id: Uuid, commit: RollbackCommit) -> Result<CogsRun>;
}
