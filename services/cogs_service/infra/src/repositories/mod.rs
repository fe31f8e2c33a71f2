//! PostgreSQL repository implementations
//!
//! Every query filters by `tenant_id` so cross-tenant rows are unreachable at
//! the storage boundary, independent of the core guard.

pub mod attribution;
pub mod lot;
pub mod movement;
pub mod run;
pub mod snapshot;
pub mod summary;
pub mod validation;

// Re-export repository implementations for convenience
pub use attribution::PgAttributionRepository;
pub use lot::PgLotRepository;
pub use movement::PgMovementRepository;
pub use run::PgRunRepository;
pub use snapshot::PgSnapshotRepository;
pub use summary::PgSummaryRepository;
pub use validation::PgValidationIssueRepository;

use std::sync::Arc;

use sqlx::PgPool;

use cogs_service_core::repositories::{
    AttributionRepository, LotRepository, MovementRepository, RunRepository, SnapshotRepository,
    SummaryRepository, ValidationIssueRepository,
};
use cogs_service_core::Result;

/// The full persistent store, one handle per database pool
///
/// Bundles the PostgreSQL repositories the coordinator, rollback engine, and
/// reporting surface need, so wiring stays in one place.
#[derive(Clone)]
pub struct PgCogsStore {
    pub lots: Arc<dyn LotRepository>,
    pub movements: Arc<dyn MovementRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub attributions: Arc<dyn AttributionRepository>,
    pub summaries: Arc<dyn SummaryRepository>,
    pub issues: Arc<dyn ValidationIssueRepository>,
    pub runs: Arc<dyn RunRepository>,
}

impl PgCogsStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            lots: Arc::new(PgLotRepository::new(pool.clone())),
            movements: Arc::new(PgMovementRepository::new(pool.clone())),
            snapshots: Arc::new(PgSnapshotRepository::new(pool.clone())),
            attributions: Arc::new(PgAttributionRepository::new(pool.clone())),
            summaries: Arc::new(PgSummaryRepository::new(pool.clone())),
            issues: Arc::new(PgValidationIssueRepository::new(pool.clone())),
            runs: Arc::new(PgRunRepository::new(pool)),
        }
    }

    /// Connect a pool from configuration and build the store
    pub async fn connect(config: &shared_config::Config) -> Result<Self> {
        let pool =
            shared_db::init_pool(&config.database_url, config.database_max_connections).await?;
        shared_db::ping(&pool).await?;
        Ok(Self::new(Arc::new(pool)))
    }
}
