//! COGS domain entities
//!
//! Value types for lots, sales, movements, snapshots, attributions, summaries,
//! runs, and validation issues, plus the pure FIFO allocator that operates on
//! them. All entities carry a `tenant_id`; all queries must filter by it.

pub mod allocator;
pub mod attribution;
pub mod lot;
pub mod movement;
pub mod run;
pub mod sale;
pub mod snapshot;
pub mod summary;
pub mod validation;

pub use allocator::{allocate, AllocationContext, AllocationOutcome, CostingConfig, LotMergePolicy};
pub use attribution::{AttributionWithDetails, CogsAttribution, CogsAttributionDetail};
pub use lot::PurchaseLot;
pub use movement::{InventoryMovement, MovementKind};
pub use run::{CogsRun, CostingMethod, RunCounters, RunStatus};
pub use sale::Sale;
pub use snapshot::InventorySnapshot;
pub use summary::{period_of, CogsSummary};
pub use validation::{ValidationIssue, ValidationKind};
