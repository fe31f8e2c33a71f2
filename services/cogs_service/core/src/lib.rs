//! COGS Service Core
//!
//! This crate contains the business logic, domain models, and trait definitions
//! for the journaled FIFO COGS engine. It has zero infrastructure dependencies.
//!
//! ## Architecture
//!
//! - `domains/`: Domain entities and the pure FIFO allocator
//! - `dto/`: Data Transfer Objects for caller communication
//! - `repositories/`: Repository trait definitions (no implementations)
//! - `services/`: Service trait definitions (no implementations)
//! - `tenant/`: Tenant isolation guard

pub mod domains;
pub mod dto;
pub mod repositories;
pub mod services;
pub mod tenant;

// Re-export commonly used types
pub use domains::cogs::{
    AllocationOutcome, AttributionWithDetails, CogsAttribution, CogsAttributionDetail, CogsRun,
    CogsSummary, CostingConfig, CostingMethod, InventoryMovement, InventorySnapshot,
    LotMergePolicy, MovementKind, PurchaseLot, RunStatus, Sale, ValidationIssue, ValidationKind,
};
pub use tenant::TenantGuard;

// Re-export shared error types
pub use shared_error::AppError;
pub use shared_types::TenantContext;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
