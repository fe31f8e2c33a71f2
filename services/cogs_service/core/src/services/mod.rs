//! Service trait definitions for the COGS engine
//!
//! This module contains trait definitions for business logic operations.
//! No implementations here - pure interfaces.

pub mod reporting;
pub mod rollback;
pub mod run_coordinator;
pub mod tenant_lock;

// Re-export main types for convenience
pub use reporting::ReportingService;
pub use rollback::RollbackService;
pub use run_coordinator::RunCoordinatorService;
pub use tenant_lock::TenantLockService;
