//! Per-tenant run lock trait
//!
//! Serializes all inventory writes for one tenant: at most one run or
//! rollback may hold the lock at any instant. Acquisition never blocks; a
//! held lock is reported so callers can surface `ConcurrentRunInProgress`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;

/// Service trait for per-tenant mutual exclusion
#[async_trait]
pub trait TenantLockService: Send + Sync {
    /// Try to acquire the tenant's run lock
    ///
    /// # Business Rules
    /// - Lock TTL prevents permanent locks in case of service crashes
    /// - Returns a lock token for release verification
    ///
    /// # Returns
    /// Lock token if acquired, None if already held
    async fn acquire(&self, tenant_id: Uuid, ttl_seconds: u32) -> Result<Option<String>>;

    /// Release a previously acquired lock
    ///
    /// Only releases when the token matches, so a crashed holder's expired
    /// lock cannot be released by a stale caller.
    ///
    /// # Returns
    /// true if released, false if the token didn't match or the lock expired
    async fn release(&self, tenant_id: Uuid, lock_token: &str) -> Result<bool>;

    /// Check whether the tenant's run lock is currently held
    async fn is_locked(&self, tenant_id: Uuid) -> Result<bool>;

    /// Force release without token verification (admin operation)
    ///
    /// Bypasses token verification; log every use for audit.
    async fn force_release(&self, tenant_id: Uuid) -> Result<bool>;
}
