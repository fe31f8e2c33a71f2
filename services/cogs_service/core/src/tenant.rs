//! Tenant isolation guard
//!
//! Every engine operation is bound to one tenant at construction time. The
//! guard checks entities both on the way in and on the way out of the
//! persistence layer; any mismatch fails closed before I/O.

use uuid::Uuid;

use shared_error::AppError;
use shared_types::TenantContext;

use crate::domains::cogs::{
    CogsAttribution, CogsAttributionDetail, CogsRun, CogsSummary, InventoryMovement,
    InventorySnapshot, PurchaseLot, Sale, ValidationIssue,
};
use crate::Result;

/// Entities that carry a tenant id
pub trait TenantScoped {
    fn owner_tenant_id(&self) -> Uuid;
}

macro_rules! impl_tenant_scoped {
    ($($entity:ty),+ $(,)?) => {
        $(
            impl TenantScoped for $entity {
                fn owner_tenant_id(&self) -> Uuid {
                    self.tenant_id
                }
            }
        )+
    };
}

impl_tenant_scoped!(
    PurchaseLot,
    Sale,
    InventoryMovement,
    InventorySnapshot,
    CogsAttribution,
    CogsAttributionDetail,
    CogsSummary,
    CogsRun,
    ValidationIssue,
);

/// Tenant-bound validation handle
#[derive(Debug, Clone, Copy)]
pub struct TenantGuard {
    tenant_id: Uuid,
}

impl TenantGuard {
    pub fn new(ctx: &TenantContext) -> Self {
        Self {
            tenant_id: ctx.tenant_id(),
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Reject a raw tenant id that does not match this scope
    pub fn check_id(&self, tenant_id: Uuid) -> Result<()> {
        if tenant_id != self.tenant_id {
            return Err(AppError::TenantMismatch(format!(
                "expected tenant {}, got {}",
                self.tenant_id, tenant_id
            )));
        }
        Ok(())
    }

    /// Reject an entity owned by another tenant
    pub fn check<E: TenantScoped>(&self, entity: &E) -> Result<()> {
        self.check_id(entity.owner_tenant_id())
    }

    /// Reject a batch if any element is owned by another tenant
    pub fn check_all<'a, E, I>(&self, entities: I) -> Result<()>
    where
        E: TenantScoped + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        for entity in entities {
            self.check(entity)?;
        }
        Ok(())
    }
}
