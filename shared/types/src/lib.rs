// Common types used across the COGS engine crates
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

/// Tenant scope attached to every core operation.
///
/// A nil tenant id is never a valid scope; construction via [`TenantContext::new`]
/// rejects it so downstream code can rely on a validated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TenantContext {
    tenant_id: Uuid,
}

impl TenantContext {
    /// Build a validated tenant scope; `None` for the nil UUID.
    pub fn new(tenant_id: Uuid) -> Option<Self> {
        if tenant_id.is_nil() {
            return None;
        }
        Some(Self { tenant_id })
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }
}

impl std::fmt::Display for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nil_tenant_id() {
        assert!(TenantContext::new(Uuid::nil()).is_none());
    }

    #[test]
    fn accepts_real_tenant_id() {
        let id = Uuid::new_v4();
        let ctx = TenantContext::new(id).unwrap();
        assert_eq!(ctx.tenant_id(), id);
    }
}
