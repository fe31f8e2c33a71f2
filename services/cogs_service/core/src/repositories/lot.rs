//! Repository trait for purchase lots

use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::cogs::PurchaseLot;
use crate::Result;

#[async_trait]
pub trait LotRepository: Send + Sync {
    /// Load lots with their current remaining quantities
    ///
    /// `skus = None` loads the tenant's entire inventory; `Some` filters to
    /// the SKUs referenced by pending sales.
    async fn load_current_inventory(
        &self,
        tenant_id: Uuid,
        skus: Option<&[String]>,
    ) -> Result<Vec<PurchaseLot>>;

    /// Insert new lots and update existing ones by `(tenant_id, lot_id)`
    async fn upsert_lots(&self, tenant_id: Uuid, lots: &[PurchaseLot]) -> Result<()>;

    /// Fetch specific lots; silently omits ids unknown to the tenant
    async fn find_by_ids(&self, tenant_id: Uuid, lot_ids: &[Uuid]) -> Result<Vec<PurchaseLot>>;
}
