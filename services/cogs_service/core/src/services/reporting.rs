//! Read-side service trait

use async_trait::async_trait;
use uuid::Uuid;

use shared_types::TenantContext;

use crate::dto::attribution::{AttributionListResponse, MovementResponse, SummaryResponse};
use crate::dto::common::PageRequest;
use crate::dto::inventory::LotResponse;
use crate::dto::run::{RunListQuery, RunResponse};
use crate::Result;

/// Read-only views over runs and their artifacts; no locking involved
#[async_trait]
pub trait ReportingService: Send + Sync {
    async fn get_run(&self, tenant: TenantContext, run_id: Uuid) -> Result<RunResponse>;

    async fn list_runs(&self, tenant: TenantContext, query: RunListQuery)
        -> Result<Vec<RunResponse>>;

    async fn read_attributions(
        &self,
        tenant: TenantContext,
        run_id: Uuid,
        page: PageRequest,
    ) -> Result<AttributionListResponse>;

    async fn read_summaries(
        &self,
        tenant: TenantContext,
        run_id: Uuid,
    ) -> Result<Vec<SummaryResponse>>;

    /// Current lot inventory, optionally filtered to one SKU
    async fn read_current_inventory(
        &self,
        tenant: TenantContext,
        sku: Option<String>,
    ) -> Result<Vec<LotResponse>>;

    /// A run's journal in emission order, for audit
    async fn read_movements(
        &self,
        tenant: TenantContext,
        run_id: Uuid,
    ) -> Result<Vec<MovementResponse>>;
}
