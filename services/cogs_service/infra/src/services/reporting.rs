//! Read-side implementation
//!
//! Pure reads over runs and their artifacts; no locking. Every returned row
//! passes the tenant guard before leaving the service.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use cogs_service_core::dto::attribution::{
    AttributionListResponse, MovementResponse, SummaryResponse,
};
use cogs_service_core::dto::common::{PageRequest, PaginationInfo};
use cogs_service_core::dto::inventory::LotResponse;
use cogs_service_core::dto::run::{RunListQuery, RunResponse};
use cogs_service_core::repositories::{
    AttributionRepository, LotRepository, MovementRepository, RunFilter, RunRepository,
    SummaryRepository,
};
use cogs_service_core::services::ReportingService;
use cogs_service_core::{Result, TenantGuard};
use shared_types::TenantContext;

/// Implementation of ReportingService
pub struct ReportingServiceImpl {
    runs: Arc<dyn RunRepository>,
    lots: Arc<dyn LotRepository>,
    movements: Arc<dyn MovementRepository>,
    attributions: Arc<dyn AttributionRepository>,
    summaries: Arc<dyn SummaryRepository>,
}

impl ReportingServiceImpl {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        lots: Arc<dyn LotRepository>,
        movements: Arc<dyn MovementRepository>,
        attributions: Arc<dyn AttributionRepository>,
        summaries: Arc<dyn SummaryRepository>,
    ) -> Self {
        Self {
            runs,
            lots,
            movements,
            attributions,
            summaries,
        }
    }
}

#[async_trait]
impl ReportingService for ReportingServiceImpl {
    async fn get_run(&self, tenant: TenantContext, run_id: Uuid) -> Result<RunResponse> {
        let guard = TenantGuard::new(&tenant);
        let run = self.runs.get(guard.tenant_id(), run_id).await?;
        guard.check(&run)?;
        Ok(run.into())
    }

    async fn list_runs(
        &self,
        tenant: TenantContext,
        query: RunListQuery,
    ) -> Result<Vec<RunResponse>> {
        let guard = TenantGuard::new(&tenant);
        let filter = RunFilter {
            status: query.status,
            limit: query.limit,
            offset: query.offset,
        };
        let runs = self.runs.list(guard.tenant_id(), &filter).await?;
        guard.check_all(&runs)?;
        Ok(runs.into_iter().map(Into::into).collect())
    }

    async fn read_attributions(
        &self,
        tenant: TenantContext,
        run_id: Uuid,
        page: PageRequest,
    ) -> Result<AttributionListResponse> {
        let guard = TenantGuard::new(&tenant);
        // Run lookup first so an unknown run surfaces as NotFound, not an empty page.
        let run = self.runs.get(guard.tenant_id(), run_id).await?;
        guard.check(&run)?;

        let page = page.normalized();
        let total = self.attributions.count_by_run(guard.tenant_id(), run_id).await?;
        let entries = self
            .attributions
            .find_by_run(guard.tenant_id(), run_id, page.limit(), page.offset())
            .await?;
        for entry in &entries {
            guard.check(&entry.attribution)?;
        }

        Ok(AttributionListResponse {
            attributions: entries.into_iter().map(Into::into).collect(),
            pagination: PaginationInfo::new(page.page, page.page_size, total),
        })
    }

    async fn read_summaries(
        &self,
        tenant: TenantContext,
        run_id: Uuid,
    ) -> Result<Vec<SummaryResponse>> {
        let guard = TenantGuard::new(&tenant);
        let run = self.runs.get(guard.tenant_id(), run_id).await?;
        guard.check(&run)?;

        let summaries = self.summaries.find_by_run(guard.tenant_id(), run_id).await?;
        guard.check_all(&summaries)?;
        Ok(summaries.into_iter().map(Into::into).collect())
    }

    async fn read_current_inventory(
        &self,
        tenant: TenantContext,
        sku: Option<String>,
    ) -> Result<Vec<LotResponse>> {
        let guard = TenantGuard::new(&tenant);
        let skus = sku.map(|sku| vec![sku]);
        let lots = self
            .lots
            .load_current_inventory(guard.tenant_id(), skus.as_deref())
            .await?;
        guard.check_all(&lots)?;
        Ok(lots.into_iter().map(Into::into).collect())
    }

    async fn read_movements(
        &self,
        tenant: TenantContext,
        run_id: Uuid,
    ) -> Result<Vec<MovementResponse>> {
        let guard = TenantGuard::new(&tenant);
        let run = self.runs.get(guard.tenant_id(), run_id).await?;
        guard.check(&run)?;

        let movements = self.movements.find_by_run(guard.tenant_id(), run_id).await?;
        guard.check_all(&movements)?;
        Ok(movements.into_iter().map(Into::into).collect())
    }
}
