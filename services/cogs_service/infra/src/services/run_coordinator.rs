//! Run coordinator implementation
//!
//! Drives one journaled allocation run: lock, run record, inventory
//! assembly, pre-run snapshot, allocation, atomic commit. Any failure after
//! the run record exists transitions it to `failed`; the tenant lock is
//! released on every exit path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use cogs_service_core::domains::cogs::{
    allocate, AllocationContext, CogsRun, CostingConfig, CostingMethod, InventorySnapshot,
    LotMergePolicy, PurchaseLot, RunCounters, RunStatus, Sale, ValidationIssue,
};
use cogs_service_core::dto::inventory::LotInput;
use cogs_service_core::dto::run::{ExecuteRunRequest, RunResponse};
use cogs_service_core::repositories::{
    CompletedRunCommit, LotRepository, RunRepository, SnapshotRepository,
};
use cogs_service_core::services::{RunCoordinatorService, TenantLockService};
use cogs_service_core::{Result, TenantGuard};
use shared_error::AppError;
use shared_types::TenantContext;

/// Implementation of RunCoordinatorService
pub struct RunCoordinatorImpl {
    lots: Arc<dyn LotRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    runs: Arc<dyn RunRepository>,
    lock: Arc<dyn TenantLockService>,
    config: CostingConfig,
    lock_ttl_seconds: u32,
}

impl RunCoordinatorImpl {
    pub fn new(
        lots: Arc<dyn LotRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        runs: Arc<dyn RunRepository>,
        lock: Arc<dyn TenantLockService>,
        config: CostingConfig,
    ) -> Self {
        Self {
            lots,
            snapshots,
            runs,
            lock,
            config,
            lock_ttl_seconds: 300,
        }
    }

    pub fn with_lock_ttl(mut self, ttl_seconds: u32) -> Self {
        self.lock_ttl_seconds = ttl_seconds;
        self
    }

    /// Structural input validation; rejects before any state change
    fn validate_request(
        &self,
        guard: &TenantGuard,
        request: &ExecuteRunRequest,
    ) -> Result<CostingMethod> {
        let mode = CostingMethod::parse(&request.mode).ok_or_else(|| {
            AppError::ValidationError(format!("unsupported costing mode '{}'", request.mode))
        })?;

        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        if request.sales.is_empty() {
            return Err(AppError::ValidationError("sales must not be empty".to_string()));
        }

        for sale in &request.sales {
            if let Some(tenant_id) = sale.tenant_id {
                guard.check_id(tenant_id)?;
            }
            if sale.quantity == 0 {
                return Err(AppError::ValidationError(format!(
                    "sale {} has zero quantity",
                    sale.sale_id
                )));
            }
            if sale.sku.is_empty() {
                return Err(AppError::ValidationError(format!(
                    "sale {} has an empty sku",
                    sale.sale_id
                )));
            }
        }

        if let Some(lots) = &request.lots {
            for lot in lots {
                if let Some(tenant_id) = lot.tenant_id {
                    guard.check_id(tenant_id)?;
                }
            }
        }

        Ok(mode)
    }

    /// Merge uploaded lots into the working inventory under the merge policy
    ///
    /// Known lot ids may only grow: `remaining_quantity` moves by the delta
    /// in `original_quantity`, never directly from user input. Conflicting
    /// rows become `lot_conflict` issues and are skipped.
    fn merge_lots(
        &self,
        guard: &TenantGuard,
        run_id: Uuid,
        inventory: &mut Vec<PurchaseLot>,
        inputs: Vec<LotInput>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Vec<PurchaseLot> {
        let mut index: HashMap<Uuid, usize> =
            inventory.iter().enumerate().map(|(i, lot)| (lot.lot_id, i)).collect();
        let mut upserts: Vec<PurchaseLot> = Vec::new();

        for input in inputs {
            match index.get(&input.lot_id).copied() {
                Some(idx) => {
                    if self.config.lot_merge_policy == LotMergePolicy::Reject {
                        issues.push(ValidationIssue::lot_conflict(
                            guard.tenant_id(),
                            run_id,
                            input.lot_id,
                            format!("lot {} already exists and merging is disabled", input.lot_id),
                        ));
                        continue;
                    }

                    let existing = &mut inventory[idx];
                    if input.sku != existing.sku {
                        issues.push(ValidationIssue::lot_conflict(
                            guard.tenant_id(),
                            run_id,
                            input.lot_id,
                            format!("lot {} cannot change sku", input.lot_id),
                        ));
                        continue;
                    }
                    let delta = input.original_quantity - existing.original_quantity;
                    if delta < 0 {
                        issues.push(ValidationIssue::lot_conflict(
                            guard.tenant_id(),
                            run_id,
                            input.lot_id,
                            format!("lot {} cannot shrink original_quantity", input.lot_id),
                        ));
                        continue;
                    }
                    let new_remaining = existing.remaining_quantity + delta;
                    if let Some(requested) = input.remaining_quantity {
                        if requested != new_remaining {
                            issues.push(ValidationIssue::lot_conflict(
                                guard.tenant_id(),
                                run_id,
                                input.lot_id,
                                format!(
                                    "lot {} remaining_quantity cannot be set directly",
                                    input.lot_id
                                ),
                            ));
                            continue;
                        }
                    }

                    existing.original_quantity = input.original_quantity;
                    existing.remaining_quantity = new_remaining;
                    existing.received_date = input.received_date;
                    existing.unit_price = input.unit_price;
                    existing.freight_cost_per_unit = input.freight_cost_per_unit;
                    existing.updated_at = Utc::now();
                    upserts.push(existing.clone());
                },
                None => {
                    let lot_id = input.lot_id;
                    let lot = input.into_lot(guard.tenant_id());
                    if let Err(message) = lot.check_invariants() {
                        issues.push(ValidationIssue::lot_conflict(
                            guard.tenant_id(),
                            run_id,
                            lot_id,
                            message,
                        ));
                        continue;
                    }
                    index.insert(lot.lot_id, inventory.len());
                    inventory.push(lot.clone());
                    upserts.push(lot);
                },
            }
        }

        upserts
    }

    /// Steps 3-7 under the tenant lock; errors after run creation mark it failed
    async fn execute_locked(
        &self,
        guard: &TenantGuard,
        mode: CostingMethod,
        request: ExecuteRunRequest,
    ) -> Result<CogsRun> {
        let run_id = request.run_id.unwrap_or_else(Uuid::now_v7);
        let mut run = CogsRun::with_id(run_id, guard.tenant_id(), mode);
        run.input_file_id = request.input_file_id;
        self.runs.create(&run).await?;
        if let Err(error) = self
            .runs
            .transition(guard.tenant_id(), run_id, RunStatus::Pending, RunStatus::Running, None)
            .await
        {
            self.mark_failed(guard, run_id, RunStatus::Pending, &error).await;
            return Err(error);
        }
        tracing::info!(tenant_id = %guard.tenant_id(), %run_id, "run started");

        match self.allocate_and_commit(guard, run_id, request).await {
            Ok(run) => {
                tracing::info!(
                    tenant_id = %guard.tenant_id(),
                    %run_id,
                    movements = run.movements_recorded,
                    validation_errors = run.validation_error_count,
                    "run completed"
                );
                Ok(run)
            },
            Err(error) => {
                tracing::error!(tenant_id = %guard.tenant_id(), %run_id, %error, "run failed");
                self.mark_failed(guard, run_id, RunStatus::Running, &error).await;
                Err(error)
            },
        }
    }

    /// Best-effort transition to `failed`; never masks the original error
    async fn mark_failed(&self, guard: &TenantGuard, run_id: Uuid, from: RunStatus, error: &AppError) {
        if let Err(transition_error) = self
            .runs
            .transition(
                guard.tenant_id(),
                run_id,
                from,
                RunStatus::Failed,
                Some(error.to_string()),
            )
            .await
        {
            tracing::error!(%run_id, %transition_error, "failed to mark run failed");
        }
    }

    async fn allocate_and_commit(
        &self,
        guard: &TenantGuard,
        run_id: Uuid,
        request: ExecuteRunRequest,
    ) -> Result<CogsRun> {
        // Assemble inventory: persisted lots plus uploads under the merge policy.
        let mut inventory = self.lots.load_current_inventory(guard.tenant_id(), None).await?;
        guard.check_all(&inventory)?;

        let mut merge_issues: Vec<ValidationIssue> = Vec::new();
        if let Some(lot_inputs) = request.lots {
            let upserts =
                self.merge_lots(guard, run_id, &mut inventory, lot_inputs, &mut merge_issues);
            if !upserts.is_empty() {
                self.lots.upsert_lots(guard.tenant_id(), &upserts).await?;
            }
        }

        // Pre-run snapshot of every lot for the tenant.
        let snapshots: Vec<InventorySnapshot> =
            inventory.iter().map(|lot| InventorySnapshot::of_lot(run_id, lot)).collect();
        self.snapshots.write_snapshot(guard.tenant_id(), &snapshots).await?;

        let sales: Vec<Sale> = request
            .sales
            .into_iter()
            .map(|input| input.into_sale(guard.tenant_id()))
            .collect();
        let ctx = AllocationContext {
            tenant_id: guard.tenant_id(),
            run_id,
            config: self.config,
        };
        let outcome = allocate(&ctx, inventory, &sales)?;

        let mut issues = merge_issues;
        issues.extend(outcome.issues);
        let counters = RunCounters {
            sales_processed: sales.len() as i64,
            movements_recorded: outcome.movements.len() as i64,
            validation_error_count: issues.len() as i64,
        };

        let commit = CompletedRunCommit {
            run_id,
            movements: outcome.movements,
            attributions: outcome.attributions,
            summaries: outcome.summaries,
            issues,
            lot_updates: outcome
                .updated_lots
                .iter()
                .map(|lot| (lot.lot_id, lot.remaining_quantity))
                .collect(),
            counters,
            completed_at: Utc::now(),
        };
        self.runs.commit_completed_run(guard.tenant_id(), commit).await
    }
}

#[async_trait]
impl RunCoordinatorService for RunCoordinatorImpl {
    async fn execute_run(
        &self,
        tenant: TenantContext,
        request: ExecuteRunRequest,
    ) -> Result<RunResponse> {
        let guard = TenantGuard::new(&tenant);
        let mode = self.validate_request(&guard, &request)?;

        // Idempotent retries on a caller-supplied run id.
        if let Some(run_id) = request.run_id {
            match self.runs.get(guard.tenant_id(), run_id).await {
                Ok(existing) => {
                    return match existing.status {
                        RunStatus::Completed => Ok(existing.into()),
                        RunStatus::Pending | RunStatus::Running => {
                            Err(AppError::ConcurrentRunInProgress(format!(
                                "run {} is already in progress",
                                run_id
                            )))
                        },
                        RunStatus::Failed | RunStatus::RolledBack => {
                            Err(AppError::IllegalState(format!(
                                "run {} already ended as {}",
                                run_id,
                                existing.status.as_str()
                            )))
                        },
                    };
                },
                Err(AppError::NotFound(_)) => {},
                Err(other) => return Err(other),
            }
        }

        let token = self
            .lock
            .acquire(guard.tenant_id(), self.lock_ttl_seconds)
            .await?
            .ok_or_else(|| {
                AppError::ConcurrentRunInProgress(format!(
                    "tenant {} already has an active run",
                    guard.tenant_id()
                ))
            })?;

        let result = self.execute_locked(&guard, mode, request).await;

        match self.lock.release(guard.tenant_id(), &token).await {
            Ok(true) => {},
            Ok(false) => {
                tracing::warn!(tenant_id = %guard.tenant_id(), "run lock expired before release")
            },
            Err(release_error) => {
                tracing::warn!(tenant_id = %guard.tenant_id(), %release_error, "run lock release failed")
            },
        }

        result.map(RunResponse::from)
    }
}
