//! In-memory persistence, the fake-for-tests variant
//!
//! Implements every repository trait plus the tenant lock against a single
//! mutex-guarded state. Commit composites hold the mutex for their whole
//! body, which gives the same atomicity the PostgreSQL transactions provide.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{
    AttributionWithDetails, CogsRun, CogsSummary, InventoryMovement, InventorySnapshot,
    PurchaseLot, RunStatus, ValidationIssue,
};
use cogs_service_core::repositories::{
    AttributionRepository, CompletedRunCommit, LotRepository, MovementRepository, RollbackCommit,
    RunFilter, RunRepository, SnapshotRepository, SummaryRepository, ValidationIssueRepository,
};
use cogs_service_core::services::TenantLockService;
use shared_error::AppError;

use cogs_service_core::Result;

#[derive(Default)]
struct StoreState {
    lots: HashMap<(Uuid, Uuid), PurchaseLot>,
    runs: HashMap<(Uuid, Uuid), CogsRun>,
    movements: Vec<InventoryMovement>,
    snapshots: Vec<InventorySnapshot>,
    attributions: Vec<AttributionWithDetails>,
    summaries: Vec<CogsSummary>,
    issues: Vec<ValidationIssue>,
}

/// In-memory implementation of the whole persistence contract
#[derive(Default)]
pub struct InMemoryCogsStore {
    state: Mutex<StoreState>,
}

impl InMemoryCogsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl LotRepository for InMemoryCogsStore {
    async fn load_current_inventory(
        &self,
        tenant_id: Uuid,
        skus: Option<&[String]>,
    ) -> Result<Vec<PurchaseLot>> {
        let state = self.lock_state();
        let mut lots: Vec<PurchaseLot> = state
            .lots
            .values()
            .filter(|lot| lot.tenant_id == tenant_id)
            .filter(|lot| skus.map(|skus| skus.contains(&lot.sku)).unwrap_or(true))
            .cloned()
            .collect();
        lots.sort_by(|a, b| (a.received_date, a.lot_id).cmp(&(b.received_date, b.lot_id)));
        Ok(lots)
    }

    async fn upsert_lots(&self, tenant_id: Uuid, lots: &[PurchaseLot]) -> Result<()> {
        let mut state = self.lock_state();
        for lot in lots {
            if lot.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "lot {} belongs to tenant {}",
                    lot.lot_id, lot.tenant_id
                )));
            }
            state.lots.insert((tenant_id, lot.lot_id), lot.clone());
        }
        Ok(())
    }

    async fn find_by_ids(&self, tenant_id: Uuid, lot_ids: &[Uuid]) -> Result<Vec<PurchaseLot>> {
        let state = self.lock_state();
        let mut lots: Vec<PurchaseLot> = lot_ids
            .iter()
            .filter_map(|lot_id| state.lots.get(&(tenant_id, *lot_id)).cloned())
            .collect();
        lots.sort_by(|a, b| (a.received_date, a.lot_id).cmp(&(b.received_date, b.lot_id)));
        Ok(lots)
    }
}

#[async_trait]
impl MovementRepository for InMemoryCogsStore {
    async fn append(&self, tenant_id: Uuid, movements: &[InventoryMovement]) -> Result<()> {
        let mut state = self.lock_state();
        for movement in movements {
            if movement.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "movement {} belongs to tenant {}",
                    movement.movement_id, movement.tenant_id
                )));
            }
            state.movements.push(movement.clone());
        }
        Ok(())
    }

    async fn find_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<InventoryMovement>> {
        let state = self.lock_state();
        Ok(state
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryCogsStore {
    async fn write_snapshot(
        &self,
        tenant_id: Uuid,
        snapshots: &[InventorySnapshot],
    ) -> Result<()> {
        let mut state = self.lock_state();
        for snapshot in snapshots {
            if snapshot.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "snapshot {} belongs to tenant {}",
                    snapshot.snapshot_id, snapshot.tenant_id
                )));
            }
            state.snapshots.push(snapshot.clone());
        }
        Ok(())
    }

    async fn read_snapshot(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<InventorySnapshot>> {
        let state = self.lock_state();
        let mut rows: Vec<InventorySnapshot> = state
            .snapshots
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.run_id == run_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.lot_id);
        Ok(rows)
    }

    async fn current_snapshot(&self, tenant_id: Uuid) -> Result<Vec<InventorySnapshot>> {
        let state = self.lock_state();
        let mut rows: Vec<InventorySnapshot> = state
            .snapshots
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.is_current)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.lot_id);
        Ok(rows)
    }
}

#[async_trait]
impl AttributionRepository for InMemoryCogsStore {
    async fn write_all(
        &self,
        tenant_id: Uuid,
        attributions: &[AttributionWithDetails],
    ) -> Result<()> {
        let mut state = self.lock_state();
        for entry in attributions {
            if entry.attribution.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "attribution {} belongs to tenant {}",
                    entry.attribution.attribution_id, entry.attribution.tenant_id
                )));
            }
            state.attributions.push(entry.clone());
        }
        Ok(())
    }

    async fn find_by_run(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AttributionWithDetails>> {
        let state = self.lock_state();
        let mut rows: Vec<AttributionWithDetails> = state
            .attributions
            .iter()
            .filter(|a| a.attribution.tenant_id == tenant_id && a.attribution.run_id == run_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.attribution.sale_date, a.attribution.sale_id)
                .cmp(&(b.attribution.sale_date, b.attribution.sale_id))
        });
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<u64> {
        let state = self.lock_state();
        Ok(state
            .attributions
            .iter()
            .filter(|a| a.attribution.tenant_id == tenant_id && a.attribution.run_id == run_id)
            .count() as u64)
    }

    async fn invalidate_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<()> {
        let mut state = self.lock_state();
        for entry in state
            .attributions
            .iter_mut()
            .filter(|a| a.attribution.tenant_id == tenant_id && a.attribution.run_id == run_id)
        {
            entry.attribution.is_valid = false;
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryRepository for InMemoryCogsStore {
    async fn write_all(&self, tenant_id: Uuid, summaries: &[CogsSummary]) -> Result<()> {
        let mut state = self.lock_state();
        for summary in summaries {
            if summary.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "summary {} belongs to tenant {}",
                    summary.summary_id, summary.tenant_id
                )));
            }
            state.summaries.push(summary.clone());
        }
        Ok(())
    }

    async fn find_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<CogsSummary>> {
        let state = self.lock_state();
        let mut rows: Vec<CogsSummary> = state
            .summaries
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.run_id == run_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.sku.clone(), a.period.clone()).cmp(&(b.sku.clone(), b.period.clone())));
        Ok(rows)
    }

    async fn invalidate_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<()> {
        let mut state = self.lock_state();
        for summary in state
            .summaries
            .iter_mut()
            .filter(|s| s.tenant_id == tenant_id && s.run_id == run_id)
        {
            summary.is_valid = false;
        }
        Ok(())
    }
}

#[async_trait]
impl ValidationIssueRepository for InMemoryCogsStore {
    async fn write_all(&self, tenant_id: Uuid, issues: &[ValidationIssue]) -> Result<()> {
        let mut state = self.lock_state();
        for issue in issues {
            if issue.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "issue {} belongs to tenant {}",
                    issue.issue_id, issue.tenant_id
                )));
            }
            state.issues.push(issue.clone());
        }
        Ok(())
    }

    async fn find_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<Vec<ValidationIssue>> {
        let state = self.lock_state();
        Ok(state
            .issues
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RunRepository for InMemoryCogsStore {
    async fn create(&self, run: &CogsRun) -> Result<CogsRun> {
        let mut state = self.lock_state();
        let key = (run.tenant_id, run.run_id);
        if state.runs.contains_key(&key) {
            return Err(AppError::IllegalState(format!("run {} already exists", run.run_id)));
        }
        state.runs.insert(key, run.clone());
        Ok(run.clone())
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
        error_message: Option<String>,
    ) -> Result<CogsRun> {
        if !from.can_transition_to(to) {
            return Err(AppError::IllegalState(format!(
                "run {} cannot transition {} -> {}",
                run_id,
                from.as_str(),
                to.as_str()
            )));
        }

        let mut state = self.lock_state();
        let run = state
            .runs
            .get_mut(&(tenant_id, run_id))
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))?;

        if run.status != from {
            return Err(AppError::IllegalState(format!(
                "run {} is {} (expected {})",
                run_id,
                run.status.as_str(),
                from.as_str()
            )));
        }

        run.status = to;
        if let Some(message) = error_message {
            run.error_message = Some(message);
        }
        if to.is_terminal() {
            run.completed_at = Some(Utc::now());
        }
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn get(&self, tenant_id: Uuid, run_id: Uuid) -> Result<CogsRun> {
        let state = self.lock_state();
        state
            .runs
            .get(&(tenant_id, run_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))
    }

    async fn list(&self, tenant_id: Uuid, filter: &RunFilter) -> Result<Vec<CogsRun>> {
        let state = self.lock_state();
        let mut runs: Vec<CogsRun> = state
            .runs
            .values()
            .filter(|run| run.tenant_id == tenant_id)
            .filter(|run| filter.status.map(|status| run.status == status).unwrap_or(true))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(100).clamp(1, 500) as usize;
        Ok(runs.into_iter().skip(offset).take(limit).collect())
    }

    async fn commit_completed_run(
        &self,
        tenant_id: Uuid,
        commit: CompletedRunCommit,
    ) -> Result<CogsRun> {
        let mut state = self.lock_state();

        // Validate everything before mutating so a failure leaves no trace,
        // mirroring the transactional backend.
        let run = state
            .runs
            .get(&(tenant_id, commit.run_id))
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", commit.run_id)))?;
        if run.status != RunStatus::Running {
            return Err(AppError::IllegalState(format!("run {} is not running", commit.run_id)));
        }
        for (lot_id, new_remaining) in &commit.lot_updates {
            let lot = state
                .lots
                .get(&(tenant_id, *lot_id))
                .ok_or_else(|| AppError::NotFound(format!("lot {} not found", lot_id)))?;
            if *new_remaining < 0 || *new_remaining > lot.original_quantity {
                return Err(AppError::InternalError(format!(
                    "lot {} rejected remaining_quantity {}",
                    lot_id, new_remaining
                )));
            }
        }

        state.movements.extend(commit.movements.iter().cloned());
        state.attributions.extend(commit.attributions.iter().cloned());
        state.summaries.extend(commit.summaries.iter().cloned());
        state.issues.extend(commit.issues.iter().cloned());
        for (lot_id, new_remaining) in &commit.lot_updates {
            if let Some(lot) = state.lots.get_mut(&(tenant_id, *lot_id)) {
                lot.remaining_quantity = *new_remaining;
                lot.updated_at = Utc::now();
            }
        }

        let touched: Vec<Uuid> = state
            .snapshots
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.run_id == commit.run_id)
            .map(|s| s.lot_id)
            .collect();
        for snapshot in state.snapshots.iter_mut().filter(|s| s.tenant_id == tenant_id) {
            if snapshot.run_id == commit.run_id {
                snapshot.is_current = true;
            } else if touched.contains(&snapshot.lot_id) {
                snapshot.is_current = false;
            }
        }

        let run = state
            .runs
            .get_mut(&(tenant_id, commit.run_id))
            .expect("run checked above");
        run.status = RunStatus::Completed;
        run.completed_at = Some(commit.completed_at);
        run.sales_processed = commit.counters.sales_processed;
        run.movements_recorded = commit.counters.movements_recorded;
        run.validation_error_count = commit.counters.validation_error_count;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn commit_rollback(&self, tenant_id: Uuid, commit: RollbackCommit) -> Result<CogsRun> {
        let mut state = self.lock_state();

        let run = state
            .runs
            .get(&(tenant_id, commit.run_id))
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", commit.run_id)))?;
        if run.status != RunStatus::Completed {
            return Err(AppError::IllegalState(format!(
                "run {} is not completed",
                commit.run_id
            )));
        }
        for (lot_id, restored_remaining) in &commit.lot_restores {
            let lot = state
                .lots
                .get(&(tenant_id, *lot_id))
                .ok_or_else(|| AppError::NotFound(format!("lot {} not found", lot_id)))?;
            if *restored_remaining < 0 || *restored_remaining > lot.original_quantity {
                return Err(AppError::InternalError(format!(
                    "lot {} rejected remaining_quantity {}",
                    lot_id, restored_remaining
                )));
            }
        }

        state.movements.extend(commit.movements.iter().cloned());
        for (lot_id, restored_remaining) in &commit.lot_restores {
            if let Some(lot) = state.lots.get_mut(&(tenant_id, *lot_id)) {
                lot.remaining_quantity = *restored_remaining;
                lot.updated_at = Utc::now();
            }
        }
        for entry in state
            .attributions
            .iter_mut()
            .filter(|a| a.attribution.tenant_id == tenant_id && a.attribution.run_id == commit.run_id)
        {
            entry.attribution.is_valid = false;
        }
        for summary in state
            .summaries
            .iter_mut()
            .filter(|s| s.tenant_id == tenant_id && s.run_id == commit.run_id)
        {
            summary.is_valid = false;
        }

        let run = state
            .runs
            .get_mut(&(tenant_id, commit.run_id))
            .expect("run checked above");
        run.status = RunStatus::RolledBack;
        run.rolled_back_at = Some(commit.rolled_back_at);
        run.updated_at = Utc::now();
        Ok(run.clone())
    }
}

/// In-memory implementation of TenantLockService
#[derive(Default)]
pub struct InMemoryTenantLockService {
    locks: Mutex<HashMap<Uuid, String>>,
}

impl InMemoryTenantLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantLockService for InMemoryTenantLockService {
    async fn acquire(&self, tenant_id: Uuid, _ttl_seconds: u32) -> Result<Option<String>> {
        let mut locks = self.locks.lock().expect("lock mutex poisoned");
        if locks.contains_key(&tenant_id) {
            return Ok(None);
        }
        let token = Uuid::now_v7().to_string();
        locks.insert(tenant_id, token.clone());
        Ok(Some(token))
    }

    async fn release(&self, tenant_id: Uuid, lock_token: &str) -> Result<bool> {
        let mut locks = self.locks.lock().expect("lock mutex poisoned");
        if locks.get(&tenant_id).map(|token| token == lock_token).unwrap_or(false) {
            locks.remove(&tenant_id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn is_locked(&self, tenant_id: Uuid) -> Result<bool> {
        let locks = self.locks.lock().expect("lock mutex poisoned");
        Ok(locks.contains_key(&tenant_id))
    }

    async fn force_release(&self, tenant_id: Uuid) -> Result<bool> {
        let mut locks = self.locks.lock().expect("lock mutex poisoned");
        Ok(locks.remove(&tenant_id).is_some())
    }
}
