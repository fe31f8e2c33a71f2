//! Rollback engine implementation
//!
//! Reverses a completed run by inverting its journal in reverse emission
//! order, cross-checking the restored quantities against the pre-run
//! snapshot, and committing atomically. Idempotent: a rolled-back run
//! returns success without touching anything.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{CogsRun, InventoryMovement, RunStatus};
use cogs_service_core::dto::run::RunResponse;
use cogs_service_core::repositories::{
    LotRepository, MovementRepository, RollbackCommit, RunRepository, SnapshotRepository,
};
use cogs_service_core::services::{RollbackService, TenantLockService};
use cogs_service_core::{Result, TenantGuard};
use shared_error::AppError;
use shared_types::TenantContext;

/// Implementation of RollbackService
pub struct RollbackServiceImpl {
    runs: Arc<dyn RunRepository>,
    movements: Arc<dyn MovementRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    lots: Arc<dyn LotRepository>,
    lock: Arc<dyn TenantLockService>,
    lock_ttl_seconds: u32,
}

impl RollbackServiceImpl {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        movements: Arc<dyn MovementRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        lots: Arc<dyn LotRepository>,
        lock: Arc<dyn TenantLockService>,
    ) -> Self {
        Self {
            runs,
            movements,
            snapshots,
            lots,
            lock,
            lock_ttl_seconds: 300,
        }
    }

    pub fn with_lock_ttl(mut self, ttl_seconds: u32) -> Self {
        self.lock_ttl_seconds = ttl_seconds;
        self
    }

    async fn rollback_locked(&self, guard: &TenantGuard, run_id: Uuid) -> Result<CogsRun> {
        let run = self.runs.get(guard.tenant_id(), run_id).await?;
        guard.check(&run)?;

        if run.status == RunStatus::RolledBack {
            return Ok(run); // Idempotent success
        }
        if run.status != RunStatus::Completed {
            return Err(AppError::IllegalState(format!(
                "run {} is {} and cannot be rolled back",
                run_id,
                run.status.as_str()
            )));
        }

        let journal = self.movements.find_by_run(guard.tenant_id(), run_id).await?;
        guard.check_all(&journal)?;
        let snapshot = self.snapshots.read_snapshot(guard.tenant_id(), run_id).await?;
        guard.check_all(&snapshot)?;

        let mut lot_ids: Vec<Uuid> = journal.iter().map(|m| m.lot_id).collect();
        lot_ids.sort();
        lot_ids.dedup();

        let lots = self.lots.find_by_ids(guard.tenant_id(), &lot_ids).await?;
        guard.check_all(&lots)?;
        let mut live: HashMap<Uuid, (i64, i64)> = lots
            .iter()
            .map(|lot| (lot.lot_id, (lot.remaining_quantity, lot.original_quantity)))
            .collect();

        // Invert the journal in reverse emission order so remaining_after
        // stays within bounds at every intermediate step.
        let mut inverse_movements: Vec<InventoryMovement> = Vec::with_capacity(journal.len());
        for movement in journal.iter().rev() {
            let (remaining, original) = live.get_mut(&movement.lot_id).ok_or_else(|| {
                AppError::InternalError(format!(
                    "journal references lot {} unknown to tenant",
                    movement.lot_id
                ))
            })?;
            let restored = *remaining - movement.quantity;
            if restored < 0 || restored > *original {
                return Err(AppError::InternalError(format!(
                    "rollback of run {} would set lot {} to {} (bounds 0..={})",
                    run_id, movement.lot_id, restored, original
                )));
            }
            *remaining = restored;
            inverse_movements.push(movement.inverse(run_id, restored));
        }

        // The pre-run snapshot is authoritative; divergence means another
        // run consumed these lots since, and reversing would corrupt them.
        let expected: HashMap<Uuid, i64> =
            snapshot.iter().map(|s| (s.lot_id, s.remaining_quantity)).collect();
        for (lot_id, (restored, _)) in &live {
            match expected.get(lot_id) {
                Some(snapshot_remaining) if snapshot_remaining == restored => {},
                Some(snapshot_remaining) => {
                    return Err(AppError::InternalError(format!(
                        "restored quantity {} for lot {} does not match snapshot {}",
                        restored, lot_id, snapshot_remaining
                    )));
                },
                None => {
                    return Err(AppError::InternalError(format!(
                        "lot {} missing from run {} snapshot",
                        lot_id, run_id
                    )));
                },
            }
        }

        let mut lot_restores: Vec<(Uuid, i64)> =
            live.into_iter().map(|(lot_id, (restored, _))| (lot_id, restored)).collect();
        lot_restores.sort_by_key(|(lot_id, _)| *lot_id);

        let commit = RollbackCommit {
            run_id,
            movements: inverse_movements,
            lot_restores,
            rolled_back_at: Utc::now(),
        };
        let run = self.runs.commit_rollback(guard.tenant_id(), commit).await?;
        tracing::info!(tenant_id = %guard.tenant_id(), %run_id, "run rolled back");
        Ok(run)
    }
}

#[async_trait]
impl RollbackService for RollbackServiceImpl {
    async fn rollback_run(&self, tenant: TenantContext, run_id: Uuid) -> Result<RunResponse> {
        let guard = TenantGuard::new(&tenant);

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

        let result = self.rollback_locked(&guard, run_id).await;

        match self.lock.release(guard.tenant_id(), &token).await {
            Ok(true) => {},
            Ok(false) => {
                tracing::warn!(tenant_id = %guard.tenant_id(), "rollback lock expired before release")
            },
            Err(release_error) => {
                tracing::warn!(tenant_id = %guard.tenant_id(), %release_error, "rollback lock release failed")
            },
        }

        result.map(RunResponse::from)
    }
}
