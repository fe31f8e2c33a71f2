//! PostgreSQL implementation of RunRepository
//!
//! Status changes are compare-and-set on the stored status. The two commit
//! composites run inside a single transaction so a run is observable as
//! `completed` (or `rolled_back`) only when every associated write landed.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{CogsRun, CostingMethod, RunStatus};
use cogs_service_core::repositories::{
    CompletedRunCommit, RollbackCommit, RunFilter, RunRepository,
};
use shared_error::AppError;

use crate::repositories::attribution::insert_attribution;
use crate::repositories::movement::insert_movement;
use crate::repositories::summary::insert_summary;
use crate::repositories::validation::insert_issue;

/// PostgreSQL implementation of RunRepository
pub struct PgRunRepository {
    pool: Arc<PgPool>,
}

impl PgRunRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Helper struct for run SQL results
#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    run_id: Uuid,
    tenant_id: Uuid,
    status: String,
    mode: String,
    started_at: chrono::DateTime<Utc>,
    completed_at: Option<chrono::DateTime<Utc>>,
    rolled_back_at: Option<chrono::DateTime<Utc>>,
    error_message: Option<String>,
    input_file_id: Option<Uuid>,
    sales_processed: i64,
    movements_recorded: i64,
    validation_error_count: i64,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<RunRow> for CogsRun {
    fn from(row: RunRow) -> Self {
        Self {
            run_id: row.run_id,
            tenant_id: row.tenant_id,
            status: RunStatus::from(row.status),
            mode: CostingMethod::parse(&row.mode).unwrap_or(CostingMethod::Fifo),
            started_at: row.started_at,
            completed_at: row.completed_at,
            rolled_back_at: row.rolled_back_at,
            error_message: row.error_message,
            input_file_id: row.input_file_id,
            sales_processed: row.sales_processed,
            movements_recorded: row.movements_recorded,
            validation_error_count: row.validation_error_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const RUN_COLUMNS: &str = "run_id, tenant_id, status, mode, started_at, completed_at, \
                           rolled_back_at, error_message, input_file_id, sales_processed, \
                           movements_recorded, validation_error_count, created_at, updated_at";

/// Set a lot's remaining quantity with the bounds invariant enforced in SQL
async fn apply_lot_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    tenant_id: Uuid,
    lot_id: Uuid,
    new_remaining: i64,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE purchase_lots
        SET remaining_quantity = $3, updated_at = NOW()
        WHERE tenant_id = $1 AND lot_id = $2
          AND $3 >= 0 AND $3 <= original_quantity
        "#,
    )
    .bind(tenant_id)
    .bind(lot_id)
    .bind(new_remaining)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to update lot quantity: {}", e)))?;

    if result.rows_affected() != 1 {
        return Err(AppError::InternalError(format!(
            "lot {} rejected remaining_quantity {}",
            lot_id, new_remaining
        )));
    }
    Ok(())
}

#[async_trait]
impl RunRepository for PgRunRepository {
    async fn create(&self, run: &CogsRun) -> Result<CogsRun, AppError> {
        let row = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            INSERT INTO cogs_runs (
                run_id, tenant_id, status, mode, started_at, completed_at,
                rolled_back_at, error_message, input_file_id, sales_processed,
                movements_recorded, validation_error_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(run.run_id)
        .bind(run.tenant_id)
        .bind(run.status.as_str())
        .bind(run.mode.as_str())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.rolled_back_at)
        .bind(&run.error_message)
        .bind(run.input_file_id)
        .bind(run.sales_processed)
        .bind(run.movements_recorded)
        .bind(run.validation_error_count)
        .bind(run.created_at)
        .bind(run.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::IllegalState(format!("run {} already exists", run.run_id))
            },
            other => AppError::DatabaseError(format!("Failed to create run: {}", other)),
        })?;

        Ok(row.into())
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
        error_message: Option<String>,
    ) -> Result<CogsRun, AppError> {
        if !from.can_transition_to(to) {
            return Err(AppError::IllegalState(format!(
                "run {} cannot transition {} -> {}",
                run_id,
                from.as_str(),
                to.as_str()
            )));
        }

        let completed_at = to.is_terminal().then(Utc::now);
        let row = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            UPDATE cogs_runs
            SET status = $1,
                error_message = COALESCE($2, error_message),
                completed_at = COALESCE($3, completed_at),
                updated_at = NOW()
            WHERE tenant_id = $4 AND run_id = $5 AND status = $6
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(to.as_str())
        .bind(&error_message)
        .bind(completed_at)
        .bind(tenant_id)
        .bind(run_id)
        .bind(from.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to transition run: {}", e)))?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                // CAS failed: unknown run or concurrent status change.
                let current = self.get(tenant_id, run_id).await?;
                Err(AppError::IllegalState(format!(
                    "run {} is {} (expected {})",
                    run_id,
                    current.status.as_str(),
                    from.as_str()
                )))
            },
        }
    }

    async fn get(&self, tenant_id: Uuid, run_id: Uuid) -> Result<CogsRun, AppError> {
        let row = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM cogs_runs
            WHERE tenant_id = $1 AND run_id = $2
            "#
        ))
        .bind(tenant_id)
        .bind(run_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch run: {}", e)))?;

        row.map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))
    }

    async fn list(&self, tenant_id: Uuid, filter: &RunFilter) -> Result<Vec<CogsRun>, AppError> {
        let limit = filter.limit.unwrap_or(100).clamp(1, 500);
        let offset = filter.offset.unwrap_or(0).max(0);

        let rows: Vec<RunRow> = match filter.status {
            Some(status) => {
                sqlx::query_as::<_, RunRow>(&format!(
                    r#"
                    SELECT {RUN_COLUMNS}
                    FROM cogs_runs
                    WHERE tenant_id = $1 AND status = $2
                    ORDER BY started_at DESC
                    LIMIT $3 OFFSET $4
                    "#
                ))
                .bind(tenant_id)
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&*self.pool)
                .await
            },
            None => {
                sqlx::query_as::<_, RunRow>(&format!(
                    r#"
                    SELECT {RUN_COLUMNS}
                    FROM cogs_runs
                    WHERE tenant_id = $1
                    ORDER BY started_at DESC
                    LIMIT $2 OFFSET $3
                    "#
                ))
                .bind(tenant_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&*self.pool)
                .await
            },
        }
        .map_err(|e| AppError::DatabaseError(format!("Failed to list runs: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn commit_completed_run(
        &self,
        tenant_id: Uuid,
        commit: CompletedRunCommit,
    ) -> Result<CogsRun, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        // CAS first: if the run is no longer running, nothing else happens.
        let row = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            UPDATE cogs_runs
            SET status = 'completed',
                completed_at = $1,
                sales_processed = $2,
                movements_recorded = $3,
                validation_error_count = $4,
                updated_at = NOW()
            WHERE tenant_id = $5 AND run_id = $6 AND status = 'running'
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(commit.completed_at)
        .bind(commit.counters.sales_processed)
        .bind(commit.counters.movements_recorded)
        .bind(commit.counters.validation_error_count)
        .bind(tenant_id)
        .bind(commit.run_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to complete run: {}", e)))?
        .ok_or_else(|| {
            AppError::IllegalState(format!("run {} is not running", commit.run_id))
        })?;

        for movement in &commit.movements {
            insert_movement(&mut tx, movement).await?;
        }
        for entry in &commit.attributions {
            insert_attribution(&mut tx, entry).await?;
        }
        for summary in &commit.summaries {
            insert_summary(&mut tx, summary).await?;
        }
        for issue in &commit.issues {
            insert_issue(&mut tx, issue).await?;
        }
        for (lot_id, new_remaining) in &commit.lot_updates {
            apply_lot_update(&mut tx, tenant_id, *lot_id, *new_remaining).await?;
        }

        // Move the is_current pointers to this run's snapshot rows.
        sqlx::query(
            r#"
            UPDATE inventory_snapshots
            SET is_current = FALSE
            WHERE tenant_id = $1 AND is_current
              AND lot_id IN (
                  SELECT lot_id FROM inventory_snapshots
                  WHERE tenant_id = $1 AND run_id = $2
              )
            "#,
        )
        .bind(tenant_id)
        .bind(commit.run_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to retire snapshots: {}", e)))?;

        sqlx::query(
            r#"
            UPDATE inventory_snapshots
            SET is_current = TRUE
            WHERE tenant_id = $1 AND run_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(commit.run_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to promote snapshot: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;

        Ok(row.into())
    }

    async fn commit_rollback(
        &self,
        tenant_id: Uuid,
        commit: RollbackCommit,
    ) -> Result<CogsRun, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        let row = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            UPDATE cogs_runs
            SET status = 'rolled_back',
                rolled_back_at = $1,
                updated_at = NOW()
            WHERE tenant_id = $2 AND run_id = $3 AND status = 'completed'
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(commit.rolled_back_at)
        .bind(tenant_id)
        .bind(commit.run_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to roll back run: {}", e)))?
        .ok_or_else(|| {
            AppError::IllegalState(format!("run {} is not completed", commit.run_id))
        })?;

        for movement in &commit.movements {
            insert_movement(&mut tx, movement).await?;
        }
        for (lot_id, restored_remaining) in &commit.lot_restores {
            apply_lot_update(&mut tx, tenant_id, *lot_id, *restored_remaining).await?;
        }

        sqlx::query(
            r#"
            UPDATE cogs_attributions
            SET is_valid = FALSE
            WHERE tenant_id = $1 AND run_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(commit.run_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to invalidate attributions: {}", e)))?;

        sqlx::query(
            r#"
            UPDATE cogs_summaries
            SET is_valid = FALSE
            WHERE tenant_id = $1 AND run_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(commit.run_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to invalidate summaries: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;

        Ok(row.into())
    }
}
