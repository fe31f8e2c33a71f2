//! PostgreSQL implementation of MovementRepository
//!
//! The journal table carries a `seq` bigserial so reads reproduce the exact
//! emission order even when entries share a timestamp.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{InventoryMovement, MovementKind};
use cogs_service_core::repositories::MovementRepository;
use shared_error::AppError;

/// PostgreSQL implementation of MovementRepository
pub struct PgMovementRepository {
    pool: Arc<PgPool>,
}

impl PgMovementRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Helper struct for movement SQL results
#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    movement_id: Uuid,
    tenant_id: Uuid,
    run_id: Uuid,
    lot_id: Uuid,
    sku: String,
    kind: String,
    quantity: i64,
    remaining_after: i64,
    unit_cost: Decimal,
    reference_id: Uuid,
    recorded_at: chrono::DateTime<Utc>,
}

impl From<MovementRow> for InventoryMovement {
    fn from(row: MovementRow) -> Self {
        Self {
            movement_id: row.movement_id,
            tenant_id: row.tenant_id,
            run_id: row.run_id,
            lot_id: row.lot_id,
            sku: row.sku,
            kind: MovementKind::from(row.kind),
            quantity: row.quantity,
            remaining_after: row.remaining_after,
            unit_cost: row.unit_cost,
            reference_id: row.reference_id,
            recorded_at: row.recorded_at,
        }
    }
}

/// Append one movement inside an open transaction; shared with PgRunRepository
pub(crate) async fn insert_movement(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    movement: &InventoryMovement,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            movement_id, tenant_id, run_id, lot_id, sku, kind, quantity,
            remaining_after, unit_cost, reference_id, recorded_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(movement.movement_id)
    .bind(movement.tenant_id)
    .bind(movement.run_id)
    .bind(movement.lot_id)
    .bind(&movement.sku)
    .bind(movement.kind.as_str())
    .bind(movement.quantity)
    .bind(movement.remaining_after)
    .bind(movement.unit_cost)
    .bind(movement.reference_id)
    .bind(movement.recorded_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to append movement: {}", e)))?;
    Ok(())
}

#[async_trait]
impl MovementRepository for PgMovementRepository {
    async fn append(
        &self,
        tenant_id: Uuid,
        movements: &[InventoryMovement],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for movement in movements {
            if movement.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "movement {} belongs to tenant {}",
                    movement.movement_id, movement.tenant_id
                )));
            }
            insert_movement(&mut tx, movement).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn find_by_run(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT movement_id, tenant_id, run_id, lot_id, sku, kind, quantity,
                   remaining_after, unit_cost, reference_id, recorded_at
            FROM inventory_movements
            WHERE tenant_id = $1 AND run_id = $2
            ORDER BY seq
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read movements: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
