//! PostgreSQL implementation of SnapshotRepository

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::InventorySnapshot;
use cogs_service_core::repositories::SnapshotRepository;
use shared_error::AppError;

/// PostgreSQL implementation of SnapshotRepository
pub struct PgSnapshotRepository {
    pool: Arc<PgPool>,
}

impl PgSnapshotRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Helper struct for snapshot SQL results
#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    snapshot_id: Uuid,
    tenant_id: Uuid,
    run_id: Uuid,
    lot_id: Uuid,
    sku: String,
    received_date: NaiveDate,
    original_quantity: i64,
    remaining_quantity: i64,
    unit_price: Decimal,
    freight_cost_per_unit: Decimal,
    is_current: bool,
    captured_at: chrono::DateTime<Utc>,
}

impl From<SnapshotRow> for InventorySnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            snapshot_id: row.snapshot_id,
            tenant_id: row.tenant_id,
            run_id: row.run_id,
            lot_id: row.lot_id,
            sku: row.sku,
            received_date: row.received_date,
            original_quantity: row.original_quantity,
            remaining_quantity: row.remaining_quantity,
            unit_price: row.unit_price,
            freight_cost_per_unit: row.freight_cost_per_unit,
            is_current: row.is_current,
            captured_at: row.captured_at,
        }
    }
}

const SNAPSHOT_COLUMNS: &str = "snapshot_id, tenant_id, run_id, lot_id, sku, received_date, \
                                original_quantity, remaining_quantity, unit_price, \
                                freight_cost_per_unit, is_current, captured_at";

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn write_snapshot(
        &self,
        tenant_id: Uuid,
        snapshots: &[InventorySnapshot],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for snapshot in snapshots {
            if snapshot.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "snapshot {} belongs to tenant {}",
                    snapshot.snapshot_id, snapshot.tenant_id
                )));
            }
            sqlx::query(
                r#"
                INSERT INTO inventory_snapshots (
                    snapshot_id, tenant_id, run_id, lot_id, sku, received_date,
                    original_quantity, remaining_quantity, unit_price,
                    freight_cost_per_unit, is_current, captured_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(snapshot.snapshot_id)
            .bind(snapshot.tenant_id)
            .bind(snapshot.run_id)
            .bind(snapshot.lot_id)
            .bind(&snapshot.sku)
            .bind(snapshot.received_date)
            .bind(snapshot.original_quantity)
            .bind(snapshot.remaining_quantity)
            .bind(snapshot.unit_price)
            .bind(snapshot.freight_cost_per_unit)
            .bind(snapshot.is_current)
            .bind(snapshot.captured_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to write snapshot: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn read_snapshot(
        &self,
        tenant_id: Uuid,
        run_id: Uuid,
    ) -> Result<Vec<InventorySnapshot>, AppError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM inventory_snapshots
            WHERE tenant_id = $1 AND run_id = $2
            ORDER BY lot_id
            "#
        ))
        .bind(tenant_id)
        .bind(run_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read snapshot: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn current_snapshot(&self, tenant_id: Uuid) -> Result<Vec<InventorySnapshot>, AppError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM inventory_snapshots
            WHERE tenant_id = $1 AND is_current
            ORDER BY lot_id
            "#
        ))
        .bind(tenant_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read current snapshot: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
