//! PostgreSQL implementation of LotRepository

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::PurchaseLot;
use cogs_service_core::repositories::LotRepository;
use shared_error::AppError;

/// PostgreSQL implementation of LotRepository
pub struct PgLotRepository {
    pool: Arc<PgPool>,
}

impl PgLotRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Helper struct for lot SQL results
#[derive(Debug, sqlx::FromRow)]
struct LotRow {
    lot_id: Uuid,
    tenant_id: Uuid,
    sku: String,
    received_date: NaiveDate,
    original_quantity: i64,
    remaining_quantity: i64,
    unit_price: Decimal,
    freight_cost_per_unit: Decimal,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<LotRow> for PurchaseLot {
    fn from(row: LotRow) -> Self {
        Self {
            lot_id: row.lot_id,
            tenant_id: row.tenant_id,
            sku: row.sku,
            received_date: row.received_date,
            original_quantity: row.original_quantity,
            remaining_quantity: row.remaining_quantity,
            unit_price: row.unit_price,
            freight_cost_per_unit: row.freight_cost_per_unit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const LOT_COLUMNS: &str = "lot_id, tenant_id, sku, received_date, original_quantity, \
                           remaining_quantity, unit_price, freight_cost_per_unit, \
                           created_at, updated_at";

#[async_trait]
impl LotRepository for PgLotRepository {
    async fn load_current_inventory(
        &self,
        tenant_id: Uuid,
        skus: Option<&[String]>,
    ) -> Result<Vec<PurchaseLot>, AppError> {
        let rows: Vec<LotRow> = match skus {
            Some(skus) => {
                sqlx::query_as::<_, LotRow>(&format!(
                    r#"
                    SELECT {LOT_COLUMNS}
                    FROM purchase_lots
                    WHERE tenant_id = $1 AND sku = ANY($2)
                    ORDER BY received_date, lot_id
                    "#
                ))
                .bind(tenant_id)
                .bind(skus)
                .fetch_all(&*self.pool)
                .await
            },
            None => {
                sqlx::query_as::<_, LotRow>(&format!(
                    r#"
                    SELECT {LOT_COLUMNS}
                    FROM purchase_lots
                    WHERE tenant_id = $1
                    ORDER BY received_date, lot_id
                    "#
                ))
                .bind(tenant_id)
                .fetch_all(&*self.pool)
                .await
            },
        }
        .map_err(|e| AppError::DatabaseError(format!("Failed to load inventory: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_lots(&self, tenant_id: Uuid, lots: &[PurchaseLot]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for lot in lots {
            if lot.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "lot {} belongs to tenant {}",
                    lot.lot_id, lot.tenant_id
                )));
            }
            sqlx::query(
                r#"
                INSERT INTO purchase_lots (
                    lot_id, tenant_id, sku, received_date, original_quantity,
                    remaining_quantity, unit_price, freight_cost_per_unit,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (tenant_id, lot_id) DO UPDATE SET
                    sku = EXCLUDED.sku,
                    received_date = EXCLUDED.received_date,
                    original_quantity = EXCLUDED.original_quantity,
                    remaining_quantity = EXCLUDED.remaining_quantity,
                    unit_price = EXCLUDED.unit_price,
                    freight_cost_per_unit = EXCLUDED.freight_cost_per_unit,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(lot.lot_id)
            .bind(lot.tenant_id)
            .bind(&lot.sku)
            .bind(lot.received_date)
            .bind(lot.original_quantity)
            .bind(lot.remaining_quantity)
            .bind(lot.unit_price)
            .bind(lot.freight_cost_per_unit)
            .bind(lot.created_at)
            .bind(lot.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to upsert lot: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn find_by_ids(
        &self,
        tenant_id: Uuid,
        lot_ids: &[Uuid],
    ) -> Result<Vec<PurchaseLot>, AppError> {
        let rows = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            SELECT {LOT_COLUMNS}
            FROM purchase_lots
            WHERE tenant_id = $1 AND lot_id = ANY($2)
            ORDER BY received_date, lot_id
            "#
        ))
        .bind(tenant_id)
        .bind(lot_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch lots: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
