//! PostgreSQL implementation of AttributionRepository

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{
    AttributionWithDetails, CogsAttribution, CogsAttributionDetail,
};
use cogs_service_core::repositories::AttributionRepository;
use shared_error::AppError;

/// PostgreSQL implementation of AttributionRepository
pub struct PgAttributionRepository {
    pool: Arc<PgPool>,
}

impl PgAttributionRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Helper struct for attribution SQL results
#[derive(Debug, sqlx::FromRow)]
struct AttributionRow {
    attribution_id: Uuid,
    tenant_id: Uuid,
    run_id: Uuid,
    sale_id: Uuid,
    sku: String,
    sale_date: NaiveDate,
    quantity_sold: i64,
    total_cogs: Decimal,
    average_unit_cost: Decimal,
    is_valid: bool,
    created_at: chrono::DateTime<Utc>,
}

impl From<AttributionRow> for CogsAttribution {
    fn from(row: AttributionRow) -> Self {
        Self {
            attribution_id: row.attribution_id,
            tenant_id: row.tenant_id,
            run_id: row.run_id,
            sale_id: row.sale_id,
            sku: row.sku,
            sale_date: row.sale_date,
            quantity_sold: row.quantity_sold,
            total_cogs: row.total_cogs,
            average_unit_cost: row.average_unit_cost,
            is_valid: row.is_valid,
            created_at: row.created_at,
        }
    }
}

/// Helper struct for detail SQL results
#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    detail_id: Uuid,
    tenant_id: Uuid,
    attribution_id: Uuid,
    lot_id: Uuid,
    quantity_allocated: i64,
    unit_cost: Decimal,
    total_cost: Decimal,
}

impl From<DetailRow> for CogsAttributionDetail {
    fn from(row: DetailRow) -> Self {
        Self {
            detail_id: row.detail_id,
            tenant_id: row.tenant_id,
            attribution_id: row.attribution_id,
            lot_id: row.lot_id,
            quantity_allocated: row.quantity_allocated,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
        }
    }
}

/// Insert one attribution with its details inside an open transaction
pub(crate) async fn insert_attribution(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &AttributionWithDetails,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO cogs_attributions (
            attribution_id, tenant_id, run_id, sale_id, sku, sale_date,
            quantity_sold, total_cogs, average_unit_cost, is_valid, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(entry.attribution.attribution_id)
    .bind(entry.attribution.tenant_id)
    .bind(entry.attribution.run_id)
    .bind(entry.attribution.sale_id)
    .bind(&entry.attribution.sku)
    .bind(entry.attribution.sale_date)
    .bind(entry.attribution.quantity_sold)
    .bind(entry.attribution.total_cogs)
    .bind(entry.attribution.average_unit_cost)
    .bind(entry.attribution.is_valid)
    .bind(entry.attribution.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to write attribution: {}", e)))?;

    for detail in &entry.details {
        sqlx::query(
            r#"
            INSERT INTO cogs_attribution_details (
                detail_id, tenant_id, attribution_id, lot_id,
                quantity_allocated, unit_cost, total_cost
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(detail.detail_id)
        .bind(detail.tenant_id)
        .bind(detail.attribution_id)
        .bind(detail.lot_id)
        .bind(detail.quantity_allocated)
        .bind(detail.unit_cost)
        .bind(detail.total_cost)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to write attribution detail: {}", e))
        })?;
    }
    Ok(())
}

#[async_trait]
impl AttributionRepository for PgAttributionRepository {
    async fn write_all(
        &self,
        tenant_id: Uuid,
        attributions: &[AttributionWithDetails],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for entry in attributions {
            if entry.attribution.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "attribution {} belongs to tenant {}",
                    entry.attribution.attribution_id, entry.attribution.tenant_id
                )));
            }
            insert_attribution(&mut tx, entry).await?;
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
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AttributionWithDetails>, AppError> {
        let rows = sqlx::query_as::<_, AttributionRow>(
            r#"
            SELECT attribution_id, tenant_id, run_id, sale_id, sku, sale_date,
                   quantity_sold, total_cogs, average_unit_cost, is_valid, created_at
            FROM cogs_attributions
            WHERE tenant_id = $1 AND run_id = $2
            ORDER BY sale_date, sale_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read attributions: {}", e)))?;

        let attribution_ids: Vec<Uuid> = rows.iter().map(|r| r.attribution_id).collect();
        let detail_rows = sqlx::query_as::<_, DetailRow>(
            r#"
            SELECT detail_id, tenant_id, attribution_id, lot_id,
                   quantity_allocated, unit_cost, total_cost
            FROM cogs_attribution_details
            WHERE tenant_id = $1 AND attribution_id = ANY($2)
            ORDER BY detail_id
            "#,
        )
        .bind(tenant_id)
        .bind(&attribution_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to read attribution details: {}", e))
        })?;

        let mut details_by_attribution: std::collections::HashMap<Uuid, Vec<CogsAttributionDetail>> =
            std::collections::HashMap::new();
        for row in detail_rows {
            details_by_attribution
                .entry(row.attribution_id)
                .or_default()
                .push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let details = details_by_attribution.remove(&row.attribution_id).unwrap_or_default();
                AttributionWithDetails {
                    attribution: row.into(),
                    details,
                }
            })
            .collect())
    }

    async fn count_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM cogs_attributions
            WHERE tenant_id = $1 AND run_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count attributions: {}", e)))?;

        Ok(count as u64)
    }

    async fn invalidate_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE cogs_attributions
            SET is_valid = FALSE
            WHERE tenant_id = $1 AND run_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to invalidate attributions: {}", e)))?;
        Ok(())
    }
}
