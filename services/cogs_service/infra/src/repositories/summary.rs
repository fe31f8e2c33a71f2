//! PostgreSQL implementation of SummaryRepository

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::CogsSummary;
use cogs_service_core::repositories::SummaryRepository;
use shared_error::AppError;

/// PostgreSQL implementation of SummaryRepository
pub struct PgSummaryRepository {
    pool: Arc<PgPool>,
}

impl PgSummaryRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Helper struct for summary SQL results
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    summary_id: Uuid,
    tenant_id: Uuid,
    run_id: Uuid,
    sku: String,
    period: String,
    total_quantity_sold: i64,
    total_cogs: Decimal,
    average_unit_cost: Decimal,
    is_valid: bool,
}

impl From<SummaryRow> for CogsSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            summary_id: row.summary_id,
            tenant_id: row.tenant_id,
            run_id: row.run_id,
            sku: row.sku,
            period: row.period,
            total_quantity_sold: row.total_quantity_sold,
            total_cogs: row.total_cogs,
            average_unit_cost: row.average_unit_cost,
            is_valid: row.is_valid,
        }
    }
}

/// Insert one summary inside an open transaction; shared with PgRunRepository
pub(crate) async fn insert_summary(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    summary: &CogsSummary,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO cogs_summaries (
            summary_id, tenant_id, run_id, sku, period,
            total_quantity_sold, total_cogs, average_unit_cost, is_valid
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(summary.summary_id)
    .bind(summary.tenant_id)
    .bind(summary.run_id)
    .bind(&summary.sku)
    .bind(&summary.period)
    .bind(summary.total_quantity_sold)
    .bind(summary.total_cogs)
    .bind(summary.average_unit_cost)
    .bind(summary.is_valid)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to write summary: {}", e)))?;
    Ok(())
}

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    async fn write_all(&self, tenant_id: Uuid, summaries: &[CogsSummary]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for summary in summaries {
            if summary.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "summary {} belongs to tenant {}",
                    summary.summary_id, summary.tenant_id
                )));
            }
            insert_summary(&mut tx, summary).await?;
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
    ) -> Result<Vec<CogsSummary>, AppError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT summary_id, tenant_id, run_id, sku, period,
                   total_quantity_sold, total_cogs, average_unit_cost, is_valid
            FROM cogs_summaries
            WHERE tenant_id = $1 AND run_id = $2
            ORDER BY sku, period
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read summaries: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn invalidate_by_run(&self, tenant_id: Uuid, run_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE cogs_summaries
            SET is_valid = FALSE
            WHERE tenant_id = $1 AND run_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to invalidate summaries: {}", e)))?;
        Ok(())
    }
}
