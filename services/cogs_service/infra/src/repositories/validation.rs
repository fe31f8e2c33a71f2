//! PostgreSQL implementation of ValidationIssueRepository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{ValidationIssue, ValidationKind};
use cogs_service_core::repositories::ValidationIssueRepository;
use shared_error::AppError;

/// PostgreSQL implementation of ValidationIssueRepository
pub struct PgValidationIssueRepository {
    pool: Arc<PgPool>,
}

impl PgValidationIssueRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Helper struct for validation issue SQL results
#[derive(Debug, sqlx::FromRow)]
struct IssueRow {
    issue_id: Uuid,
    tenant_id: Uuid,
    run_id: Uuid,
    kind: String,
    sku: Option<String>,
    sale_id: Option<Uuid>,
    lot_id: Option<Uuid>,
    quantity: Option<i64>,
    message: String,
    recorded_at: chrono::DateTime<Utc>,
}

impl From<IssueRow> for ValidationIssue {
    fn from(row: IssueRow) -> Self {
        Self {
            issue_id: row.issue_id,
            tenant_id: row.tenant_id,
            run_id: row.run_id,
            kind: ValidationKind::from(row.kind),
            sku: row.sku,
            sale_id: row.sale_id,
            lot_id: row.lot_id,
            quantity: row.quantity,
            message: row.message,
            recorded_at: row.recorded_at,
        }
    }
}

/// Insert one issue inside an open transaction; shared with PgRunRepository
pub(crate) async fn insert_issue(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    issue: &ValidationIssue,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO validation_issues (
            issue_id, tenant_id, run_id, kind, sku, sale_id, lot_id,
            quantity, message, recorded_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(issue.issue_id)
    .bind(issue.tenant_id)
    .bind(issue.run_id)
    .bind(issue.kind.as_str())
    .bind(&issue.sku)
    .bind(issue.sale_id)
    .bind(issue.lot_id)
    .bind(issue.quantity)
    .bind(&issue.message)
    .bind(issue.recorded_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to write validation issue: {}", e)))?;
    Ok(())
}

#[async_trait]
impl ValidationIssueRepository for PgValidationIssueRepository {
    async fn write_all(&self, tenant_id: Uuid, issues: &[ValidationIssue]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for issue in issues {
            if issue.tenant_id != tenant_id {
                return Err(AppError::TenantMismatch(format!(
                    "issue {} belongs to tenant {}",
                    issue.issue_id, issue.tenant_id
                )));
            }
            insert_issue(&mut tx, issue).await?;
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
    ) -> Result<Vec<ValidationIssue>, AppError> {
        let rows = sqlx::query_as::<_, IssueRow>(
            r#"
            SELECT issue_id, tenant_id, run_id, kind, sku, sale_id, lot_id,
                   quantity, message, recorded_at
            FROM validation_issues
            WHERE tenant_id = $1 AND run_id = $2
            ORDER BY recorded_at, issue_id
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read validation issues: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
