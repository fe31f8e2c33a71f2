use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domains::cogs::{CogsRun, RunStatus, Sale};
use crate::dto::inventory::LotInput;

/// One sale row as submitted by the caller
///
/// `tenant_id` is optional; when present it must match the request scope or
/// the whole call is rejected before any state change.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaleInput {
    pub sale_id: Uuid,
    pub tenant_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub sku: String,
    pub sale_date: NaiveDate,
    /// Signed: positive = sale, negative = return
    pub quantity: i64,
}

impl SaleInput {
    pub fn into_sale(self, tenant_id: Uuid) -> Sale {
        Sale {
            sale_id: self.sale_id,
            tenant_id,
            sku: self.sku,
            sale_date: self.sale_date,
            quantity: self.quantity,
        }
    }
}

/// Request to execute one allocation run
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRunRequest {
    /// Client-supplied run id enables idempotent retries
    pub run_id: Option<Uuid>,
    /// Costing mode; only "fifo" is recognized today
    pub mode: String,
    #[validate(nested)]
    pub sales: Vec<SaleInput>,
    /// Lots to merge into the tenant's inventory before allocating
    #[validate(nested)]
    pub lots: Option<Vec<LotInput>>,
    pub input_file_id: Option<Uuid>,
}

/// Listing filter accepted by the read side
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListQuery {
    pub status: Option<RunStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Run record as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub run_id: Uuid,
    pub tenant_id: Uuid,
    pub status: RunStatus,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub sales_processed: i64,
    pub movements_recorded: i64,
    pub validation_error_count: i64,
}

impl From<CogsRun> for RunResponse {
    fn from(run: CogsRun) -> Self {
        Self {
            run_id: run.run_id,
            tenant_id: run.tenant_id,
            status: run.status,
            mode: run.mode.as_str().to_string(),
            started_at: run.started_at,
            completed_at: run.completed_at,
            rolled_back_at: run.rolled_back_at,
            error_message: run.error_message,
            sales_processed: run.sales_processed,
            movements_recorded: run.movements_recorded,
            validation_error_count: run.validation_error_count,
        }
    }
}
