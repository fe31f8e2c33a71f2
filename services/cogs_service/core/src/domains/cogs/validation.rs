use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-row validation error kinds
///
/// These are data, not exceptions: the allocator records them and continues,
/// and a completed run with a non-zero issue count is still a success.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum ValidationKind {
    InsufficientInventory,
    OverReturn,
    DateInversion,
    UnknownSku,
    LotConflict,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::InsufficientInventory => "insufficient_inventory",
            ValidationKind::OverReturn => "over_return",
            ValidationKind::DateInversion => "date_inversion",
            ValidationKind::UnknownSku => "unknown_sku",
            ValidationKind::LotConflict => "lot_conflict",
        }
    }
}

impl From<String> for ValidationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "insufficient_inventory" => ValidationKind::InsufficientInventory,
            "over_return" => ValidationKind::OverReturn,
            "date_inversion" => ValidationKind::DateInversion,
            "lot_conflict" => ValidationKind::LotConflict,
            _ => ValidationKind::UnknownSku,
        }
    }
}

/// A recorded per-row validation error, persisted with the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub issue_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    pub run_id: Uuid,
    pub kind: ValidationKind,

    pub sku: Option<String>,
    pub sale_id: Option<Uuid>,
    pub lot_id: Option<Uuid>,
    pub quantity: Option<i64>,

    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl ValidationIssue {
    fn new(tenant_id: Uuid, run_id: Uuid, kind: ValidationKind, message: String) -> Self {
        Self {
            issue_id: Uuid::now_v7(),
            tenant_id,
            run_id,
            kind,
            sku: None,
            sale_id: None,
            lot_id: None,
            quantity: None,
            message,
            recorded_at: Utc::now(),
        }
    }

    pub fn insufficient_inventory(
        tenant_id: Uuid,
        run_id: Uuid,
        sku: &str,
        sale_id: Uuid,
        shortfall: i64,
    ) -> Self {
        let mut issue = Self::new(
            tenant_id,
            run_id,
            ValidationKind::InsufficientInventory,
            format!("sale {} short {} units of {}", sale_id, shortfall, sku),
        );
        issue.sku = Some(sku.to_string());
        issue.sale_id = Some(sale_id);
        issue.quantity = Some(shortfall);
        issue
    }

    pub fn over_return(
        tenant_id: Uuid,
        run_id: Uuid,
        sku: &str,
        sale_id: Uuid,
        unrestored: i64,
    ) -> Self {
        let mut issue = Self::new(
            tenant_id,
            run_id,
            ValidationKind::OverReturn,
            format!(
                "return {} exceeds consumed capacity of {} by {} units",
                sale_id, sku, unrestored
            ),
        );
        issue.sku = Some(sku.to_string());
        issue.sale_id = Some(sale_id);
        issue.quantity = Some(unrestored);
        issue
    }

    pub fn date_inversion(
        tenant_id: Uuid,
        run_id: Uuid,
        sku: &str,
        sale_id: Uuid,
        skipped_units: i64,
    ) -> Self {
        let mut issue = Self::new(
            tenant_id,
            run_id,
            ValidationKind::DateInversion,
            format!(
                "sale {} predates the receipt of {} available units of {}",
                sale_id, skipped_units, sku
            ),
        );
        issue.sku = Some(sku.to_string());
        issue.sale_id = Some(sale_id);
        issue.quantity = Some(skipped_units);
        issue
    }

    pub fn unknown_sku(tenant_id: Uuid, run_id: Uuid, sku: &str, sale_id: Uuid) -> Self {
        let mut issue = Self::new(
            tenant_id,
            run_id,
            ValidationKind::UnknownSku,
            format!("sale {} references sku {} with no lots on record", sale_id, sku),
        );
        issue.sku = Some(sku.to_string());
        issue.sale_id = Some(sale_id);
        issue
    }

    pub fn lot_conflict(tenant_id: Uuid, run_id: Uuid, lot_id: Uuid, message: String) -> Self {
        let mut issue = Self::new(tenant_id, run_id, ValidationKind::LotConflict, message);
        issue.lot_id = Some(lot_id);
        issue
    }
}
