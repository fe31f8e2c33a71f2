use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-sale cost attribution
///
/// `is_valid = false` marks attributions that were only partially fulfilled
/// or that belong to a rolled-back run. Returns are recorded as attributions
/// with negative `quantity_sold` and negative `total_cogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CogsAttribution {
    pub attribution_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    pub run_id: Uuid,
    pub sale_id: Uuid,
    pub sku: String,
    pub sale_date: NaiveDate,

    pub quantity_sold: i64,
    pub total_cogs: Decimal,
    pub average_unit_cost: Decimal,

    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

/// One lot's contribution to an attribution
///
/// Invariant: `total_cost = quantity_allocated * unit_cost`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CogsAttributionDetail {
    pub detail_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    pub attribution_id: Uuid,
    pub lot_id: Uuid,

    pub quantity_allocated: i64,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

impl CogsAttributionDetail {
    pub fn new(
        tenant_id: Uuid,
        attribution_id: Uuid,
        lot_id: Uuid,
        quantity_allocated: i64,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            detail_id: Uuid::now_v7(),
            tenant_id,
            attribution_id,
            lot_id,
            quantity_allocated,
            unit_cost,
            total_cost: Decimal::from(quantity_allocated) * unit_cost,
        }
    }
}

/// An attribution together with its lot-level detail rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionWithDetails {
    pub attribution: CogsAttribution,
    pub details: Vec<CogsAttributionDetail>,
}
