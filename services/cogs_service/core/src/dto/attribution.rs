use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::cogs::{
    AttributionWithDetails, CogsAttributionDetail, CogsSummary, InventoryMovement,
};
use crate::dto::common::PaginationInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionDetailResponse {
    pub lot_id: Uuid,
    pub quantity_allocated: i64,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

impl From<CogsAttributionDetail> for AttributionDetailResponse {
    fn from(detail: CogsAttributionDetail) -> Self {
        Self {
            lot_id: detail.lot_id,
            quantity_allocated: detail.quantity_allocated,
            unit_cost: detail.unit_cost,
            total_cost: detail.total_cost,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionResponse {
    pub attribution_id: Uuid,
    pub run_id: Uuid,
    pub sale_id: Uuid,
    pub sku: String,
    pub sale_date: NaiveDate,
    pub quantity_sold: i64,
    pub total_cogs: Decimal,
    pub average_unit_cost: Decimal,
    pub is_valid: bool,
    pub details: Vec<AttributionDetailResponse>,
}

impl From<AttributionWithDetails> for AttributionResponse {
    fn from(entry: AttributionWithDetails) -> Self {
        Self {
            attribution_id: entry.attribution.attribution_id,
            run_id: entry.attribution.run_id,
            sale_id: entry.attribution.sale_id,
            sku: entry.attribution.sku,
            sale_date: entry.attribution.sale_date,
            quantity_sold: entry.attribution.quantity_sold,
            total_cogs: entry.attribution.total_cogs,
            average_unit_cost: entry.attribution.average_unit_cost,
            is_valid: entry.attribution.is_valid,
            details: entry.details.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionListResponse {
    pub attributions: Vec<AttributionResponse>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub sku: String,
    pub period: String,
    pub total_quantity_sold: i64,
    pub total_cogs: Decimal,
    pub average_unit_cost: Decimal,
    pub is_valid: bool,
}

impl From<CogsSummary> for SummaryResponse {
    fn from(summary: CogsSummary) -> Self {
        Self {
            sku: summary.sku,
            period: summary.period,
            total_quantity_sold: summary.total_quantity_sold,
            total_cogs: summary.total_cogs,
            average_unit_cost: summary.average_unit_cost,
            is_valid: summary.is_valid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    pub movement_id: Uuid,
    pub run_id: Uuid,
    pub lot_id: Uuid,
    pub sku: String,
    pub kind: String,
    pub quantity: i64,
    pub remaining_after: i64,
    pub unit_cost: Decimal,
    pub reference_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl From<InventoryMovement> for MovementResponse {
    fn from(movement: InventoryMovement) -> Self {
        Self {
            movement_id: movement.movement_id,
            run_id: movement.run_id,
            lot_id: movement.lot_id,
            sku: movement.sku,
            kind: movement.kind.as_str().to_string(),
            quantity: movement.quantity,
            remaining_after: movement.remaining_after,
            unit_cost: movement.unit_cost,
            reference_id: movement.reference_id,
            recorded_at: movement.recorded_at,
        }
    }
}
