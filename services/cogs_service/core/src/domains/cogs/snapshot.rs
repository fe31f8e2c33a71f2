use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::cogs::lot::PurchaseLot;

/// Immutable pre-run capture of one lot's state
///
/// Written once per `(run_id, lot_id)` before the run's writes. The
/// `is_current` flag marks the snapshot generation that matches the baseline
/// of the latest committed run; exactly one row per `(tenant_id, lot_id)`
/// carries it, and the pointer moves atomically at run commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub snapshot_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    pub run_id: Uuid,
    pub lot_id: Uuid,
    pub sku: String,

    /// Lot attributes copied by value; no back-pointers
    pub received_date: NaiveDate,
    pub original_quantity: i64,
    pub remaining_quantity: i64,
    pub unit_price: Decimal,
    pub freight_cost_per_unit: Decimal,

    pub is_current: bool,
    pub captured_at: DateTime<Utc>,
}

impl InventorySnapshot {
    /// Capture a lot's current state for `run_id`
    pub fn of_lot(run_id: Uuid, lot: &PurchaseLot) -> Self {
        Self {
            snapshot_id: Uuid::now_v7(),
            tenant_id: lot.tenant_id,
            run_id,
            lot_id: lot.lot_id,
            sku: lot.sku.clone(),
            received_date: lot.received_date,
            original_quantity: lot.original_quantity,
            remaining_quantity: lot.remaining_quantity,
            unit_price: lot.unit_price,
            freight_cost_per_unit: lot.freight_cost_per_unit,
            is_current: false,
            captured_at: Utc::now(),
        }
    }

    /// Reconstruct the captured lot state, used when restoring from snapshot
    pub fn to_lot(&self) -> PurchaseLot {
        PurchaseLot {
            lot_id: self.lot_id,
            tenant_id: self.tenant_id,
            sku: self.sku.clone(),
            received_date: self.received_date,
            original_quantity: self.original_quantity,
            remaining_quantity: self.remaining_quantity,
            unit_price: self.unit_price,
            freight_cost_per_unit: self.freight_cost_per_unit,
            created_at: self.captured_at,
            updated_at: self.captured_at,
        }
    }
}
