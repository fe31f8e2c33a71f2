use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domains::cogs::PurchaseLot;

/// One lot row as submitted by the caller
///
/// `remaining_quantity` defaults to `original_quantity` for new lots. For
/// known lot ids the merge policy decides; the coordinator never silently
/// overwrites a lot's remaining quantity from user input mid-run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LotInput {
    pub lot_id: Uuid,
    pub tenant_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub sku: String,
    pub received_date: NaiveDate,
    pub original_quantity: i64,
    pub remaining_quantity: Option<i64>,
    pub unit_price: Decimal,
    pub freight_cost_per_unit: Decimal,
}

impl LotInput {
    pub fn into_lot(self, tenant_id: Uuid) -> PurchaseLot {
        let remaining = self.remaining_quantity.unwrap_or(self.original_quantity);
        let mut lot = PurchaseLot::new(
            tenant_id,
            self.sku,
            self.received_date,
            self.original_quantity,
            self.unit_price,
            self.freight_cost_per_unit,
        );
        lot.lot_id = self.lot_id;
        lot.remaining_quantity = remaining;
        lot
    }
}

/// Lot as returned by the read side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotResponse {
    pub lot_id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub received_date: NaiveDate,
    pub original_quantity: i64,
    pub remaining_quantity: i64,
    pub unit_price: Decimal,
    pub freight_cost_per_unit: Decimal,
    pub effective_unit_cost: Decimal,
}

impl From<PurchaseLot> for LotResponse {
    fn from(lot: PurchaseLot) -> Self {
        let effective_unit_cost = lot.effective_unit_cost();
        Self {
            lot_id: lot.lot_id,
            tenant_id: lot.tenant_id,
            sku: lot.sku,
            received_date: lot.received_date,
            original_quantity: lot.original_quantity,
            remaining_quantity: lot.remaining_quantity,
            unit_price: lot.unit_price,
            freight_cost_per_unit: lot.freight_cost_per_unit,
            effective_unit_cost,
        }
    }
}
