use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Purchase lot domain entity: one inventory arrival of a single SKU
///
/// `remaining_quantity` is mutated only by the run coordinator during a run
/// or by the rollback engine during a rollback. Lots are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLot {
    /// Primary key using UUID v7 (timestamp-based)
    pub lot_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 100))]
    pub sku: String,

    /// Date the lot arrived; drives the FIFO ordering
    pub received_date: NaiveDate,

    /// Quantities: 0 <= remaining_quantity <= original_quantity
    pub original_quantity: i64,
    pub remaining_quantity: i64,

    /// Costs per unit, 4 decimal places
    pub unit_price: Decimal,
    pub freight_cost_per_unit: Decimal,

    /// Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseLot {
    /// Create a new lot with all units remaining
    pub fn new(
        tenant_id: Uuid,
        sku: String,
        received_date: NaiveDate,
        original_quantity: i64,
        unit_price: Decimal,
        freight_cost_per_unit: Decimal,
    ) -> Self {
        Self {
            lot_id: Uuid::now_v7(),
            tenant_id,
            sku,
            received_date,
            original_quantity,
            remaining_quantity: original_quantity,
            unit_price,
            freight_cost_per_unit,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Cost basis per unit: purchase price plus allocated freight
    pub fn effective_unit_cost(&self) -> Decimal {
        self.unit_price + self.freight_cost_per_unit
    }

    /// Units already consumed from this lot
    pub fn consumed_quantity(&self) -> i64 {
        self.original_quantity - self.remaining_quantity
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Structural invariant check; violations are fatal to a run
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.sku.is_empty() {
            return Err(format!("lot {} has an empty sku", self.lot_id));
        }
        if self.original_quantity <= 0 {
            return Err(format!(
                "lot {} has non-positive original_quantity {}",
                self.lot_id, self.original_quantity
            ));
        }
        if self.remaining_quantity < 0 || self.remaining_quantity > self.original_quantity {
            return Err(format!(
                "lot {} has remaining_quantity {} outside [0, {}]",
                self.lot_id, self.remaining_quantity, self.original_quantity
            ));
        }
        if self.unit_price.is_sign_negative() || self.freight_cost_per_unit.is_sign_negative() {
            return Err(format!("lot {} has a negative unit cost component", self.lot_id));
        }
        Ok(())
    }

    /// Consume up to `quantity` units; returns the amount actually taken
    pub fn consume(&mut self, quantity: i64) -> i64 {
        let taken = quantity.min(self.remaining_quantity);
        self.remaining_quantity -= taken;
        self.updated_at = Utc::now();
        taken
    }

    /// Restore up to `quantity` previously consumed units; returns the amount restored
    pub fn restore(&mut self, quantity: i64) -> i64 {
        let restored = quantity.min(self.consumed_quantity());
        self.remaining_quantity += restored;
        self.updated_at = Utc::now();
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn lot(original: i64, remaining: i64) -> PurchaseLot {
        let mut lot = PurchaseLot::new(
            Uuid::new_v4(),
            "WIDGET".to_string(),
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            original,
            Decimal::from_str("10.00").unwrap(),
            Decimal::from_str("1.00").unwrap(),
        );
        lot.remaining_quantity = remaining;
        lot
    }

    #[test]
    fn consume_caps_at_remaining() {
        let mut l = lot(100, 30);
        assert_eq!(l.consume(50), 30);
        assert_eq!(l.remaining_quantity, 0);
        assert!(l.is_exhausted());
    }

    #[test]
    fn restore_caps_at_consumed() {
        let mut l = lot(100, 70);
        assert_eq!(l.restore(50), 30);
        assert_eq!(l.remaining_quantity, 100);
    }

    #[test]
    fn effective_unit_cost_includes_freight() {
        let l = lot(10, 10);
        assert_eq!(l.effective_unit_cost(), Decimal::from_str("11.00").unwrap());
    }

    #[test]
    fn invariants_reject_over_remaining() {
        let l = lot(10, 11);
        assert!(l.check_invariants().is_err());
    }
}
