use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Sale event for one SKU
///
/// Positive quantity is a sale; negative quantity is a customer return.
/// A zero quantity violates the structural invariant and fails the run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub sale_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 100))]
    pub sku: String,

    pub sale_date: NaiveDate,

    /// Signed: positive = sale, negative = return
    pub quantity: i64,
}

impl Sale {
    pub fn new(tenant_id: Uuid, sku: String, sale_date: NaiveDate, quantity: i64) -> Self {
        Self {
            sale_id: Uuid::now_v7(),
            tenant_id,
            sku,
            sale_date,
            quantity,
        }
    }

    pub fn is_return(&self) -> bool {
        self.quantity < 0
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        if self.sku.is_empty() {
            return Err(format!("sale {} has an empty sku", self.sale_id));
        }
        if self.quantity == 0 {
            return Err(format!("sale {} has zero quantity", self.sale_id));
        }
        Ok(())
    }
}
