use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monthly COGS rollup per SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CogsSummary {
    pub summary_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    pub run_id: Uuid,
    pub sku: String,

    /// YYYY-MM
    pub period: String,

    pub total_quantity_sold: i64,
    pub total_cogs: Decimal,
    pub average_unit_cost: Decimal,

    pub is_valid: bool,
}

/// Month bucket key for summaries, e.g. "2024-07"
pub fn period_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_formats_with_zero_padding() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        assert_eq!(period_of(date), "2024-07");
        let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        assert_eq!(period_of(date), "2024-11");
    }
}
