//! Pure FIFO allocation
//!
//! Given one tenant's lots and sales, produce attributions, journal
//! movements, updated lot quantities, validation issues, and monthly
//! summaries. No I/O happens here; the run coordinator owns persistence.
//!
//! Canonical lot order per SKU is `received_date` ascending with `lot_id` as
//! the tie-break. Sales consume oldest lots first; returns restore the most
//! recently consumed lots first and ignore the date guard.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_error::AppError;

use crate::domains::cogs::attribution::{
    AttributionWithDetails, CogsAttribution, CogsAttributionDetail,
};
use crate::domains::cogs::lot::PurchaseLot;
use crate::domains::cogs::movement::{InventoryMovement, MovementKind};
use crate::domains::cogs::run::CostingMethod;
use crate::domains::cogs::sale::Sale;
use crate::domains::cogs::summary::{period_of, CogsSummary};
use crate::domains::cogs::validation::ValidationIssue;
use crate::Result;

/// Policy for lot uploads that reference an already-known lot id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LotMergePolicy {
    Reject,
    UpsertIncreaseOnly,
}

impl LotMergePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("reject") {
            Some(LotMergePolicy::Reject)
        } else if s.eq_ignore_ascii_case("upsert_increase_only") {
            Some(LotMergePolicy::UpsertIncreaseOnly)
        } else {
            None
        }
    }
}

/// Engine configuration consumed by the allocator and coordinator
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostingConfig {
    pub mode: CostingMethod,
    /// When true, a sale may not consume lots received after the sale date
    pub require_date_guard: bool,
    pub lot_merge_policy: LotMergePolicy,
    /// Final rounding scale for currency sums
    pub monetary_scale: u32,
    /// Rounding scale for unit costs and averages
    pub intermediate_scale: u32,
}

impl Default for CostingConfig {
    fn default() -> Self {
        Self {
            mode: CostingMethod::Fifo,
            require_date_guard: true,
            lot_merge_policy: LotMergePolicy::UpsertIncreaseOnly,
            monetary_scale: 2,
            intermediate_scale: 4,
        }
    }
}

impl CostingConfig {
    /// Banker's rounding at the final currency scale
    pub fn round_money(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.monetary_scale, RoundingStrategy::MidpointNearestEven)
    }

    /// Banker's rounding at the unit-cost scale
    pub fn round_unit(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.intermediate_scale, RoundingStrategy::MidpointNearestEven)
    }
}

/// Identity and configuration stamped onto every emitted record
#[derive(Debug, Clone)]
pub struct AllocationContext {
    pub tenant_id: Uuid,
    pub run_id: Uuid,
    pub config: CostingConfig,
}

/// The full decision record of one allocation pass
#[derive(Debug, Clone, Default)]
pub struct AllocationOutcome {
    pub attributions: Vec<AttributionWithDetails>,
    pub movements: Vec<InventoryMovement>,
    /// Only lots whose remaining quantity changed
    pub updated_lots: Vec<PurchaseLot>,
    pub issues: Vec<ValidationIssue>,
    pub summaries: Vec<CogsSummary>,
}

/// Allocate one tenant's sales against its lot inventory
///
/// Per-row problems (insufficient inventory, over-returns, date inversions,
/// unknown SKUs) become [`ValidationIssue`] rows and the pass continues.
/// Structural invariant violations return `Err` and the coordinator marks
/// the run failed.
pub fn allocate(
    ctx: &AllocationContext,
    mut lots: Vec<PurchaseLot>,
    sales: &[Sale],
) -> Result<AllocationOutcome> {
    check_structure(ctx, &lots, sales)?;

    // Canonical order per SKU: received_date asc, lot_id asc.
    let mut by_sku: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, lot) in lots.iter().enumerate() {
        by_sku.entry(lot.sku.clone()).or_default().push(idx);
    }
    for indices in by_sku.values_mut() {
        indices.sort_by(|&a, &b| {
            (lots[a].received_date, lots[a].lot_id).cmp(&(lots[b].received_date, lots[b].lot_id))
        });
    }

    // Sales in ascending sale_date order, sale_id as tie-break.
    let mut ordered: Vec<&Sale> = sales.iter().collect();
    ordered.sort_by(|a, b| (a.sale_date, a.sale_id).cmp(&(b.sale_date, b.sale_id)));

    let mut outcome = AllocationOutcome::default();
    let mut touched: HashSet<usize> = HashSet::new();

    for sale in ordered {
        if sale.quantity > 0 {
            allocate_sale(ctx, sale, &by_sku, &mut lots, &mut touched, &mut outcome);
        } else {
            allocate_return(ctx, sale, &by_sku, &mut lots, &mut touched, &mut outcome);
        }
    }

    outcome.summaries = summarize(ctx, &outcome.attributions);
    outcome.updated_lots = (0..lots.len())
        .filter(|idx| touched.contains(idx))
        .map(|idx| lots[idx].clone())
        .collect();

    Ok(outcome)
}

fn check_structure(ctx: &AllocationContext, lots: &[PurchaseLot], sales: &[Sale]) -> Result<()> {
    let mut lot_ids = HashSet::new();
    for lot in lots {
        if lot.tenant_id != ctx.tenant_id {
            return Err(AppError::TenantMismatch(format!(
                "lot {} belongs to tenant {}",
                lot.lot_id, lot.tenant_id
            )));
        }
        lot.check_invariants().map_err(AppError::ValidationError)?;
        if !lot_ids.insert(lot.lot_id) {
            return Err(AppError::ValidationError(format!("duplicate lot id {}", lot.lot_id)));
        }
    }

    let mut sale_ids = HashSet::new();
    for sale in sales {
        if sale.tenant_id != ctx.tenant_id {
            return Err(AppError::TenantMismatch(format!(
                "sale {} belongs to tenant {}",
                sale.sale_id, sale.tenant_id
            )));
        }
        sale.check_invariants().map_err(AppError::ValidationError)?;
        if !sale_ids.insert(sale.sale_id) {
            return Err(AppError::ValidationError(format!("duplicate sale id {}", sale.sale_id)));
        }
    }
    Ok(())
}

fn allocate_sale(
    ctx: &AllocationContext,
    sale: &Sale,
    by_sku: &BTreeMap<String, Vec<usize>>,
    lots: &mut [PurchaseLot],
    touched: &mut HashSet<usize>,
    outcome: &mut AllocationOutcome,
) {
    let attribution_id = Uuid::now_v7();
    let mut details: Vec<CogsAttributionDetail> = Vec::new();
    let mut need = sale.quantity;
    let mut date_skipped = 0i64;

    match by_sku.get(sale.sku.as_str()) {
        None => {
            outcome.issues.push(ValidationIssue::unknown_sku(
                ctx.tenant_id,
                ctx.run_id,
                &sale.sku,
                sale.sale_id,
            ));
        },
        Some(indices) => {
            for &idx in indices {
                if need == 0 {
                    break;
                }
                let lot = &mut lots[idx];
                if lot.remaining_quantity == 0 {
                    continue;
                }
                if ctx.config.require_date_guard && lot.received_date > sale.sale_date {
                    date_skipped += lot.remaining_quantity;
                    continue;
                }

                let taken = lot.consume(need);
                need -= taken;
                touched.insert(idx);

                let unit_cost = ctx.config.round_unit(lot.effective_unit_cost());
                details.push(CogsAttributionDetail::new(
                    ctx.tenant_id,
                    attribution_id,
                    lot.lot_id,
                    taken,
                    unit_cost,
                ));
                outcome.movements.push(InventoryMovement::new(
                    ctx.tenant_id,
                    ctx.run_id,
                    lot.lot_id,
                    lot.sku.clone(),
                    MovementKind::Sale,
                    -taken,
                    lot.remaining_quantity,
                    unit_cost,
                    sale.sale_id,
                ));
            }

            if need > 0 {
                outcome.issues.push(ValidationIssue::insufficient_inventory(
                    ctx.tenant_id,
                    ctx.run_id,
                    &sale.sku,
                    sale.sale_id,
                    need,
                ));
                if date_skipped > 0 {
                    outcome.issues.push(ValidationIssue::date_inversion(
                        ctx.tenant_id,
                        ctx.run_id,
                        &sale.sku,
                        sale.sale_id,
                        date_skipped,
                    ));
                }
            }
        },
    }

    let total_cogs = ctx
        .config
        .round_money(details.iter().map(|d| d.total_cost).sum::<Decimal>());
    let average_unit_cost = ctx.config.round_unit(total_cogs / Decimal::from(sale.quantity));

    outcome.attributions.push(AttributionWithDetails {
        attribution: CogsAttribution {
            attribution_id,
            tenant_id: ctx.tenant_id,
            run_id: ctx.run_id,
            sale_id: sale.sale_id,
            sku: sale.sku.clone(),
            sale_date: sale.sale_date,
            quantity_sold: sale.quantity,
            total_cogs,
            average_unit_cost,
            is_valid: need == 0,
            created_at: chrono::Utc::now(),
        },
        details,
    });
}

fn allocate_return(
    ctx: &AllocationContext,
    sale: &Sale,
    by_sku: &BTreeMap<String, Vec<usize>>,
    lots: &mut [PurchaseLot],
    touched: &mut HashSet<usize>,
    outcome: &mut AllocationOutcome,
) {
    let attribution_id = Uuid::now_v7();
    let mut details: Vec<CogsAttributionDetail> = Vec::new();
    let mut need = -sale.quantity;

    // Newest-consumed-first: walk the canonical order in reverse. The date
    // guard does not apply to restorations.
    if let Some(indices) = by_sku.get(sale.sku.as_str()) {
        for &idx in indices.iter().rev() {
            if need == 0 {
                break;
            }
            let lot = &mut lots[idx];
            if lot.consumed_quantity() == 0 {
                continue;
            }

            let restored = lot.restore(need);
            need -= restored;
            touched.insert(idx);

            let unit_cost = ctx.config.round_unit(lot.effective_unit_cost());
            details.push(CogsAttributionDetail::new(
                ctx.tenant_id,
                attribution_id,
                lot.lot_id,
                -restored,
                unit_cost,
            ));
            outcome.movements.push(InventoryMovement::new(
                ctx.tenant_id,
                ctx.run_id,
                lot.lot_id,
                lot.sku.clone(),
                MovementKind::Return,
                restored,
                lot.remaining_quantity,
                unit_cost,
                sale.sale_id,
            ));
        }
    }

    if need > 0 {
        outcome.issues.push(ValidationIssue::over_return(
            ctx.tenant_id,
            ctx.run_id,
            &sale.sku,
            sale.sale_id,
            need,
        ));
    }

    // A return that restored nothing leaves no attribution, only the issue.
    if details.is_empty() {
        return;
    }

    let total_cogs = ctx
        .config
        .round_money(details.iter().map(|d| d.total_cost).sum::<Decimal>());
    let average_unit_cost = ctx.config.round_unit(total_cogs / Decimal::from(sale.quantity));

    outcome.attributions.push(AttributionWithDetails {
        attribution: CogsAttribution {
            attribution_id,
            tenant_id: ctx.tenant_id,
            run_id: ctx.run_id,
            sale_id: sale.sale_id,
            sku: sale.sku.clone(),
            sale_date: sale.sale_date,
            quantity_sold: sale.quantity,
            total_cogs,
            average_unit_cost,
            is_valid: need == 0,
            created_at: chrono::Utc::now(),
        },
        details,
    });
}

/// Roll attributions up by (sku, YYYY-MM) over the costed quantities
fn summarize(ctx: &AllocationContext, attributions: &[AttributionWithDetails]) -> Vec<CogsSummary> {
    let mut buckets: BTreeMap<(String, String), (i64, Decimal)> = BTreeMap::new();
    for entry in attributions {
        let key = (entry.attribution.sku.clone(), period_of(entry.attribution.sale_date));
        let bucket = buckets.entry(key).or_insert((0, Decimal::ZERO));
        bucket.0 += entry.details.iter().map(|d| d.quantity_allocated).sum::<i64>();
        bucket.1 += entry.attribution.total_cogs;
    }

    buckets
        .into_iter()
        .map(|((sku, period), (quantity, total))| {
            let total_cogs = ctx.config.round_money(total);
            let average_unit_cost = if quantity != 0 {
                ctx.config.round_unit(total_cogs / Decimal::from(quantity))
            } else {
                Decimal::ZERO
            };
            CogsSummary {
                summary_id: Uuid::now_v7(),
                tenant_id: ctx.tenant_id,
                run_id: ctx.run_id,
                sku,
                period,
                total_quantity_sold: quantity,
                total_cogs,
                average_unit_cost,
                is_valid: true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::cogs::validation::ValidationKind;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx() -> AllocationContext {
        AllocationContext {
            tenant_id: Uuid::from_u128(0xA),
            run_id: Uuid::from_u128(0xF00D),
            config: CostingConfig::default(),
        }
    }

    fn lot(
        ctx: &AllocationContext,
        id: u128,
        sku: &str,
        received: NaiveDate,
        original: i64,
        remaining: i64,
        unit_price: &str,
        freight: &str,
    ) -> PurchaseLot {
        let mut lot = PurchaseLot::new(
            ctx.tenant_id,
            sku.to_string(),
            received,
            original,
            dec(unit_price),
            dec(freight),
        );
        lot.lot_id = Uuid::from_u128(id);
        lot.remaining_quantity = remaining;
        lot
    }

    fn sale(ctx: &AllocationContext, id: u128, sku: &str, day: NaiveDate, qty: i64) -> Sale {
        let mut sale = Sale::new(ctx.tenant_id, sku.to_string(), day, qty);
        sale.sale_id = Uuid::from_u128(id);
        sale
    }

    // Scenario: single lot covers the whole sale.
    #[test]
    fn single_lot_allocation() {
        let ctx = ctx();
        let lots = vec![lot(&ctx, 1, "A", date(2024, 7, 1), 100, 100, "10.00", "1.00")];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 15), 30)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        assert_eq!(outcome.attributions.len(), 1);
        let entry = &outcome.attributions[0];
        assert!(entry.attribution.is_valid);
        assert_eq!(entry.attribution.quantity_sold, 30);
        assert_eq!(entry.attribution.total_cogs, dec("330.00"));
        assert_eq!(entry.attribution.average_unit_cost, dec("11.0000"));
        assert_eq!(entry.details.len(), 1);
        assert_eq!(entry.details[0].quantity_allocated, 30);
        assert_eq!(entry.details[0].unit_cost, dec("11.00"));
        assert_eq!(entry.details[0].total_cost, dec("330.00"));

        assert_eq!(outcome.movements.len(), 1);
        assert_eq!(outcome.movements[0].kind, MovementKind::Sale);
        assert_eq!(outcome.movements[0].quantity, -30);
        assert_eq!(outcome.movements[0].remaining_after, 70);

        assert_eq!(outcome.updated_lots.len(), 1);
        assert_eq!(outcome.updated_lots[0].remaining_quantity, 70);
        assert!(outcome.issues.is_empty());
    }

    // Scenario: sale spans two lots, oldest consumed first.
    #[test]
    fn multi_lot_fifo_spanning() {
        let ctx = ctx();
        let lots = vec![
            lot(&ctx, 1, "A", date(2024, 7, 1), 50, 50, "10.00", "1.00"),
            lot(&ctx, 2, "A", date(2024, 7, 10), 100, 100, "12.00", "1.00"),
        ];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 20), 80)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        let entry = &outcome.attributions[0];
        assert!(entry.attribution.is_valid);
        assert_eq!(entry.attribution.total_cogs, dec("940.00"));
        assert_eq!(entry.attribution.average_unit_cost, dec("11.7500"));
        assert_eq!(entry.details.len(), 2);
        assert_eq!(
            (entry.details[0].quantity_allocated, entry.details[0].total_cost),
            (50, dec("550.00"))
        );
        assert_eq!(
            (entry.details[1].quantity_allocated, entry.details[1].total_cost),
            (30, dec("390.00"))
        );

        assert_eq!(outcome.movements.len(), 2);
        assert_eq!(outcome.movements[0].remaining_after, 0);
        assert_eq!(outcome.movements[1].remaining_after, 70);

        let l1 = outcome.updated_lots.iter().find(|l| l.lot_id == Uuid::from_u128(1)).unwrap();
        let l2 = outcome.updated_lots.iter().find(|l| l.lot_id == Uuid::from_u128(2)).unwrap();
        assert_eq!(l1.remaining_quantity, 0);
        assert_eq!(l2.remaining_quantity, 70);
    }

    // Scenario: inventory shortfall yields a partial, invalid attribution.
    #[test]
    fn insufficient_inventory_partial_allocation() {
        let ctx = ctx();
        let lots = vec![lot(&ctx, 1, "B", date(2024, 6, 1), 10, 10, "5.00", "0.00")];
        let sales = vec![sale(&ctx, 101, "B", date(2024, 7, 1), 25)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        let entry = &outcome.attributions[0];
        assert!(!entry.attribution.is_valid);
        assert_eq!(entry.attribution.quantity_sold, 25);
        assert_eq!(entry.attribution.total_cogs, dec("50.00"));
        assert_eq!(entry.details.len(), 1);
        assert_eq!(entry.details[0].quantity_allocated, 10);

        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, ValidationKind::InsufficientInventory);
        assert_eq!(outcome.issues[0].quantity, Some(15));
        assert_eq!(outcome.updated_lots[0].remaining_quantity, 0);
    }

    // Scenario: return restores the newest consumed lot first.
    #[test]
    fn return_restores_newest_consumed_first() {
        let ctx = ctx();
        // State after the spanning sale: L1 exhausted, L2 at 70 of 100.
        let lots = vec![
            lot(&ctx, 1, "A", date(2024, 7, 1), 50, 0, "10.00", "1.00"),
            lot(&ctx, 2, "A", date(2024, 7, 10), 100, 70, "12.00", "1.00"),
        ];
        let sales = vec![sale(&ctx, 201, "A", date(2024, 7, 25), -20)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        assert_eq!(outcome.movements.len(), 1);
        let movement = &outcome.movements[0];
        assert_eq!(movement.kind, MovementKind::Return);
        assert_eq!(movement.lot_id, Uuid::from_u128(2));
        assert_eq!(movement.quantity, 20);
        assert_eq!(movement.remaining_after, 90);

        let entry = &outcome.attributions[0];
        assert_eq!(entry.attribution.quantity_sold, -20);
        assert_eq!(entry.attribution.total_cogs, dec("-260.00"));

        let summary = &outcome.summaries[0];
        assert_eq!(summary.total_cogs, dec("-260.00"));
        assert_eq!(summary.total_quantity_sold, -20);

        let l2 = outcome.updated_lots.iter().find(|l| l.lot_id == Uuid::from_u128(2)).unwrap();
        assert_eq!(l2.remaining_quantity, 90);
        assert!(!outcome.updated_lots.iter().any(|l| l.lot_id == Uuid::from_u128(1)));
    }

    // Boundary: exact-remaining sale consumes the lot to zero, one detail row.
    #[test]
    fn exact_quantity_consumes_single_lot() {
        let ctx = ctx();
        let lots = vec![
            lot(&ctx, 1, "A", date(2024, 7, 1), 40, 40, "10.00", "0.00"),
            lot(&ctx, 2, "A", date(2024, 7, 5), 40, 40, "10.00", "0.00"),
        ];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 10), 40)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        let entry = &outcome.attributions[0];
        assert_eq!(entry.details.len(), 1);
        assert_eq!(outcome.movements.len(), 1);
        assert_eq!(outcome.updated_lots.len(), 1);
        assert_eq!(outcome.updated_lots[0].lot_id, Uuid::from_u128(1));
        assert_eq!(outcome.updated_lots[0].remaining_quantity, 0);
    }

    // Boundary: one unit over rolls into the next lot with two detail rows.
    #[test]
    fn one_over_spills_into_next_lot() {
        let ctx = ctx();
        let lots = vec![
            lot(&ctx, 1, "A", date(2024, 7, 1), 40, 40, "10.00", "0.00"),
            lot(&ctx, 2, "A", date(2024, 7, 5), 40, 40, "10.00", "0.00"),
        ];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 10), 41)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        let entry = &outcome.attributions[0];
        assert_eq!(entry.details.len(), 2);
        assert_eq!(entry.details[0].quantity_allocated, 40);
        assert_eq!(entry.details[1].quantity_allocated, 1);

        let l2 = outcome.updated_lots.iter().find(|l| l.lot_id == Uuid::from_u128(2)).unwrap();
        assert_eq!(l2.remaining_quantity, 39);
    }

    // Boundary: return against never-consumed inventory produces no movements.
    #[test]
    fn return_against_unconsumed_sku() {
        let ctx = ctx();
        let lots = vec![lot(&ctx, 1, "A", date(2024, 7, 1), 40, 40, "10.00", "0.00")];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 10), -5)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        assert!(outcome.movements.is_empty());
        assert!(outcome.attributions.is_empty());
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, ValidationKind::OverReturn);
    }

    // Boundary: zero-quantity sale is structural, not per-row.
    #[test]
    fn zero_quantity_sale_is_structural_error() {
        let ctx = ctx();
        let lots = vec![lot(&ctx, 1, "A", date(2024, 7, 1), 40, 40, "10.00", "0.00")];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 10), 0)];

        let result = allocate(&ctx, lots, &sales);
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn over_return_restores_available_capacity_only() {
        let ctx = ctx();
        let lots = vec![lot(&ctx, 1, "A", date(2024, 7, 1), 50, 30, "10.00", "0.00")];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 10), -35)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        assert_eq!(outcome.movements.len(), 1);
        assert_eq!(outcome.movements[0].quantity, 20);
        assert_eq!(outcome.updated_lots[0].remaining_quantity, 50);

        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, ValidationKind::OverReturn);
        assert_eq!(outcome.issues[0].quantity, Some(15));

        let entry = &outcome.attributions[0];
        assert!(!entry.attribution.is_valid);
    }

    #[test]
    fn date_guard_skips_future_lots() {
        let ctx = ctx();
        let lots = vec![
            lot(&ctx, 1, "A", date(2024, 7, 1), 10, 10, "10.00", "0.00"),
            lot(&ctx, 2, "A", date(2024, 8, 1), 100, 100, "12.00", "0.00"),
        ];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 15), 30)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        let entry = &outcome.attributions[0];
        assert!(!entry.attribution.is_valid);
        assert_eq!(entry.details.len(), 1);
        assert_eq!(entry.details[0].quantity_allocated, 10);

        let kinds: Vec<ValidationKind> = outcome.issues.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&ValidationKind::InsufficientInventory));
        assert!(kinds.contains(&ValidationKind::DateInversion));
    }

    #[test]
    fn date_guard_disabled_consumes_future_lots() {
        let ctx = AllocationContext {
            config: CostingConfig {
                require_date_guard: false,
                ..CostingConfig::default()
            },
            ..ctx()
        };
        let lots = vec![
            lot(&ctx, 1, "A", date(2024, 7, 1), 10, 10, "10.00", "0.00"),
            lot(&ctx, 2, "A", date(2024, 8, 1), 100, 100, "12.00", "0.00"),
        ];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 15), 30)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        let entry = &outcome.attributions[0];
        assert!(entry.attribution.is_valid);
        assert_eq!(entry.details.len(), 2);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn unknown_sku_yields_invalid_attribution() {
        let ctx = ctx();
        let lots = vec![lot(&ctx, 1, "A", date(2024, 7, 1), 10, 10, "10.00", "0.00")];
        let sales = vec![sale(&ctx, 101, "MISSING", date(2024, 7, 15), 5)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, ValidationKind::UnknownSku);
        let entry = &outcome.attributions[0];
        assert!(!entry.attribution.is_valid);
        assert!(entry.details.is_empty());
        assert_eq!(entry.attribution.total_cogs, Decimal::ZERO);
    }

    #[test]
    fn received_date_tie_breaks_on_lot_id() {
        let ctx = ctx();
        let lots = vec![
            lot(&ctx, 9, "A", date(2024, 7, 1), 10, 10, "12.00", "0.00"),
            lot(&ctx, 3, "A", date(2024, 7, 1), 10, 10, "10.00", "0.00"),
        ];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 15), 5)];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        // Same received_date: the smaller lot id wins.
        assert_eq!(outcome.movements[0].lot_id, Uuid::from_u128(3));
    }

    #[test]
    fn sales_process_in_date_order() {
        let ctx = ctx();
        let lots = vec![lot(&ctx, 1, "A", date(2024, 7, 1), 10, 10, "10.00", "0.00")];
        // Submitted out of order; the later sale must see the earlier one's effect.
        let sales = vec![
            sale(&ctx, 102, "A", date(2024, 7, 20), 6),
            sale(&ctx, 101, "A", date(2024, 7, 10), 6),
        ];

        let outcome = allocate(&ctx, lots, &sales).unwrap();

        let first = outcome
            .attributions
            .iter()
            .find(|a| a.attribution.sale_id == Uuid::from_u128(101))
            .unwrap();
        let second = outcome
            .attributions
            .iter()
            .find(|a| a.attribution.sale_id == Uuid::from_u128(102))
            .unwrap();
        assert!(first.attribution.is_valid);
        assert!(!second.attribution.is_valid);
        assert_eq!(second.details[0].quantity_allocated, 4);
    }

    #[test]
    fn duplicate_lot_id_is_structural_error() {
        let ctx = ctx();
        let duplicate = lot(&ctx, 1, "A", date(2024, 7, 2), 10, 10, "10.00", "0.00");
        let lots = vec![lot(&ctx, 1, "A", date(2024, 7, 1), 10, 10, "10.00", "0.00"), duplicate];
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 15), 5)];

        assert!(allocate(&ctx, lots, &sales).is_err());
    }

    #[test]
    fn foreign_tenant_lot_fails_closed() {
        let ctx = ctx();
        let mut foreign = lot(&ctx, 1, "A", date(2024, 7, 1), 10, 10, "10.00", "0.00");
        foreign.tenant_id = Uuid::from_u128(0xB);
        let sales = vec![sale(&ctx, 101, "A", date(2024, 7, 15), 5)];

        let result = allocate(&ctx, vec![foreign], &sales);
        assert!(matches!(result, Err(AppError::TenantMismatch(_))));
    }

    #[test]
    fn identical_inputs_produce_identical_output() {
        let ctx = ctx();
        let build = || {
            let lots = vec![
                lot(&ctx, 1, "A", date(2024, 7, 1), 50, 50, "10.00", "1.00"),
                lot(&ctx, 2, "A", date(2024, 7, 10), 100, 100, "12.00", "1.00"),
                lot(&ctx, 3, "B", date(2024, 6, 1), 25, 25, "5.00", "0.50"),
            ];
            let sales = vec![
                sale(&ctx, 101, "A", date(2024, 7, 20), 80),
                sale(&ctx, 102, "B", date(2024, 7, 5), 10),
                sale(&ctx, 103, "A", date(2024, 7, 25), -20),
            ];
            (lots, sales)
        };

        let (lots_a, sales_a) = build();
        let (lots_b, sales_b) = build();
        let first = allocate(&ctx, lots_a, &sales_a).unwrap();
        let second = allocate(&ctx, lots_b, &sales_b).unwrap();

        let costs = |o: &AllocationOutcome| {
            o.attributions
                .iter()
                .map(|a| (a.attribution.sale_id, a.attribution.total_cogs, a.attribution.is_valid))
                .collect::<Vec<_>>()
        };
        let moves = |o: &AllocationOutcome| {
            o.movements
                .iter()
                .map(|m| (m.lot_id, m.kind, m.quantity, m.remaining_after))
                .collect::<Vec<_>>()
        };
        let stock = |o: &AllocationOutcome| {
            o.updated_lots
                .iter()
                .map(|l| (l.lot_id, l.remaining_quantity))
                .collect::<Vec<_>>()
        };
        assert_eq!(costs(&first), costs(&second));
        assert_eq!(moves(&first), moves(&second));
        assert_eq!(stock(&first), stock(&second));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_lots(tenant: Uuid) -> impl Strategy<Value = Vec<PurchaseLot>> {
            prop::collection::vec(
                (1u32..4, 1i64..200, 0u32..28, 1i64..5000),
                1..8,
            )
            .prop_map(move |specs| {
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (sku_n, qty, day, cents))| {
                        let mut lot = PurchaseLot::new(
                            tenant,
                            format!("SKU-{}", sku_n),
                            date(2024, 1, 1) + chrono::Duration::days(day as i64),
                            qty,
                            Decimal::new(cents, 2),
                            Decimal::ZERO,
                        );
                        lot.lot_id = Uuid::from_u128(i as u128 + 1);
                        lot
                    })
                    .collect()
            })
        }

        fn arb_sales(tenant: Uuid) -> impl Strategy<Value = Vec<Sale>> {
            prop::collection::vec((1u32..4, -100i64..150, 0u32..58), 1..8).prop_map(
                move |specs| {
                    specs
                        .into_iter()
                        .enumerate()
                        .filter(|(_, (_, qty, _))| *qty != 0)
                        .map(|(i, (sku_n, qty, day))| {
                            let mut sale = Sale::new(
                                tenant,
                                format!("SKU-{}", sku_n),
                                date(2024, 1, 15) + chrono::Duration::days(day as i64),
                                qty,
                            );
                            sale.sale_id = Uuid::from_u128(0x1000 + i as u128);
                            sale
                        })
                        .collect()
                },
            )
        }

        proptest! {
            // Remaining quantities always stay within [0, original].
            #[test]
            fn lot_bounds_hold(lots in arb_lots(Uuid::from_u128(0xA)), sales in arb_sales(Uuid::from_u128(0xA))) {
                let ctx = AllocationContext {
                    tenant_id: Uuid::from_u128(0xA),
                    run_id: Uuid::from_u128(0xF00D),
                    config: CostingConfig::default(),
                };
                let outcome = allocate(&ctx, lots, &sales).unwrap();
                for lot in &outcome.updated_lots {
                    prop_assert!(lot.remaining_quantity >= 0);
                    prop_assert!(lot.remaining_quantity <= lot.original_quantity);
                }
                for movement in &outcome.movements {
                    prop_assert!(movement.remaining_after >= 0);
                    prop_assert!(movement.has_valid_sign());
                }
            }

            // The journal telescopes: per-lot movement sums equal the remaining delta.
            #[test]
            fn journal_telescopes(lots in arb_lots(Uuid::from_u128(0xA)), sales in arb_sales(Uuid::from_u128(0xA))) {
                let ctx = AllocationContext {
                    tenant_id: Uuid::from_u128(0xA),
                    run_id: Uuid::from_u128(0xF00D),
                    config: CostingConfig::default(),
                };
                let pre: std::collections::HashMap<Uuid, i64> =
                    lots.iter().map(|l| (l.lot_id, l.remaining_quantity)).collect();
                let outcome = allocate(&ctx, lots, &sales).unwrap();
                for lot in &outcome.updated_lots {
                    let moved: i64 = outcome
                        .movements
                        .iter()
                        .filter(|m| m.lot_id == lot.lot_id)
                        .map(|m| m.quantity)
                        .sum();
                    prop_assert_eq!(lot.remaining_quantity - pre[&lot.lot_id], moved);
                }
            }

            // Attribution totals equal the sum of their details; valid ones cover the sale.
            #[test]
            fn attribution_totals_consistent(lots in arb_lots(Uuid::from_u128(0xA)), sales in arb_sales(Uuid::from_u128(0xA))) {
                let ctx = AllocationContext {
                    tenant_id: Uuid::from_u128(0xA),
                    run_id: Uuid::from_u128(0xF00D),
                    config: CostingConfig::default(),
                };
                let outcome = allocate(&ctx, lots, &sales).unwrap();
                for entry in &outcome.attributions {
                    let detail_sum: Decimal = entry.details.iter().map(|d| d.total_cost).sum();
                    prop_assert_eq!(entry.attribution.total_cogs, ctx.config.round_money(detail_sum));
                    for detail in &entry.details {
                        prop_assert_eq!(
                            detail.total_cost,
                            Decimal::from(detail.quantity_allocated) * detail.unit_cost
                        );
                    }
                    if entry.attribution.is_valid {
                        let allocated: i64 =
                            entry.details.iter().map(|d| d.quantity_allocated).sum();
                        prop_assert_eq!(allocated, entry.attribution.quantity_sold);
                    }
                }
            }
        }
    }
}
