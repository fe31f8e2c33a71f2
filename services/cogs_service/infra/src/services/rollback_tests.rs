//! Rollback engine tests against the in-memory store

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{
    CogsRun, CostingConfig, CostingMethod, MovementKind, PurchaseLot, RunStatus,
};
use cogs_service_core::dto::run::{ExecuteRunRequest, SaleInput};
use cogs_service_core::repositories::{
    AttributionRepository, LotRepository, MovementRepository, RunRepository, SummaryRepository,
};
use cogs_service_core::services::{RollbackService, RunCoordinatorService, TenantLockService};
use shared_error::AppError;
use shared_types::TenantContext;

use crate::memory::{InMemoryCogsStore, InMemoryTenantLockService};
use crate::services::rollback::RollbackServiceImpl;
use crate::services::run_coordinator::RunCoordinatorImpl;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn tenant(n: u128) -> TenantContext {
    TenantContext::new(Uuid::from_u128(n)).unwrap()
}

struct Harness {
    lots: Arc<dyn LotRepository>,
    movements: Arc<dyn MovementRepository>,
    attributions: Arc<dyn AttributionRepository>,
    summaries: Arc<dyn SummaryRepository>,
    runs: Arc<dyn RunRepository>,
    lock: Arc<InMemoryTenantLockService>,
    coordinator: RunCoordinatorImpl,
    rollback: RollbackServiceImpl,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryCogsStore::new());
    let lock = Arc::new(InMemoryTenantLockService::new());
    let coordinator = RunCoordinatorImpl::new(
        store.clone(),
        store.clone(),
        store.clone(),
        lock.clone(),
        CostingConfig::default(),
    );
    let rollback = RollbackServiceImpl::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        lock.clone(),
    );
    Harness {
        lots: store.clone(),
        movements: store.clone(),
        attributions: store.clone(),
        summaries: store.clone(),
        runs: store,
        lock,
        coordinator,
        rollback,
    }
}

fn seed_lot(
    tenant: &TenantContext,
    id: u128,
    sku: &str,
    received: NaiveDate,
    original: i64,
    remaining: i64,
    unit_price: &str,
) -> PurchaseLot {
    let mut lot = PurchaseLot::new(
        tenant.tenant_id(),
        sku.to_string(),
        received,
        original,
        dec(unit_price),
        dec("1.00"),
    );
    lot.lot_id = Uuid::from_u128(id);
    lot.remaining_quantity = remaining;
    lot
}

fn sale_input(id: u128, sku: &str, day: NaiveDate, qty: i64) -> SaleInput {
    SaleInput {
        sale_id: Uuid::from_u128(id),
        tenant_id: None,
        sku: sku.to_string(),
        sale_date: day,
        quantity: qty,
    }
}

fn request(sales: Vec<SaleInput>) -> ExecuteRunRequest {
    ExecuteRunRequest {
        run_id: None,
        mode: "fifo".to_string(),
        sales,
        lots: None,
        input_file_id: None,
    }
}

async fn seed_spanning_run(h: &Harness, t1: &TenantContext) -> Uuid {
    h.lots
        .upsert_lots(
            t1.tenant_id(),
            &[
                seed_lot(t1, 1, "A", date(2024, 7, 1), 50, 50, "10.00"),
                seed_lot(t1, 2, "A", date(2024, 7, 10), 100, 100, "12.00"),
            ],
        )
        .await
        .unwrap();

    let response = h
        .coordinator
        .execute_run(t1.clone(), request(vec![sale_input(101, "A", date(2024, 7, 20), 80)]))
        .await
        .unwrap();
    assert_eq!(response.status, RunStatus::Completed);
    response.run_id
}

#[tokio::test]
async fn rollback_round_trip_restores_lots() {
    let h = harness();
    let t1 = tenant(1);
    let run_id = seed_spanning_run(&h, &t1).await;

    // Post-run state: L1 exhausted, L2 at 70.
    let inventory = h.lots.load_current_inventory(t1.tenant_id(), None).await.unwrap();
    assert_eq!(inventory[0].remaining_quantity, 0);
    assert_eq!(inventory[1].remaining_quantity, 70);

    let response = h.rollback.rollback_run(t1.clone(), run_id).await.unwrap();
    assert_eq!(response.status, RunStatus::RolledBack);
    assert!(response.rolled_back_at.is_some());

    let inventory = h.lots.load_current_inventory(t1.tenant_id(), None).await.unwrap();
    assert_eq!(inventory[0].remaining_quantity, 50);
    assert_eq!(inventory[1].remaining_quantity, 100);

    // Rollback entries negate the original journal per lot.
    let journal = h.movements.find_by_run(t1.tenant_id(), run_id).await.unwrap();
    let mut per_lot: HashMap<Uuid, i64> = HashMap::new();
    for movement in &journal {
        *per_lot.entry(movement.lot_id).or_default() += movement.quantity;
    }
    assert!(per_lot.values().all(|&sum| sum == 0));
    assert!(journal.iter().any(|m| m.kind == MovementKind::Rollback));

    // Rollback entries reference the movements they reverse.
    let originals: Vec<Uuid> = journal
        .iter()
        .filter(|m| m.kind == MovementKind::Sale)
        .map(|m| m.movement_id)
        .collect();
    for rollback in journal.iter().filter(|m| m.kind == MovementKind::Rollback) {
        assert!(originals.contains(&rollback.reference_id));
    }

    // Derived artifacts are flagged invalid.
    let attributions = h.attributions.find_by_run(t1.tenant_id(), run_id, 50, 0).await.unwrap();
    assert!(attributions.iter().all(|a| !a.attribution.is_valid));
    let summaries = h.summaries.find_by_run(t1.tenant_id(), run_id).await.unwrap();
    assert!(summaries.iter().all(|s| !s.is_valid));

    assert!(!h.lock.is_locked(t1.tenant_id()).await.unwrap());
}

#[tokio::test]
async fn rollback_is_idempotent() {
    let h = harness();
    let t1 = tenant(1);
    let run_id = seed_spanning_run(&h, &t1).await;

    h.rollback.rollback_run(t1.clone(), run_id).await.unwrap();
    let journal_len = h.movements.find_by_run(t1.tenant_id(), run_id).await.unwrap().len();

    // Second rollback is a no-op success.
    let response = h.rollback.rollback_run(t1.clone(), run_id).await.unwrap();
    assert_eq!(response.status, RunStatus::RolledBack);
    let journal = h.movements.find_by_run(t1.tenant_id(), run_id).await.unwrap();
    assert_eq!(journal.len(), journal_len);

    let inventory = h.lots.load_current_inventory(t1.tenant_id(), None).await.unwrap();
    assert_eq!(inventory[0].remaining_quantity, 50);
    assert_eq!(inventory[1].remaining_quantity, 100);
}

#[tokio::test]
async fn rollback_of_run_with_returns() {
    let h = harness();
    let t1 = tenant(1);
    h.lots
        .upsert_lots(
            t1.tenant_id(),
            &[seed_lot(&t1, 1, "A", date(2024, 7, 1), 100, 100, "10.00")],
        )
        .await
        .unwrap();

    let response = h
        .coordinator
        .execute_run(
            t1.clone(),
            request(vec![
                sale_input(101, "A", date(2024, 7, 10), 40),
                sale_input(102, "A", date(2024, 7, 20), -15),
            ]),
        )
        .await
        .unwrap();
    let inventory = h.lots.load_current_inventory(t1.tenant_id(), None).await.unwrap();
    assert_eq!(inventory[0].remaining_quantity, 75);

    h.rollback.rollback_run(t1.clone(), response.run_id).await.unwrap();
    let inventory = h.lots.load_current_inventory(t1.tenant_id(), None).await.unwrap();
    assert_eq!(inventory[0].remaining_quantity, 100);
}

#[tokio::test]
async fn rollback_rejects_non_completed_run() {
    let h = harness();
    let t1 = tenant(1);

    let run = CogsRun::new(t1.tenant_id(), CostingMethod::Fifo);
    h.runs.create(&run).await.unwrap();

    let result = h.rollback.rollback_run(t1, run.run_id).await;
    assert!(matches!(result, Err(AppError::IllegalState(_))));
}

#[tokio::test]
async fn rollback_of_foreign_run_is_not_found() {
    let h = harness();
    let t1 = tenant(1);
    let t2 = tenant(2);
    let run_id = seed_spanning_run(&h, &t1).await;

    let result = h.rollback.rollback_run(t2, run_id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // Nothing changed for the owning tenant.
    let run = h.runs.get(t1.tenant_id(), run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn rollback_refused_while_lock_held() {
    let h = harness();
    let t1 = tenant(1);
    let run_id = seed_spanning_run(&h, &t1).await;

    let token = h.lock.acquire(t1.tenant_id(), 60).await.unwrap().unwrap();
    let result = h.rollback.rollback_run(t1.clone(), run_id).await;
    assert!(matches!(result, Err(AppError::ConcurrentRunInProgress(_))));
    h.lock.release(t1.tenant_id(), &token).await.unwrap();
}

#[tokio::test]
async fn rerun_after_rollback_reallocates() {
    let h = harness();
    let t1 = tenant(1);
    let run_id = seed_spanning_run(&h, &t1).await;

    h.rollback.rollback_run(t1.clone(), run_id).await.unwrap();

    // Inventory is back to the pre-run state, so the same sale allocates again.
    let response = h
        .coordinator
        .execute_run(t1.clone(), request(vec![sale_input(201, "A", date(2024, 7, 20), 80)]))
        .await
        .unwrap();
    assert_eq!(response.status, RunStatus::Completed);

    let inventory = h.lots.load_current_inventory(t1.tenant_id(), None).await.unwrap();
    assert_eq!(inventory[0].remaining_quantity, 0);
    assert_eq!(inventory[1].remaining_quantity, 70);
}
