//! Tenant isolation tests: no operation scoped to one tenant may observe or
//! mutate another tenant's state.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use cogs_service_core::domains::cogs::{CostingConfig, PurchaseLot, RunStatus};
use cogs_service_core::dto::common::PageRequest;
use cogs_service_core::dto::run::{ExecuteRunRequest, RunListQuery, SaleInput};
use cogs_service_core::repositories::LotRepository;
use cogs_service_core::services::{
    ReportingService, RunCoordinatorService, TenantLockService,
};
use shared_error::AppError;
use shared_types::TenantContext;

use crate::memory::{InMemoryCogsStore, InMemoryTenantLockService};
use crate::services::reporting::ReportingServiceImpl;
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
    lock: Arc<InMemoryTenantLockService>,
    coordinator: RunCoordinatorImpl,
    reporting: ReportingServiceImpl,
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
    let reporting = ReportingServiceImpl::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    );
    Harness {
        lots: store,
        lock,
        coordinator,
        reporting,
    }
}

fn seed_lot(tenant: &TenantContext, id: u128, sku: &str) -> PurchaseLot {
    let mut lot = PurchaseLot::new(
        tenant.tenant_id(),
        sku.to_string(),
        date(2024, 7, 1),
        100,
        dec("10.00"),
        dec("1.00"),
    );
    lot.lot_id = Uuid::from_u128(id);
    lot
}

fn sale_input(id: u128, sku: &str, qty: i64) -> SaleInput {
    SaleInput {
        sale_id: Uuid::from_u128(id),
        tenant_id: None,
        sku: sku.to_string(),
        sale_date: date(2024, 7, 15),
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

async fn seed_completed_run(h: &Harness, owner: &TenantContext) -> Uuid {
    h.lots
        .upsert_lots(owner.tenant_id(), &[seed_lot(owner, 1, "A")])
        .await
        .unwrap();
    let response = h
        .coordinator
        .execute_run(owner.clone(), request(vec![sale_input(101, "A", 30)]))
        .await
        .unwrap();
    response.run_id
}

#[tokio::test]
async fn runs_are_invisible_across_tenants() {
    let h = harness();
    let t1 = tenant(1);
    let t2 = tenant(2);
    let run_id = seed_completed_run(&h, &t1).await;

    let result = h.reporting.get_run(t2.clone(), run_id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let listed = h.reporting.list_runs(t2, RunListQuery::default()).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn artifacts_are_invisible_across_tenants() {
    let h = harness();
    let t1 = tenant(1);
    let t2 = tenant(2);
    let run_id = seed_completed_run(&h, &t1).await;

    let attributions = h
        .reporting
        .read_attributions(t2.clone(), run_id, PageRequest::default())
        .await;
    assert!(matches!(attributions, Err(AppError::NotFound(_))));

    let summaries = h.reporting.read_summaries(t2.clone(), run_id).await;
    assert!(matches!(summaries, Err(AppError::NotFound(_))));

    let movements = h.reporting.read_movements(t2, run_id).await;
    assert!(matches!(movements, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn inventory_is_tenant_scoped() {
    let h = harness();
    let t1 = tenant(1);
    let t2 = tenant(2);
    seed_completed_run(&h, &t1).await;

    let other = h.reporting.read_current_inventory(t2, None).await.unwrap();
    assert!(other.is_empty());

    let own = h.reporting.read_current_inventory(t1, None).await.unwrap();
    assert_eq!(own.len(), 1);
}

#[tokio::test]
async fn storage_rejects_cross_tenant_writes() {
    let h = harness();
    let t1 = tenant(1);
    let t2 = tenant(2);

    // A lot stamped for tenant 2 cannot be written through tenant 1's scope.
    let foreign = seed_lot(&t2, 7, "A");
    let result = h.lots.upsert_lots(t1.tenant_id(), &[foreign]).await;
    assert!(matches!(result, Err(AppError::TenantMismatch(_))));
}

#[tokio::test]
async fn tenants_do_not_share_locks() {
    let h = harness();
    let t1 = tenant(1);
    let t2 = tenant(2);
    h.lots
        .upsert_lots(t2.tenant_id(), &[seed_lot(&t2, 9, "A")])
        .await
        .unwrap();

    // Tenant 1's lock never blocks tenant 2's run.
    let _token = h.lock.acquire(t1.tenant_id(), 60).await.unwrap().unwrap();
    let response = h
        .coordinator
        .execute_run(t2, request(vec![sale_input(201, "A", 10)]))
        .await
        .unwrap();
    assert_eq!(response.status, RunStatus::Completed);
}

#[tokio::test]
async fn nil_tenant_id_is_never_a_scope() {
    assert!(TenantContext::new(Uuid::nil()).is_none());
}
