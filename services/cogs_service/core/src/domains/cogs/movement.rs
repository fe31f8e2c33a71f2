use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Movement categories in the append-only inventory journal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum MovementKind {
    Sale,
    Return,
    Adjustment,
    Rollback,
}

impl From<String> for MovementKind {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("sale") {
            MovementKind::Sale
        } else if s.eq_ignore_ascii_case("return") {
            MovementKind::Return
        } else if s.eq_ignore_ascii_case("rollback") {
            MovementKind::Rollback
        } else {
            MovementKind::Adjustment
        }
    }
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Sale => "sale",
            MovementKind::Return => "return",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Rollback => "rollback",
        }
    }
}

/// One append-only journal entry recording a single effect on a lot
///
/// Never mutated or deleted once written. `quantity` is negative for
/// consumption and positive for restoration; `remaining_after` records the
/// lot's remaining quantity after this entry applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub movement_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    pub run_id: Uuid,
    pub lot_id: Uuid,
    pub sku: String,

    pub kind: MovementKind,
    pub quantity: i64,
    pub remaining_after: i64,
    pub unit_cost: Decimal,

    /// Sale id for sale/return movements; originating movement id for rollbacks
    pub reference_id: Uuid,

    pub recorded_at: DateTime<Utc>,
}

impl InventoryMovement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        run_id: Uuid,
        lot_id: Uuid,
        sku: String,
        kind: MovementKind,
        quantity: i64,
        remaining_after: i64,
        unit_cost: Decimal,
        reference_id: Uuid,
    ) -> Self {
        Self {
            movement_id: Uuid::now_v7(),
            tenant_id,
            run_id,
            lot_id,
            sku,
            kind,
            quantity,
            remaining_after,
            unit_cost,
            reference_id,
            recorded_at: Utc::now(),
        }
    }

    /// Sign invariants per kind: sale consumes, return restores
    pub fn has_valid_sign(&self) -> bool {
        match self.kind {
            MovementKind::Sale => self.quantity < 0,
            MovementKind::Return => self.quantity > 0,
            MovementKind::Adjustment | MovementKind::Rollback => self.quantity != 0,
        }
    }

    /// Build the inverse entry used by the rollback engine
    ///
    /// `remaining_after` must be recomputed by the caller, which walks the
    /// journal in reverse emission order.
    pub fn inverse(&self, rollback_run_id: Uuid, remaining_after: i64) -> InventoryMovement {
        InventoryMovement::new(
            self.tenant_id,
            rollback_run_id,
            self.lot_id,
            self.sku.clone(),
            MovementKind::Rollback,
            -self.quantity,
            remaining_after,
            self.unit_cost,
            self.movement_id,
        )
    }
}
