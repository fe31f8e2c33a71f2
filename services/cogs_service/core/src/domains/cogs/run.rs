use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run lifecycle states
///
/// ```text
/// pending --> running --> completed --> rolled_back
///               |
///               +--> failed
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::RolledBack)
    }

    /// Legal state-machine edges; everything else is rejected by CAS
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Completed, RunStatus::RolledBack)
        )
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            "rolled_back" => RunStatus::RolledBack,
            _ => RunStatus::Failed,
        }
    }
}

/// Supported costing methods
///
/// The run carries a mode tag for future extension; only FIFO allocates today.
/// Unknown mode strings are rejected before any state change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum CostingMethod {
    Fifo,
}

impl CostingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostingMethod::Fifo => "fifo",
        }
    }

    /// `None` for unrecognized modes; callers surface ValidationError
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("fifo") {
            Some(CostingMethod::Fifo)
        } else {
            None
        }
    }
}

/// Aggregate counters stamped onto a completed run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounters {
    pub sales_processed: i64,
    pub movements_recorded: i64,
    pub validation_error_count: i64,
}

/// One invocation of the allocation pipeline for one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CogsRun {
    pub run_id: Uuid,

    /// Multi-tenancy: All queries must filter by tenant_id
    pub tenant_id: Uuid,

    pub status: RunStatus,
    pub mode: CostingMethod,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub input_file_id: Option<Uuid>,

    pub sales_processed: i64,
    pub movements_recorded: i64,
    pub validation_error_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CogsRun {
    pub fn new(tenant_id: Uuid, mode: CostingMethod) -> Self {
        Self::with_id(Uuid::now_v7(), tenant_id, mode)
    }

    /// Create with a caller-supplied run id (idempotent retries)
    pub fn with_id(run_id: Uuid, tenant_id: Uuid, mode: CostingMethod) -> Self {
        Self {
            run_id,
            tenant_id,
            status: RunStatus::Pending,
            mode,
            started_at: Utc::now(),
            completed_at: None,
            rolled_back_at: None,
            error_message: None,
            input_file_id: None,
            sales_processed: 0,
            movements_recorded: 0,
            validation_error_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
