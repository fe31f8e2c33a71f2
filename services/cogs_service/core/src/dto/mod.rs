//! Data Transfer Objects for caller communication

pub mod attribution;
pub mod common;
pub mod inventory;
pub mod run;

pub use attribution::{
    AttributionDetailResponse, AttributionListResponse, AttributionResponse, MovementResponse,
    SummaryResponse,
};
pub use common::{PageRequest, PaginationInfo};
pub use inventory::{LotInput, LotResponse};
pub use run::{ExecuteRunRequest, RunListQuery, RunResponse, SaleInput};
