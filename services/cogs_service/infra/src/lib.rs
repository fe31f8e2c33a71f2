//! COGS Service Infrastructure
//!
//! Implementations of the core repository and service traits:
//!
//! - `repositories/`: PostgreSQL persistence via sqlx
//! - `memory/`: complete in-memory store, the fake persistence variant for tests
//! - `services/`: run coordinator, rollback engine, reporting, Redis tenant lock

pub mod memory;
pub mod repositories;
pub mod services;
