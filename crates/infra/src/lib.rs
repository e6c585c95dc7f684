//! Infrastructure layer: the ledger store boundary and its backends, the
//! commit hooks (tenant enforcement, audit capture), the movement engine and
//! the services built on top of it.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod jobs;
pub mod movement_engine;
pub mod queries;
pub mod store;
pub mod tenancy;

pub use audit::{AuditCapture, AuditQuery};
pub use catalog::CatalogService;
pub use config::{LedgerConfig, LowStockConfig, RetryPolicy};
pub use jobs::LowStockReportJob;
pub use movement_engine::MovementEngine;
pub use queries::LedgerQueries;
pub use store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore, StoreError, UnitOfWork};
pub use tenancy::TenantEnforcement;
