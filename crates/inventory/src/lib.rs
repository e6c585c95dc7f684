//! Inventory ledger domain module.
//!
//! This crate contains the ledger's records and business rules, implemented
//! purely as deterministic domain logic (no IO, no storage). Persistence,
//! tenant enforcement and audit capture live in `stockledger-infra`.

pub mod audit;
pub mod item;
pub mod movement;
pub mod product;
pub mod report;
pub mod stock;
pub mod warehouse;

pub use audit::{AuditLog, AuditOperation};
pub use item::{ConcurrencyToken, DECIMAL_SCALE, InventoryItem};
pub use movement::{CreateMovement, MovementType, Placement, StockMovement, ValidatedMovement};
pub use product::{NewProduct, Product, ProductUpdate};
pub use report::LowStockReport;
pub use stock::StockRow;
pub use warehouse::{NewWarehouse, Warehouse, WarehouseUpdate};
