//! `stockledger-core`: shared building blocks of the inventory ledger.
//!
//! This crate contains **pure** primitives (no infrastructure concerns):
//! identifiers, the per-operation tenant context, the entity capability used by
//! save-time hooks, and the error taxonomy surfaced to callers.

pub mod entity;
pub mod error;
pub mod id;
pub mod tenant;

pub use entity::{Entity, Snapshot};
pub use error::{LedgerError, LedgerResult};
pub use id::{
    ActorId, AuditLogId, InventoryItemId, MovementId, ProductId, ReportId, TenantId, WarehouseId,
};
pub use tenant::{TenantContext, TenantScoped};
