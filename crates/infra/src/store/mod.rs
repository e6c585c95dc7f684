//! Ledger store boundary.
//!
//! This module defines the storage-facing abstraction the ledger runs on
//! without making any storage-engine assumptions.
//!
//! ## Pieces
//!
//! - [`LedgerStore`]: opens transactions and serves tenant-scoped snapshot reads
//! - [`LedgerTransaction`]: tenant-filtered reads, id allocation and an atomic
//!   `commit` of a batch of staged changes
//! - [`ChangeSet`]: the entities changed in one unit of work (insert / update /
//!   delete, with the as-loaded original for updates and deletes)
//! - [`CommitHooks`]: pre-commit hooks invoked with the change set, decoupled
//!   from any store implementation (tenant enforcement, audit capture)
//! - [`UnitOfWork`]: ties one transaction, its change set and the hook chain
//!   together for a single attempt
//!
//! ## Commit contract
//!
//! `commit` must apply every staged change or none of them. For
//! `InventoryItem` updates and deletes the store compares the row version the
//! writer loaded with the stored one and fails with
//! [`StoreError::Concurrency`] on mismatch. A duplicate inventory-item key on
//! insert is reported the same way (another writer created the row first).

pub mod change_set;
pub mod hooks;
pub mod in_memory;
pub mod postgres;
pub mod record;
pub mod unit_of_work;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::{LedgerError, ProductId, TenantId, WarehouseId};
use stockledger_inventory::{
    AuditLog, InventoryItem, LowStockReport, Product, StockMovement, StockRow, Warehouse,
};

use crate::audit::AuditQuery;

pub use change_set::{ChangeKind, ChangeSet, StagedChange};
pub use hooks::{CommitContext, CommitHook, CommitHooks};
pub use in_memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use record::{EntityKind, LedgerRecord, RecordKey};
pub use unit_of_work::{CommitReceipt, UnitOfWork};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to business-rule failures.
/// [`StoreError::Concurrency`] is the only kind the movement engine retries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row read by the writer changed (or appeared) before commit.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Delete refused: the row is still referenced.
    #[error("row is still referenced: {0}")]
    Referenced(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// The staged batch is malformed (e.g. duplicate primary key).
    #[error("invalid change: {0}")]
    InvalidChange(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => LedgerError::Concurrency(msg),
            StoreError::UniqueViolation(msg) | StoreError::Referenced(msg) => {
                LedgerError::Conflict(msg)
            }
            StoreError::TenantIsolation(msg) => LedgerError::CrossTenantViolation(msg),
            other @ (StoreError::InvalidChange(_) | StoreError::Backend(_)) => {
                LedgerError::Store(other.to_string())
            }
        }
    }
}

/// One open store transaction, exclusively owned by a single unit of work.
///
/// Every read is filtered by `tenant_id`: a row owned by another tenant is
/// reported as absent.
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn product(
        &mut self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    async fn warehouse(
        &mut self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>, StoreError>;

    async fn inventory_item(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<InventoryItem>, StoreError>;

    /// Reserve a primary key for a row about to be inserted.
    async fn allocate_id(&mut self, kind: EntityKind) -> Result<i64, StoreError>;

    /// Apply the staged changes atomically and end the transaction.
    ///
    /// Audit rows staged with id 0 get their id assigned here.
    async fn commit(self: Box<Self>, changes: &mut [StagedChange]) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Relational ledger store.
///
/// Listing operations are consistent snapshot reads scoped to one tenant.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError>;

    /// Balances joined with product and warehouse, ordered by (warehouse, product).
    async fn list_stock(&self, tenant_id: TenantId) -> Result<Vec<StockRow>, StoreError>;

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError>;

    async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>, StoreError>;

    /// Movements ordered by id, optionally for one product.
    async fn list_movements(
        &self,
        tenant_id: TenantId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockMovement>, StoreError>;

    /// Audit rows newest first, filtered and paged by `query`.
    async fn list_audit(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLog>, StoreError>;

    async fn list_reports(&self, tenant_id: TenantId) -> Result<Vec<LowStockReport>, StoreError>;

    /// Every tenant owning at least one product or warehouse.
    async fn tenants(&self) -> Result<Vec<TenantId>, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        (**self).begin().await
    }

    async fn list_stock(&self, tenant_id: TenantId) -> Result<Vec<StockRow>, StoreError> {
        (**self).list_stock(tenant_id).await
    }

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        (**self).list_products(tenant_id).await
    }

    async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>, StoreError> {
        (**self).list_warehouses(tenant_id).await
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        (**self).list_movements(tenant_id, product_id).await
    }

    async fn list_audit(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLog>, StoreError> {
        (**self).list_audit(tenant_id, query).await
    }

    async fn list_reports(&self, tenant_id: TenantId) -> Result<Vec<LowStockReport>, StoreError> {
        (**self).list_reports(tenant_id).await
    }

    async fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        (**self).tenants().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_the_ledger_taxonomy() {
        assert!(matches!(
            LedgerError::from(StoreError::Concurrency("x".into())),
            LedgerError::Concurrency(_)
        ));
        assert!(matches!(
            LedgerError::from(StoreError::UniqueViolation("sku".into())),
            LedgerError::Conflict(_)
        ));
        assert!(matches!(
            LedgerError::from(StoreError::Referenced("product".into())),
            LedgerError::Conflict(_)
        ));
        assert!(matches!(
            LedgerError::from(StoreError::TenantIsolation("row".into())),
            LedgerError::CrossTenantViolation(_)
        ));
        assert!(matches!(
            LedgerError::from(StoreError::Backend("io".into())),
            LedgerError::Store(_)
        ));
    }
}
