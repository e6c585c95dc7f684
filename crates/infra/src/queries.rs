//! Read-only, tenant-scoped listings.

use tracing::instrument;

use stockledger_core::{LedgerResult, ProductId, TenantContext};
use stockledger_inventory::{AuditLog, LowStockReport, StockMovement, StockRow};

use crate::audit::AuditQuery;
use crate::store::LedgerStore;

/// Every listing requires a resolved tenant and only ever returns that
/// tenant's rows.
pub struct LedgerQueries<S> {
    store: S,
}

impl<S> LedgerQueries<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Balances ordered by (warehouse id, product id).
    #[instrument(skip(self), err)]
    pub async fn list_stock(&self, tenant: TenantContext) -> LedgerResult<Vec<StockRow>> {
        let tenant_id = tenant.require()?;
        Ok(self.store.list_stock(tenant_id).await?)
    }

    pub async fn list_movements(
        &self,
        tenant: TenantContext,
        product_id: Option<ProductId>,
    ) -> LedgerResult<Vec<StockMovement>> {
        let tenant_id = tenant.require()?;
        Ok(self.store.list_movements(tenant_id, product_id).await?)
    }

    /// Newest first; `take` is clamped to `1..=200`.
    pub async fn list_audit(
        &self,
        tenant: TenantContext,
        query: &AuditQuery,
    ) -> LedgerResult<Vec<AuditLog>> {
        let tenant_id = tenant.require()?;
        Ok(self.store.list_audit(tenant_id, &query.normalized()).await?)
    }

    pub async fn list_reports(&self, tenant: TenantContext) -> LedgerResult<Vec<LowStockReport>> {
        let tenant_id = tenant.require()?;
        Ok(self.store.list_reports(tenant_id).await?)
    }
}
