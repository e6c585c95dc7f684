//! One transactional attempt: a store transaction, its change set and the
//! hook chain that runs before commit.

use std::sync::Arc;

use tracing::{debug, warn};

use stockledger_core::{
    ActorId, LedgerError, LedgerResult, ProductId, TenantContext, TenantId, WarehouseId,
};
use stockledger_inventory::{InventoryItem, Product, Warehouse};

use super::change_set::{ChangeSet, StagedChange};
use super::hooks::{CommitContext, CommitHooks};
use super::record::{EntityKind, LedgerRecord, RecordKey};
use super::{LedgerStore, LedgerTransaction};

/// Unit of work bound to one resolved tenant.
///
/// Dropping it without calling [`UnitOfWork::commit`] discards every staged
/// change.
pub struct UnitOfWork {
    tx: Box<dyn LedgerTransaction>,
    changes: ChangeSet,
    hooks: Arc<CommitHooks>,
    tenant: TenantContext,
    tenant_id: TenantId,
    actor: Option<ActorId>,
}

impl UnitOfWork {
    /// Open a transaction for `tenant`.
    ///
    /// Fails with `TenantNotResolved` before touching the store when the
    /// context carries no tenant.
    pub async fn begin<S>(
        store: &S,
        hooks: Arc<CommitHooks>,
        tenant: TenantContext,
        actor: Option<ActorId>,
    ) -> LedgerResult<Self>
    where
        S: LedgerStore + ?Sized,
    {
        let tenant_id = tenant.require()?;
        let tx = store.begin().await?;
        Ok(Self {
            tx,
            changes: ChangeSet::new(),
            hooks,
            tenant,
            tenant_id,
            actor,
        })
    }

    /// Read a product without tracking it.
    pub async fn find_product(&mut self, id: ProductId) -> LedgerResult<Option<Product>> {
        Ok(self.tx.product(self.tenant_id, id).await?)
    }

    /// Read a product for update.
    pub async fn load_product(&mut self, id: ProductId) -> LedgerResult<Product> {
        let product = self
            .find_product(id)
            .await?
            .ok_or(LedgerError::not_found("Product"))?;
        self.changes.track(product.clone().into());
        Ok(product)
    }

    pub async fn find_warehouse(&mut self, id: WarehouseId) -> LedgerResult<Option<Warehouse>> {
        Ok(self.tx.warehouse(self.tenant_id, id).await?)
    }

    /// Read a warehouse for update.
    pub async fn load_warehouse(&mut self, id: WarehouseId) -> LedgerResult<Warehouse> {
        let warehouse = self
            .find_warehouse(id)
            .await?
            .ok_or(LedgerError::not_found("Warehouse"))?;
        self.changes.track(warehouse.clone().into());
        Ok(warehouse)
    }

    /// Read the balance row of `(product, warehouse)` for update.
    pub async fn load_inventory_item(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> LedgerResult<Option<InventoryItem>> {
        let item = self
            .tx
            .inventory_item(self.tenant_id, product_id, warehouse_id)
            .await?;
        if let Some(item) = &item {
            self.changes.track(item.clone().into());
        }
        Ok(item)
    }

    pub async fn allocate_id(&mut self, kind: EntityKind) -> LedgerResult<i64> {
        Ok(self.tx.allocate_id(kind).await?)
    }

    pub fn stage_insert(&mut self, record: impl Into<LedgerRecord>) -> LedgerResult<()> {
        self.changes.insert(record.into())
    }

    pub fn stage_update(&mut self, record: impl Into<LedgerRecord>) -> LedgerResult<()> {
        self.changes.update(record.into())
    }

    pub fn stage_delete(&mut self, key: RecordKey) -> LedgerResult<()> {
        self.changes.delete(key)
    }

    /// Run the hook chain, then commit every staged change atomically.
    pub async fn commit(self) -> LedgerResult<CommitReceipt> {
        let UnitOfWork {
            tx,
            mut changes,
            hooks,
            tenant,
            actor,
            ..
        } = self;

        let ctx = CommitContext::new(tenant, actor);
        if let Err(err) = hooks.run(&ctx, &mut changes) {
            discard(tx).await;
            return Err(err);
        }

        debug!(changes = changes.len(), "committing unit of work");
        tx.commit(changes.as_mut_slice()).await?;

        Ok(CommitReceipt {
            changes: changes.into_changes(),
        })
    }

    pub async fn rollback(self) {
        discard(self.tx).await;
    }
}

async fn discard(tx: Box<dyn LedgerTransaction>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "rollback failed");
    }
}

/// What a successful commit wrote, after hooks ran and the store assigned ids.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    changes: Vec<StagedChange>,
}

impl CommitReceipt {
    pub fn record(&self, key: &RecordKey) -> Option<&LedgerRecord> {
        self.changes
            .iter()
            .find(|c| !c.is_generated() && c.key() == *key)
            .map(StagedChange::current)
    }

    /// The committed state of `key`, converted back to its concrete type.
    pub fn get<T>(&self, key: &RecordKey) -> Option<T>
    where
        T: TryFrom<LedgerRecord>,
    {
        self.record(key).cloned().and_then(|r| T::try_from(r).ok())
    }
}
