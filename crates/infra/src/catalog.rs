//! Product and warehouse maintenance.
//!
//! Writes go through a [`UnitOfWork`], so tenant enforcement and audit
//! capture apply exactly as they do for movements.

use std::sync::Arc;

use tracing::{info, instrument};

use stockledger_core::{
    ActorId, LedgerError, LedgerResult, ProductId, TenantContext, WarehouseId,
};
use stockledger_inventory::{
    NewProduct, NewWarehouse, Product, ProductUpdate, Warehouse, WarehouseUpdate,
};

use crate::store::{CommitHooks, EntityKind, LedgerStore, RecordKey, UnitOfWork};

pub struct CatalogService<S> {
    store: S,
    hooks: Arc<CommitHooks>,
}

impl<S> CatalogService<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            hooks: Arc::new(CommitHooks::standard()),
        }
    }

    pub fn with_hooks(mut self, hooks: CommitHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    async fn begin(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
    ) -> LedgerResult<UnitOfWork> {
        UnitOfWork::begin(&self.store, self.hooks.clone(), tenant, actor).await
    }

    // Products

    pub async fn list_products(&self, tenant: TenantContext) -> LedgerResult<Vec<Product>> {
        let tenant_id = tenant.require()?;
        Ok(self.store.list_products(tenant_id).await?)
    }

    pub async fn get_product(&self, tenant: TenantContext, id: ProductId) -> LedgerResult<Product> {
        let mut uow = self.begin(tenant, None).await?;
        let found = uow.find_product(id).await;
        uow.rollback().await;
        found?.ok_or(LedgerError::not_found("Product"))
    }

    #[instrument(skip(self, new), err)]
    pub async fn create_product(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        new: NewProduct,
    ) -> LedgerResult<Product> {
        let mut uow = self.begin(tenant, actor).await?;
        let id = ProductId::new(uow.allocate_id(EntityKind::Product).await?);
        let product = new.into_product(id)?;
        uow.stage_insert(product)?;

        let receipt = uow.commit().await?;
        let product: Product = receipt
            .get(&RecordKey::new(EntityKind::Product, id.get()))
            .ok_or_else(|| LedgerError::store("committed product missing from receipt"))?;
        info!(product_id = %product.id, sku = %product.sku, "product created");
        Ok(product)
    }

    #[instrument(skip(self, update), err)]
    pub async fn update_product(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        id: ProductId,
        update: ProductUpdate,
    ) -> LedgerResult<Product> {
        let mut uow = self.begin(tenant, actor).await?;
        let mut product = uow.load_product(id).await?;
        update.apply_to(&mut product)?;
        uow.stage_update(product.clone())?;
        uow.commit().await?;
        Ok(product)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_product(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        id: ProductId,
    ) -> LedgerResult<()> {
        let mut uow = self.begin(tenant, actor).await?;
        uow.load_product(id).await?;
        uow.stage_delete(RecordKey::new(EntityKind::Product, id.get()))?;
        uow.commit().await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    // Warehouses

    pub async fn list_warehouses(&self, tenant: TenantContext) -> LedgerResult<Vec<Warehouse>> {
        let tenant_id = tenant.require()?;
        Ok(self.store.list_warehouses(tenant_id).await?)
    }

    pub async fn get_warehouse(
        &self,
        tenant: TenantContext,
        id: WarehouseId,
    ) -> LedgerResult<Warehouse> {
        let mut uow = self.begin(tenant, None).await?;
        let found = uow.find_warehouse(id).await;
        uow.rollback().await;
        found?.ok_or(LedgerError::not_found("Warehouse"))
    }

    #[instrument(skip(self, new), err)]
    pub async fn create_warehouse(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        new: NewWarehouse,
    ) -> LedgerResult<Warehouse> {
        let mut uow = self.begin(tenant, actor).await?;
        let id = WarehouseId::new(uow.allocate_id(EntityKind::Warehouse).await?);
        uow.stage_insert(new.into_warehouse(id)?)?;

        let receipt = uow.commit().await?;
        let warehouse: Warehouse = receipt
            .get(&RecordKey::new(EntityKind::Warehouse, id.get()))
            .ok_or_else(|| LedgerError::store("committed warehouse missing from receipt"))?;
        info!(warehouse_id = %warehouse.id, name = %warehouse.name, "warehouse created");
        Ok(warehouse)
    }

    #[instrument(skip(self, update), err)]
    pub async fn update_warehouse(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        id: WarehouseId,
        update: WarehouseUpdate,
    ) -> LedgerResult<Warehouse> {
        let mut uow = self.begin(tenant, actor).await?;
        let mut warehouse = uow.load_warehouse(id).await?;
        update.apply_to(&mut warehouse)?;
        uow.stage_update(warehouse.clone())?;
        uow.commit().await?;
        Ok(warehouse)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_warehouse(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        id: WarehouseId,
    ) -> LedgerResult<()> {
        let mut uow = self.begin(tenant, actor).await?;
        uow.load_warehouse(id).await?;
        uow.stage_delete(RecordKey::new(EntityKind::Warehouse, id.get()))?;
        uow.commit().await?;
        info!(warehouse_id = %id, "warehouse deleted");
        Ok(())
    }
}
