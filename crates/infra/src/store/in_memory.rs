use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use stockledger_core::{AuditLogId, ProductId, TenantId, TenantScoped, WarehouseId};
use stockledger_inventory::{
    AuditLog, InventoryItem, LowStockReport, Product, StockMovement, StockRow, Warehouse,
};

use super::change_set::{ChangeKind, StagedChange};
use super::record::{EntityKind, LedgerRecord, RecordKey};
use super::{LedgerStore, LedgerTransaction, StoreError};
use crate::audit::AuditQuery;

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<i64, Product>,
    warehouses: BTreeMap<i64, Warehouse>,
    items: BTreeMap<i64, InventoryItem>,
    movements: BTreeMap<i64, StockMovement>,
    audit: BTreeMap<i64, AuditLog>,
    reports: BTreeMap<i64, LowStockReport>,
}

impl Tables {
    fn get(&self, key: &RecordKey) -> Option<LedgerRecord> {
        match key.kind {
            EntityKind::Product => self.products.get(&key.id).cloned().map(Into::into),
            EntityKind::Warehouse => self.warehouses.get(&key.id).cloned().map(Into::into),
            EntityKind::InventoryItem => self.items.get(&key.id).cloned().map(Into::into),
            EntityKind::StockMovement => self.movements.get(&key.id).cloned().map(Into::into),
            EntityKind::AuditLog => self.audit.get(&key.id).cloned().map(Into::into),
            EntityKind::LowStockReport => self.reports.get(&key.id).cloned().map(Into::into),
        }
    }

    fn put(&mut self, record: LedgerRecord) -> Option<LedgerRecord> {
        let id = record.id();
        match record {
            LedgerRecord::Product(r) => self.products.insert(id, r).map(Into::into),
            LedgerRecord::Warehouse(r) => self.warehouses.insert(id, r).map(Into::into),
            LedgerRecord::InventoryItem(r) => self.items.insert(id, r).map(Into::into),
            LedgerRecord::StockMovement(r) => self.movements.insert(id, r).map(Into::into),
            LedgerRecord::AuditLog(r) => self.audit.insert(id, r).map(Into::into),
            LedgerRecord::LowStockReport(r) => self.reports.insert(id, r).map(Into::into),
        }
    }

    fn remove(&mut self, key: &RecordKey) -> Option<LedgerRecord> {
        match key.kind {
            EntityKind::Product => self.products.remove(&key.id).map(Into::into),
            EntityKind::Warehouse => self.warehouses.remove(&key.id).map(Into::into),
            EntityKind::InventoryItem => self.items.remove(&key.id).map(Into::into),
            EntityKind::StockMovement => self.movements.remove(&key.id).map(Into::into),
            EntityKind::AuditLog => self.audit.remove(&key.id).map(Into::into),
            EntityKind::LowStockReport => self.reports.remove(&key.id).map(Into::into),
        }
    }

    fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<&Product> {
        self.products
            .get(&id.get())
            .filter(|p| p.tenant_id == tenant_id)
    }

    fn warehouse(&self, tenant_id: TenantId, id: WarehouseId) -> Option<&Warehouse> {
        self.warehouses
            .get(&id.get())
            .filter(|w| w.tenant_id == tenant_id)
    }

    fn item(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Option<&InventoryItem> {
        self.items.values().find(|i| {
            i.tenant_id() == tenant_id
                && i.product_id() == product_id
                && i.warehouse_id() == warehouse_id
        })
    }

    /// Check and write one staged change.
    fn apply(&mut self, change: &StagedChange) -> Result<(), StoreError> {
        let key = change.key();
        let stored = self.get(&key);

        let append_only = matches!(
            key.kind,
            EntityKind::StockMovement | EntityKind::AuditLog | EntityKind::LowStockReport
        );
        if append_only && change.kind() != ChangeKind::Insert {
            return Err(StoreError::InvalidChange(format!(
                "{} rows are append-only",
                key.kind.type_name()
            )));
        }

        match change.kind() {
            ChangeKind::Insert => {
                if stored.is_some() {
                    return Err(StoreError::InvalidChange(format!("{key} already exists")));
                }
                self.check_insert(change.current())?;
                self.put(change.current().clone());
            }
            ChangeKind::Update => {
                let stored = stored
                    .ok_or_else(|| StoreError::Concurrency(format!("{key} no longer exists")))?;
                self.check_existing(change, &stored)?;
                self.check_unique(change.current())?;
                self.put(change.current().clone());
            }
            ChangeKind::Delete => {
                let stored = stored
                    .ok_or_else(|| StoreError::Concurrency(format!("{key} no longer exists")))?;
                self.check_existing(change, &stored)?;
                self.check_unreferenced(&stored)?;
                self.remove(&key);
            }
        }
        Ok(())
    }

    fn check_insert(&self, record: &LedgerRecord) -> Result<(), StoreError> {
        if let Some(scoped) = record.tenant_scoped() {
            if scoped.tenant_id().is_nil() {
                return Err(StoreError::TenantIsolation(format!(
                    "{} has no tenant",
                    record.key()
                )));
            }
        }

        match record {
            LedgerRecord::InventoryItem(item) => {
                let tenant = item.tenant_id();
                if self.item(tenant, item.product_id(), item.warehouse_id()).is_some() {
                    return Err(StoreError::Concurrency(format!(
                        "inventory item for product {} at warehouse {} was created concurrently",
                        item.product_id(),
                        item.warehouse_id()
                    )));
                }
                self.require_references(tenant, item.product_id(), &[item.warehouse_id()])
            }
            LedgerRecord::StockMovement(m) => {
                let warehouses: Vec<WarehouseId> =
                    [m.warehouse_id, m.from_warehouse_id, m.to_warehouse_id]
                        .into_iter()
                        .flatten()
                        .collect();
                self.require_references(m.tenant_id, m.product_id, &warehouses)
            }
            other => self.check_unique(other),
        }
    }

    /// Stored row must still be the one the writer loaded.
    fn check_existing(
        &self,
        change: &StagedChange,
        stored: &LedgerRecord,
    ) -> Result<(), StoreError> {
        let Some(original) = change.original() else {
            return Err(StoreError::InvalidChange(format!(
                "{} staged without its original",
                change.key()
            )));
        };

        if let (Some(stored), Some(original)) = (stored.tenant_scoped(), original.tenant_scoped()) {
            if stored.tenant_id() != original.tenant_id() {
                return Err(StoreError::TenantIsolation(format!(
                    "{} belongs to another tenant",
                    change.key()
                )));
            }
        }

        if let (Some(stored), Some(original)) =
            (stored.as_inventory_item(), original.as_inventory_item())
        {
            if stored.row_version() != original.row_version() {
                return Err(StoreError::Concurrency(format!(
                    "{} row version {} is stale (stored {})",
                    change.key(),
                    original.row_version(),
                    stored.row_version()
                )));
            }
        }
        Ok(())
    }

    fn check_unique(&self, record: &LedgerRecord) -> Result<(), StoreError> {
        match record {
            LedgerRecord::Product(p) => {
                let taken = self.products.values().any(|other| {
                    other.id != p.id && other.tenant_id == p.tenant_id && other.sku == p.sku
                });
                if taken {
                    return Err(StoreError::UniqueViolation(format!(
                        "product SKU '{}' already exists",
                        p.sku
                    )));
                }
            }
            LedgerRecord::Warehouse(w) => {
                let taken = self.warehouses.values().any(|other| {
                    other.id != w.id && other.tenant_id == w.tenant_id && other.name == w.name
                });
                if taken {
                    return Err(StoreError::UniqueViolation(format!(
                        "warehouse name '{}' already exists",
                        w.name
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn require_references(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouses: &[WarehouseId],
    ) -> Result<(), StoreError> {
        if self.product(tenant_id, product_id).is_none() {
            return Err(StoreError::Concurrency(format!("product {product_id} no longer exists")));
        }
        for warehouse_id in warehouses {
            if self.warehouse(tenant_id, *warehouse_id).is_none() {
                return Err(StoreError::Concurrency(format!(
                    "warehouse {warehouse_id} no longer exists"
                )));
            }
        }
        Ok(())
    }

    fn check_unreferenced(&self, stored: &LedgerRecord) -> Result<(), StoreError> {
        let referenced = match stored {
            LedgerRecord::Product(p) => {
                self.items.values().any(|i| i.product_id() == p.id)
                    || self.movements.values().any(|m| m.product_id == p.id)
            }
            LedgerRecord::Warehouse(w) => {
                let id = Some(w.id);
                self.items.values().any(|i| i.warehouse_id() == w.id)
                    || self.movements.values().any(|m| {
                        m.warehouse_id == id || m.from_warehouse_id == id || m.to_warehouse_id == id
                    })
            }
            _ => false,
        };
        if referenced {
            return Err(StoreError::Referenced(format!(
                "{} is referenced by stock records",
                stored.key()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: RwLock<Tables>,
    sequences: Mutex<BTreeMap<EntityKind, i64>>,
}

impl Inner {
    fn next_id(&self, kind: EntityKind) -> Result<i64, StoreError> {
        let mut sequences = self
            .sequences
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let next = sequences.entry(kind).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Not optimized for performance. Reads inside a
/// transaction see committed state; staged changes stay with the caller until
/// `commit`, which checks and applies the whole batch under the write lock and
/// restores the previous state if any change is refused.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    inner: Arc<Inner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct InMemoryTransaction {
    inner: Arc<Inner>,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn product(
        &mut self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read()?.product(tenant_id, id).cloned())
    }

    async fn warehouse(
        &mut self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>, StoreError> {
        Ok(self.inner.read()?.warehouse(tenant_id, id).cloned())
    }

    async fn inventory_item(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self
            .inner
            .read()?
            .item(tenant_id, product_id, warehouse_id)
            .cloned())
    }

    async fn allocate_id(&mut self, kind: EntityKind) -> Result<i64, StoreError> {
        self.inner.next_id(kind)
    }

    async fn commit(self: Box<Self>, changes: &mut [StagedChange]) -> Result<(), StoreError> {
        for change in changes.iter_mut() {
            if let LedgerRecord::AuditLog(row) = change.current_mut() {
                if !row.id.is_valid() {
                    row.id = AuditLogId::new(self.inner.next_id(EntityKind::AuditLog)?);
                }
            }
        }

        let mut tables = self
            .inner
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let mut undo: Vec<(RecordKey, Option<LedgerRecord>)> = Vec::with_capacity(changes.len());
        for change in changes.iter() {
            let key = change.key();
            let before = tables.get(&key);
            if let Err(err) = tables.apply(change) {
                for (key, before) in undo.into_iter().rev() {
                    match before {
                        Some(record) => {
                            tables.put(record);
                        }
                        None => {
                            tables.remove(&key);
                        }
                    }
                }
                return Err(err);
            }
            undo.push((key, before));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            inner: self.inner.clone(),
        }))
    }

    async fn list_stock(&self, tenant_id: TenantId) -> Result<Vec<StockRow>, StoreError> {
        let tables = self.inner.read()?;
        let mut rows: Vec<StockRow> = tables
            .items
            .values()
            .filter(|i| i.tenant_id() == tenant_id)
            .filter_map(|i| {
                let product = tables.product(tenant_id, i.product_id())?;
                let warehouse = tables.warehouse(tenant_id, i.warehouse_id())?;
                Some(StockRow {
                    warehouse_id: warehouse.id,
                    warehouse_name: warehouse.name.clone(),
                    product_id: product.id,
                    sku: product.sku.clone(),
                    product_name: product.name.clone(),
                    quantity_on_hand: i.quantity_on_hand(),
                })
            })
            .collect();
        rows.sort_by_key(StockRow::sort_key);
        Ok(rows)
    }

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .inner
            .read()?
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>, StoreError> {
        Ok(self
            .inner
            .read()?
            .warehouses
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        Ok(self
            .inner
            .read()?
            .movements
            .values()
            .filter(|m| m.tenant_id == tenant_id)
            .filter(|m| product_id.is_none_or(|p| m.product_id == p))
            .cloned()
            .collect())
    }

    async fn list_audit(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLog>, StoreError> {
        let query = query.normalized();
        let tables = self.inner.read()?;
        let mut rows: Vec<&AuditLog> = tables
            .audit
            .values()
            .filter(|a| a.tenant_id == tenant_id && query.matches(a))
            .collect();
        rows.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        Ok(rows
            .into_iter()
            .skip(query.skip)
            .take(query.take)
            .cloned()
            .collect())
    }

    async fn list_reports(&self, tenant_id: TenantId) -> Result<Vec<LowStockReport>, StoreError> {
        Ok(self
            .inner
            .read()?
            .reports
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let tables = self.inner.read()?;
        let tenants: BTreeSet<TenantId> = tables
            .products
            .values()
            .map(|p| p.tenant_id)
            .chain(tables.warehouses.values().map(|w| w.tenant_id))
            .collect();
        Ok(tenants.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChangeSet;
    use rust_decimal::Decimal;
    use stockledger_core::InventoryItemId;
    use stockledger_inventory::ConcurrencyToken;

    fn product(tenant: TenantId, id: i64, sku: &str) -> Product {
        Product {
            id: ProductId::new(id),
            tenant_id: tenant,
            sku: sku.to_string(),
            name: format!("Product {id}"),
            price: Decimal::ONE,
            active: true,
        }
    }

    fn warehouse(tenant: TenantId, id: i64, name: &str) -> Warehouse {
        Warehouse {
            id: WarehouseId::new(id),
            tenant_id: tenant,
            name: name.to_string(),
            is_active: true,
        }
    }

    fn item(tenant: TenantId, id: i64, qty: i64) -> InventoryItem {
        InventoryItem::restore(
            InventoryItemId::new(id),
            tenant,
            ProductId::new(1),
            WarehouseId::new(1),
            Decimal::from(qty),
            ConcurrencyToken::fresh(),
        )
        .unwrap()
    }

    async fn commit(store: &InMemoryLedgerStore, changes: ChangeSet) -> Result<(), StoreError> {
        let tx = store.begin().await?;
        let mut changes = changes.into_changes();
        tx.commit(&mut changes).await
    }

    async fn seed(store: &InMemoryLedgerStore, tenant: TenantId) {
        let mut cs = ChangeSet::new();
        cs.insert(product(tenant, 1, "SKU-1").into()).unwrap();
        cs.insert(warehouse(tenant, 1, "Main").into()).unwrap();
        cs.insert(item(tenant, 1, 10).into()).unwrap();
        commit(store, cs).await.unwrap();
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_trace() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        seed(&store, tenant).await;

        let mut cs = ChangeSet::new();
        cs.insert(warehouse(tenant, 2, "Overflow").into()).unwrap();
        cs.insert(product(tenant, 2, "SKU-1").into()).unwrap();
        let err = commit(&store, cs).await.unwrap_err();

        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(store.list_warehouses(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_row_version_is_refused() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        seed(&store, tenant).await;

        let mut tx = store.begin().await.unwrap();
        let loaded = tx
            .inventory_item(tenant, ProductId::new(1), WarehouseId::new(1))
            .await
            .unwrap()
            .unwrap();

        // Another writer bumps the row first.
        let mut first = ChangeSet::new();
        first.track(loaded.clone().into());
        let mut bumped = loaded.clone();
        bumped.receive(Decimal::ONE).unwrap();
        bumped.set_row_version(ConcurrencyToken::fresh());
        first.update(bumped.into()).unwrap();
        commit(&store, first).await.unwrap();

        let mut second = ChangeSet::new();
        second.track(loaded.clone().into());
        let mut stale = loaded;
        stale.withdraw(Decimal::ONE).unwrap();
        stale.set_row_version(ConcurrencyToken::fresh());
        second.update(stale.into()).unwrap();
        let mut changes = second.into_changes();
        let err = tx.commit(&mut changes).await.unwrap_err();

        assert!(matches!(err, StoreError::Concurrency(_)));
        let rows = store.list_stock(tenant).await.unwrap();
        assert_eq!(rows[0].quantity_on_hand, Decimal::from(11));
    }

    #[tokio::test]
    async fn duplicate_item_key_reads_as_concurrency() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        seed(&store, tenant).await;

        let mut cs = ChangeSet::new();
        cs.insert(item(tenant, 2, 3).into()).unwrap();
        let err = commit(&store, cs).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[tokio::test]
    async fn referenced_product_cannot_be_deleted() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        seed(&store, tenant).await;

        let mut cs = ChangeSet::new();
        cs.track(product(tenant, 1, "SKU-1").into());
        cs.delete(RecordKey::new(EntityKind::Product, 1)).unwrap();
        let err = commit(&store, cs).await.unwrap_err();
        assert!(matches!(err, StoreError::Referenced(_)));
    }

    #[tokio::test]
    async fn reads_are_tenant_filtered() {
        let store = InMemoryLedgerStore::new();
        let a = TenantId::new();
        let b = TenantId::new();
        seed(&store, a).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.product(b, ProductId::new(1)).await.unwrap().is_none());
        assert!(tx.product(a, ProductId::new(1)).await.unwrap().is_some());
        assert!(store.list_stock(b).await.unwrap().is_empty());
        assert_eq!(store.tenants().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn unstamped_insert_is_refused() {
        let store = InMemoryLedgerStore::new();

        let mut cs = ChangeSet::new();
        cs.insert(product(TenantId::nil(), 1, "SKU-1").into()).unwrap();
        let err = commit(&store, cs).await.unwrap_err();

        assert!(matches!(err, StoreError::TenantIsolation(_)));
        assert!(store.tenants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_through_another_tenant_is_refused() {
        let store = InMemoryLedgerStore::new();
        let a = TenantId::new();
        let b = TenantId::new();
        seed(&store, a).await;

        // Same key, but the writer believes the row belongs to `b`.
        let mut cs = ChangeSet::new();
        cs.track(product(b, 1, "SKU-1").into());
        let mut hijacked = product(b, 1, "SKU-1");
        hijacked.name = "Taken".to_string();
        cs.update(hijacked.into()).unwrap();
        let err = commit(&store, cs).await.unwrap_err();

        assert!(matches!(err, StoreError::TenantIsolation(_)));
        let mut tx = store.begin().await.unwrap();
        let kept = tx.product(a, ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(kept.name, "Product 1");
        assert!(tx.product(b, ProductId::new(1)).await.unwrap().is_none());
    }
}
