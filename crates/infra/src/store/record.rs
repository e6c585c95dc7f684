//! Type-erased ledger records as they flow through a change set.

use stockledger_core::{Entity, LedgerError, LedgerResult, Snapshot, TenantScoped};
use stockledger_inventory::{
    AuditLog, InventoryItem, LowStockReport, Product, StockMovement, Warehouse,
};

/// Persisted record kinds (one table each).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Product,
    Warehouse,
    InventoryItem,
    StockMovement,
    AuditLog,
    LowStockReport,
}

impl EntityKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Product => Product::ENTITY_TYPE,
            EntityKind::Warehouse => Warehouse::ENTITY_TYPE,
            EntityKind::InventoryItem => InventoryItem::ENTITY_TYPE,
            EntityKind::StockMovement => StockMovement::ENTITY_TYPE,
            EntityKind::AuditLog => "AuditLog",
            EntityKind::LowStockReport => LowStockReport::ENTITY_TYPE,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Warehouse => "warehouses",
            EntityKind::InventoryItem => "inventory_items",
            EntityKind::StockMovement => "stock_movements",
            EntityKind::AuditLog => "audit_logs",
            EntityKind::LowStockReport => "low_stock_reports",
        }
    }
}

/// Identity of a row within a change set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl RecordKey {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl core::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}#{}", self.kind.type_name(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerRecord {
    Product(Product),
    Warehouse(Warehouse),
    InventoryItem(InventoryItem),
    StockMovement(StockMovement),
    AuditLog(AuditLog),
    LowStockReport(LowStockReport),
}

impl LedgerRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            LedgerRecord::Product(_) => EntityKind::Product,
            LedgerRecord::Warehouse(_) => EntityKind::Warehouse,
            LedgerRecord::InventoryItem(_) => EntityKind::InventoryItem,
            LedgerRecord::StockMovement(_) => EntityKind::StockMovement,
            LedgerRecord::AuditLog(_) => EntityKind::AuditLog,
            LedgerRecord::LowStockReport(_) => EntityKind::LowStockReport,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            LedgerRecord::Product(r) => r.key(),
            LedgerRecord::Warehouse(r) => r.key(),
            LedgerRecord::InventoryItem(r) => r.key(),
            LedgerRecord::StockMovement(r) => r.key(),
            LedgerRecord::AuditLog(r) => r.id.get(),
            LedgerRecord::LowStockReport(r) => r.key(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.kind(), self.id())
    }

    pub fn entity_type(&self) -> &'static str {
        self.kind().type_name()
    }

    /// `id=<n>` encoding recorded on audit rows.
    pub fn primary_key(&self) -> String {
        format!("id={}", self.id())
    }

    /// Tenant capability; `None` for records that are not tenant-scoped.
    ///
    /// Audit rows carry a tenant id for filtering, but they are owned by audit
    /// capture and never pass through tenant enforcement.
    pub fn tenant_scoped(&self) -> Option<&dyn TenantScoped> {
        match self {
            LedgerRecord::Product(r) => Some(r as &dyn TenantScoped),
            LedgerRecord::Warehouse(r) => Some(r as &dyn TenantScoped),
            LedgerRecord::InventoryItem(r) => Some(r as &dyn TenantScoped),
            LedgerRecord::StockMovement(r) => Some(r as &dyn TenantScoped),
            LedgerRecord::LowStockReport(r) => Some(r as &dyn TenantScoped),
            LedgerRecord::AuditLog(_) => None,
        }
    }

    pub fn tenant_scoped_mut(&mut self) -> Option<&mut dyn TenantScoped> {
        match self {
            LedgerRecord::Product(r) => Some(r as &mut dyn TenantScoped),
            LedgerRecord::Warehouse(r) => Some(r as &mut dyn TenantScoped),
            LedgerRecord::InventoryItem(r) => Some(r as &mut dyn TenantScoped),
            LedgerRecord::StockMovement(r) => Some(r as &mut dyn TenantScoped),
            LedgerRecord::LowStockReport(r) => Some(r as &mut dyn TenantScoped),
            LedgerRecord::AuditLog(_) => None,
        }
    }

    pub fn snapshot(&self) -> LedgerResult<Snapshot> {
        match self {
            LedgerRecord::Product(r) => r.snapshot(),
            LedgerRecord::Warehouse(r) => r.snapshot(),
            LedgerRecord::InventoryItem(r) => r.snapshot(),
            LedgerRecord::StockMovement(r) => r.snapshot(),
            LedgerRecord::LowStockReport(r) => r.snapshot(),
            LedgerRecord::AuditLog(_) => Err(LedgerError::audit("audit rows are not audited")),
        }
    }

    pub fn as_inventory_item(&self) -> Option<&InventoryItem> {
        match self {
            LedgerRecord::InventoryItem(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_inventory_item_mut(&mut self) -> Option<&mut InventoryItem> {
        match self {
            LedgerRecord::InventoryItem(i) => Some(i),
            _ => None,
        }
    }
}

macro_rules! impl_record_conversions {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for LedgerRecord {
                fn from(value: $variant) -> Self {
                    LedgerRecord::$variant(value)
                }
            }

            impl TryFrom<LedgerRecord> for $variant {
                type Error = LedgerRecord;

                fn try_from(value: LedgerRecord) -> Result<Self, Self::Error> {
                    match value {
                        LedgerRecord::$variant(r) => Ok(r),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_record_conversions!(
    Product,
    Warehouse,
    InventoryItem,
    StockMovement,
    AuditLog,
    LowStockReport,
);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use stockledger_core::{ProductId, TenantId};

    fn product() -> Product {
        Product {
            id: ProductId::new(4),
            tenant_id: TenantId::nil(),
            sku: "SKU-4".to_string(),
            name: "Bolt".to_string(),
            price: Decimal::new(125, 2),
            active: true,
        }
    }

    #[test]
    fn key_and_type_come_from_the_wrapped_record() {
        let rec = LedgerRecord::from(product());
        assert_eq!(rec.key(), RecordKey::new(EntityKind::Product, 4));
        assert_eq!(rec.entity_type(), "Product");
        assert_eq!(rec.primary_key(), "id=4");
    }

    #[test]
    fn tenant_capability_reaches_the_record() {
        let mut rec = LedgerRecord::from(product());
        let t = TenantId::new();
        rec.tenant_scoped_mut().unwrap().set_tenant_id(t);
        assert_eq!(rec.tenant_scoped().unwrap().tenant_id(), t);

        let p = Product::try_from(rec).unwrap();
        assert_eq!(p.tenant_id, t);
    }
}
