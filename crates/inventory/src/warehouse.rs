use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, LedgerError, LedgerResult, TenantId, TenantScoped, WarehouseId};

/// A stock location. `(tenant_id, name)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub tenant_id: TenantId,
    pub name: String,
    pub is_active: bool,
}

impl TenantScoped for Warehouse {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = tenant_id;
    }
}

impl Entity for Warehouse {
    const ENTITY_TYPE: &'static str = "Warehouse";

    fn key(&self) -> i64 {
        self.id.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    pub is_active: bool,
}

impl NewWarehouse {
    pub fn into_warehouse(self, id: WarehouseId) -> LedgerResult<Warehouse> {
        Ok(Warehouse {
            id,
            tenant_id: TenantId::nil(),
            name: required_name(&self.name)?,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseUpdate {
    pub name: String,
    pub is_active: bool,
}

impl WarehouseUpdate {
    pub fn apply_to(self, warehouse: &mut Warehouse) -> LedgerResult<()> {
        warehouse.name = required_name(&self.name)?;
        warehouse.is_active = self.is_active;
        Ok(())
    }
}

fn required_name(name: &str) -> LedgerResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::invalid_request("Name is required."));
    }
    Ok(name.to_string())
}
