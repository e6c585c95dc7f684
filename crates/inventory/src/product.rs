use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, LedgerError, LedgerResult, ProductId, TenantId, TenantScoped};

/// A sellable product. `(tenant_id, sku)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub active: bool,
}

impl TenantScoped for Product {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = tenant_id;
    }
}

impl Entity for Product {
    const ENTITY_TYPE: &'static str = "Product";

    fn key(&self) -> i64 {
        self.id.get()
    }
}

/// Input for creating a product.
///
/// The tenant is never taken from the caller; it is stamped at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub active: bool,
}

impl NewProduct {
    /// Validate and build an unstamped product with the store-assigned id.
    pub fn into_product(self, id: ProductId) -> LedgerResult<Product> {
        let sku = self.sku.trim();
        let name = self.name.trim();
        if sku.is_empty() || name.is_empty() {
            return Err(LedgerError::invalid_request("SKU and Name are required."));
        }
        ensure_price(self.price)?;

        Ok(Product {
            id,
            tenant_id: TenantId::nil(),
            sku: sku.to_string(),
            name: name.to_string(),
            price: self.price,
            active: self.active,
        })
    }
}

/// Input for updating a product. The SKU is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub price: Decimal,
    pub active: bool,
}

impl ProductUpdate {
    pub fn apply_to(self, product: &mut Product) -> LedgerResult<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(LedgerError::invalid_request("Name is required."));
        }
        ensure_price(self.price)?;

        product.name = name.to_string();
        product.price = self.price;
        product.active = self.active;
        Ok(())
    }
}

fn ensure_price(price: Decimal) -> LedgerResult<()> {
    if price < Decimal::ZERO {
        return Err(LedgerError::invalid_request("Price must be non-negative."));
    }
    crate::item::ensure_scale(price, "Price")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(sku: &str, name: &str, price: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: name.to_string(),
            price: Decimal::from(price),
            active: true,
        }
    }

    #[test]
    fn new_product_is_trimmed_and_unstamped() {
        let p = draft("  SKU-1 ", " Widget ", 3).into_product(ProductId::new(1)).unwrap();
        assert_eq!(p.sku, "SKU-1");
        assert_eq!(p.name, "Widget");
        assert!(p.tenant_id.is_nil());
    }

    #[test]
    fn new_product_requires_sku_and_name() {
        let err = draft("   ", "Widget", 1).into_product(ProductId::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));

        let err = draft("SKU", "", 1).into_product(ProductId::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = draft("SKU", "Widget", -1).into_product(ProductId::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }

    #[test]
    fn price_finer_than_storage_is_rejected() {
        let mut d = draft("SKU", "Widget", 1);
        d.price = Decimal::new(19_999, 5);
        let err = d.into_product(ProductId::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));

        let mut p = draft("SKU", "Widget", 1).into_product(ProductId::new(1)).unwrap();
        let err = ProductUpdate {
            name: "Widget".to_string(),
            price: Decimal::new(1, 6),
            active: true,
        }
        .apply_to(&mut p)
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
        assert_eq!(p.price, Decimal::ONE);
    }

    #[test]
    fn update_keeps_sku() {
        let mut p = draft("SKU-1", "Widget", 3).into_product(ProductId::new(1)).unwrap();
        ProductUpdate {
            name: "Gadget".to_string(),
            price: Decimal::new(450, 2),
            active: false,
        }
        .apply_to(&mut p)
        .unwrap();

        assert_eq!(p.sku, "SKU-1");
        assert_eq!(p.name, "Gadget");
        assert_eq!(p.price, Decimal::new(45, 1));
        assert!(!p.active);
    }
}
