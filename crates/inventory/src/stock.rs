use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, WarehouseId};

/// One balance line of the stock listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub product_id: ProductId,
    pub sku: String,
    pub product_name: String,
    pub quantity_on_hand: Decimal,
}

impl StockRow {
    /// Listing order: warehouse, then product.
    pub fn sort_key(&self) -> (WarehouseId, ProductId) {
        (self.warehouse_id, self.product_id)
    }
}
