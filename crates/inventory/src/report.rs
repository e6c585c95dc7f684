use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, ReportId, TenantId, TenantScoped};

use crate::stock::StockRow;

/// Snapshot of the balances at or below a threshold, generated periodically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockReport {
    pub id: ReportId,
    pub tenant_id: TenantId,
    pub generated_at: DateTime<Utc>,
    pub threshold: Decimal,
    pub rows: Vec<StockRow>,
}

impl LowStockReport {
    /// Build a report from a full stock listing, keeping rows at or below `threshold`.
    pub fn from_listing(
        id: ReportId,
        threshold: Decimal,
        generated_at: DateTime<Utc>,
        listing: impl IntoIterator<Item = StockRow>,
    ) -> Self {
        let rows = listing
            .into_iter()
            .filter(|r| r.quantity_on_hand <= threshold)
            .collect();

        Self {
            id,
            tenant_id: TenantId::nil(),
            generated_at,
            threshold,
            rows,
        }
    }
}

impl TenantScoped for LowStockReport {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = tenant_id;
    }
}

impl Entity for LowStockReport {
    const ENTITY_TYPE: &'static str = "LowStockReport";

    fn key(&self) -> i64 {
        self.id.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::{ProductId, WarehouseId};

    fn row(product: i64, qty: i64) -> StockRow {
        StockRow {
            warehouse_id: WarehouseId::new(1),
            warehouse_name: "Main".to_string(),
            product_id: ProductId::new(product),
            sku: format!("SKU-{product}"),
            product_name: format!("Product {product}"),
            quantity_on_hand: Decimal::from(qty),
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let report = LowStockReport::from_listing(
            ReportId::new(1),
            Decimal::from(5),
            Utc::now(),
            vec![row(1, 4), row(2, 5), row(3, 6)],
        );
        let products: Vec<_> = report.rows.iter().map(|r| r.product_id.get()).collect();
        assert_eq!(products, vec![1, 2]);
        assert!(report.tenant_id.is_nil());
    }
}
