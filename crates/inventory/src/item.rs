use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{
    Entity, InventoryItemId, LedgerError, LedgerResult, ProductId, TenantId, TenantScoped,
    WarehouseId,
};

/// Decimal places stored for quantities and prices (`NUMERIC(18, 4)`).
pub const DECIMAL_SCALE: u32 = 4;

/// Refuse values with more decimal places than the ledger stores.
pub(crate) fn ensure_scale(value: Decimal, field: &str) -> LedgerResult<()> {
    if value.normalize().scale() > DECIMAL_SCALE {
        return Err(LedgerError::invalid_request(format!(
            "{field} allows at most {DECIMAL_SCALE} decimal places."
        )));
    }
    Ok(())
}

/// Opaque row version of an [`InventoryItem`].
///
/// A fresh value is issued on every insert and every update of the row; the
/// store compares the value read by a writer with the stored one at commit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyToken(Uuid);

impl ConcurrencyToken {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    /// Placeholder carried by a row that has not been staged yet.
    pub const fn unset() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_nil()
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Current balance of one product at one warehouse.
///
/// `(tenant_id, product_id, warehouse_id)` is unique and `quantity_on_hand`
/// never drops below zero: every mutator checks before it writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    tenant_id: TenantId,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    quantity_on_hand: Decimal,
    row_version: ConcurrencyToken,
}

impl InventoryItem {
    /// A new, empty balance row (quantity 0, tenant and token not yet stamped).
    pub fn open(id: InventoryItemId, product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            id,
            tenant_id: TenantId::nil(),
            product_id,
            warehouse_id,
            quantity_on_hand: Decimal::ZERO,
            row_version: ConcurrencyToken::unset(),
        }
    }

    /// Rebuild a row loaded from storage.
    pub fn restore(
        id: InventoryItemId,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity_on_hand: Decimal,
        row_version: ConcurrencyToken,
    ) -> LedgerResult<Self> {
        if quantity_on_hand < Decimal::ZERO {
            return Err(LedgerError::store(format!(
                "inventory item {id} has negative quantity {quantity_on_hand}"
            )));
        }
        Ok(Self {
            id,
            tenant_id,
            product_id,
            warehouse_id,
            quantity_on_hand,
            row_version,
        })
    }

    pub fn id(&self) -> InventoryItemId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn quantity_on_hand(&self) -> Decimal {
        self.quantity_on_hand
    }

    pub fn row_version(&self) -> ConcurrencyToken {
        self.row_version
    }

    pub fn set_row_version(&mut self, token: ConcurrencyToken) {
        self.row_version = token;
    }

    /// Apply a signed change to the balance.
    ///
    /// Fails with `InsufficientStock` (leaving the balance untouched) when the
    /// result would be negative.
    pub fn apply_delta(&mut self, delta: Decimal) -> LedgerResult<Decimal> {
        let next = self.quantity_on_hand + delta;
        if next < Decimal::ZERO {
            return Err(LedgerError::InsufficientStock {
                available: self.quantity_on_hand,
                requested: -delta,
            });
        }
        self.quantity_on_hand = next;
        Ok(next)
    }

    pub fn receive(&mut self, quantity: Decimal) -> LedgerResult<Decimal> {
        self.apply_delta(quantity)
    }

    pub fn withdraw(&mut self, quantity: Decimal) -> LedgerResult<Decimal> {
        self.apply_delta(-quantity)
    }
}

impl TenantScoped for InventoryItem {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = tenant_id;
    }
}

impl Entity for InventoryItem {
    const ENTITY_TYPE: &'static str = "InventoryItem";

    fn key(&self) -> i64 {
        self.id.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> InventoryItem {
        InventoryItem::open(InventoryItemId::new(1), ProductId::new(10), WarehouseId::new(20))
    }

    #[test]
    fn open_row_starts_empty_and_unstamped() {
        let i = item();
        assert_eq!(i.quantity_on_hand(), Decimal::ZERO);
        assert!(i.row_version().is_unset());
        assert!(i.tenant_id().is_nil());
    }

    #[test]
    fn oversell_fails_and_leaves_balance_unchanged() {
        let mut i = item();
        i.receive(Decimal::from(5)).unwrap();

        let err = i.withdraw(Decimal::from(10)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                available: Decimal::from(5),
                requested: Decimal::from(10),
            }
        );
        assert_eq!(i.quantity_on_hand(), Decimal::from(5));
    }

    #[test]
    fn fractional_quantities_are_exact() {
        let mut i = item();
        i.receive(Decimal::new(1, 1)).unwrap();
        i.receive(Decimal::new(2, 1)).unwrap();
        assert_eq!(i.quantity_on_hand(), Decimal::new(3, 1));
    }

    #[test]
    fn restore_rejects_negative_balances() {
        let err = InventoryItem::restore(
            InventoryItemId::new(1),
            TenantId::new(),
            ProductId::new(1),
            WarehouseId::new(1),
            Decimal::from(-1),
            ConcurrencyToken::fresh(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
    }

    #[test]
    fn scale_beyond_storage_is_refused() {
        assert!(ensure_scale(Decimal::new(12345, 4), "Quantity").is_ok());
        assert!(ensure_scale(Decimal::new(1_2500_0, 5), "Quantity").is_ok());
        let err = ensure_scale(Decimal::new(1, 5), "Quantity").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }

    #[test]
    fn fresh_tokens_differ() {
        assert_ne!(ConcurrencyToken::fresh(), ConcurrencyToken::fresh());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: the balance is the sum of the accepted signed deltas and
            /// a rejected delta never changes it.
            #[test]
            fn balance_is_sum_of_accepted_deltas(
                deltas in prop::collection::vec(-50i64..50, 0..60)
            ) {
                let mut i = item();
                let mut expected = Decimal::ZERO;

                for d in deltas {
                    let delta = Decimal::from(d);
                    let before = i.quantity_on_hand();
                    match i.apply_delta(delta) {
                        Ok(after) => {
                            expected += delta;
                            prop_assert_eq!(after, expected);
                        }
                        Err(LedgerError::InsufficientStock { .. }) => {
                            prop_assert!(before + delta < Decimal::ZERO);
                            prop_assert_eq!(i.quantity_on_hand(), before);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
                    }
                    prop_assert!(i.quantity_on_hand() >= Decimal::ZERO);
                }

                prop_assert_eq!(i.quantity_on_hand(), expected);
            }
        }
    }
}
