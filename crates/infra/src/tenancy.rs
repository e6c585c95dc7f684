//! Tenant enforcement at commit time.
//!
//! Every tenant-scoped row in the change set is stamped with (or checked
//! against) the tenant of the unit of work. A mismatch is never corrected.

use tracing::warn;

use stockledger_core::{LedgerError, LedgerResult, TenantId};
use stockledger_inventory::ConcurrencyToken;

use crate::store::{ChangeKind, ChangeSet, CommitContext, CommitHook, StagedChange};

/// Pre-commit hook owning tenant stamping and inventory row versions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantEnforcement;

impl CommitHook for TenantEnforcement {
    fn name(&self) -> &'static str {
        "tenant_enforcement"
    }

    fn before_commit(&self, ctx: &CommitContext, changes: &mut ChangeSet) -> LedgerResult<()> {
        let tenant_id = ctx.tenant.require()?;

        for change in changes.iter_mut() {
            match change.kind() {
                ChangeKind::Insert => stamp(tenant_id, change)?,
                ChangeKind::Update | ChangeKind::Delete => verify_owner(tenant_id, change)?,
            }

            if change.kind() != ChangeKind::Delete {
                if let Some(item) = change.current_mut().as_inventory_item_mut() {
                    item.set_row_version(ConcurrencyToken::fresh());
                }
            }
        }
        Ok(())
    }
}

fn stamp(tenant_id: TenantId, change: &mut StagedChange) -> LedgerResult<()> {
    let key = change.key();
    let Some(scoped) = change.current_mut().tenant_scoped_mut() else {
        return Ok(());
    };

    let stamped = scoped.tenant_id();
    if stamped.is_nil() {
        scoped.set_tenant_id(tenant_id);
    } else if stamped != tenant_id {
        warn!(record = %key, owner = %stamped, tenant = %tenant_id, "cross-tenant insert refused");
        return Err(LedgerError::cross_tenant(format!(
            "{key} is stamped for tenant {stamped}, not {tenant_id}"
        )));
    }
    Ok(())
}

fn verify_owner(tenant_id: TenantId, change: &StagedChange) -> LedgerResult<()> {
    let key = change.key();
    let stored = change
        .original()
        .and_then(|r| r.tenant_scoped())
        .map(|r| r.tenant_id());
    let staged = change.current().tenant_scoped().map(|r| r.tenant_id());

    for owner in [stored, staged].into_iter().flatten() {
        if owner != tenant_id {
            warn!(record = %key, owner = %owner, tenant = %tenant_id, "cross-tenant write refused");
            return Err(LedgerError::cross_tenant(format!(
                "{key} belongs to tenant {owner}, not {tenant_id}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use stockledger_core::{InventoryItemId, ProductId, TenantContext, WarehouseId};
    use stockledger_inventory::{InventoryItem, Product};

    use crate::store::LedgerRecord;

    fn ctx(tenant: TenantId) -> CommitContext {
        CommitContext::new(TenantContext::resolved(tenant), None)
    }

    fn product(tenant: TenantId) -> Product {
        Product {
            id: ProductId::new(1),
            tenant_id: tenant,
            sku: "SKU-1".to_string(),
            name: "Bolt".to_string(),
            price: Decimal::ONE,
            active: true,
        }
    }

    #[test]
    fn unresolved_tenant_fails_first() {
        let mut cs = ChangeSet::new();
        cs.insert(product(TenantId::new()).into()).unwrap();

        let ctx = CommitContext::new(TenantContext::unresolved(), None);
        let err = TenantEnforcement.before_commit(&ctx, &mut cs).unwrap_err();
        assert_eq!(err, LedgerError::TenantNotResolved);
    }

    #[test]
    fn insert_without_tenant_is_stamped() {
        let tenant = TenantId::new();
        let mut cs = ChangeSet::new();
        cs.insert(product(TenantId::nil()).into()).unwrap();

        TenantEnforcement.before_commit(&ctx(tenant), &mut cs).unwrap();

        let staged = cs.iter().next().unwrap().current();
        assert_eq!(staged.tenant_scoped().unwrap().tenant_id(), tenant);
    }

    #[test]
    fn insert_for_another_tenant_is_refused() {
        let mut cs = ChangeSet::new();
        cs.insert(product(TenantId::new()).into()).unwrap();

        let err = TenantEnforcement
            .before_commit(&ctx(TenantId::new()), &mut cs)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CrossTenantViolation(_)));
    }

    #[test]
    fn update_of_foreign_row_is_refused() {
        let owner = TenantId::new();
        let mut cs = ChangeSet::new();
        cs.track(product(owner).into());
        let mut renamed = product(owner);
        renamed.name = "Nut".to_string();
        cs.update(renamed.into()).unwrap();

        let err = TenantEnforcement
            .before_commit(&ctx(TenantId::new()), &mut cs)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CrossTenantViolation(_)));
    }

    #[test]
    fn tenant_of_existing_row_cannot_move() {
        let owner = TenantId::new();
        let mut cs = ChangeSet::new();
        cs.track(product(owner).into());
        cs.update(product(TenantId::new()).into()).unwrap();

        let err = TenantEnforcement.before_commit(&ctx(owner), &mut cs).unwrap_err();
        assert!(matches!(err, LedgerError::CrossTenantViolation(_)));
    }

    #[test]
    fn inventory_rows_get_a_fresh_version_per_write() {
        let tenant = TenantId::new();
        let item = InventoryItem::restore(
            InventoryItemId::new(1),
            tenant,
            ProductId::new(1),
            WarehouseId::new(1),
            Decimal::from(4),
            ConcurrencyToken::fresh(),
        )
        .unwrap();
        let loaded = item.row_version();

        let mut cs = ChangeSet::new();
        cs.track(item.clone().into());
        let mut next = item;
        next.receive(Decimal::ONE).unwrap();
        cs.update(next.into()).unwrap();

        TenantEnforcement.before_commit(&ctx(tenant), &mut cs).unwrap();

        let staged = cs.iter().next().unwrap();
        let bumped = staged.current().as_inventory_item().unwrap().row_version();
        assert_ne!(bumped, loaded);
        assert!(!bumped.is_unset());
        let LedgerRecord::InventoryItem(original) = staged.original().unwrap() else {
            panic!("expected an inventory item");
        };
        assert_eq!(original.row_version(), loaded);
    }
}
