//! Change capture into the append-only audit log.
//!
//! [`AuditCapture`] runs as a pre-commit hook after tenant enforcement. It
//! first snapshots every staged change, then appends one [`AuditLog`] row per
//! change to the same batch, so the rows commit (or roll back) with the
//! change they document.

mod query;

pub use query::{AuditQuery, DEFAULT_AUDIT_PAGE, MAX_AUDIT_PAGE};

use tracing::debug;

use stockledger_core::{ActorId, AuditLogId, LedgerResult, TenantId};
use stockledger_inventory::{AuditLog, AuditOperation, audit::encode_snapshot};

use crate::store::{ChangeKind, ChangeSet, CommitContext, CommitHook, LedgerRecord, StagedChange};

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditCapture;

impl CommitHook for AuditCapture {
    fn name(&self) -> &'static str {
        "audit_capture"
    }

    fn before_commit(&self, ctx: &CommitContext, changes: &mut ChangeSet) -> LedgerResult<()> {
        let actor_id = ctx.actor.unwrap_or(ActorId::SYSTEM);

        let rows = changes
            .iter()
            .filter(|c| !matches!(c.current(), LedgerRecord::AuditLog(_)))
            .map(|c| audit_row(c, actor_id, ctx))
            .collect::<LedgerResult<Vec<_>>>()?;

        debug!(rows = rows.len(), actor = %actor_id, "captured audit rows");
        for row in rows {
            changes.append_generated(row.into());
        }
        Ok(())
    }
}

fn audit_row(
    change: &StagedChange,
    actor_id: ActorId,
    ctx: &CommitContext,
) -> LedgerResult<AuditLog> {
    let current = change.current();

    let (operation, before, after) = match change.kind() {
        ChangeKind::Insert => (AuditOperation::Insert, None, Some(current)),
        ChangeKind::Update => (AuditOperation::Update, change.original(), Some(current)),
        ChangeKind::Delete => (
            AuditOperation::Delete,
            Some(change.original().unwrap_or(current)),
            None,
        ),
    };

    let encode = |record: Option<&LedgerRecord>| -> LedgerResult<Option<String>> {
        record
            .map(|r| r.snapshot().and_then(|s| encode_snapshot(&s)))
            .transpose()
    };

    Ok(AuditLog {
        id: AuditLogId::new(0),
        tenant_id: current
            .tenant_scoped()
            .map(|r| r.tenant_id())
            .unwrap_or(TenantId::nil()),
        actor_id,
        entity_type: current.entity_type().to_string(),
        entity_id: current.primary_key(),
        operation,
        timestamp: ctx.now,
        before_json: encode(before)?,
        after_json: encode(after)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use stockledger_core::{ProductId, TenantContext, WarehouseId};
    use stockledger_inventory::{Product, Warehouse};

    fn product(tenant: TenantId) -> Product {
        Product {
            id: ProductId::new(7),
            tenant_id: tenant,
            sku: "SKU-7".to_string(),
            name: "Hinge".to_string(),
            price: Decimal::new(250, 2),
            active: true,
        }
    }

    fn ctx(tenant: TenantId, actor: Option<ActorId>) -> CommitContext {
        CommitContext::new(TenantContext::resolved(tenant), actor)
    }

    fn audit_rows(cs: &ChangeSet) -> Vec<AuditLog> {
        cs.iter()
            .filter_map(|c| match c.current() {
                LedgerRecord::AuditLog(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn one_row_per_change_with_snapshots() {
        let tenant = TenantId::new();
        let mut cs = ChangeSet::new();
        cs.track(product(tenant).into());
        let mut repriced = product(tenant);
        repriced.price = Decimal::new(300, 2);
        cs.update(repriced.into()).unwrap();
        cs.insert(
            Warehouse {
                id: WarehouseId::new(2),
                tenant_id: tenant,
                name: "Dock".to_string(),
                is_active: true,
            }
            .into(),
        )
        .unwrap();

        AuditCapture
            .before_commit(&ctx(tenant, Some(ActorId::new(9))), &mut cs)
            .unwrap();

        let rows = audit_rows(&cs);
        assert_eq!(rows.len(), 2);

        let update = &rows[0];
        assert_eq!(update.operation, AuditOperation::Update);
        assert_eq!(update.entity_type, "Product");
        assert_eq!(update.entity_id, "id=7");
        assert_eq!(update.actor_id, ActorId::new(9));
        assert_eq!(update.tenant_id, tenant);
        let before = update.before().unwrap().unwrap();
        let after = update.after().unwrap().unwrap();
        assert_eq!(before["price"], json!("2.50"));
        assert_eq!(after["price"], json!("3.00"));

        let insert = &rows[1];
        assert_eq!(insert.operation, AuditOperation::Insert);
        assert!(insert.before_json.is_none());
        assert_eq!(insert.after().unwrap().unwrap()["name"], json!("Dock"));
    }

    #[test]
    fn delete_records_only_the_before_state() {
        let tenant = TenantId::new();
        let mut cs = ChangeSet::new();
        cs.track(product(tenant).into());
        cs.delete(LedgerRecord::from(product(tenant)).key()).unwrap();

        AuditCapture.before_commit(&ctx(tenant, None), &mut cs).unwrap();

        let rows = audit_rows(&cs);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].operation, AuditOperation::Delete);
        assert!(rows[0].after_json.is_none());
        assert_eq!(rows[0].before().unwrap().unwrap()["sku"], json!("SKU-7"));
    }

    #[test]
    fn missing_actor_degrades_to_system() {
        let tenant = TenantId::new();
        let mut cs = ChangeSet::new();
        cs.insert(product(tenant).into()).unwrap();

        AuditCapture.before_commit(&ctx(tenant, None), &mut cs).unwrap();

        assert_eq!(audit_rows(&cs)[0].actor_id, ActorId::SYSTEM);
    }

    #[test]
    fn audit_rows_are_not_audited_again() {
        let tenant = TenantId::new();
        let mut cs = ChangeSet::new();
        cs.insert(product(tenant).into()).unwrap();

        AuditCapture.before_commit(&ctx(tenant, None), &mut cs).unwrap();
        AuditCapture.before_commit(&ctx(tenant, None), &mut cs).unwrap();

        // second pass audits the product again, never the first audit row
        let rows = audit_rows(&cs);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.entity_type == "Product"));
    }
}
