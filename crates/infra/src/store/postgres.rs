//! Postgres-backed ledger store.
//!
//! Schema lives in `migrations/0001_ledger.sql` and is applied by
//! [`PgLedgerStore::migrate`].
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `UniqueViolation` | Duplicate SKU / warehouse name |
//! | Database (unique violation) on `inventory_items` | `23505` | `Concurrency` | Racing writer created the balance row |
//! | Database (foreign key violation) on delete | `23503` | `Referenced` | Product / warehouse still used |
//! | Database (foreign key violation) on insert | `23503` | `Concurrency` | Referenced row deleted concurrently |
//! | Database (serialization failure) | `40001` | `Concurrency` | Transaction conflict |
//! | Database (check constraint violation) | `23514` | `InvalidChange` | e.g. negative quantity |
//! | Other | N/A | `Backend` | Network errors, pool closed, etc. |
//!
//! ## Optimistic Concurrency
//!
//! Inventory item updates are `UPDATE ... WHERE row_version = $expected`; zero
//! rows affected means another writer committed first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use stockledger_core::{
    ActorId, AuditLogId, InventoryItemId, MovementId, ProductId, ReportId, TenantId,
    TenantScoped, WarehouseId,
};
use stockledger_inventory::{
    AuditLog, AuditOperation, ConcurrencyToken, InventoryItem, LowStockReport, MovementType,
    Product, StockMovement, StockRow, Warehouse,
};

use super::change_set::{ChangeKind, StagedChange};
use super::record::{EntityKind, LedgerRecord};
use super::{LedgerStore, LedgerTransaction, StoreError};
use crate::audit::AuditQuery;

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

/// Postgres-backed ledger store.
///
/// Every query includes `tenant_id` in the WHERE clause.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: Arc<PgPool>,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the ledger tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn product(
        &mut self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, sku, name, price, active
            FROM products
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_product", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    async fn warehouse(
        &mut self,
        tenant_id: TenantId,
        id: WarehouseId,
    ) -> Result<Option<Warehouse>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, is_active
            FROM warehouses
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_warehouse", e))?;

        row.as_ref().map(decode_warehouse).transpose()
    }

    async fn inventory_item(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, product_id, warehouse_id, quantity_on_hand, row_version
            FROM inventory_items
            WHERE tenant_id = $1 AND product_id = $2 AND warehouse_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.get())
        .bind(warehouse_id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_inventory_item", e))?;

        row.as_ref().map(decode_item).transpose()
    }

    async fn allocate_id(&mut self, kind: EntityKind) -> Result<i64, StoreError> {
        next_id(&mut self.tx, kind).await
    }

    #[instrument(skip(self, changes), fields(changes = changes.len()), err)]
    async fn commit(mut self: Box<Self>, changes: &mut [StagedChange]) -> Result<(), StoreError> {
        for change in changes.iter_mut() {
            if let LedgerRecord::AuditLog(row) = change.current_mut() {
                if !row.id.is_valid() {
                    row.id = AuditLogId::new(next_id(&mut self.tx, EntityKind::AuditLog).await?);
                }
            }
        }

        for change in changes.iter() {
            match change.kind() {
                ChangeKind::Insert => insert(&mut self.tx, change.current()).await?,
                ChangeKind::Update => update(&mut self.tx, change).await?,
                ChangeKind::Delete => delete(&mut self.tx, change).await?,
            }
        }

        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        debug!("ledger transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

async fn next_id(
    tx: &mut Transaction<'static, Postgres>,
    kind: EntityKind,
) -> Result<i64, StoreError> {
    let sql = format!("SELECT nextval('{}_id_seq')", kind.table());
    let id: i64 = sqlx::query_scalar(&sql)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("allocate_id", e))?;
    Ok(id)
}

async fn insert(
    tx: &mut Transaction<'static, Postgres>,
    record: &LedgerRecord,
) -> Result<(), StoreError> {
    match record {
        LedgerRecord::Product(p) => {
            sqlx::query(
                r#"
                INSERT INTO products (id, tenant_id, sku, name, price, active)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(p.id.get())
            .bind(p.tenant_id.as_uuid())
            .bind(&p.sku)
            .bind(&p.name)
            .bind(p.price)
            .bind(p.active)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;
        }
        LedgerRecord::Warehouse(w) => {
            sqlx::query(
                r#"
                INSERT INTO warehouses (id, tenant_id, name, is_active)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(w.id.get())
            .bind(w.tenant_id.as_uuid())
            .bind(&w.name)
            .bind(w.is_active)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_warehouse", e))?;
        }
        LedgerRecord::InventoryItem(i) => {
            sqlx::query(
                r#"
                INSERT INTO inventory_items
                    (id, tenant_id, product_id, warehouse_id, quantity_on_hand, row_version)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(i.id().get())
            .bind(i.tenant_id().as_uuid())
            .bind(i.product_id().get())
            .bind(i.warehouse_id().get())
            .bind(i.quantity_on_hand())
            .bind(i.row_version().as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| concurrent_write(map_sqlx_error("insert_inventory_item", e)))?;
        }
        LedgerRecord::StockMovement(m) => {
            sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    id, tenant_id, type, product_id, quantity,
                    warehouse_id, from_warehouse_id, to_warehouse_id,
                    created_by, created_at, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(m.id.get())
            .bind(m.tenant_id.as_uuid())
            .bind(m.kind.as_str())
            .bind(m.product_id.get())
            .bind(m.quantity)
            .bind(m.warehouse_id.map(|w| w.get()))
            .bind(m.from_warehouse_id.map(|w| w.get()))
            .bind(m.to_warehouse_id.map(|w| w.get()))
            .bind(m.created_by.get())
            .bind(m.created_at)
            .bind(&m.notes)
            .execute(&mut **tx)
            .await
            .map_err(|e| concurrent_write(map_sqlx_error("insert_stock_movement", e)))?;
        }
        LedgerRecord::AuditLog(a) => {
            sqlx::query(
                r#"
                INSERT INTO audit_logs (
                    id, tenant_id, actor_id, entity_type, entity_id,
                    operation, timestamp, before_json, after_json
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(a.id.get())
            .bind(a.tenant_id.as_uuid())
            .bind(a.actor_id.get())
            .bind(&a.entity_type)
            .bind(&a.entity_id)
            .bind(a.operation.as_str())
            .bind(a.timestamp)
            .bind(&a.before_json)
            .bind(&a.after_json)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_audit_log", e))?;
        }
        LedgerRecord::LowStockReport(r) => {
            let rows = serde_json::to_value(&r.rows)
                .map_err(|e| StoreError::InvalidChange(format!("report rows: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO low_stock_reports (id, tenant_id, generated_at, threshold, rows)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(r.id.get())
            .bind(r.tenant_id.as_uuid())
            .bind(r.generated_at)
            .bind(r.threshold)
            .bind(rows)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_low_stock_report", e))?;
        }
    }
    Ok(())
}

async fn update(
    tx: &mut Transaction<'static, Postgres>,
    change: &StagedChange,
) -> Result<(), StoreError> {
    let affected = match (change.current(), change.original()) {
        (LedgerRecord::Product(p), _) => sqlx::query(
            r#"
            UPDATE products SET sku = $3, name = $4, price = $5, active = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(p.tenant_id.as_uuid())
        .bind(p.id.get())
        .bind(&p.sku)
        .bind(&p.name)
        .bind(p.price)
        .bind(p.active)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?
        .rows_affected(),
        (LedgerRecord::Warehouse(w), _) => sqlx::query(
            r#"
            UPDATE warehouses SET name = $3, is_active = $4
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(w.tenant_id.as_uuid())
        .bind(w.id.get())
        .bind(&w.name)
        .bind(w.is_active)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_warehouse", e))?
        .rows_affected(),
        (LedgerRecord::InventoryItem(i), Some(LedgerRecord::InventoryItem(loaded))) => {
            sqlx::query(
                r#"
                UPDATE inventory_items SET quantity_on_hand = $4, row_version = $5
                WHERE tenant_id = $1 AND id = $2 AND row_version = $3
                "#,
            )
            .bind(i.tenant_id().as_uuid())
            .bind(i.id().get())
            .bind(loaded.row_version().as_uuid())
            .bind(i.quantity_on_hand())
            .bind(i.row_version().as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("update_inventory_item", e))?
            .rows_affected()
        }
        (other, _) => {
            return Err(StoreError::InvalidChange(format!(
                "{} rows are append-only",
                other.entity_type()
            )));
        }
    };

    if affected == 0 {
        return Err(StoreError::Concurrency(format!(
            "{} changed or vanished since it was loaded",
            change.key()
        )));
    }
    Ok(())
}

async fn delete(
    tx: &mut Transaction<'static, Postgres>,
    change: &StagedChange,
) -> Result<(), StoreError> {
    let record = change.current();
    let tenant_id = record
        .tenant_scoped()
        .map(|r| r.tenant_id())
        .unwrap_or_default();

    let affected = match (record, change.original()) {
        (LedgerRecord::Product(_) | LedgerRecord::Warehouse(_), _) => {
            let sql = format!(
                "DELETE FROM {} WHERE tenant_id = $1 AND id = $2",
                record.kind().table()
            );
            sqlx::query(&sql)
                .bind(tenant_id.as_uuid())
                .bind(record.id())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("delete", e))?
                .rows_affected()
        }
        (LedgerRecord::InventoryItem(_), Some(LedgerRecord::InventoryItem(loaded))) => {
            sqlx::query(
                "DELETE FROM inventory_items WHERE tenant_id = $1 AND id = $2 AND row_version = $3",
            )
            .bind(tenant_id.as_uuid())
            .bind(record.id())
            .bind(loaded.row_version().as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("delete_inventory_item", e))?
            .rows_affected()
        }
        (other, _) => {
            return Err(StoreError::InvalidChange(format!(
                "{} rows are append-only",
                other.entity_type()
            )));
        }
    };

    if affected == 0 {
        return Err(StoreError::Concurrency(format!(
            "{} changed or vanished since it was loaded",
            change.key()
        )));
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_stock(&self, tenant_id: TenantId) -> Result<Vec<StockRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                w.id AS warehouse_id,
                w.name AS warehouse_name,
                p.id AS product_id,
                p.sku,
                p.name AS product_name,
                i.quantity_on_hand
            FROM inventory_items i
            JOIN products p ON p.tenant_id = i.tenant_id AND p.id = i.product_id
            JOIN warehouses w ON w.tenant_id = i.tenant_id AND w.id = i.warehouse_id
            WHERE i.tenant_id = $1
            ORDER BY w.id, p.id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock", e))?;

        rows.iter()
            .map(|row| -> Result<StockRow, StoreError> {
                Ok(StockRow {
                    warehouse_id: WarehouseId::new(
                        row.try_get("warehouse_id").map_err(decode_error)?,
                    ),
                    warehouse_name: row.try_get("warehouse_name").map_err(decode_error)?,
                    product_id: ProductId::new(row.try_get("product_id").map_err(decode_error)?),
                    sku: row.try_get("sku").map_err(decode_error)?,
                    product_name: row.try_get("product_name").map_err(decode_error)?,
                    quantity_on_hand: row.try_get("quantity_on_hand").map_err(decode_error)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, sku, name, price, active
            FROM products
            WHERE tenant_id = $1
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(decode_product).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_warehouses(&self, tenant_id: TenantId) -> Result<Vec<Warehouse>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, is_active
            FROM warehouses
            WHERE tenant_id = $1
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_warehouses", e))?;

        rows.iter().map(decode_warehouse).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_movements(
        &self,
        tenant_id: TenantId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, tenant_id, type, product_id, quantity,
                warehouse_id, from_warehouse_id, to_warehouse_id,
                created_by, created_at, notes
            FROM stock_movements
            WHERE tenant_id = $1 AND ($2::BIGINT IS NULL OR product_id = $2)
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.map(|p| p.get()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter().map(decode_movement).collect()
    }

    #[instrument(skip(self, query), fields(tenant_id = %tenant_id), err)]
    async fn list_audit(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLog>, StoreError> {
        let query = query.normalized();
        let rows = sqlx::query(
            r#"
            SELECT
                id, tenant_id, actor_id, entity_type, entity_id,
                operation, timestamp, before_json, after_json
            FROM audit_logs
            WHERE tenant_id = $1
              AND ($2::TEXT IS NULL OR entity_type = $2)
              AND ($3::BIGINT IS NULL OR actor_id = $3)
            ORDER BY timestamp DESC, id DESC
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.entity_type.as_deref())
        .bind(query.actor_id.map(|a| a.get()))
        .bind(query.skip as i64)
        .bind(query.take as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit", e))?;

        rows.iter().map(decode_audit).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_reports(&self, tenant_id: TenantId) -> Result<Vec<LowStockReport>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, generated_at, threshold, rows
            FROM low_stock_reports
            WHERE tenant_id = $1
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_reports", e))?;

        rows.iter().map(decode_report).collect()
    }

    async fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let ids: Vec<uuid::Uuid> = sqlx::query_scalar(
            r#"
            SELECT tenant_id FROM products
            UNION
            SELECT tenant_id FROM warehouses
            ORDER BY 1
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("tenants", e))?;

        Ok(ids.into_iter().map(TenantId::from_uuid).collect())
    }
}

// Row decoding

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

fn tenant(row: &PgRow) -> Result<TenantId, StoreError> {
    let id: uuid::Uuid = row.try_get("tenant_id").map_err(decode_error)?;
    Ok(TenantId::from_uuid(id))
}

fn decode_product(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::new(row.try_get("id").map_err(decode_error)?),
        tenant_id: tenant(row)?,
        sku: row.try_get("sku").map_err(decode_error)?,
        name: row.try_get("name").map_err(decode_error)?,
        price: row.try_get("price").map_err(decode_error)?,
        active: row.try_get("active").map_err(decode_error)?,
    })
}

fn decode_warehouse(row: &PgRow) -> Result<Warehouse, StoreError> {
    Ok(Warehouse {
        id: WarehouseId::new(row.try_get("id").map_err(decode_error)?),
        tenant_id: tenant(row)?,
        name: row.try_get("name").map_err(decode_error)?,
        is_active: row.try_get("is_active").map_err(decode_error)?,
    })
}

fn decode_item(row: &PgRow) -> Result<InventoryItem, StoreError> {
    let quantity: Decimal = row.try_get("quantity_on_hand").map_err(decode_error)?;
    let version: uuid::Uuid = row.try_get("row_version").map_err(decode_error)?;
    InventoryItem::restore(
        InventoryItemId::new(row.try_get("id").map_err(decode_error)?),
        tenant(row)?,
        ProductId::new(row.try_get("product_id").map_err(decode_error)?),
        WarehouseId::new(row.try_get("warehouse_id").map_err(decode_error)?),
        quantity,
        ConcurrencyToken::from_uuid(version),
    )
    .map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode_movement(row: &PgRow) -> Result<StockMovement, StoreError> {
    let kind: String = row.try_get("type").map_err(decode_error)?;
    let warehouse = |column: &str| -> Result<Option<WarehouseId>, StoreError> {
        let id: Option<i64> = row.try_get(column).map_err(decode_error)?;
        Ok(id.map(WarehouseId::new))
    };

    Ok(StockMovement {
        id: MovementId::new(row.try_get("id").map_err(decode_error)?),
        tenant_id: tenant(row)?,
        kind: kind
            .parse::<MovementType>()
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        product_id: ProductId::new(row.try_get("product_id").map_err(decode_error)?),
        quantity: row.try_get("quantity").map_err(decode_error)?,
        warehouse_id: warehouse("warehouse_id")?,
        from_warehouse_id: warehouse("from_warehouse_id")?,
        to_warehouse_id: warehouse("to_warehouse_id")?,
        created_by: ActorId::new(row.try_get("created_by").map_err(decode_error)?),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_error)?,
        notes: row.try_get("notes").map_err(decode_error)?,
    })
}

fn decode_audit(row: &PgRow) -> Result<AuditLog, StoreError> {
    let operation: String = row.try_get("operation").map_err(decode_error)?;
    Ok(AuditLog {
        id: AuditLogId::new(row.try_get("id").map_err(decode_error)?),
        tenant_id: tenant(row)?,
        actor_id: ActorId::new(row.try_get("actor_id").map_err(decode_error)?),
        entity_type: row.try_get("entity_type").map_err(decode_error)?,
        entity_id: row.try_get("entity_id").map_err(decode_error)?,
        operation: operation
            .parse::<AuditOperation>()
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        timestamp: row.try_get("timestamp").map_err(decode_error)?,
        before_json: row.try_get("before_json").map_err(decode_error)?,
        after_json: row.try_get("after_json").map_err(decode_error)?,
    })
}

fn decode_report(row: &PgRow) -> Result<LowStockReport, StoreError> {
    let rows: serde_json::Value = row.try_get("rows").map_err(decode_error)?;
    Ok(LowStockReport {
        id: ReportId::new(row.try_get("id").map_err(decode_error)?),
        tenant_id: tenant(row)?,
        generated_at: row.try_get("generated_at").map_err(decode_error)?,
        threshold: row.try_get("threshold").map_err(decode_error)?,
        rows: serde_json::from_value(rows)
            .map_err(|e| StoreError::Backend(format!("report rows: {e}")))?,
    })
}

/// Writes on balance rows and movements race with other writers: a duplicate
/// key or a vanished reference means the state read by this attempt is stale.
fn concurrent_write(err: StoreError) -> StoreError {
    match err {
        StoreError::UniqueViolation(msg) | StoreError::Referenced(msg) => {
            StoreError::Concurrency(msg)
        }
        other => other,
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::Referenced(msg),
                Some("40001") => StoreError::Concurrency(msg),
                Some("23514") => StoreError::InvalidChange(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
