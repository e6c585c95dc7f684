//! Transactional stock movements.
//!
//! Each attempt runs in its own unit of work: existence checks, balance
//! changes and the movement record are staged, then committed through the
//! hook chain. An optimistic-concurrency mismatch at commit sends the request
//! back to a fresh attempt until the retry budget is spent.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use stockledger_core::{
    ActorId, InventoryItemId, LedgerError, LedgerResult, MovementId, ProductId, TenantContext,
    WarehouseId,
};
use stockledger_inventory::{
    CreateMovement, InventoryItem, Placement, StockMovement, ValidatedMovement,
};

use crate::config::RetryPolicy;
use crate::store::{CommitHooks, EntityKind, LedgerStore, RecordKey, UnitOfWork};

pub struct MovementEngine<S> {
    store: S,
    hooks: Arc<CommitHooks>,
    retry: RetryPolicy,
}

impl<S> MovementEngine<S>
where
    S: LedgerStore,
{
    /// Engine with the standard hook chain and the default retry budget.
    pub fn new(store: S) -> Self {
        Self {
            store,
            hooks: Arc::new(CommitHooks::standard()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_hooks(mut self, hooks: CommitHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn create_movement(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        request: &CreateMovement,
    ) -> LedgerResult<StockMovement> {
        self.create_movement_with_cancel(tenant, actor, request, &CancellationToken::new())
            .await
    }

    /// Record one movement, observing `cancel` until commit starts.
    #[instrument(
        skip(self, request, cancel),
        fields(kind = %request.kind, product_id = %request.product_id),
        err
    )]
    pub async fn create_movement_with_cancel(
        &self,
        tenant: TenantContext,
        actor: Option<ActorId>,
        request: &CreateMovement,
        cancel: &CancellationToken,
    ) -> LedgerResult<StockMovement> {
        tenant.require()?;
        let actor = actor
            .filter(|a| a.get() > 0)
            .ok_or_else(|| LedgerError::invalid_request("an authenticated actor is required"))?;
        let movement = request.validate()?;

        let max_attempts = self.retry.max_attempts();
        for attempt in 1..=max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LedgerError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }

            match self.attempt(tenant, actor, &movement, cancel).await {
                Ok(recorded) => {
                    info!(
                        movement_id = %recorded.id,
                        tenant_id = %recorded.tenant_id,
                        attempt,
                        "stock movement committed"
                    );
                    return Ok(recorded);
                }
                Err(err) if err.is_retryable() => {
                    warn!(attempt, max_attempts, error = %err, "concurrency conflict");
                }
                Err(err) => return Err(err),
            }
        }

        Err(LedgerError::ConcurrencyExhausted {
            attempts: max_attempts,
        })
    }

    async fn attempt(
        &self,
        tenant: TenantContext,
        actor: ActorId,
        movement: &ValidatedMovement,
        cancel: &CancellationToken,
    ) -> LedgerResult<StockMovement> {
        let mut uow =
            UnitOfWork::begin(&self.store, self.hooks.clone(), tenant, Some(actor)).await?;

        let staged = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LedgerError::Cancelled),
            staged = stage(&mut uow, movement, actor) => staged,
        };

        let key = match staged {
            Ok(key) => key,
            Err(err) => {
                debug!(error = %err, "rolling back movement attempt");
                uow.rollback().await;
                return Err(err);
            }
        };

        let receipt = uow.commit().await?;
        receipt
            .get::<StockMovement>(&key)
            .ok_or_else(|| LedgerError::store("committed movement missing from receipt"))
    }
}

/// Stage the balance changes and the movement record of one attempt.
async fn stage(
    uow: &mut UnitOfWork,
    movement: &ValidatedMovement,
    actor: ActorId,
) -> LedgerResult<RecordKey> {
    uow.find_product(movement.product_id)
        .await?
        .ok_or(LedgerError::not_found("Product"))?;
    for warehouse_id in movement.placement.warehouses() {
        uow.find_warehouse(warehouse_id)
            .await?
            .ok_or(LedgerError::not_found("Warehouse"))?;
    }

    match movement.placement {
        Placement::Single(warehouse_id) => {
            let delta = movement
                .kind
                .single_delta(movement.quantity)
                .ok_or_else(|| LedgerError::invalid_request("transfer needs two warehouses"))?;
            let mut balance = Balance::resolve(uow, movement.product_id, warehouse_id).await?;
            balance.item.apply_delta(delta)?;
            balance.stage(uow)?;
        }
        Placement::Transfer { from, to } => {
            let mut source = Balance::resolve(uow, movement.product_id, from).await?;
            source.item.withdraw(movement.quantity)?;
            let mut destination = Balance::resolve(uow, movement.product_id, to).await?;
            destination.item.receive(movement.quantity)?;
            source.stage(uow)?;
            destination.stage(uow)?;
        }
    }

    let id = MovementId::new(uow.allocate_id(EntityKind::StockMovement).await?);
    uow.stage_insert(movement.record(id, actor, Utc::now()))?;
    Ok(RecordKey::new(EntityKind::StockMovement, id.get()))
}

/// A balance row loaded for update, or opened lazily at quantity 0.
struct Balance {
    item: InventoryItem,
    is_new: bool,
}

impl Balance {
    async fn resolve(
        uow: &mut UnitOfWork,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> LedgerResult<Self> {
        if let Some(item) = uow.load_inventory_item(product_id, warehouse_id).await? {
            return Ok(Self {
                item,
                is_new: false,
            });
        }
        let id = InventoryItemId::new(uow.allocate_id(EntityKind::InventoryItem).await?);
        Ok(Self {
            item: InventoryItem::open(id, product_id, warehouse_id),
            is_new: true,
        })
    }

    fn stage(self, uow: &mut UnitOfWork) -> LedgerResult<()> {
        if self.is_new {
            uow.stage_insert(self.item)
        } else {
            uow.stage_update(self.item)
        }
    }
}
