use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    ActorId, Entity, LedgerError, LedgerResult, MovementId, ProductId, TenantId, TenantScoped,
    WarehouseId,
};

/// Kind of stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Transfer,
}

impl MovementType {
    pub const ALL: [MovementType; 4] = [
        MovementType::Purchase,
        MovementType::Sale,
        MovementType::Adjustment,
        MovementType::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "Purchase",
            MovementType::Sale => "Sale",
            MovementType::Adjustment => "Adjustment",
            MovementType::Transfer => "Transfer",
        }
    }

    /// Signed balance change at a single warehouse (`None` for transfers).
    pub fn single_delta(&self, quantity: Decimal) -> Option<Decimal> {
        match self {
            MovementType::Purchase | MovementType::Adjustment => Some(quantity),
            MovementType::Sale => Some(-quantity),
            MovementType::Transfer => None,
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = LedgerError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                LedgerError::invalid_request(
                    "Invalid movement type. Use Purchase, Sale, Adjustment, Transfer.",
                )
            })
    }
}

/// Raw movement request as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMovement {
    #[serde(rename = "type")]
    pub kind: String,
    pub product_id: ProductId,
    pub quantity: Decimal,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub from_warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub to_warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateMovement {
    pub fn single(
        kind: MovementType,
        product_id: ProductId,
        quantity: Decimal,
        warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            product_id,
            quantity,
            warehouse_id: Some(warehouse_id),
            from_warehouse_id: None,
            to_warehouse_id: None,
            notes: None,
        }
    }

    pub fn transfer(
        product_id: ProductId,
        quantity: Decimal,
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            kind: MovementType::Transfer.as_str().to_string(),
            product_id,
            quantity,
            warehouse_id: None,
            from_warehouse_id: Some(from_warehouse_id),
            to_warehouse_id: Some(to_warehouse_id),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the request shape. Touches no state.
    pub fn validate(&self) -> LedgerResult<ValidatedMovement> {
        let kind: MovementType = self.kind.parse()?;

        if !self.product_id.is_valid() {
            return Err(LedgerError::invalid_request("Invalid ProductId."));
        }

        match kind {
            MovementType::Adjustment => {
                if self.quantity.is_zero() {
                    return Err(LedgerError::invalid_request(
                        "Quantity must be non-zero for Adjustment.",
                    ));
                }
            }
            _ => {
                if self.quantity <= Decimal::ZERO {
                    return Err(LedgerError::invalid_request(
                        "Quantity must be > 0 for Purchase/Sale/Transfer.",
                    ));
                }
            }
        }

        crate::item::ensure_scale(self.quantity, "Quantity")?;

        let placement = match kind {
            MovementType::Transfer => {
                let (Some(from), Some(to)) = (self.from_warehouse_id, self.to_warehouse_id) else {
                    return Err(LedgerError::invalid_request(
                        "FromWarehouseId and ToWarehouseId are required for Transfer.",
                    ));
                };
                if !from.is_valid() || !to.is_valid() {
                    return Err(LedgerError::invalid_request(
                        "FromWarehouseId and ToWarehouseId must be positive.",
                    ));
                }
                if from == to {
                    return Err(LedgerError::invalid_request(
                        "FromWarehouseId and ToWarehouseId must be different.",
                    ));
                }
                Placement::Transfer { from, to }
            }
            _ => match self.warehouse_id {
                Some(w) if w.is_valid() => Placement::Single(w),
                _ => {
                    return Err(LedgerError::invalid_request(
                        "WarehouseId is required for Purchase/Sale/Adjustment.",
                    ));
                }
            },
        };

        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(ValidatedMovement {
            kind,
            product_id: self.product_id,
            quantity: self.quantity,
            placement,
            notes,
        })
    }
}

/// Warehouses addressed by a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    Single(WarehouseId),
    Transfer { from: WarehouseId, to: WarehouseId },
}

impl Placement {
    pub fn warehouses(&self) -> Vec<WarehouseId> {
        match *self {
            Placement::Single(w) => vec![w],
            Placement::Transfer { from, to } => vec![from, to],
        }
    }
}

/// A movement request that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedMovement {
    pub kind: MovementType,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub placement: Placement,
    pub notes: Option<String>,
}

impl ValidatedMovement {
    /// The append-only record for this movement (unstamped, store-assigned id).
    pub fn record(
        &self,
        id: MovementId,
        created_by: ActorId,
        created_at: DateTime<Utc>,
    ) -> StockMovement {
        let (warehouse_id, from_warehouse_id, to_warehouse_id) = match self.placement {
            Placement::Single(w) => (Some(w), None, None),
            Placement::Transfer { from, to } => (None, Some(from), Some(to)),
        };

        StockMovement {
            id,
            tenant_id: TenantId::nil(),
            kind: self.kind,
            product_id: self.product_id,
            quantity: self.quantity,
            warehouse_id,
            from_warehouse_id,
            to_warehouse_id,
            created_by,
            created_at,
            notes: self.notes.clone(),
        }
    }
}

/// Immutable fact record of a committed movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    #[serde(rename = "type")]
    pub kind: MovementType,
    pub product_id: ProductId,
    /// Positive for Purchase/Sale/Transfer; signed for Adjustment.
    pub quantity: Decimal,
    pub warehouse_id: Option<WarehouseId>,
    pub from_warehouse_id: Option<WarehouseId>,
    pub to_warehouse_id: Option<WarehouseId>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TenantScoped for StockMovement {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = tenant_id;
    }
}

impl Entity for StockMovement {
    const ENTITY_TYPE: &'static str = "StockMovement";

    fn key(&self) -> i64 {
        self.id.get()
    }
}
