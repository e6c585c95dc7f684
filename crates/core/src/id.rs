//! Strongly-typed identifiers used across the ledger.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Identifier of a tenant (multi-tenant boundary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The empty tenant marker (`00000000-...`).
    ///
    /// Never a valid acting tenant; recorded on audit rows of entities that are
    /// not tenant-scoped.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::nil()
    }
}

impl core::fmt::Display for TenantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for TenantId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<TenantId> for Uuid {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl FromStr for TenantId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| LedgerError::invalid_request(format!("TenantId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Row identifiers are store-assigned positive integers.
macro_rules! impl_row_id {
    ($t:ident, $name:literal) => {
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }

            /// Identifiers handed to the ledger by callers must be positive.
            pub const fn is_valid(self) -> bool {
                self.0 > 0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let v = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| LedgerError::invalid_request(format!("{}: {}", $name, e)))?;
                Ok(Self(v))
            }
        }
    };
}

impl_row_id!(ProductId, "ProductId");
impl_row_id!(WarehouseId, "WarehouseId");
impl_row_id!(InventoryItemId, "InventoryItemId");
impl_row_id!(MovementId, "MovementId");
impl_row_id!(AuditLogId, "AuditLogId");
impl_row_id!(ReportId, "ReportId");

/// Identity of the authenticated caller performing a write.
///
/// `ActorId::SYSTEM` (0) is recorded by audit capture when no caller identity
/// is available.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(i64);

impl ActorId {
    pub const SYSTEM: ActorId = ActorId(0);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn is_system(self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for ActorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for ActorId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for ActorId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = s
            .trim()
            .parse::<i64>()
            .map_err(|e| LedgerError::invalid_request(format!("ActorId: {e}")))?;
        Ok(Self(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_must_be_positive() {
        assert!(ProductId::new(1).is_valid());
        assert!(!ProductId::new(0).is_valid());
        assert!(!WarehouseId::new(-4).is_valid());
    }

    #[test]
    fn tenant_id_parses_and_rejects_garbage() {
        let t = TenantId::new();
        let parsed: TenantId = t.to_string().parse().unwrap();
        assert_eq!(parsed, t);

        let err = "not-a-uuid".parse::<TenantId>().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }

    #[test]
    fn nil_tenant_is_default() {
        assert!(TenantId::default().is_nil());
        assert!(!TenantId::new().is_nil());
    }

    #[test]
    fn actor_id_parses_from_subject_claim() {
        let a: ActorId = " 42 ".parse().unwrap();
        assert_eq!(a.get(), 42);
        assert!(ActorId::SYSTEM.is_system());
        assert!("abc".parse::<ActorId>().is_err());
    }
}
