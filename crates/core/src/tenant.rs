//! Per-operation tenant identity.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::id::TenantId;

/// Tenant context for a single ledger operation.
///
/// Built once by the caller (e.g. from a request header) and passed by value
/// into every core operation. It is never mutated after construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
}

impl TenantContext {
    /// A context acting on behalf of `tenant_id`.
    ///
    /// The nil tenant is never a valid acting tenant and yields an unresolved
    /// context.
    pub fn resolved(tenant_id: TenantId) -> Self {
        if tenant_id.is_nil() {
            return Self::unresolved();
        }
        Self {
            tenant_id: Some(tenant_id),
        }
    }

    pub const fn unresolved() -> Self {
        Self { tenant_id: None }
    }

    /// Parse a raw tenant header value; absent or malformed input is unresolved.
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse::<TenantId>().ok())
            .map(Self::resolved)
            .unwrap_or_default()
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_resolved(&self) -> bool {
        self.tenant_id.is_some()
    }

    /// The acting tenant, or `TenantNotResolved`.
    pub fn require(&self) -> LedgerResult<TenantId> {
        self.tenant_id.ok_or(LedgerError::TenantNotResolved)
    }
}

/// Capability of records owned by exactly one tenant.
///
/// Tenant enforcement operates only through this trait. A record whose tenant
/// is still [`TenantId::nil`] has not been stamped yet.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
    fn set_tenant_id(&mut self, tenant_id: TenantId);
}
