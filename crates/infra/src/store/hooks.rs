//! Pre-commit hook chain.
//!
//! Hooks see the full change set right before the store commits it and may
//! mutate it (stamp tenants, bump row versions, append audit rows) or veto the
//! commit by returning an error. They run in registration order; the first
//! error aborts the commit and nothing is written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use stockledger_core::{ActorId, LedgerResult, TenantContext};

use super::change_set::ChangeSet;
use crate::audit::AuditCapture;
use crate::tenancy::TenantEnforcement;

/// Ambient state of the commit being prepared.
#[derive(Debug, Clone, Copy)]
pub struct CommitContext {
    pub tenant: TenantContext,
    pub actor: Option<ActorId>,
    pub now: DateTime<Utc>,
}

impl CommitContext {
    pub fn new(tenant: TenantContext, actor: Option<ActorId>) -> Self {
        Self {
            tenant,
            actor,
            now: Utc::now(),
        }
    }
}

pub trait CommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn before_commit(&self, ctx: &CommitContext, changes: &mut ChangeSet) -> LedgerResult<()>;
}

#[derive(Clone, Default)]
pub struct CommitHooks {
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl CommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl CommitHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Tenant enforcement, then audit capture.
    ///
    /// Audit rows must see the stamped tenant and the bumped row version, so
    /// the order is fixed.
    pub fn standard() -> Self {
        Self::new().with(TenantEnforcement).with(AuditCapture)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn run(&self, ctx: &CommitContext, changes: &mut ChangeSet) -> LedgerResult<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), changes = changes.len(), "running commit hook");
            hook.before_commit(ctx, changes)?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for CommitHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommitHooks")
            .field("hooks", &self.names())
            .finish()
    }
}
