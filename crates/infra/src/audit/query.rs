use serde::{Deserialize, Serialize};

use stockledger_core::ActorId;
use stockledger_inventory::AuditLog;

/// Largest page `ListAudit` will return.
pub const MAX_AUDIT_PAGE: usize = 200;

/// Default page size when a caller asks for nothing specific.
pub const DEFAULT_AUDIT_PAGE: usize = 50;

/// Filter and paging for audit listings (newest first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub actor_id: Option<ActorId>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_take")]
    pub take: usize,
}

fn default_take() -> usize {
    DEFAULT_AUDIT_PAGE
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            entity_type: None,
            actor_id: None,
            skip: 0,
            take: DEFAULT_AUDIT_PAGE,
        }
    }
}

impl AuditQuery {
    pub fn for_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn by_actor(mut self, actor_id: ActorId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn page(mut self, skip: usize, take: usize) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }

    /// `take` clamped to `1..=MAX_AUDIT_PAGE`; a blank entity type filter is dropped.
    pub fn normalized(&self) -> Self {
        Self {
            entity_type: self
                .entity_type
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            actor_id: self.actor_id,
            skip: self.skip,
            take: self.take.clamp(1, MAX_AUDIT_PAGE),
        }
    }

    pub fn matches(&self, row: &AuditLog) -> bool {
        self.entity_type
            .as_deref()
            .is_none_or(|t| row.entity_type == t)
            && self.actor_id.is_none_or(|a| row.actor_id == a)
    }
}
