use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, AuditLogId, LedgerError, LedgerResult, Snapshot, TenantId};

/// Kind of change an audit row documents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::Insert => "Insert",
            AuditOperation::Update => "Update",
            AuditOperation::Delete => "Delete",
        }
    }
}

impl core::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditOperation {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Insert" => Ok(AuditOperation::Insert),
            "Update" => Ok(AuditOperation::Update),
            "Delete" => Ok(AuditOperation::Delete),
            other => Err(LedgerError::store(format!("unknown audit operation '{other}'"))),
        }
    }
}

/// Append-only record of one entity change.
///
/// `before_json` is absent for inserts and `after_json` for deletes. Both hold
/// a serialized [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    /// Copied from the audited entity; nil when the entity is not tenant-scoped.
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: AuditOperation,
    pub timestamp: DateTime<Utc>,
    pub before_json: Option<String>,
    pub after_json: Option<String>,
}

impl AuditLog {
    pub fn before(&self) -> LedgerResult<Option<Snapshot>> {
        decode(self.before_json.as_deref())
    }

    pub fn after(&self) -> LedgerResult<Option<Snapshot>> {
        decode(self.after_json.as_deref())
    }
}

/// Serialize a snapshot for storage on an audit row.
pub fn encode_snapshot(snapshot: &Snapshot) -> LedgerResult<String> {
    serde_json::to_string(snapshot).map_err(|e| LedgerError::audit(e.to_string()))
}

fn decode(raw: Option<&str>) -> LedgerResult<Option<Snapshot>> {
    raw.map(|s| serde_json::from_str::<Snapshot>(s).map_err(|e| LedgerError::audit(e.to_string())))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshots_round_trip_through_the_row() {
        let mut snap = Snapshot::new();
        snap.insert("name".to_string(), json!("Widget"));
        snap.insert("price".to_string(), json!("1.50"));

        let row = AuditLog {
            id: AuditLogId::new(1),
            tenant_id: TenantId::new(),
            actor_id: ActorId::new(5),
            entity_type: "Product".to_string(),
            entity_id: "id=3".to_string(),
            operation: AuditOperation::Insert,
            timestamp: Utc::now(),
            before_json: None,
            after_json: Some(encode_snapshot(&snap).unwrap()),
        };

        assert_eq!(row.before().unwrap(), None);
        assert_eq!(row.after().unwrap(), Some(snap));
    }

    #[test]
    fn operation_names_round_trip() {
        for op in [AuditOperation::Insert, AuditOperation::Update, AuditOperation::Delete] {
            assert_eq!(op.as_str().parse::<AuditOperation>().unwrap(), op);
        }
        assert!("Upsert".parse::<AuditOperation>().is_err());
    }
}
