//! Entity capability: identity plus a field snapshot for audit capture.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{LedgerError, LedgerResult};

/// Full field-name → value capture of an entity.
///
/// Keyed by field name, so two snapshots of the same state compare and
/// serialize identically regardless of field declaration order.
pub type Snapshot = BTreeMap<String, JsonValue>;

/// A persisted record with a stable type name and primary key.
pub trait Entity: Serialize {
    /// Type name recorded on audit rows (e.g. `"Product"`).
    const ENTITY_TYPE: &'static str;

    /// Primary key value.
    fn key(&self) -> i64;

    /// Deterministic string encoding of the primary key (`id=<n>`).
    fn primary_key(&self) -> String {
        format!("id={}", self.key())
    }

    /// Snapshot every serialized field of the entity.
    fn snapshot(&self) -> LedgerResult<Snapshot> {
        match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => Ok(map.into_iter().collect()),
            Ok(other) => Err(LedgerError::audit(format!(
                "{} did not serialize to a field map (got {})",
                Self::ENTITY_TYPE,
                kind_of(&other)
            ))),
            Err(e) => Err(LedgerError::audit(format!(
                "{} snapshot failed: {e}",
                Self::ENTITY_TYPE
            ))),
        }
    }
}

fn kind_of(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Widget {
        id: i64,
        zeta: &'static str,
        alpha: u32,
    }

    impl Entity for Widget {
        const ENTITY_TYPE: &'static str = "Widget";

        fn key(&self) -> i64 {
            self.id
        }
    }

    #[derive(Serialize)]
    struct Opaque(u8);

    impl Entity for Opaque {
        const ENTITY_TYPE: &'static str = "Opaque";

        fn key(&self) -> i64 {
            i64::from(self.0)
        }
    }

    #[test]
    fn snapshot_is_keyed_by_field_name() {
        let snap = Widget {
            id: 7,
            zeta: "z",
            alpha: 1,
        }
        .snapshot()
        .unwrap();
        let keys: Vec<_> = snap.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "id", "zeta"]);
        assert_eq!(snap["zeta"], JsonValue::from("z"));
    }

    #[test]
    fn primary_key_encoding_is_deterministic() {
        let w = Widget {
            id: 12,
            zeta: "",
            alpha: 0,
        };
        assert_eq!(w.primary_key(), "id=12");
    }

    #[test]
    fn non_struct_entities_fail_to_snapshot() {
        let err = Opaque(3).snapshot().unwrap_err();
        assert!(matches!(err, LedgerError::Audit(_)));
    }
}
