//! Entities changed within one unit of work.

use std::collections::HashMap;

use stockledger_core::{LedgerError, LedgerResult};

use super::record::{LedgerRecord, RecordKey};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One staged change.
///
/// `original` is the row as loaded (absent for inserts). For deletes,
/// `current` equals `original`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    kind: ChangeKind,
    original: Option<LedgerRecord>,
    current: LedgerRecord,
}

impl StagedChange {
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn original(&self) -> Option<&LedgerRecord> {
        self.original.as_ref()
    }

    pub fn current(&self) -> &LedgerRecord {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut LedgerRecord {
        &mut self.current
    }

    pub fn key(&self) -> RecordKey {
        self.current.key()
    }

    /// Whether this change was produced by a commit hook (audit rows).
    pub fn is_generated(&self) -> bool {
        matches!(self.current, LedgerRecord::AuditLog(_))
    }
}

/// Change tracker for one unit of work.
///
/// Rows loaded for update are tracked with their as-loaded state; staging an
/// update or delete for a row that was never loaded is refused, since the
/// store could not detect a stale write without the original.
#[derive(Debug, Default)]
pub struct ChangeSet {
    tracked: HashMap<RecordKey, LedgerRecord>,
    changes: Vec<StagedChange>,
    positions: HashMap<RecordKey, usize>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the as-loaded state of a row.
    pub fn track(&mut self, record: LedgerRecord) {
        self.tracked.insert(record.key(), record);
    }

    pub fn insert(&mut self, record: LedgerRecord) -> LedgerResult<()> {
        let key = record.key();
        if self.positions.contains_key(&key) || self.tracked.contains_key(&key) {
            return Err(LedgerError::store(format!("{key} is already part of this unit of work")));
        }
        self.push(StagedChange {
            kind: ChangeKind::Insert,
            original: None,
            current: record,
        });
        Ok(())
    }

    /// Stage the new state of a tracked (or freshly inserted) row.
    ///
    /// An update that leaves the row equal to its loaded state stages nothing.
    pub fn update(&mut self, record: LedgerRecord) -> LedgerResult<()> {
        let key = record.key();
        if let Some(&pos) = self.positions.get(&key) {
            let staged = &mut self.changes[pos];
            return match staged.kind {
                ChangeKind::Insert | ChangeKind::Update => {
                    staged.current = record;
                    Ok(())
                }
                ChangeKind::Delete => Err(LedgerError::store(format!(
                    "{key} is staged for deletion"
                ))),
            };
        }

        let original = self
            .tracked
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                LedgerError::store(format!("{key} was not loaded in this unit of work"))
            })?;

        if original == record {
            return Ok(());
        }

        self.push(StagedChange {
            kind: ChangeKind::Update,
            original: Some(original),
            current: record,
        });
        Ok(())
    }

    pub fn delete(&mut self, key: RecordKey) -> LedgerResult<()> {
        if let Some(&pos) = self.positions.get(&key) {
            match self.changes[pos].kind {
                ChangeKind::Insert => {
                    self.changes.remove(pos);
                    self.reindex();
                }
                ChangeKind::Update => {
                    let staged = &mut self.changes[pos];
                    if let Some(original) = staged.original.clone() {
                        staged.kind = ChangeKind::Delete;
                        staged.current = original;
                    }
                }
                ChangeKind::Delete => {}
            }
            return Ok(());
        }

        let original = self
            .tracked
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                LedgerError::store(format!("{key} was not loaded in this unit of work"))
            })?;

        self.push(StagedChange {
            kind: ChangeKind::Delete,
            original: Some(original.clone()),
            current: original,
        });
        Ok(())
    }

    /// Append a hook-generated insert (audit rows). Not indexed by key: the
    /// store assigns the id at commit.
    pub fn append_generated(&mut self, record: LedgerRecord) {
        self.changes.push(StagedChange {
            kind: ChangeKind::Insert,
            original: None,
            current: record,
        });
    }

    pub fn get(&self, key: &RecordKey) -> Option<&StagedChange> {
        self.positions.get(key).map(|&pos| &self.changes[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedChange> {
        self.changes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StagedChange> {
        self.changes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn as_mut_slice(&mut self) -> &mut [StagedChange] {
        &mut self.changes
    }

    pub fn into_changes(self) -> Vec<StagedChange> {
        self.changes
    }

    fn push(&mut self, change: StagedChange) {
        self.positions.insert(change.key(), self.changes.len());
        self.changes.push(change);
    }

    fn reindex(&mut self) {
        self.positions = self
            .changes
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_generated())
            .map(|(i, c)| (c.key(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityKind;
    use stockledger_core::{TenantId, WarehouseId};
    use stockledger_inventory::Warehouse;

    fn warehouse(id: i64, name: &str) -> LedgerRecord {
        LedgerRecord::Warehouse(Warehouse {
            id: WarehouseId::new(id),
            tenant_id: TenantId::nil(),
            name: name.to_string(),
            is_active: true,
        })
    }

    #[test]
    fn update_requires_a_tracked_original() {
        let mut cs = ChangeSet::new();
        let err = cs.update(warehouse(1, "Main")).unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));

        cs.track(warehouse(1, "Main"));
        cs.update(warehouse(1, "Overflow")).unwrap();

        let staged = cs.iter().next().unwrap();
        assert_eq!(staged.kind(), ChangeKind::Update);
        assert_eq!(staged.original(), Some(&warehouse(1, "Main")));
        assert_eq!(staged.current(), &warehouse(1, "Overflow"));
    }

    #[test]
    fn unchanged_update_stages_nothing() {
        let mut cs = ChangeSet::new();
        cs.track(warehouse(1, "Main"));
        cs.update(warehouse(1, "Main")).unwrap();
        assert!(cs.is_empty());
    }

    #[test]
    fn updating_a_staged_insert_keeps_it_an_insert() {
        let mut cs = ChangeSet::new();
        cs.insert(warehouse(3, "A")).unwrap();
        cs.update(warehouse(3, "B")).unwrap();

        assert_eq!(cs.len(), 1);
        let staged = cs.iter().next().unwrap();
        assert_eq!(staged.kind(), ChangeKind::Insert);
        assert_eq!(staged.current(), &warehouse(3, "B"));
    }

    #[test]
    fn deleting_a_staged_insert_unstages_it() {
        let mut cs = ChangeSet::new();
        cs.insert(warehouse(3, "A")).unwrap();
        cs.insert(warehouse(4, "B")).unwrap();
        cs.delete(RecordKey::new(EntityKind::Warehouse, 3)).unwrap();

        assert_eq!(cs.len(), 1);
        let key = RecordKey::new(EntityKind::Warehouse, 4);
        assert!(cs.get(&key).is_some());
    }

    #[test]
    fn delete_captures_the_loaded_state() {
        let mut cs = ChangeSet::new();
        cs.track(warehouse(2, "Main"));
        cs.update(warehouse(2, "Renamed")).unwrap();
        cs.delete(RecordKey::new(EntityKind::Warehouse, 2)).unwrap();

        let staged = cs.iter().next().unwrap();
        assert_eq!(staged.kind(), ChangeKind::Delete);
        assert_eq!(staged.current(), &warehouse(2, "Main"));
    }

    #[test]
    fn double_insert_is_refused() {
        let mut cs = ChangeSet::new();
        cs.insert(warehouse(1, "A")).unwrap();
        assert!(cs.insert(warehouse(1, "A")).is_err());
    }
}
