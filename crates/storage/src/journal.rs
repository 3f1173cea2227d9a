//! Journal for tracking changes in carestore.
//!
//! This module provides the `Journal` struct for recording the changes made
//! within a transaction, so they can be reported on commit or undone on
//! rollback.

use crate::cache::TableCache;
use carestore_core::{EntityKind, Result, Row, RowId};

/// A single journal entry representing a change.
#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    /// A row was inserted.
    Insert { kind: EntityKind, row: Row },
    /// A row was updated.
    Update { kind: EntityKind, old: Row, new: Row },
    /// A row was deleted.
    Delete { kind: EntityKind, row: Row },
}

impl JournalEntry {
    /// Returns the entity kind for this entry.
    pub fn kind(&self) -> EntityKind {
        match self {
            JournalEntry::Insert { kind, .. }
            | JournalEntry::Update { kind, .. }
            | JournalEntry::Delete { kind, .. } => *kind,
        }
    }

    /// Returns the row ID for this entry.
    pub fn row_id(&self) -> RowId {
        match self {
            JournalEntry::Insert { row, .. } | JournalEntry::Delete { row, .. } => row.id(),
            JournalEntry::Update { old, .. } => old.id(),
        }
    }
}

/// Journal for tracking changes within a transaction.
#[derive(Debug, Default)]
pub struct Journal {
    /// Ordered list of entries for replay.
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an insert operation.
    pub fn record_insert(&mut self, kind: EntityKind, row: Row) {
        self.entries.push(JournalEntry::Insert { kind, row });
    }

    /// Records an update operation.
    pub fn record_update(&mut self, kind: EntityKind, old: Row, new: Row) {
        self.entries.push(JournalEntry::Update { kind, old, new });
    }

    /// Records a delete operation.
    pub fn record_delete(&mut self, kind: EntityKind, row: Row) {
        self.entries.push(JournalEntry::Delete { kind, row });
    }

    /// Returns all journal entries in the order they were recorded.
    pub fn get_entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finalizes the journal. Changes are already applied to the cache.
    pub fn commit(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Undoes every recorded change, newest first, restoring exact before-images.
    ///
    /// Every entry is attempted even if an earlier one fails; the first failure
    /// is returned.
    pub fn rollback(&mut self, cache: &mut TableCache) -> Result<()> {
        let mut first_error = None;

        for entry in std::mem::take(&mut self.entries).into_iter().rev() {
            let result = match entry {
                JournalEntry::Insert { kind, row } => cache.delete_row(kind, row.id()).map(|_| ()),
                JournalEntry::Update { kind, old, .. } => cache.restore_row(kind, old),
                JournalEntry::Delete { kind, row } => cache.restore_row(kind, row),
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, "journal rollback step failed");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{appointment, clinic_catalog, patient, record};

    #[test]
    fn test_journal_insert() {
        let mut cache = TableCache::new(clinic_catalog());
        let mut journal = Journal::new();
        let row = patient(1, "Curie");

        cache.insert_row(EntityKind::Patient, row.clone()).unwrap();
        journal.record_insert(EntityKind::Patient, row);

        assert_eq!(journal.get_entries().len(), 1);
        assert_eq!(journal.get_entries()[0].kind(), EntityKind::Patient);
        assert_eq!(journal.get_entries()[0].row_id(), 1);
    }

    #[test]
    fn test_journal_rollback_restores_cascade() {
        let mut cache = TableCache::new(clinic_catalog());
        cache.insert_row(EntityKind::Patient, patient(1, "Curie")).unwrap();
        cache
            .insert_row(EntityKind::Appointment, appointment(1, 1, "Scheduled"))
            .unwrap();
        cache.insert_row(EntityKind::MedicalRecord, record(1, 1)).unwrap();

        // Leaves first, as a cascade would
        let mut journal = Journal::new();
        for kind in [EntityKind::MedicalRecord, EntityKind::Appointment, EntityKind::Patient] {
            let row = cache.delete_row(kind, 1).unwrap();
            journal.record_delete(kind, row);
        }
        assert_eq!(cache.total_row_count(), 0);

        journal.rollback(&mut cache).unwrap();

        assert_eq!(cache.total_row_count(), 3);
        assert_eq!(*cache.get_row(EntityKind::MedicalRecord, 1).unwrap(), record(1, 1));
        assert!(cache
            .indexes()
            .has_dependent("fk_appointment_patient", 1, 1));
        assert!(journal.is_empty());
    }

    #[test]
    fn test_journal_rollback_update_restores_version() {
        let mut cache = TableCache::new(clinic_catalog());
        cache.insert_row(EntityKind::Patient, patient(1, "Curie")).unwrap();

        let mut journal = Journal::new();
        let mut new = patient(1, "Sklodowska");
        new.increment_version();
        let old = cache.update_row(EntityKind::Patient, 1, new.clone()).unwrap();
        journal.record_update(EntityKind::Patient, old.clone(), new);

        journal.rollback(&mut cache).unwrap();
        assert_eq!(*cache.get_row(EntityKind::Patient, 1).unwrap(), old);
    }

    #[test]
    fn test_journal_commit_drains() {
        let mut journal = Journal::new();
        journal.record_insert(EntityKind::Patient, patient(1, "Curie"));
        journal.record_delete(EntityKind::Patient, patient(2, "Noether"));

        let entries = journal.commit();
        assert_eq!(entries.len(), 2);
        assert!(journal.is_empty());
        assert_eq!(entries[1].kind(), EntityKind::Patient);
        assert_eq!(entries[1].row_id(), 2);
    }
}
