//! Mutation engine: validation, cascade planning and atomic apply.
//!
//! The engine is stateless apart from the catalog. Every mutating method runs
//! a whole unit of work inside one `Transaction` and either commits it or rolls
//! it back before returning, so a caller never sees a half-applied change.
//!
//! Planning (`prepare_*`, `plan_delete`) only reads the cache and can run under
//! a shared lock; applying needs `&mut TableCache`.

use carestore_core::schema::{Catalog, ConstraintAction, Table};
use carestore_core::{EntityKind, Error, Result, Row, RowId, Value};
use carestore_storage::{ConstraintChecker, JournalEntry, LockKey, TableCache, Transaction};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Every row a delete removes, in the order it removes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadePlan {
    root: LockKey,
    /// Leaves first: descending topological rank, then ascending id.
    targets: Vec<LockKey>,
}

impl CascadePlan {
    pub fn root(&self) -> LockKey {
        self.root
    }

    /// Rows in delete order. The root is last.
    pub fn targets(&self) -> &[LockKey] {
        &self.targets
    }

    /// Rows in global lock order (kind, then id).
    pub fn lock_keys(&self) -> Vec<LockKey> {
        let mut keys = self.targets.clone();
        keys.sort_unstable();
        keys
    }

    /// True if every row of `other` is also in this plan.
    pub fn covers(&self, other: &CascadePlan) -> bool {
        let mine: BTreeSet<&LockKey> = self.targets.iter().collect();
        other.targets.iter().all(|key| mine.contains(key))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Applies inserts, updates and cascading deletes against a `TableCache`.
#[derive(Clone, Debug)]
pub struct MutationEngine {
    catalog: Arc<Catalog>,
    verify_on_commit: bool,
}

impl MutationEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            verify_on_commit: false,
        }
    }

    /// Runs `verify` before every commit and aborts the unit if it fails.
    pub fn with_verify_on_commit(mut self, verify: bool) -> Self {
        self.verify_on_commit = verify;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn table(&self, kind: EntityKind) -> Result<&Table> {
        self.catalog.table(kind)
    }

    /// Builds a row for `kind` from positional values. Null values of columns
    /// with a default are filled in. Checks shape, types and value domains; the
    /// checks that need stored data run in `insert`.
    pub fn prepare_insert(&self, kind: EntityKind, id: RowId, mut values: Vec<Value>) -> Result<Row> {
        let table = self.table(kind)?;
        let now = Utc::now();
        for (column, value) in table.columns().iter().zip(values.iter_mut()) {
            if value.is_null() {
                if let Some(default) = column.get_default() {
                    *value = default.resolve(now);
                }
            }
        }

        let row = Row::new(id, values);
        ConstraintChecker::check_row(table, &row)?;
        ConstraintChecker::check_domain(table, &row)?;
        Ok(row)
    }

    /// Applies `changes` to a copy of `current` and bumps its version.
    pub fn prepare_update(
        &self,
        kind: EntityKind,
        current: &Row,
        changes: Vec<(String, Value)>,
    ) -> Result<Row> {
        let table = self.table(kind)?;
        let mut values = current.values().to_vec();
        for (name, value) in changes {
            let column = table
                .get_column(&name)
                .ok_or_else(|| Error::column_not_found(table.name(), &name))?;
            if !column.is_mutable() {
                return Err(Error::immutable_column(table.name(), &name));
            }
            let slot = values
                .get_mut(column.index())
                .ok_or_else(|| Error::invalid_operation(format!("{kind} #{} is malformed", current.id())))?;
            *slot = value;
        }

        let mut row = Row::new_with_version(current.id(), current.version(), values);
        row.increment_version();
        ConstraintChecker::check_row(table, &row)?;
        ConstraintChecker::check_domain(table, &row)?;
        Ok(row)
    }

    /// Parents referenced by `row`, in lock order.
    pub fn parent_keys(&self, kind: EntityKind, row: &Row) -> Result<Vec<LockKey>> {
        let table = self.table(kind)?;
        let mut keys: Vec<LockKey> = table
            .foreign_keys()
            .iter()
            .filter_map(|fk| table.reference(fk, row).map(|id| LockKey::new(fk.parent, id)))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    /// Computes the cascade closure of `(kind, id)` breadth-first through the
    /// foreign-key indexes. Nothing is removed.
    ///
    /// A `Restrict` foreign key with at least one dependent fails the plan.
    pub fn plan_delete(&self, cache: &TableCache, kind: EntityKind, id: RowId) -> Result<CascadePlan> {
        if !cache.contains(kind, id) {
            return Err(Error::not_found(kind, id));
        }

        let root = LockKey::new(kind, id);
        let mut seen = BTreeSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            for fk in self.catalog.dependents_of(node.kind) {
                let children = cache.indexes().lookup_dependents(fk.child, &fk.name, node.id)?;
                if children.is_empty() {
                    continue;
                }
                if fk.action == ConstraintAction::Restrict {
                    return Err(Error::foreign_key(
                        &fk.name,
                        format!("{node} is still referenced by {} {}", children.len(), fk.child),
                    ));
                }
                for child in children {
                    let key = LockKey::new(fk.child, child);
                    if seen.insert(key) {
                        queue.push_back(key);
                    }
                }
            }
        }

        let mut targets: Vec<LockKey> = seen.into_iter().collect();
        targets.sort_by(|a, b| {
            self.catalog
                .rank(b.kind)
                .cmp(&self.catalog.rank(a.kind))
                .then(a.id.cmp(&b.id))
        });

        debug!(root = %root, rows = targets.len(), "planned cascade");
        Ok(CascadePlan { root, targets })
    }

    /// Stores a prepared row after checking its references and unique keys.
    pub fn insert(
        &self,
        cache: &mut TableCache,
        tx: Transaction,
        kind: EntityKind,
        row: Row,
    ) -> Result<Vec<JournalEntry>> {
        self.run(cache, tx, |cache, tx| {
            let table = cache.catalog().table(kind)?;
            ConstraintChecker::check_all(cache, table, &row)?;
            tx.insert(cache, kind, row)?;
            Ok(())
        })
    }

    /// Replaces a row with a prepared one. Fails with a conflict if the stored
    /// row changed since `new_row` was prepared from it.
    pub fn update(
        &self,
        cache: &mut TableCache,
        tx: Transaction,
        kind: EntityKind,
        new_row: Row,
    ) -> Result<Vec<JournalEntry>> {
        self.run(cache, tx, |cache, tx| {
            let id = new_row.id();
            let current = cache.get_row(kind, id).ok_or_else(|| Error::not_found(kind, id))?;
            if current.version() + 1 != new_row.version() {
                return Err(Error::conflict(format!("{kind} #{id} changed while the update was planned")));
            }
            let table = cache.catalog().table(kind)?;
            ConstraintChecker::check_all(cache, table, &new_row)?;
            tx.update(cache, kind, id, new_row)?;
            Ok(())
        })
    }

    /// Removes every row of `plan`, leaves first.
    ///
    /// The plan must still describe the stored data: a target that has already
    /// gone is a conflict and nothing is removed.
    pub fn delete(
        &self,
        cache: &mut TableCache,
        tx: Transaction,
        plan: &CascadePlan,
    ) -> Result<Vec<JournalEntry>> {
        self.run(cache, tx, |cache, tx| {
            for key in plan.targets() {
                if !cache.contains(key.kind, key.id) {
                    return Err(Error::conflict(format!(
                        "{key} was removed while deleting {}",
                        plan.root()
                    )));
                }
                tx.delete(cache, key.kind, key.id)?;
            }
            Ok(())
        })
    }

    /// Runs `op` and commits, or rolls back everything `op` did.
    fn run<F>(&self, cache: &mut TableCache, mut tx: Transaction, op: F) -> Result<Vec<JournalEntry>>
    where
        F: FnOnce(&mut TableCache, &mut Transaction) -> Result<()>,
    {
        let outcome = op(cache, &mut tx).and_then(|()| {
            if self.verify_on_commit {
                self.verify(cache)
            } else {
                Ok(())
            }
        });

        match outcome {
            Ok(()) => {
                let tx_id = tx.id();
                let changes = tx.commit()?;
                debug!(tx = tx_id, changes = changes.len(), "committed");
                Ok(changes)
            }
            Err(err) => {
                let tx_id = tx.id();
                if let Err(rollback_err) = tx.rollback(cache) {
                    warn!(tx = tx_id, error = %rollback_err, "rollback incomplete");
                }
                debug!(tx = tx_id, error = %err, "rolled back");
                Err(err)
            }
        }
    }

    /// Full scan re-checking every stored row against the catalog, and every
    /// index against the rows.
    pub fn verify(&self, cache: &TableCache) -> Result<()> {
        let indexes = cache.indexes();
        for table in self.catalog.tables() {
            let store = cache.store(table.kind())?;
            let mut references: BTreeMap<&str, usize> = BTreeMap::new();

            for row in store.scan() {
                ConstraintChecker::check_row(table, &row)?;
                ConstraintChecker::check_domain(table, &row)?;
                ConstraintChecker::check_foreign_keys(cache, table, &row)?;

                for fk in table.foreign_keys() {
                    let Some(parent) = table.reference(fk, &row) else {
                        continue;
                    };
                    *references.entry(fk.name.as_str()).or_insert(0) += 1;
                    if !indexes.has_dependent(&fk.name, parent, row.id()) {
                        return Err(Error::invalid_operation(format!(
                            "index {} is missing {} #{}",
                            fk.name,
                            table.kind(),
                            row.id()
                        )));
                    }
                }

                for unique in table.uniques() {
                    let key = table.key_values(&unique.columns, &row);
                    if key.iter().any(Value::is_null) {
                        continue;
                    }
                    *references.entry(unique.name.as_str()).or_insert(0) += 1;
                    if indexes.unique_owner(&unique.name, &key)? != Some(row.id()) {
                        return Err(Error::invalid_operation(format!(
                            "index {} does not map to {} #{}",
                            unique.name,
                            table.kind(),
                            row.id()
                        )));
                    }
                }
            }

            let names = table
                .foreign_keys()
                .iter()
                .map(|fk| fk.name.as_str())
                .chain(table.uniques().iter().map(|u| u.name.as_str()));
            for name in names {
                let expected = references.get(name).copied().unwrap_or(0);
                let actual = indexes.entry_count(name).unwrap_or(0);
                if expected != actual {
                    return Err(Error::invalid_operation(format!(
                        "index {name} has {actual} entries, expected {expected}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::clinical_catalog;
    use carestore_core::schema::TableBuilder;
    use carestore_core::DataType;
    use chrono::{NaiveDate, NaiveTime};

    struct Fixture {
        engine: MutationEngine,
        cache: TableCache,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = Arc::new(clinical_catalog().unwrap());
            Self {
                engine: MutationEngine::new(catalog.clone()).with_verify_on_commit(true),
                cache: TableCache::new(catalog),
            }
        }

        fn insert(&mut self, kind: EntityKind, values: Vec<Value>) -> Result<RowId> {
            let id = self.cache.ids().next(kind);
            let row = self.engine.prepare_insert(kind, id, values)?;
            self.engine.insert(&mut self.cache, Transaction::begin(), kind, row)?;
            Ok(id)
        }

        fn patient(&mut self, last_name: &str) -> RowId {
            self.insert(
                EntityKind::Patient,
                vec![
                    Value::Text("Ann".into()),
                    Value::Text(last_name.into()),
                    Value::Date(NaiveDate::from_ymd_opt(1980, 1, 2).unwrap()),
                    Value::Text("F".into()),
                    Value::Text("555-0101".into()),
                    Value::Null,
                ],
            )
            .unwrap()
        }

        fn doctor(&mut self) -> RowId {
            self.insert(
                EntityKind::Doctor,
                vec![
                    Value::Text("Gregory".into()),
                    Value::Text("House".into()),
                    Value::Text("Diagnostics".into()),
                    Value::Text("555-0199".into()),
                    Value::Null,
                ],
            )
            .unwrap()
        }

        fn facility(&mut self) -> RowId {
            self.insert(
                EntityKind::Facility,
                vec![
                    Value::Text("Princeton-Plainsboro".into()),
                    Value::Text("NJ".into()),
                    Value::Text("555-0000".into()),
                ],
            )
            .unwrap()
        }

        fn appointment(&mut self, patient: RowId, doctor: RowId, status: &str) -> Result<RowId> {
            self.insert(
                EntityKind::Appointment,
                vec![
                    Value::Id(patient),
                    Value::Id(doctor),
                    Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                    Value::Time(NaiveTime::from_hms_opt(9, 30, 0).unwrap()),
                    Value::Text(status.into()),
                ],
            )
        }

        fn record(&mut self, appointment: RowId) -> Result<RowId> {
            self.insert(
                EntityKind::MedicalRecord,
                vec![
                    Value::Id(appointment),
                    Value::Text("lupus".into()),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ],
            )
        }

        fn link(&mut self, doctor: RowId, facility: RowId) -> Result<RowId> {
            self.insert(EntityKind::DoctorFacilityLink, vec![Value::Id(doctor), Value::Id(facility)])
        }
    }

    #[test]
    fn test_prepare_insert_fills_default() {
        let f = Fixture::new();
        let row = f
            .engine
            .prepare_insert(
                EntityKind::MedicalRecord,
                1,
                vec![Value::Id(1), Value::Text("flu".into()), Value::Null, Value::Null, Value::Null],
            )
            .unwrap();
        assert!(matches!(row.get(4), Some(Value::Timestamp(_))));
    }

    #[test]
    fn test_insert_checks_references() {
        let mut f = Fixture::new();
        let doctor = f.doctor();
        let err = f.appointment(99, doctor, "Scheduled").unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation { ref constraint, .. } if constraint == "fk_appointment_patient"));
        assert_eq!(f.cache.row_count(EntityKind::Appointment), 0);
    }

    #[test]
    fn test_insert_checks_domain_first() {
        let mut f = Fixture::new();
        // Missing parents and a bad status: the domain check is reported
        let err = f.appointment(1, 1, "Pending").unwrap_err();
        assert!(matches!(err, Error::DomainViolation { .. }));
    }

    #[test]
    fn test_second_record_for_appointment_rejected() {
        let mut f = Fixture::new();
        let (p, d) = (f.patient("Doe"), f.doctor());
        let a = f.appointment(p, d, "Completed").unwrap();
        f.record(a).unwrap();

        let before = f.cache.total_row_count();
        let err = f.record(a).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref constraint, .. } if constraint == "uq_record_appointment"));
        assert_eq!(f.cache.total_row_count(), before);
        f.engine.verify(&f.cache).unwrap();
    }

    #[test]
    fn test_duplicate_link_rejected() {
        let mut f = Fixture::new();
        let (d, fac) = (f.doctor(), f.facility());
        f.link(d, fac).unwrap();
        let err = f.link(d, fac).unwrap_err();
        assert_eq!(err, Error::duplicate_key("pk_doctor_facility", "(#1, #1)"));
    }

    #[test]
    fn test_plan_delete_is_leaves_first() {
        let mut f = Fixture::new();
        let (p, d, fac) = (f.patient("Doe"), f.doctor(), f.facility());
        let a1 = f.appointment(p, d, "Completed").unwrap();
        let a2 = f.appointment(p, d, "Scheduled").unwrap();
        let r1 = f.record(a1).unwrap();
        let l = f.link(d, fac).unwrap();

        let plan = f.engine.plan_delete(&f.cache, EntityKind::Doctor, d).unwrap();
        assert_eq!(
            plan.targets(),
            &[
                LockKey::new(EntityKind::MedicalRecord, r1),
                LockKey::new(EntityKind::DoctorFacilityLink, l),
                LockKey::new(EntityKind::Appointment, a1),
                LockKey::new(EntityKind::Appointment, a2),
                LockKey::new(EntityKind::Doctor, d),
            ]
        );
        assert_eq!(plan.root(), LockKey::new(EntityKind::Doctor, d));
        assert_eq!(plan.lock_keys()[0], LockKey::new(EntityKind::Doctor, d));
        assert_eq!(plan.len(), 5);

        // Planning touches nothing
        assert_eq!(f.cache.row_count(EntityKind::Appointment), 2);
    }

    #[test]
    fn test_plan_delete_missing_root() {
        let f = Fixture::new();
        let err = f.engine.plan_delete(&f.cache, EntityKind::Patient, 7).unwrap_err();
        assert_eq!(err, Error::not_found(EntityKind::Patient, 7));
    }

    #[test]
    fn test_delete_applies_plan() {
        let mut f = Fixture::new();
        let (p, d) = (f.patient("Doe"), f.doctor());
        let a = f.appointment(p, d, "Completed").unwrap();
        f.record(a).unwrap();

        let plan = f.engine.plan_delete(&f.cache, EntityKind::Patient, p).unwrap();
        let changes = f.engine.delete(&mut f.cache, Transaction::begin(), &plan).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].kind(), EntityKind::MedicalRecord);
        assert_eq!(changes[2].kind(), EntityKind::Patient);
        assert_eq!(f.cache.row_count(EntityKind::MedicalRecord), 0);
        assert!(f.cache.contains(EntityKind::Doctor, d));
        f.engine.verify(&f.cache).unwrap();
    }

    #[test]
    fn test_stale_plan_is_a_conflict_and_changes_nothing() {
        let mut f = Fixture::new();
        let (p, d) = (f.patient("Doe"), f.doctor());
        let a = f.appointment(p, d, "Scheduled").unwrap();
        let plan = f.engine.plan_delete(&f.cache, EntityKind::Doctor, d).unwrap();

        // Someone else removes the appointment first
        let inner = f.engine.plan_delete(&f.cache, EntityKind::Appointment, a).unwrap();
        f.engine.delete(&mut f.cache, Transaction::begin(), &inner).unwrap();

        let err = f.engine.delete(&mut f.cache, Transaction::begin(), &plan).unwrap_err();
        assert!(err.is_retryable());
        assert!(f.cache.contains(EntityKind::Doctor, d));
        assert!(f.cache.contains(EntityKind::Patient, p));
    }

    #[test]
    fn test_plan_covers_detects_growth() {
        let mut f = Fixture::new();
        let (p, d) = (f.patient("Doe"), f.doctor());
        let before = f.engine.plan_delete(&f.cache, EntityKind::Patient, p).unwrap();
        f.appointment(p, d, "Scheduled").unwrap();
        let after = f.engine.plan_delete(&f.cache, EntityKind::Patient, p).unwrap();
        assert!(after.covers(&before));
        assert!(!before.covers(&after));
    }

    #[test]
    fn test_update_rules() {
        let mut f = Fixture::new();
        let (p, d) = (f.patient("Doe"), f.doctor());
        let a = f.appointment(p, d, "Scheduled").unwrap();
        let current = f.cache.get_row(EntityKind::Appointment, a).unwrap();

        let err = f
            .engine
            .prepare_update(EntityKind::Appointment, &current, vec![("patient_id".into(), Value::Id(p))])
            .unwrap_err();
        assert!(matches!(err, Error::ImmutableColumn { .. }));

        let err = f
            .engine
            .prepare_update(EntityKind::Appointment, &current, vec![("room".into(), Value::Null)])
            .unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));

        let err = f
            .engine
            .prepare_update(EntityKind::Appointment, &current, vec![("status".into(), Value::Text("Lost".into()))])
            .unwrap_err();
        assert!(matches!(err, Error::DomainViolation { .. }));

        let row = f
            .engine
            .prepare_update(EntityKind::Appointment, &current, vec![("status".into(), Value::Text("Completed".into()))])
            .unwrap();
        assert_eq!(row.version(), 2);
        f.engine.update(&mut f.cache, Transaction::begin(), EntityKind::Appointment, row.clone()).unwrap();

        // The same prepared row is now stale
        let err = f
            .engine
            .update(&mut f.cache, Transaction::begin(), EntityKind::Appointment, row)
            .unwrap_err();
        assert!(err.is_retryable());
        let stored = f.cache.get_row(EntityKind::Appointment, a).unwrap();
        assert_eq!(stored.get(4), Some(&Value::Text("Completed".into())));
    }

    #[test]
    fn test_restrict_blocks_delete() {
        let parents = TableBuilder::new(EntityKind::Facility)
            .add_column("name", DataType::Text)
            .unwrap()
            .build()
            .unwrap();
        let children = TableBuilder::new(EntityKind::DoctorFacilityLink)
            .add_column("facility_id", DataType::Id)
            .unwrap()
            .add_foreign_key_with_action(
                "fk_link_facility",
                "facility_id",
                EntityKind::Facility,
                ConstraintAction::Restrict,
            )
            .unwrap()
            .build()
            .unwrap();
        let catalog = Arc::new(Catalog::new(vec![parents, children]).unwrap());
        let engine = MutationEngine::new(catalog.clone());
        let mut cache = TableCache::new(catalog);
        cache
            .insert_row(EntityKind::Facility, Row::new(1, vec![Value::Text("North".into())]))
            .unwrap();
        cache
            .insert_row(EntityKind::DoctorFacilityLink, Row::new(1, vec![Value::Id(1)]))
            .unwrap();

        let err = engine.plan_delete(&cache, EntityKind::Facility, 1).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation { .. }));
        assert!(engine.plan_delete(&cache, EntityKind::DoctorFacilityLink, 1).is_ok());
    }

    #[test]
    fn test_verify_detects_index_drift() {
        let mut f = Fixture::new();
        let (p, d) = (f.patient("Doe"), f.doctor());
        f.appointment(p, d, "Scheduled").unwrap();
        f.engine.verify(&f.cache).unwrap();

        // Break a reference behind the engine's back
        f.cache.delete_row(EntityKind::Patient, p).unwrap();
        assert!(matches!(
            f.engine.verify(&f.cache),
            Err(Error::ForeignKeyViolation { .. })
        ));
    }
}
