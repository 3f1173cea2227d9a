//! Database - Main entry point for carestore operations.
//!
//! `Database` owns the table cache behind a read/write lock and routes every
//! mutation through the same three steps:
//!
//! 1. plan under the shared cache lock (validate, compute the cascade closure)
//! 2. take the row locks for everything the plan touches, holding no cache lock
//! 3. take the exclusive cache lock, re-check the plan and apply it atomically
//!
//! If step 3 finds the plan stale the mutation fails with a concurrency
//! conflict, and the coordinator runs it again from step 1.

use crate::config::DatabaseConfig;
use crate::coordinator::TransactionCoordinator;
use crate::engine::MutationEngine;
use crate::model::{
    Appointment, AppointmentPatch, Doctor, DoctorFacilityLink, DoctorPatch, Entity, Facility,
    FacilityPatch, MedicalRecord, MedicalRecordPatch, NewAppointment, NewDoctor, NewEntity,
    NewFacility, NewMedicalRecord, NewPatient, Patch, Patient, PatientPatch, Record,
};
use crate::schema::{
    clinical_catalog, FK_APPOINTMENT_DOCTOR, FK_APPOINTMENT_PATIENT, FK_LINK_DOCTOR,
    FK_LINK_FACILITY, PK_DOCTOR_FACILITY, UQ_RECORD_APPOINTMENT,
};
use carestore_core::schema::Catalog;
use carestore_core::{EntityKind, Error, Result, Row, RowId, Value};
use carestore_storage::{JournalEntry, LockKey, LockType, TableCache, Transaction};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// What a cascading delete removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteSummary {
    pub kind: EntityKind,
    pub id: RowId,
    /// Rows removed per kind, the root included.
    pub removed: BTreeMap<EntityKind, usize>,
}

impl DeleteSummary {
    /// Tallies the rows a committed cascade removed.
    pub fn from_changes(kind: EntityKind, id: RowId, changes: &[JournalEntry]) -> Self {
        let mut removed = BTreeMap::new();
        for entry in changes {
            if let JournalEntry::Delete { kind, .. } = entry {
                *removed.entry(*kind).or_insert(0) += 1;
            }
        }
        Self { kind, id, removed }
    }

    pub fn total(&self) -> usize {
        self.removed.values().sum()
    }

    pub fn removed(&self, kind: EntityKind) -> usize {
        self.removed.get(&kind).copied().unwrap_or(0)
    }
}

/// The clinical record store.
///
/// `Database` is `Send + Sync`; share it between threads with an `Arc`.
pub struct Database {
    catalog: Arc<Catalog>,
    engine: MutationEngine,
    cache: RwLock<TableCache>,
    coordinator: TransactionCoordinator,
    config: DatabaseConfig,
}

impl Database {
    /// Creates an empty store over the clinical schema.
    pub fn new() -> Result<Self> {
        Self::with_config(DatabaseConfig::default())
    }

    pub fn with_config(config: DatabaseConfig) -> Result<Self> {
        Ok(Self::with_catalog(Arc::new(clinical_catalog()?), config))
    }

    /// Creates an empty store over any catalog.
    pub fn with_catalog(catalog: Arc<Catalog>, config: DatabaseConfig) -> Self {
        info!(
            tables = catalog.tables().count(),
            max_conflict_retries = config.max_conflict_retries,
            verify_on_commit = config.verify_on_commit,
            "database created"
        );
        Self {
            engine: MutationEngine::new(catalog.clone()).with_verify_on_commit(config.verify_on_commit),
            cache: RwLock::new(TableCache::new(catalog.clone())),
            coordinator: TransactionCoordinator::new(config.max_conflict_retries),
            catalog,
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    // ----- generic operations -----

    /// Inserts a row of positional `values` and returns its new id.
    ///
    /// Null values for columns with a default (`medical_records.created_at`)
    /// are filled in. Fails with the first violated constraint and stores
    /// nothing.
    pub fn create(&self, kind: EntityKind, values: Vec<Value>) -> Result<RowId> {
        let id = self.cache.read().ids().next(kind);
        let row = self.engine.prepare_insert(kind, id, values)?;
        let parents = self.engine.parent_keys(kind, &row)?;

        self.coordinator.retry("create", || {
            let tx = Transaction::begin();
            let requests = parents
                .iter()
                .map(|key| (*key, LockType::Shared))
                .chain([(LockKey::new(kind, id), LockType::Exclusive)]);
            let _locks = self.coordinator.acquire(tx.id(), requests);

            let mut cache = self.cache.write();
            let changes = self.engine.insert(&mut cache, tx, kind, row.clone())?;
            changes
                .iter()
                .find_map(|entry| match entry {
                    JournalEntry::Insert { row, .. } => Some(row.id()),
                    _ => None,
                })
                .ok_or_else(|| Error::invalid_operation(format!("insert into {kind} committed no row")))
        })
    }

    /// Returns a snapshot of the row. Takes a shared lock on that row only.
    pub fn read_by_id(&self, kind: EntityKind, id: RowId) -> Result<Row> {
        self.catalog.table(kind)?;
        let tx = Transaction::begin();
        let _locks = self
            .coordinator
            .acquire(tx.id(), [(LockKey::new(kind, id), LockType::Shared)]);
        let cache = self.cache.read();
        cache
            .get_row(kind, id)
            .map(|row| (*row).clone())
            .ok_or_else(|| Error::not_found(kind, id))
    }

    /// Writes the named columns and returns the updated row.
    ///
    /// Key and foreign-key columns cannot be changed.
    pub fn update(&self, kind: EntityKind, id: RowId, changes: Vec<(String, Value)>) -> Result<Row> {
        self.coordinator.retry("update", || {
            let new_row = {
                let cache = self.cache.read();
                let current = cache.get_row(kind, id).ok_or_else(|| Error::not_found(kind, id))?;
                self.engine.prepare_update(kind, &current, changes.clone())?
            };
            let parents = self.engine.parent_keys(kind, &new_row)?;

            let tx = Transaction::begin();
            let requests = parents
                .iter()
                .map(|key| (*key, LockType::Shared))
                .chain([(LockKey::new(kind, id), LockType::Exclusive)]);
            let _locks = self.coordinator.acquire(tx.id(), requests);

            let mut cache = self.cache.write();
            let changes = self.engine.update(&mut cache, tx, kind, new_row.clone())?;
            changes
                .into_iter()
                .find_map(|entry| match entry {
                    JournalEntry::Update { new, .. } => Some(new),
                    _ => None,
                })
                .ok_or_else(|| Error::invalid_operation(format!("update of {kind} #{id} committed no row")))
        })
    }

    /// Deletes the row and everything that depends on it, transitively.
    pub fn delete(&self, kind: EntityKind, id: RowId) -> Result<DeleteSummary> {
        self.coordinator.retry("delete", || {
            let plan = {
                let cache = self.cache.read();
                self.engine.plan_delete(&cache, kind, id)?
            };

            let tx = Transaction::begin();
            let requests = plan
                .lock_keys()
                .into_iter()
                .map(|key| (key, LockType::Exclusive));
            let _locks = self.coordinator.acquire(tx.id(), requests);

            let mut cache = self.cache.write();
            // Dependents may have come or gone while we waited for the locks
            let current = self.engine.plan_delete(&cache, kind, id)?;
            if !plan.covers(&current) {
                return Err(Error::conflict(format!(
                    "{} gained dependents while its delete was waiting",
                    plan.root()
                )));
            }
            let changes = self.engine.delete(&mut cache, tx, &current)?;

            debug!(root = %current.root(), rows = current.len(), changes = changes.len(), "cascade applied");
            Ok(DeleteSummary::from_changes(kind, id, &changes))
        })
    }

    // ----- typed operations -----

    /// Inserts a typed entity.
    pub fn insert<N: NewEntity>(&self, new: N) -> Result<RowId> {
        self.create(N::KIND, new.into_values())
    }

    /// Reads a typed entity.
    pub fn get<E: Entity>(&self, id: RowId) -> Result<E> {
        E::from_row(&self.read_by_id(E::KIND, id)?)
    }

    /// Applies a typed patch and returns the updated entity.
    pub fn patch<E: Entity, P: Patch>(&self, id: RowId, patch: P) -> Result<E> {
        if E::KIND != P::KIND {
            return Err(Error::invalid_operation(format!(
                "patch for {} applied to {}",
                P::KIND,
                E::KIND
            )));
        }
        E::from_row(&self.update(P::KIND, id, patch.into_changes())?)
    }

    /// Reads any row as a tagged `Record`.
    pub fn read(&self, kind: EntityKind, id: RowId) -> Result<Record> {
        Record::from_row(kind, &self.read_by_id(kind, id)?)
    }

    pub fn create_patient(&self, patient: NewPatient) -> Result<RowId> {
        self.insert(patient)
    }

    pub fn patient(&self, id: RowId) -> Result<Patient> {
        self.get(id)
    }

    pub fn update_patient(&self, id: RowId, patch: PatientPatch) -> Result<Patient> {
        self.patch(id, patch)
    }

    /// Deletes the patient with all of their appointments and records.
    pub fn delete_patient(&self, id: RowId) -> Result<DeleteSummary> {
        self.delete(EntityKind::Patient, id)
    }

    pub fn create_doctor(&self, doctor: NewDoctor) -> Result<RowId> {
        self.insert(doctor)
    }

    pub fn doctor(&self, id: RowId) -> Result<Doctor> {
        self.get(id)
    }

    pub fn update_doctor(&self, id: RowId, patch: DoctorPatch) -> Result<Doctor> {
        self.patch(id, patch)
    }

    /// Deletes the doctor, their facility links, appointments and records.
    pub fn delete_doctor(&self, id: RowId) -> Result<DeleteSummary> {
        self.delete(EntityKind::Doctor, id)
    }

    pub fn create_facility(&self, facility: NewFacility) -> Result<RowId> {
        self.insert(facility)
    }

    pub fn facility(&self, id: RowId) -> Result<Facility> {
        self.get(id)
    }

    pub fn update_facility(&self, id: RowId, patch: FacilityPatch) -> Result<Facility> {
        self.patch(id, patch)
    }

    pub fn delete_facility(&self, id: RowId) -> Result<DeleteSummary> {
        self.delete(EntityKind::Facility, id)
    }

    pub fn create_appointment(&self, appointment: NewAppointment) -> Result<RowId> {
        self.insert(appointment)
    }

    pub fn appointment(&self, id: RowId) -> Result<Appointment> {
        self.get(id)
    }

    pub fn update_appointment(&self, id: RowId, patch: AppointmentPatch) -> Result<Appointment> {
        self.patch(id, patch)
    }

    pub fn delete_appointment(&self, id: RowId) -> Result<DeleteSummary> {
        self.delete(EntityKind::Appointment, id)
    }

    pub fn create_medical_record(&self, record: NewMedicalRecord) -> Result<RowId> {
        self.insert(record)
    }

    pub fn medical_record(&self, id: RowId) -> Result<MedicalRecord> {
        self.get(id)
    }

    pub fn update_medical_record(&self, id: RowId, patch: MedicalRecordPatch) -> Result<MedicalRecord> {
        self.patch(id, patch)
    }

    pub fn delete_medical_record(&self, id: RowId) -> Result<DeleteSummary> {
        self.delete(EntityKind::MedicalRecord, id)
    }

    /// Records that a doctor works at a facility. Returns the link's id.
    pub fn link_doctor_facility(&self, doctor_id: RowId, facility_id: RowId) -> Result<RowId> {
        self.create(
            EntityKind::DoctorFacilityLink,
            vec![Value::Id(doctor_id), Value::Id(facility_id)],
        )
    }

    /// Removes the link if it exists. Returns whether one was removed.
    pub fn unlink_doctor_facility(&self, doctor_id: RowId, facility_id: RowId) -> Result<bool> {
        let key = vec![Value::Id(doctor_id), Value::Id(facility_id)];
        let owner = self.cache.read().indexes().unique_owner(PK_DOCTOR_FACILITY, &key)?;
        let Some(link_id) = owner else {
            return Ok(false);
        };
        match self.delete(EntityKind::DoctorFacilityLink, link_id) {
            Ok(_) => Ok(true),
            // Unlinked concurrently
            Err(Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn link(&self, id: RowId) -> Result<DoctorFacilityLink> {
        self.get(id)
    }

    // ----- relationship queries -----

    /// Appointments of a patient, by id.
    pub fn list_appointments_for_patient(&self, patient_id: RowId) -> Result<Vec<Appointment>> {
        Self::children::<Appointment>(&self.cache.read(), EntityKind::Patient, patient_id, FK_APPOINTMENT_PATIENT)
    }

    /// Appointments of a doctor, by id.
    pub fn list_appointments_for_doctor(&self, doctor_id: RowId) -> Result<Vec<Appointment>> {
        Self::children::<Appointment>(&self.cache.read(), EntityKind::Doctor, doctor_id, FK_APPOINTMENT_DOCTOR)
    }

    /// Doctors linked to a facility, by id.
    pub fn list_doctors_for_facility(&self, facility_id: RowId) -> Result<Vec<Doctor>> {
        let cache = self.cache.read();
        let links = Self::children::<DoctorFacilityLink>(&cache, EntityKind::Facility, facility_id, FK_LINK_FACILITY)?;
        Self::resolve(&cache, links.iter().map(|link| link.doctor_id))
    }

    /// Facilities linked to a doctor, by id.
    pub fn list_facilities_for_doctor(&self, doctor_id: RowId) -> Result<Vec<Facility>> {
        let cache = self.cache.read();
        let links = Self::children::<DoctorFacilityLink>(&cache, EntityKind::Doctor, doctor_id, FK_LINK_DOCTOR)?;
        Self::resolve(&cache, links.iter().map(|link| link.facility_id))
    }

    /// The record written for an appointment, if there is one.
    pub fn medical_record_for_appointment(&self, appointment_id: RowId) -> Result<Option<MedicalRecord>> {
        let cache = self.cache.read();
        if !cache.contains(EntityKind::Appointment, appointment_id) {
            return Err(Error::not_found(EntityKind::Appointment, appointment_id));
        }
        let owner = cache
            .indexes()
            .unique_owner(UQ_RECORD_APPOINTMENT, &vec![Value::Id(appointment_id)])?;
        owner
            .and_then(|id| cache.get_row(EntityKind::MedicalRecord, id))
            .map(|row| MedicalRecord::from_row(&row))
            .transpose()
    }

    /// Rows of `E` whose foreign key `fk_name` points at `(parent, parent_id)`.
    fn children<E: Entity>(
        cache: &TableCache,
        parent: EntityKind,
        parent_id: RowId,
        fk_name: &str,
    ) -> Result<Vec<E>> {
        if !cache.contains(parent, parent_id) {
            return Err(Error::not_found(parent, parent_id));
        }
        let ids = cache.indexes().lookup_dependents(E::KIND, fk_name, parent_id)?;
        ids.into_iter()
            .filter_map(|id| cache.get_row(E::KIND, id))
            .map(|row| E::from_row(&row))
            .collect()
    }

    /// Reads each id as an `E`, in id order, skipping ids that no longer exist.
    fn resolve<E: Entity>(cache: &TableCache, ids: impl Iterator<Item = RowId>) -> Result<Vec<E>> {
        let mut ids: Vec<RowId> = ids.collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| cache.get_row(E::KIND, id))
            .map(|row| E::from_row(&row))
            .collect()
    }

    // ----- introspection -----

    /// Number of stored rows of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.cache.read().row_count(kind)
    }

    /// Re-checks every row and index. Blocks writers for the duration.
    pub fn verify_integrity(&self) -> Result<()> {
        self.engine.verify(&self.cache.read())
    }
}
