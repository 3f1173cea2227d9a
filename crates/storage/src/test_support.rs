//! Shared fixtures for the storage unit tests.

use carestore_core::schema::{Catalog, CheckConstraint, TableBuilder};
use carestore_core::{DataType, EntityKind, Row, RowId, Value};
use std::sync::Arc;

/// Patients ← appointments ← medical records, with a status check and a
/// unique appointment reference on records.
pub fn clinic_catalog() -> Arc<Catalog> {
    let patients = TableBuilder::new(EntityKind::Patient)
        .add_column("last_name", DataType::Text)
        .unwrap()
        .add_column("email", DataType::Text)
        .unwrap()
        .add_non_empty(&["last_name"])
        .unwrap()
        .add_nullable(&["email"])
        .unwrap()
        .build()
        .unwrap();
    let appointments = TableBuilder::new(EntityKind::Appointment)
        .add_column("patient_id", DataType::Id)
        .unwrap()
        .add_column("status", DataType::Text)
        .unwrap()
        .add_foreign_key("fk_appointment_patient", "patient_id", EntityKind::Patient)
        .unwrap()
        .add_check(CheckConstraint::one_of(
            "chk_appointment_status",
            "status",
            &["Scheduled", "Completed", "Cancelled"],
        ))
        .unwrap()
        .build()
        .unwrap();
    let records = TableBuilder::new(EntityKind::MedicalRecord)
        .add_column("appointment_id", DataType::Id)
        .unwrap()
        .add_column("diagnosis", DataType::Text)
        .unwrap()
        .add_foreign_key("fk_record_appointment", "appointment_id", EntityKind::Appointment)
        .unwrap()
        .add_unique("uq_record_appointment", &["appointment_id"])
        .unwrap()
        .build()
        .unwrap();
    Arc::new(Catalog::new(vec![patients, appointments, records]).unwrap())
}

pub fn patient(id: RowId, last_name: &str) -> Row {
    Row::new(id, vec![Value::Text(last_name.into()), Value::Null])
}

pub fn appointment(id: RowId, patient: RowId, status: &str) -> Row {
    Row::new(id, vec![Value::Id(patient), Value::Text(status.into())])
}

pub fn record(id: RowId, appointment: RowId) -> Row {
    Row::new(id, vec![Value::Id(appointment), Value::Text("flu".into())])
}
