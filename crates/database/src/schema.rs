//! The clinical schema: six tables and the constraints between them.
//!
//! Column order here is the positional layout of every stored row; the typed
//! model in `model.rs` reads and writes rows in exactly this order.

use carestore_core::schema::{Catalog, CheckConstraint, ColumnDefault, Table, TableBuilder};
use carestore_core::{DataType, EntityKind, Result};

pub const FK_APPOINTMENT_PATIENT: &str = "fk_appointment_patient";
pub const FK_APPOINTMENT_DOCTOR: &str = "fk_appointment_doctor";
pub const FK_RECORD_APPOINTMENT: &str = "fk_record_appointment";
pub const FK_LINK_DOCTOR: &str = "fk_link_doctor";
pub const FK_LINK_FACILITY: &str = "fk_link_facility";
pub const UQ_RECORD_APPOINTMENT: &str = "uq_record_appointment";
pub const PK_DOCTOR_FACILITY: &str = "pk_doctor_facility";
pub const CHK_APPOINTMENT_STATUS: &str = "chk_appointment_status";

/// Legal values of `appointments.status`.
pub const APPOINTMENT_STATUSES: [&str; 3] = ["Scheduled", "Completed", "Cancelled"];

fn patients() -> Result<Table> {
    TableBuilder::new(EntityKind::Patient)
        .add_column("first_name", DataType::Text)?
        .add_column("last_name", DataType::Text)?
        .add_column("date_of_birth", DataType::Date)?
        .add_column("gender", DataType::Text)?
        .add_column("contact_number", DataType::Text)?
        .add_column("email", DataType::Text)?
        .add_non_empty(&["first_name", "last_name"])?
        .add_nullable(&["email"])?
        .build()
}

fn doctors() -> Result<Table> {
    TableBuilder::new(EntityKind::Doctor)
        .add_column("first_name", DataType::Text)?
        .add_column("last_name", DataType::Text)?
        .add_column("specialization", DataType::Text)?
        .add_column("contact_number", DataType::Text)?
        .add_column("email", DataType::Text)?
        .add_non_empty(&["first_name", "last_name"])?
        .add_nullable(&["email"])?
        .build()
}

fn facilities() -> Result<Table> {
    TableBuilder::new(EntityKind::Facility)
        .add_column("name", DataType::Text)?
        .add_column("location", DataType::Text)?
        .add_column("contact_number", DataType::Text)?
        .add_non_empty(&["name"])?
        .build()
}

fn doctor_facility() -> Result<Table> {
    TableBuilder::new(EntityKind::DoctorFacilityLink)
        .add_column("doctor_id", DataType::Id)?
        .add_column("facility_id", DataType::Id)?
        .add_foreign_key(FK_LINK_DOCTOR, "doctor_id", EntityKind::Doctor)?
        .add_foreign_key(FK_LINK_FACILITY, "facility_id", EntityKind::Facility)?
        .add_primary_key(&["doctor_id", "facility_id"])?
        .build()
}

fn appointments() -> Result<Table> {
    TableBuilder::new(EntityKind::Appointment)
        .add_column("patient_id", DataType::Id)?
        .add_column("doctor_id", DataType::Id)?
        .add_column("date", DataType::Date)?
        .add_column("time", DataType::Time)?
        .add_column("status", DataType::Text)?
        .add_foreign_key(FK_APPOINTMENT_PATIENT, "patient_id", EntityKind::Patient)?
        .add_foreign_key(FK_APPOINTMENT_DOCTOR, "doctor_id", EntityKind::Doctor)?
        .add_check(CheckConstraint::one_of(
            CHK_APPOINTMENT_STATUS,
            "status",
            &APPOINTMENT_STATUSES,
        ))?
        .build()
}

fn medical_records() -> Result<Table> {
    TableBuilder::new(EntityKind::MedicalRecord)
        .add_column("appointment_id", DataType::Id)?
        .add_column("diagnosis", DataType::Text)?
        .add_column("prescription", DataType::Text)?
        .add_column("test_results", DataType::Text)?
        .add_column("created_at", DataType::Timestamp)?
        .add_nullable(&["prescription", "test_results"])?
        .add_default("created_at", ColumnDefault::CurrentTimestamp)?
        .add_foreign_key(FK_RECORD_APPOINTMENT, "appointment_id", EntityKind::Appointment)?
        .add_unique(UQ_RECORD_APPOINTMENT, &["appointment_id"])?
        .build()
}

/// Builds the catalog for all six clinical entities.
pub fn clinical_catalog() -> Result<Catalog> {
    Catalog::new(vec![
        patients()?,
        doctors()?,
        facilities()?,
        doctor_facility()?,
        appointments()?,
        medical_records()?,
    ])
}
