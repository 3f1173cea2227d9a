//! Carestore Database - The clinical record store.
//!
//! This crate puts the clinical schema on top of the storage layer:
//!
//! - `schema`: the six clinical tables and their constraints
//! - `model`: typed entities, insert payloads and patches
//! - `MutationEngine`: validation, cascade planning and atomic apply
//! - `TransactionCoordinator`: ordered row locks and bounded conflict retry
//! - `Database`: the thread-safe entry point
//!
//! # Example
//!
//! ```rust
//! use carestore_core::EntityKind;
//! use carestore_database::{AppointmentStatus, Database, NewAppointment, NewDoctor, NewPatient};
//! use chrono::{NaiveDate, NaiveTime};
//!
//! let db = Database::new().unwrap();
//! let patient = db
//!     .create_patient(NewPatient {
//!         first_name: "Ada".into(),
//!         last_name: "Lovelace".into(),
//!         date_of_birth: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
//!         gender: "F".into(),
//!         contact_number: "555-0100".into(),
//!         email: None,
//!     })
//!     .unwrap();
//! let doctor = db
//!     .create_doctor(NewDoctor {
//!         first_name: "John".into(),
//!         last_name: "Watson".into(),
//!         specialization: "General practice".into(),
//!         contact_number: "555-0111".into(),
//!         email: None,
//!     })
//!     .unwrap();
//! db.create_appointment(NewAppointment {
//!     patient_id: patient,
//!     doctor_id: doctor,
//!     date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
//!     time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
//!     status: AppointmentStatus::Scheduled,
//! })
//! .unwrap();
//!
//! let summary = db.delete_patient(patient).unwrap();
//! assert_eq!(summary.removed(EntityKind::Appointment), 1);
//! assert_eq!(db.count(EntityKind::Appointment), 0);
//! ```

pub mod config;
pub mod coordinator;
pub mod database;
pub mod engine;
pub mod model;
pub mod schema;

pub use config::DatabaseConfig;
pub use coordinator::{LockGuard, TransactionCoordinator};
pub use database::{Database, DeleteSummary};
pub use engine::{CascadePlan, MutationEngine};
pub use model::{
    Appointment, AppointmentPatch, AppointmentStatus, Doctor, DoctorFacilityLink, DoctorPatch,
    Entity, Facility, FacilityPatch, MedicalRecord, MedicalRecordPatch, NewAppointment, NewDoctor,
    NewDoctorFacilityLink, NewEntity, NewFacility, NewMedicalRecord, NewPatient, Patch, Patient,
    PatientPatch, Record,
};
pub use schema::clinical_catalog;
