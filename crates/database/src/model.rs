//! Typed views over stored rows.
//!
//! Each entity has a read type (`Patient`), an insert type (`NewPatient`) and a
//! patch type (`PatientPatch`). They convert to and from the positional rows of
//! `schema.rs`; `Record` is the tagged union over all six read types.

use crate::schema::CHK_APPOINTMENT_STATUS;
use carestore_core::{DataType, EntityKind, Error, Result, Row, RowId, Value};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A typed entity that can be read back from a stored row.
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn from_row(row: &Row) -> Result<Self>;
}

/// Insert payload for an entity.
pub trait NewEntity {
    const KIND: EntityKind;

    /// Values in column order. Nulls are filled from column defaults.
    fn into_values(self) -> Vec<Value>;
}

/// Partial update for an entity. Only set fields are written.
pub trait Patch {
    const KIND: EntityKind;

    fn into_changes(self) -> Vec<(String, Value)>;
}

/// `appointments.status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Scheduled" => Ok(AppointmentStatus::Scheduled),
            "Completed" => Ok(AppointmentStatus::Completed),
            "Cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(Error::domain(CHK_APPOINTMENT_STATUS, "status", Value::Text(other.into()))),
        }
    }
}

impl From<AppointmentStatus> for Value {
    fn from(status: AppointmentStatus) -> Self {
        Value::Text(status.as_str().into())
    }
}

/// Positional reader over a row, with typed accessors.
struct Fields<'a> {
    kind: EntityKind,
    row: &'a Row,
}

impl<'a> Fields<'a> {
    fn new(kind: EntityKind, row: &'a Row, arity: usize) -> Result<Self> {
        if row.len() != arity {
            return Err(Error::invalid_operation(format!(
                "{kind} row has {} values, expected {arity}",
                row.len()
            )));
        }
        Ok(Self { kind, row })
    }

    fn value(&self, i: usize) -> &'a Value {
        // Arity is checked in `new`
        &self.row.values()[i]
    }

    fn mismatch(&self, i: usize, expected: DataType) -> Error {
        let column = format!("{}[{i}]", self.kind);
        match self.value(i).data_type() {
            Some(got) => Error::type_mismatch(column, expected, got),
            None => Error::null_constraint(column),
        }
    }

    fn text(&self, i: usize) -> Result<String> {
        self.value(i)
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.mismatch(i, DataType::Text))
    }

    fn opt_text(&self, i: usize) -> Result<Option<String>> {
        match self.value(i) {
            Value::Null => Ok(None),
            _ => self.text(i).map(Some),
        }
    }

    fn id(&self, i: usize) -> Result<RowId> {
        self.value(i).as_id().ok_or_else(|| self.mismatch(i, DataType::Id))
    }

    fn date(&self, i: usize) -> Result<NaiveDate> {
        self.value(i).as_date().ok_or_else(|| self.mismatch(i, DataType::Date))
    }

    fn time(&self, i: usize) -> Result<NaiveTime> {
        self.value(i).as_time().ok_or_else(|| self.mismatch(i, DataType::Time))
    }

    fn timestamp(&self, i: usize) -> Result<DateTime<Utc>> {
        self.value(i)
            .as_timestamp()
            .ok_or_else(|| self.mismatch(i, DataType::Timestamp))
    }
}

/// Collects the set fields of a patch.
#[derive(Default)]
struct Changes(Vec<(String, Value)>);

impl Changes {
    fn set(mut self, column: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(v) = value {
            self.0.push((column.to_string(), v.into()));
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RowId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub contact_number: String,
    pub email: Option<String>,
}

impl Entity for Patient {
    const KIND: EntityKind = EntityKind::Patient;

    fn from_row(row: &Row) -> Result<Self> {
        let f = Fields::new(Self::KIND, row, 6)?;
        Ok(Self {
            id: row.id(),
            first_name: f.text(0)?,
            last_name: f.text(1)?,
            date_of_birth: f.date(2)?,
            gender: f.text(3)?,
            contact_number: f.text(4)?,
            email: f.opt_text(5)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub contact_number: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewEntity for NewPatient {
    const KIND: EntityKind = EntityKind::Patient;

    fn into_values(self) -> Vec<Value> {
        vec![
            self.first_name.into(),
            self.last_name.into(),
            self.date_of_birth.into(),
            self.gender.into(),
            self.contact_number.into(),
            self.email.into(),
        ]
    }
}

/// `email: Some(None)` clears the address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<Option<String>>,
}

impl Patch for PatientPatch {
    const KIND: EntityKind = EntityKind::Patient;

    fn into_changes(self) -> Vec<(String, Value)> {
        Changes::default()
            .set("first_name", self.first_name)
            .set("last_name", self.last_name)
            .set("date_of_birth", self.date_of_birth)
            .set("gender", self.gender)
            .set("contact_number", self.contact_number)
            .set("email", self.email)
            .0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: RowId,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub contact_number: String,
    pub email: Option<String>,
}

impl Entity for Doctor {
    const KIND: EntityKind = EntityKind::Doctor;

    fn from_row(row: &Row) -> Result<Self> {
        let f = Fields::new(Self::KIND, row, 5)?;
        Ok(Self {
            id: row.id(),
            first_name: f.text(0)?,
            last_name: f.text(1)?,
            specialization: f.text(2)?,
            contact_number: f.text(3)?,
            email: f.opt_text(4)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDoctor {
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub contact_number: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewEntity for NewDoctor {
    const KIND: EntityKind = EntityKind::Doctor;

    fn into_values(self) -> Vec<Value> {
        vec![
            self.first_name.into(),
            self.last_name.into(),
            self.specialization.into(),
            self.contact_number.into(),
            self.email.into(),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialization: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<Option<String>>,
}

impl Patch for DoctorPatch {
    const KIND: EntityKind = EntityKind::Doctor;

    fn into_changes(self) -> Vec<(String, Value)> {
        Changes::default()
            .set("first_name", self.first_name)
            .set("last_name", self.last_name)
            .set("specialization", self.specialization)
            .set("contact_number", self.contact_number)
            .set("email", self.email)
            .0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: RowId,
    pub name: String,
    pub location: String,
    pub contact_number: String,
}

impl Entity for Facility {
    const KIND: EntityKind = EntityKind::Facility;

    fn from_row(row: &Row) -> Result<Self> {
        let f = Fields::new(Self::KIND, row, 3)?;
        Ok(Self {
            id: row.id(),
            name: f.text(0)?,
            location: f.text(1)?,
            contact_number: f.text(2)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFacility {
    pub name: String,
    pub location: String,
    pub contact_number: String,
}

impl NewEntity for NewFacility {
    const KIND: EntityKind = EntityKind::Facility;

    fn into_values(self) -> Vec<Value> {
        vec![self.name.into(), self.location.into(), self.contact_number.into()]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub contact_number: Option<String>,
}

impl Patch for FacilityPatch {
    const KIND: EntityKind = EntityKind::Facility;

    fn into_changes(self) -> Vec<(String, Value)> {
        Changes::default()
            .set("name", self.name)
            .set("location", self.location)
            .set("contact_number", self.contact_number)
            .0
    }
}

/// A doctor working at a facility. `id` is internal; the key is the pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorFacilityLink {
    pub id: RowId,
    pub doctor_id: RowId,
    pub facility_id: RowId,
}

impl Entity for DoctorFacilityLink {
    const KIND: EntityKind = EntityKind::DoctorFacilityLink;

    fn from_row(row: &Row) -> Result<Self> {
        let f = Fields::new(Self::KIND, row, 2)?;
        Ok(Self {
            id: row.id(),
            doctor_id: f.id(0)?,
            facility_id: f.id(1)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDoctorFacilityLink {
    pub doctor_id: RowId,
    pub facility_id: RowId,
}

impl NewEntity for NewDoctorFacilityLink {
    const KIND: EntityKind = EntityKind::DoctorFacilityLink;

    fn into_values(self) -> Vec<Value> {
        vec![Value::Id(self.doctor_id), Value::Id(self.facility_id)]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: RowId,
    pub patient_id: RowId,
    pub doctor_id: RowId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
}

impl Entity for Appointment {
    const KIND: EntityKind = EntityKind::Appointment;

    fn from_row(row: &Row) -> Result<Self> {
        let f = Fields::new(Self::KIND, row, 5)?;
        Ok(Self {
            id: row.id(),
            patient_id: f.id(0)?,
            doctor_id: f.id(1)?,
            date: f.date(2)?,
            time: f.time(3)?,
            status: f.text(4)?.parse()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: RowId,
    pub doctor_id: RowId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
}

impl NewEntity for NewAppointment {
    const KIND: EntityKind = EntityKind::Appointment;

    fn into_values(self) -> Vec<Value> {
        vec![
            Value::Id(self.patient_id),
            Value::Id(self.doctor_id),
            self.date.into(),
            self.time.into(),
            self.status.into(),
        ]
    }
}

/// Patient and doctor are fixed; rebook by delete and insert.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppointmentPatch {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub status: Option<AppointmentStatus>,
}

impl Patch for AppointmentPatch {
    const KIND: EntityKind = EntityKind::Appointment;

    fn into_changes(self) -> Vec<(String, Value)> {
        Changes::default()
            .set("date", self.date)
            .set("time", self.time)
            .set("status", self.status)
            .0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: RowId,
    pub appointment_id: RowId,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub test_results: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for MedicalRecord {
    const KIND: EntityKind = EntityKind::MedicalRecord;

    fn from_row(row: &Row) -> Result<Self> {
        let f = Fields::new(Self::KIND, row, 5)?;
        Ok(Self {
            id: row.id(),
            appointment_id: f.id(0)?,
            diagnosis: f.text(1)?,
            prescription: f.opt_text(2)?,
            test_results: f.opt_text(3)?,
            created_at: f.timestamp(4)?,
        })
    }
}

/// `created_at: None` stamps the record with the insert time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMedicalRecord {
    pub appointment_id: RowId,
    pub diagnosis: String,
    #[serde(default)]
    pub prescription: Option<String>,
    #[serde(default)]
    pub test_results: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewEntity for NewMedicalRecord {
    const KIND: EntityKind = EntityKind::MedicalRecord;

    fn into_values(self) -> Vec<Value> {
        vec![
            Value::Id(self.appointment_id),
            self.diagnosis.into(),
            self.prescription.into(),
            self.test_results.into(),
            self.created_at.into(),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicalRecordPatch {
    pub diagnosis: Option<String>,
    pub prescription: Option<Option<String>>,
    pub test_results: Option<Option<String>>,
}

impl Patch for MedicalRecordPatch {
    const KIND: EntityKind = EntityKind::MedicalRecord;

    fn into_changes(self) -> Vec<(String, Value)> {
        Changes::default()
            .set("diagnosis", self.diagnosis)
            .set("prescription", self.prescription)
            .set("test_results", self.test_results)
            .0
    }
}

/// Any stored record, tagged by kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Patient(Patient),
    Doctor(Doctor),
    Facility(Facility),
    DoctorFacilityLink(DoctorFacilityLink),
    Appointment(Appointment),
    MedicalRecord(MedicalRecord),
}

impl Record {
    pub fn from_row(kind: EntityKind, row: &Row) -> Result<Self> {
        Ok(match kind {
            EntityKind::Patient => Record::Patient(Patient::from_row(row)?),
            EntityKind::Doctor => Record::Doctor(Doctor::from_row(row)?),
            EntityKind::Facility => Record::Facility(Facility::from_row(row)?),
            EntityKind::DoctorFacilityLink => {
                Record::DoctorFacilityLink(DoctorFacilityLink::from_row(row)?)
            }
            EntityKind::Appointment => Record::Appointment(Appointment::from_row(row)?),
            EntityKind::MedicalRecord => Record::MedicalRecord(MedicalRecord::from_row(row)?),
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Patient(_) => EntityKind::Patient,
            Record::Doctor(_) => EntityKind::Doctor,
            Record::Facility(_) => EntityKind::Facility,
            Record::DoctorFacilityLink(_) => EntityKind::DoctorFacilityLink,
            Record::Appointment(_) => EntityKind::Appointment,
            Record::MedicalRecord(_) => EntityKind::MedicalRecord,
        }
    }

    pub fn id(&self) -> RowId {
        match self {
            Record::Patient(r) => r.id,
            Record::Doctor(r) => r.id,
            Record::Facility(r) => r.id,
            Record::DoctorFacilityLink(r) => r.id,
            Record::Appointment(r) => r.id,
            Record::MedicalRecord(r) => r.id,
        }
    }
}
