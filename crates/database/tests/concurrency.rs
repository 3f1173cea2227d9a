//! Concurrent mutations against one `Database`.
//!
//! Threads race cascading deletes against inserts and against each other;
//! afterwards every invariant must still hold.

use carestore_core::{EntityKind, Error, RowId};
use carestore_database::{
    AppointmentStatus, Database, DatabaseConfig, NewAppointment, NewDoctor, NewMedicalRecord,
    NewPatient,
};
use chrono::{NaiveDate, NaiveTime};
use std::sync::{Arc, Barrier};
use std::thread;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn patient(i: u64) -> NewPatient {
    NewPatient {
        first_name: format!("First{i}"),
        last_name: format!("Last{i}"),
        date_of_birth: NaiveDate::from_ymd_opt(1960 + (i % 40) as i32, 1, 1).unwrap(),
        gender: "F".into(),
        contact_number: format!("555-{i:04}"),
        email: None,
    }
}

fn doctor(i: u64) -> NewDoctor {
    NewDoctor {
        first_name: "Doc".into(),
        last_name: format!("Tor{i}"),
        specialization: "Cardiology".into(),
        contact_number: format!("555-9{i:03}"),
        email: None,
    }
}

fn appointment(patient_id: RowId, doctor_id: RowId, slot: u32) -> NewAppointment {
    NewAppointment {
        patient_id,
        doctor_id,
        date: NaiveDate::from_ymd_opt(2024, 6, 1 + slot % 28).unwrap(),
        time: NaiveTime::from_hms_opt(8 + slot % 9, 0, 0).unwrap(),
        status: AppointmentStatus::Scheduled,
    }
}

fn record(appointment_id: RowId) -> NewMedicalRecord {
    NewMedicalRecord {
        appointment_id,
        diagnosis: "checkup".into(),
        prescription: None,
        test_results: None,
        created_at: None,
    }
}

/// Errors a racing mutation may legitimately see.
fn is_race_outcome(err: &Error) -> bool {
    matches!(
        err,
        Error::NotFound { .. }
            | Error::ForeignKeyViolation { .. }
            | Error::DuplicateKey { .. }
            | Error::ConcurrencyConflict { .. }
    )
}

struct Clinic {
    patients: Vec<RowId>,
    doctors: Vec<RowId>,
    appointments: Vec<RowId>,
}

fn populate(db: &Database, patients: u64, doctors: u64, per_patient: u32) -> Clinic {
    let patients: Vec<RowId> = (0..patients).map(|i| db.create_patient(patient(i)).unwrap()).collect();
    let doctors: Vec<RowId> = (0..doctors).map(|i| db.create_doctor(doctor(i)).unwrap()).collect();
    let mut appointments = Vec::new();
    for (pi, p) in patients.iter().enumerate() {
        for slot in 0..per_patient {
            let d = doctors[(pi + slot as usize) % doctors.len()];
            let a = db.create_appointment(appointment(*p, d, slot)).unwrap();
            db.create_medical_record(record(a)).unwrap();
            appointments.push(a);
        }
    }
    Clinic {
        patients,
        doctors,
        appointments,
    }
}

#[test]
fn test_racing_cascades_keep_integrity() {
    init_tracing();
    let db = Arc::new(Database::with_config(DatabaseConfig::new().with_max_conflict_retries(8)).unwrap());
    let clinic = Arc::new(populate(&db, 20, 5, 3));
    let barrier = Arc::new(Barrier::new(4));

    let doctor_deleter = {
        let (db, clinic, barrier) = (db.clone(), clinic.clone(), barrier.clone());
        thread::spawn(move || {
            barrier.wait();
            let mut deleted = Vec::new();
            for d in clinic.doctors.iter().step_by(2) {
                match db.delete_doctor(*d) {
                    Ok(_) => deleted.push(*d),
                    Err(err) => assert!(is_race_outcome(&err), "{err}"),
                }
            }
            deleted
        })
    };

    let patient_deleter = {
        let (db, clinic, barrier) = (db.clone(), clinic.clone(), barrier.clone());
        thread::spawn(move || {
            barrier.wait();
            let mut deleted = Vec::new();
            for p in clinic.patients.iter().step_by(3) {
                match db.delete_patient(*p) {
                    Ok(_) => deleted.push(*p),
                    Err(err) => assert!(is_race_outcome(&err), "{err}"),
                }
            }
            deleted
        })
    };

    let appointment_deleter = {
        let (db, clinic, barrier) = (db.clone(), clinic.clone(), barrier.clone());
        thread::spawn(move || {
            barrier.wait();
            for a in clinic.appointments.iter().rev().step_by(4) {
                if let Err(err) = db.delete_appointment(*a) {
                    assert!(is_race_outcome(&err), "{err}");
                }
            }
        })
    };

    let booker = {
        let (db, clinic, barrier) = (db.clone(), clinic.clone(), barrier.clone());
        thread::spawn(move || {
            barrier.wait();
            for (i, p) in clinic.patients.iter().enumerate() {
                let d = clinic.doctors[i % clinic.doctors.len()];
                match db.create_appointment(appointment(*p, d, 20 + i as u32)) {
                    Ok(a) => {
                        if let Err(err) = db.create_medical_record(record(a)) {
                            assert!(is_race_outcome(&err), "{err}");
                        }
                    }
                    Err(err) => assert!(is_race_outcome(&err), "{err}"),
                }
            }
        })
    };

    let deleted_doctors = doctor_deleter.join().unwrap();
    let deleted_patients = patient_deleter.join().unwrap();
    appointment_deleter.join().unwrap();
    booker.join().unwrap();

    db.verify_integrity().unwrap();
    for d in deleted_doctors {
        assert_eq!(db.doctor(d).unwrap_err(), Error::not_found(EntityKind::Doctor, d));
    }
    for p in deleted_patients {
        assert_eq!(db.patient(p).unwrap_err(), Error::not_found(EntityKind::Patient, p));
    }

    // No appointment outlives either of its parents
    for a in 1..=clinic.appointments.len() as RowId + 40 {
        if let Ok(appt) = db.appointment(a) {
            assert!(db.patient(appt.patient_id).is_ok());
            assert!(db.doctor(appt.doctor_id).is_ok());
        }
    }
}

#[test]
fn test_same_row_deleted_twice_concurrently() {
    init_tracing();
    let db = Arc::new(Database::new().unwrap());
    let clinic = populate(&db, 1, 1, 5);
    let p = clinic.patients[0];
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let (db, barrier) = (db.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                db.delete_patient(p)
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let succeeded: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].total(), 1 + 5 + 5);
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, Err(Error::NotFound { .. }))));

    assert_eq!(db.count(EntityKind::Appointment), 0);
    assert_eq!(db.count(EntityKind::MedicalRecord), 0);
    db.verify_integrity().unwrap();
}

#[test]
fn test_concurrent_inserts_get_distinct_ids() {
    let db = Arc::new(Database::new().unwrap());
    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || {
                (0..50u64)
                    .map(|i| db.create_patient(patient(t * 100 + i)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<RowId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 200);
    assert_eq!(db.count(EntityKind::Patient), 200);
}

#[test]
fn test_concurrent_links_for_same_pair() {
    let db = Arc::new(Database::new().unwrap());
    let d = db.create_doctor(doctor(1)).unwrap();
    let f = db
        .create_facility(carestore_database::NewFacility {
            name: "Annex".into(),
            location: "West".into(),
            contact_number: "555-0001".into(),
        })
        .unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let (db, barrier) = (db.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                db.link_doctor_facility(d, f)
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.as_ref().err())
        .all(|e| matches!(e, Error::DuplicateKey { .. })));
    assert_eq!(db.count(EntityKind::DoctorFacilityLink), 1);
}

#[test]
fn test_facility_roster_is_read_from_one_state() {
    init_tracing();
    let db = Arc::new(Database::new().unwrap());
    let f = db
        .create_facility(carestore_database::NewFacility {
            name: "General".into(),
            location: "North".into(),
            contact_number: "555-0100".into(),
        })
        .unwrap();
    let doctors: Vec<RowId> = (0..30).map(|i| db.create_doctor(doctor(i)).unwrap()).collect();
    for d in &doctors {
        db.link_doctor_facility(*d, f).unwrap();
    }
    let barrier = Arc::new(Barrier::new(2));

    let deleter = {
        let (db, doctors, barrier) = (db.clone(), doctors.clone(), barrier.clone());
        thread::spawn(move || {
            barrier.wait();
            for d in doctors {
                db.delete_doctor(d).unwrap();
            }
        })
    };

    barrier.wait();
    loop {
        let roster: Vec<RowId> = db
            .list_doctors_for_facility(f)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        // Doctors go in id order, so any single state lists a suffix
        assert_eq!(roster, doctors[doctors.len() - roster.len()..].to_vec());
        if roster.is_empty() {
            break;
        }
    }
    deleter.join().unwrap();
    assert_eq!(db.count(EntityKind::DoctorFacilityLink), 0);
    db.verify_integrity().unwrap();
}
