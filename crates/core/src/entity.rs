//! Entity kinds known to the store.

use core::fmt;

/// The closed set of record kinds.
///
/// Declaration order is significant: it is the first component of the global
/// lock order, so never reorder variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Patient,
    Doctor,
    Facility,
    DoctorFacilityLink,
    Appointment,
    MedicalRecord,
}

impl EntityKind {
    /// Number of entity kinds.
    pub const COUNT: usize = 6;

    /// All kinds in lock order.
    pub const ALL: [EntityKind; Self::COUNT] = [
        EntityKind::Patient,
        EntityKind::Doctor,
        EntityKind::Facility,
        EntityKind::DoctorFacilityLink,
        EntityKind::Appointment,
        EntityKind::MedicalRecord,
    ];

    /// Position of this kind in `ALL`.
    #[inline]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// The table name used in constraint names and messages.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Patient => "patients",
            EntityKind::Doctor => "doctors",
            EntityKind::Facility => "facilities",
            EntityKind::DoctorFacilityLink => "doctor_facility",
            EntityKind::Appointment => "appointments",
            EntityKind::MedicalRecord => "medical_records",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
