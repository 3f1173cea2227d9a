//! Constraint definitions for carestore schemas.

use crate::entity::EntityKind;
use crate::value::Value;

/// Foreign key action on parent delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ConstraintAction {
    /// Reject the delete if any dependent exists.
    Restrict,
    /// Delete the dependents too.
    #[default]
    Cascade,
}

/// Shape of an entity's primary key.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum PrimaryKey {
    /// Store-assigned record id.
    #[default]
    Surrogate,
    /// Tuple of columns, enforced through a unique constraint. The record still
    /// carries an internal surrogate id.
    Composite(Vec<String>),
}

/// Foreign key specification. The referenced column is always the parent's id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Entity holding the reference.
    pub child: EntityKind,
    /// Referencing column in the child.
    pub column: String,
    /// Referenced entity.
    pub parent: EntityKind,
    /// Action on parent delete.
    pub action: ConstraintAction,
}

impl ForeignKey {
    /// Creates a cascading foreign key.
    pub fn new(
        name: impl Into<String>,
        child: EntityKind,
        column: impl Into<String>,
        parent: EntityKind,
    ) -> Self {
        Self {
            name: name.into(),
            child,
            column: column.into(),
            parent,
            action: ConstraintAction::Cascade,
        }
    }

    /// Sets the constraint action.
    pub fn action(mut self, action: ConstraintAction) -> Self {
        self.action = action;
        self
    }
}

/// Uniqueness over one or more columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: String,
    pub table: EntityKind,
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    pub fn new(name: impl Into<String>, table: EntityKind, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            table,
            columns,
        }
    }

    #[inline]
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

/// Value-domain check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckConstraint {
    /// Column must hold one of a fixed set of text values.
    OneOf {
        name: String,
        column: String,
        allowed: Vec<String>,
    },
}

impl CheckConstraint {
    pub fn one_of(name: impl Into<String>, column: impl Into<String>, allowed: &[&str]) -> Self {
        CheckConstraint::OneOf {
            name: name.into(),
            column: column.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CheckConstraint::OneOf { name, .. } => name,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            CheckConstraint::OneOf { column, .. } => column,
        }
    }

    /// Returns true if `value` satisfies the check. Null passes; nullability is
    /// enforced separately.
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            CheckConstraint::OneOf { allowed, .. } => match value {
                Value::Null => true,
                Value::Text(s) => allowed.iter().any(|a| a == s),
                _ => false,
            },
        }
    }
}

/// Table constraints container.
#[derive(Clone, Debug, Default)]
pub struct Constraints {
    primary_key: PrimaryKey,
    foreign_keys: Vec<ForeignKey>,
    uniques: Vec<UniqueConstraint>,
    checks: Vec<CheckConstraint>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_key(mut self, pk: PrimaryKey) -> Self {
        self.primary_key = pk;
        self
    }

    pub fn add_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn add_unique(mut self, unique: UniqueConstraint) -> Self {
        self.uniques.push(unique);
        self
    }

    pub fn add_check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }

    pub fn get_primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    pub fn get_foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Unique constraints, including the one backing a composite primary key.
    pub fn get_uniques(&self) -> &[UniqueConstraint] {
        &self.uniques
    }

    pub fn get_checks(&self) -> &[CheckConstraint] {
        &self.checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key() {
        let fk = ForeignKey::new(
            "fk_appointment_patient",
            EntityKind::Appointment,
            "patient_id",
            EntityKind::Patient,
        );
        assert_eq!(fk.child, EntityKind::Appointment);
        assert_eq!(fk.parent, EntityKind::Patient);
        assert_eq!(fk.action, ConstraintAction::Cascade);

        let fk = fk.action(ConstraintAction::Restrict);
        assert_eq!(fk.action, ConstraintAction::Restrict);
    }

    #[test]
    fn test_one_of_check() {
        let check = CheckConstraint::one_of(
            "chk_status",
            "status",
            &["Scheduled", "Completed", "Cancelled"],
        );
        assert_eq!(check.column(), "status");
        assert!(check.admits(&Value::Text("Completed".into())));
        assert!(!check.admits(&Value::Text("Pending".into())));
        assert!(!check.admits(&Value::Text("completed".into())));
        assert!(!check.admits(&Value::Int64(1)));
        assert!(check.admits(&Value::Null));
    }

    #[test]
    fn test_constraints() {
        let constraints = Constraints::new()
            .primary_key(PrimaryKey::Composite(vec!["doctor_id".into(), "facility_id".into()]))
            .add_unique(UniqueConstraint::new(
                "pk_doctor_facility",
                EntityKind::DoctorFacilityLink,
                vec!["doctor_id".into(), "facility_id".into()],
            ));

        assert!(matches!(constraints.get_primary_key(), PrimaryKey::Composite(cols) if cols.len() == 2));
        assert!(constraints.get_uniques()[0].is_composite());
        assert!(constraints.get_foreign_keys().is_empty());
    }
}
