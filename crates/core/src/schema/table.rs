//! Table definition for carestore schemas.

use super::column::{Column, ColumnDefault};
use super::constraint::{CheckConstraint, ConstraintAction, Constraints, ForeignKey, PrimaryKey, UniqueConstraint};
use crate::entity::EntityKind;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::types::DataType;
use crate::value::Value;

/// A table definition: one per entity kind.
#[derive(Clone, Debug)]
pub struct Table {
    kind: EntityKind,
    columns: Vec<Column>,
    constraints: Constraints,
}

impl Table {
    /// Returns the entity kind stored in this table.
    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.table_name()
    }

    /// Returns the columns.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the constraints.
    #[inline]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Gets a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Gets a column index by name.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Like `get_column_index`, but reports a missing column as an error.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.get_column_index(name)
            .ok_or_else(|| Error::column_not_found(self.name(), name))
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        self.constraints.get_primary_key()
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        self.constraints.get_foreign_keys()
    }

    pub fn uniques(&self) -> &[UniqueConstraint] {
        self.constraints.get_uniques()
    }

    pub fn checks(&self) -> &[CheckConstraint] {
        self.constraints.get_checks()
    }

    /// Extracts the values of `columns` from `row`, in order.
    pub fn key_values(&self, columns: &[String], row: &Row) -> Vec<Value> {
        columns
            .iter()
            .map(|name| {
                self.get_column_index(name)
                    .and_then(|i| row.get(i))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }

    /// Returns the parent id referenced by `fk` in `row`, if set.
    pub fn reference(&self, fk: &ForeignKey, row: &Row) -> Option<crate::RowId> {
        self.get_column_index(&fk.column)
            .and_then(|i| row.get(i))
            .and_then(Value::as_id)
    }
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    kind: EntityKind,
    columns: Vec<Column>,
    primary_key: PrimaryKey,
    uniques: Vec<UniqueConstraint>,
    foreign_keys: Vec<ForeignKey>,
    checks: Vec<CheckConstraint>,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            columns: Vec::new(),
            primary_key: PrimaryKey::Surrogate,
            uniques: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
        }
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let Some(first) = name.chars().next() else {
            return Err(Error::invalid_schema("Name cannot be empty"));
        };
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter or underscore: {name}"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {name}"
            )));
        }
        Ok(())
    }

    fn require_column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| Error::invalid_schema(format!("Column not found: {name}")))
    }

    fn modify_column(mut self, name: &str, f: impl FnOnce(Column) -> Column) -> Result<Self> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| Error::invalid_schema(format!("Column not found: {name}")))?;
        let col = self.columns.remove(pos);
        self.columns.insert(pos, f(col));
        Ok(self)
    }

    /// Adds a non-null, mutable column.
    pub fn add_column(self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        self.add_column_def(Column::new(name, data_type))
    }

    /// Adds a fully configured column.
    pub fn add_column_def(mut self, column: Column) -> Result<Self> {
        Self::check_naming_rules(column.name())?;
        if self.columns.iter().any(|c| c.name() == column.name()) {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {}",
                column.name()
            )));
        }
        self.columns.push(column);
        Ok(self)
    }

    /// Marks columns nullable.
    pub fn add_nullable(mut self, columns: &[&str]) -> Result<Self> {
        for name in columns {
            self = self.modify_column(name, |c| c.nullable(true))?;
        }
        Ok(self)
    }

    /// Requires non-blank text in the given columns.
    pub fn add_non_empty(mut self, columns: &[&str]) -> Result<Self> {
        for name in columns {
            if !self.require_column(name)?.data_type().is_textual() {
                return Err(Error::invalid_schema(format!(
                    "Non-empty check requires a text column: {name}"
                )));
            }
            self = self.modify_column(name, |c| c.non_empty(true))?;
        }
        Ok(self)
    }

    /// Sets an insert default.
    pub fn add_default(self, column: &str, default: ColumnDefault) -> Result<Self> {
        if default == ColumnDefault::CurrentTimestamp
            && self.require_column(column)?.data_type() != DataType::Timestamp
        {
            return Err(Error::invalid_schema(format!(
                "Current timestamp default requires a timestamp column: {column}"
            )));
        }
        self.modify_column(column, |c| c.default_value(default))
    }

    /// Declares a composite primary key. The columns become immutable and are
    /// enforced through a unique constraint named `pk_<table>`.
    pub fn add_primary_key(mut self, columns: &[&str]) -> Result<Self> {
        if columns.len() < 2 {
            return Err(Error::invalid_schema(
                "Single-column keys use the surrogate id; composite keys need two or more columns",
            ));
        }
        for name in columns {
            self = self.modify_column(name, |c| c.mutable(false))?;
        }
        let cols: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        self.uniques.push(UniqueConstraint::new(
            format!("pk_{}", self.kind.table_name()),
            self.kind,
            cols.clone(),
        ));
        self.primary_key = PrimaryKey::Composite(cols);
        Ok(self)
    }

    /// Adds a unique constraint.
    pub fn add_unique(mut self, name: impl Into<String>, columns: &[&str]) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if columns.is_empty() {
            return Err(Error::invalid_schema(format!("Unique constraint {name} has no columns")));
        }
        for col in columns {
            self.require_column(col)?;
        }
        self.uniques.push(UniqueConstraint::new(
            name,
            self.kind,
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        Ok(self)
    }

    /// Adds a cascading foreign key. The column must be of type `Id` and becomes
    /// immutable.
    pub fn add_foreign_key(
        self,
        name: impl Into<String>,
        column: &str,
        parent: EntityKind,
    ) -> Result<Self> {
        self.add_foreign_key_with_action(name, column, parent, ConstraintAction::Cascade)
    }

    pub fn add_foreign_key_with_action(
        mut self,
        name: impl Into<String>,
        column: &str,
        parent: EntityKind,
        action: ConstraintAction,
    ) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        let col = self.require_column(column)?;
        if col.data_type() != DataType::Id {
            return Err(Error::invalid_schema(format!(
                "Foreign key column must have type id: {column}"
            )));
        }
        self = self.modify_column(column, |c| c.mutable(false))?;
        self.foreign_keys
            .push(ForeignKey::new(name, self.kind, column, parent).action(action));
        Ok(self)
    }

    /// Adds a value-domain check.
    pub fn add_check(mut self, check: CheckConstraint) -> Result<Self> {
        Self::check_naming_rules(check.name())?;
        self.require_column(check.column())?;
        self.checks.push(check);
        Ok(self)
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<Table> {
        let mut constraints = Constraints::new().primary_key(self.primary_key);
        for fk in self.foreign_keys {
            constraints = constraints.add_foreign_key(fk);
        }
        for unique in self.uniques {
            constraints = constraints.add_unique(unique);
        }
        for check in self.checks {
            constraints = constraints.add_check(check);
        }

        let columns: Vec<Column> = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_index(i))
            .collect();

        Ok(Table {
            kind: self.kind,
            columns,
            constraints,
        })
    }
}
