//! Constraint checking for carestore.
//!
//! This module provides row validation against the catalog: shape and type,
//! not-null and non-empty text, value-domain checks, foreign-key existence
//! and uniqueness. Every check reads only; nothing here mutates the cache.

use crate::cache::TableCache;
use carestore_core::schema::Table;
use carestore_core::{Error, Result, Row};
use carestore_index::render_key;

/// Constraint checker for validating rows before they are written.
pub struct ConstraintChecker;

impl ConstraintChecker {
    /// Checks arity, column types, not-null and non-empty text.
    pub fn check_row(schema: &Table, row: &Row) -> Result<()> {
        let columns = schema.columns();
        if row.len() != columns.len() {
            return Err(Error::invalid_operation(format!(
                "{} expects {} values, got {}",
                schema.name(),
                columns.len(),
                row.len()
            )));
        }

        for (column, value) in columns.iter().zip(row.values()) {
            match value.data_type() {
                None if !column.is_nullable() => {
                    return Err(Error::null_constraint(column.name()));
                }
                None => {}
                Some(got) if got != column.data_type() => {
                    return Err(Error::type_mismatch(column.name(), column.data_type(), got));
                }
                Some(_) => {
                    if column.is_non_empty() && value.is_blank_text() {
                        return Err(Error::empty_value(column.name()));
                    }
                }
            }
        }

        Ok(())
    }

    /// Checks every value-domain constraint of the table.
    pub fn check_domain(schema: &Table, row: &Row) -> Result<()> {
        for check in schema.checks() {
            let idx = schema.column_index(check.column())?;
            if let Some(value) = row.get(idx) {
                if !check.admits(value) {
                    return Err(Error::domain(check.name(), check.column(), value.clone()));
                }
            }
        }
        Ok(())
    }

    /// Checks that every non-null reference resolves to a stored parent.
    pub fn check_foreign_keys(cache: &TableCache, schema: &Table, row: &Row) -> Result<()> {
        for fk in schema.foreign_keys() {
            let Some(parent_id) = schema.reference(fk, row) else {
                continue;
            };
            if !cache.contains(fk.parent, parent_id) {
                return Err(Error::foreign_key(
                    &fk.name,
                    format!("{} #{parent_id} does not exist", fk.parent),
                ));
            }
        }
        Ok(())
    }

    /// Checks every uniqueness constraint. A key already held by `row` itself
    /// (an update that leaves the key unchanged) is not a violation.
    pub fn check_unique(cache: &TableCache, schema: &Table, row: &Row) -> Result<()> {
        for constraint in schema.uniques() {
            let key = schema.key_values(&constraint.columns, row);
            if key.iter().any(|v| v.is_null()) {
                continue;
            }
            match cache.indexes().unique_owner(&constraint.name, &key)? {
                Some(owner) if owner != row.id() => {
                    return Err(Error::duplicate_key(&constraint.name, render_key(&key)));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Runs every check, reporting the first violation.
    pub fn check_all(cache: &TableCache, schema: &Table, row: &Row) -> Result<()> {
        Self::check_row(schema, row)?;
        Self::check_domain(schema, row)?;
        Self::check_foreign_keys(cache, schema, row)?;
        Self::check_unique(cache, schema, row)
    }
}
