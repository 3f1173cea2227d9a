//! Error types for carestore.

use crate::entity::EntityKind;
use crate::row::RowId;
use crate::types::DataType;
use crate::value::Value;
use thiserror::Error;

/// Result type alias for carestore operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for store operations.
///
/// No variant is ever returned with partially applied state behind it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Referenced record does not exist.
    #[error("{kind} #{id} not found")]
    NotFound { kind: EntityKind, id: RowId },

    /// Primary or unique constraint violation.
    #[error("duplicate key on {constraint}: {key}")]
    DuplicateKey { constraint: String, key: String },

    /// Reference to a parent that does not exist, or a restricted delete.
    #[error("foreign key violation ({constraint}): {message}")]
    ForeignKeyViolation { constraint: String, message: String },

    /// Value outside its allowed domain.
    #[error("domain violation ({constraint}): {value} is not allowed in {column}")]
    DomainViolation {
        constraint: String,
        column: String,
        value: Value,
    },

    /// A concurrent mutation invalidated this one's premises.
    #[error("concurrency conflict: {message}")]
    ConcurrencyConflict { message: String },

    /// Value type does not match the column type.
    #[error("type mismatch on {column}: expected {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        got: DataType,
    },

    /// Null in a column that requires a value.
    #[error("null constraint violation on column: {column}")]
    NullConstraint { column: String },

    /// Blank text in a column that requires content.
    #[error("empty value in column: {column}")]
    EmptyValue { column: String },

    #[error("column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },

    /// Patch touches a key or foreign-key column.
    #[error("column {column} of {table} cannot be updated")]
    ImmutableColumn { table: String, column: String },

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    pub fn not_found(kind: EntityKind, id: RowId) -> Self {
        Error::NotFound { kind, id }
    }

    pub fn duplicate_key(constraint: impl Into<String>, key: impl Into<String>) -> Self {
        Error::DuplicateKey {
            constraint: constraint.into(),
            key: key.into(),
        }
    }

    pub fn foreign_key(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ForeignKeyViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    pub fn domain(constraint: impl Into<String>, column: impl Into<String>, value: Value) -> Self {
        Error::DomainViolation {
            constraint: constraint.into(),
            column: column.into(),
            value,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::ConcurrencyConflict {
            message: message.into(),
        }
    }

    pub fn type_mismatch(column: impl Into<String>, expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch {
            column: column.into(),
            expected,
            got,
        }
    }

    pub fn null_constraint(column: impl Into<String>) -> Self {
        Error::NullConstraint {
            column: column.into(),
        }
    }

    pub fn empty_value(column: impl Into<String>) -> Self {
        Error::EmptyValue {
            column: column.into(),
        }
    }

    pub fn immutable_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ImmutableColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// True only for errors a coordinator may retry transparently.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }
}
