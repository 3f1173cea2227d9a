//! Column definition for carestore schemas.

use crate::types::DataType;
use crate::value::Value;
use chrono::{DateTime, Utc};

/// How a column is filled when an insert leaves it null.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnDefault {
    /// A fixed value.
    Value(Value),
    /// The commit clock at insert time (`Timestamp` columns only).
    CurrentTimestamp,
}

impl ColumnDefault {
    /// Resolves the default against the given clock reading.
    pub fn resolve(&self, now: DateTime<Utc>) -> Value {
        match self {
            ColumnDefault::Value(v) => v.clone(),
            ColumnDefault::CurrentTimestamp => Value::Timestamp(now),
        }
    }
}

/// A column definition in a table schema.
#[derive(Clone, Debug)]
pub struct Column {
    /// Column name.
    name: String,
    /// Data type of the column.
    data_type: DataType,
    /// Whether this column allows null values.
    nullable: bool,
    /// Whether text in this column must contain non-whitespace characters.
    non_empty: bool,
    /// Whether `update` may change this column.
    mutable: bool,
    /// Value used when an insert leaves the column null.
    default: Option<ColumnDefault>,
    /// Column index in the table (0-based).
    index: usize,
}

impl Column {
    /// Creates a new non-null, mutable column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            non_empty: false,
            mutable: true,
            default: None,
            index: 0,
        }
    }

    /// Sets whether this column is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Requires non-blank text.
    pub fn non_empty(mut self, non_empty: bool) -> Self {
        self.non_empty = non_empty;
        self
    }

    /// Sets whether `update` may change this column.
    pub fn mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    /// Sets the default used when an insert leaves this column null.
    pub fn default_value(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the column index.
    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the data type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn is_non_empty(&self) -> bool {
        self.non_empty
    }

    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Returns the insert default, if any.
    pub fn get_default(&self) -> Option<&ColumnDefault> {
        self.default.as_ref()
    }

    /// Returns the column index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data_type == other.data_type
    }
}
