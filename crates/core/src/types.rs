//! Data type definitions for carestore.
//!
//! This module defines the semantic column types a record can hold.

use core::fmt;

/// Supported column types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Reference to another record's id (foreign keys).
    Id,
    /// 64-bit signed integer
    Int64,
    /// UTF-8 text
    Text,
    /// Calendar date without time zone
    Date,
    /// Wall-clock time of day
    Time,
    /// UTC instant
    Timestamp,
}

impl DataType {
    /// Returns the lowercase name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Id => "id",
            DataType::Int64 => "int64",
            DataType::Text => "text",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::Timestamp => "timestamp",
        }
    }

    /// Returns true if columns of this type may be compared for text emptiness.
    #[inline]
    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::Text)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
