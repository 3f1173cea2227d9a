//! Schema module for carestore.
//!
//! This module contains all schema-related definitions including columns, tables,
//! constraints, and the catalog that ties them together.

mod catalog;
mod column;
mod constraint;
mod table;

pub use catalog::Catalog;
pub use column::{Column, ColumnDefault};
pub use constraint::{CheckConstraint, ConstraintAction, Constraints, ForeignKey, PrimaryKey, UniqueConstraint};
pub use table::{Table, TableBuilder};
