//! carestore Core - Core types and schema definitions for carestore.
//!
//! This crate provides the foundational types for the carestore record store:
//!
//! - `EntityKind`: The closed set of record kinds
//! - `DataType`: Column types (Id, Int64, Text, Date, Time, Timestamp)
//! - `Value`: Runtime values that can be stored in a record
//! - `Row`: A record's values with its id and version
//! - `IdAllocator`: Monotonic per-entity id source
//! - `schema`: Schema definitions (Column, Table, Constraints, Catalog)
//! - `Error`: Error types for store operations
//!
//! # Example
//!
//! ```rust
//! use carestore_core::schema::{Catalog, TableBuilder};
//! use carestore_core::{DataType, EntityKind, Row, Value};
//!
//! let patients = TableBuilder::new(EntityKind::Patient)
//!     .add_column("last_name", DataType::Text)
//!     .unwrap()
//!     .add_non_empty(&["last_name"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let catalog = Catalog::new(vec![patients]).unwrap();
//!
//! let row = Row::new(1, vec![Value::Text("Lovelace".into())]);
//! assert_eq!(row.id(), 1);
//! assert_eq!(catalog.topological_order(), &[EntityKind::Patient]);
//! ```

mod entity;
mod error;
mod row;
pub mod schema;
mod types;
mod value;

pub use entity::EntityKind;
pub use error::{Error, Result};
pub use row::{IdAllocator, Row, RowId};
pub use types::DataType;
pub use value::Value;
