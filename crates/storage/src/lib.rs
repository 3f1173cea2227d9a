//! Carestore Storage - Storage layer for the carestore record store.
//!
//! This crate provides the storage layer including:
//!
//! - `RowStore`: Record storage for one entity
//! - `TableCache`: All record stores plus their indexes and id counters
//! - `Journal`: Change tracking for transactions
//! - `Transaction`: Transaction management with rollback support
//! - `ConstraintChecker`: Constraint validation
//! - `LockManager`: Per-record shared/exclusive locks
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use carestore_core::schema::{Catalog, TableBuilder};
//! use carestore_core::{DataType, EntityKind, Row, Value};
//! use carestore_storage::{TableCache, Transaction};
//!
//! let facilities = TableBuilder::new(EntityKind::Facility)
//!     .add_column("name", DataType::Text)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let mut cache = TableCache::new(Arc::new(Catalog::new(vec![facilities]).unwrap()));
//!
//! let mut tx = Transaction::begin();
//! let row = Row::new(1, vec![Value::Text("North Clinic".into())]);
//! tx.insert(&mut cache, EntityKind::Facility, row).unwrap();
//! tx.commit().unwrap();
//!
//! assert_eq!(cache.row_count(EntityKind::Facility), 1);
//! ```

pub mod cache;
pub mod constraint;
pub mod journal;
pub mod lock;
pub mod row_store;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use cache::TableCache;
pub use constraint::ConstraintChecker;
pub use journal::{Journal, JournalEntry};
pub use lock::{LockKey, LockManager, LockType};
pub use row_store::RowStore;
pub use transaction::{Transaction, TransactionId};
