//! Carestore Index - secondary indexes for the carestore engine.
//!
//! This crate provides:
//!
//! - `HashIndex`: O(1) point lookups from a key to the ordered set of ids under it
//! - `IndexManager`: one index per foreign key and per uniqueness constraint in a
//!   catalog, maintained on every insert, update and delete
//!
//! # Example
//!
//! ```rust
//! use carestore_index::{HashIndex, Index};
//!
//! // Non-unique: parent id → dependent ids
//! let mut by_patient: HashIndex<u64> = HashIndex::new(false);
//! by_patient.add(1, 10).unwrap();
//! by_patient.add(1, 11).unwrap();
//! assert_eq!(by_patient.get(&1).into_iter().collect::<Vec<_>>(), vec![10, 11]);
//!
//! // Unique: one id per key
//! let mut by_appointment: HashIndex<u64> = HashIndex::new(true);
//! by_appointment.add(10, 100).unwrap();
//! assert!(by_appointment.add(10, 101).is_err());
//! ```

pub mod hash;
pub mod manager;
pub mod stats;
pub mod traits;

pub use hash::HashIndex;
pub use manager::{render_key, IndexManager, KeyTuple};
pub use stats::IndexStats;
pub use traits::{Index, IndexError};
