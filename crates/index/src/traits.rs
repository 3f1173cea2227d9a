//! Index trait definitions for carestore.
//!
//! This module defines the core `Index` trait that all index implementations must satisfy.

use carestore_core::RowId;
use std::collections::BTreeSet;
use thiserror::Error;

/// Core trait for all index implementations.
pub trait Index<K> {
    /// Adds a key-id pair to the index.
    /// For unique indexes, this fails if the key is already held by another id.
    fn add(&mut self, key: K, value: RowId) -> Result<(), IndexError>;

    /// Gets all row IDs associated with a key, in ascending order.
    fn get(&self, key: &K) -> BTreeSet<RowId>;

    /// Removes a key (and optionally a specific value) from the index.
    /// If value is None, removes all values for the key.
    fn remove(&mut self, key: &K, value: Option<RowId>);

    /// Checks if the index contains the given key.
    fn contains_key(&self, key: &K) -> bool;

    /// Checks if the index maps `key` to `value`.
    fn contains(&self, key: &K, value: RowId) -> bool;

    /// Returns the number of (key, id) entries in the index.
    fn len(&self) -> usize;

    /// Returns true if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error type for index operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Attempted to insert a duplicate key in a unique index.
    #[error("Duplicate key in unique index")]
    DuplicateKey,
}
