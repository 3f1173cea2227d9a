//! Row structure for carestore.
//!
//! This module defines the `Row` struct which holds the column values of a single
//! record, and the `IdAllocator` that hands out record ids.

use crate::entity::EntityKind;
use crate::value::Value;
use core::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a record within its entity.
pub type RowId = u64;

/// Per-entity id source.
///
/// Ids start at 1, increase monotonically and are never handed out twice,
/// even when the mutation that drew an id aborts.
#[derive(Debug)]
pub struct IdAllocator {
    next: [AtomicU64; EntityKind::COUNT],
}

impl IdAllocator {
    /// Creates an allocator whose first id for every entity is 1.
    pub fn new() -> Self {
        Self {
            next: core::array::from_fn(|_| AtomicU64::new(1)),
        }
    }

    /// Draws the next id for `kind`.
    pub fn next(&self, kind: EntityKind) -> RowId {
        self.next[kind.ordinal()].fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the id the next call to `next` would return, without drawing it.
    pub fn peek(&self, kind: EntityKind) -> RowId {
        self.next[kind.ordinal()].load(Ordering::SeqCst)
    }

    /// Moves the counter forward so it never hands out `id` or anything below it.
    pub fn advance_past(&self, kind: EntityKind, id: RowId) {
        self.next[kind.ordinal()].fetch_max(id.saturating_add(1), Ordering::SeqCst);
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A record's payload.
#[derive(Clone, Debug)]
pub struct Row {
    /// Record id.
    id: RowId,
    /// Version number for change detection. Incremented on each update.
    version: u64,
    /// Values stored in this row, indexed by column position.
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given ID and values.
    /// Version defaults to 1 for new rows.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, version: 1, values }
    }

    /// Creates a new row with the given ID, version, and values.
    pub fn new_with_version(id: RowId, version: u64, values: Vec<Value>) -> Self {
        Self { id, version, values }
    }

    /// Returns the row ID.
    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns the version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Increments the version number and returns the new value.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row and returns its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Gets a value at the given column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Sets a value at the given column index.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        if index < self.values.len() {
            self.values[index] = value;
            true
        } else {
            false
        }
    }

    /// Returns the number of values in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version && self.values == other.values
    }
}

impl Eq for Row {}
