//! Row storage for carestore.
//!
//! This module provides the `RowStore` struct which holds the records of a
//! single entity, keyed by record id. Secondary indexes live in the
//! `IndexManager` owned by the `TableCache`; a `RowStore` only knows ids.

use carestore_core::schema::Table;
use carestore_core::{EntityKind, Error, Result, Row, RowId};
use std::sync::Arc;

/// Row storage backend: HashMap (O(1) lookup) or BTreeMap (O(log n) lookup, ordered scans).
#[cfg(feature = "hash-store")]
type RowMap = hashbrown::HashMap<RowId, Arc<Row>>;
#[cfg(not(feature = "hash-store"))]
type RowMap = std::collections::BTreeMap<RowId, Arc<Row>>;

/// Record store for one entity.
#[derive(Clone, Debug)]
pub struct RowStore {
    schema: Table,
    rows: RowMap,
}

impl RowStore {
    /// Creates an empty store for the given table schema.
    pub fn new(schema: Table) -> Self {
        Self {
            schema,
            rows: RowMap::default(),
        }
    }

    /// Returns the table schema.
    pub fn schema(&self) -> &Table {
        &self.schema
    }

    /// Returns the entity kind held by this store.
    pub fn kind(&self) -> EntityKind {
        self.schema.kind()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inserts a row. Fails if its id is already present.
    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        let row_id = row.id();
        if self.rows.contains_key(&row_id) {
            return Err(Error::duplicate_key(
                format!("pk_{}", self.schema.name()),
                format!("#{row_id}"),
            ));
        }
        if row.len() != self.schema.columns().len() {
            return Err(Error::invalid_operation(format!(
                "{} expects {} values, got {}",
                self.schema.name(),
                self.schema.columns().len(),
                row.len()
            )));
        }
        self.rows.insert(row_id, Arc::new(row));
        Ok(row_id)
    }

    /// Replaces a row, returning the previous one.
    pub fn update(&mut self, row_id: RowId, new_row: Row) -> Result<Arc<Row>> {
        if new_row.id() != row_id {
            return Err(Error::invalid_operation(format!(
                "Row id mismatch: updating #{row_id} with #{}",
                new_row.id()
            )));
        }
        match self.rows.get_mut(&row_id) {
            Some(slot) => Ok(std::mem::replace(slot, Arc::new(new_row))),
            None => Err(Error::not_found(self.kind(), row_id)),
        }
    }

    /// Removes a row, returning it.
    pub fn delete(&mut self, row_id: RowId) -> Result<Arc<Row>> {
        self.rows
            .remove(&row_id)
            .ok_or_else(|| Error::not_found(self.kind(), row_id))
    }

    /// Gets a row by ID.
    pub fn get(&self, row_id: RowId) -> Option<Arc<Row>> {
        self.rows.get(&row_id).cloned()
    }

    /// Returns true if a row with this id is stored.
    pub fn contains(&self, row_id: RowId) -> bool {
        self.rows.contains_key(&row_id)
    }

    /// Iterates over all rows.
    pub fn scan(&self) -> impl Iterator<Item = Arc<Row>> + '_ {
        self.rows.values().cloned()
    }
}
