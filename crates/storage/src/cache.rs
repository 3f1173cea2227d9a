//! Cache management for carestore.
//!
//! This module provides the `TableCache` struct which owns one `RowStore` per
//! entity, the `IndexManager` over all of them and the id allocator. Every
//! mutation goes through here so a store change and its index changes land
//! together or not at all.

use crate::row_store::RowStore;
use carestore_core::schema::{Catalog, Table};
use carestore_core::{EntityKind, Error, IdAllocator, Result, Row, RowId};
use carestore_index::IndexManager;
use std::collections::BTreeMap;
use std::sync::Arc;

/// All record stores plus their indexes.
pub struct TableCache {
    catalog: Arc<Catalog>,
    /// Entity kind → RowStore mapping.
    tables: BTreeMap<EntityKind, RowStore>,
    indexes: IndexManager,
    ids: IdAllocator,
}

impl TableCache {
    /// Creates an empty store for every table in `catalog`.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let tables = catalog
            .tables()
            .map(|t| (t.kind(), RowStore::new(t.clone())))
            .collect();
        let indexes = IndexManager::new(&catalog);
        Self {
            catalog,
            tables,
            indexes,
            ids: IdAllocator::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    /// The id source. Ids may be drawn without holding a write lock.
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// The record store for `kind`. A kind missing from the catalog is an error.
    pub fn store(&self, kind: EntityKind) -> Result<&RowStore> {
        self.tables
            .get(&kind)
            .ok_or_else(|| Error::invalid_operation(format!("Table not in catalog: {kind}")))
    }

    fn parts_mut(&mut self, kind: EntityKind) -> Result<(&Table, &mut RowStore, &mut IndexManager)> {
        let table = self.catalog.table(kind)?;
        let store = self
            .tables
            .get_mut(&kind)
            .ok_or_else(|| Error::invalid_operation(format!("Table not in catalog: {kind}")))?;
        Ok((table, store, &mut self.indexes))
    }

    /// Gets a row by entity and id.
    pub fn get_row(&self, kind: EntityKind, row_id: RowId) -> Option<Arc<Row>> {
        self.tables.get(&kind).and_then(|t| t.get(row_id))
    }

    pub fn contains(&self, kind: EntityKind, row_id: RowId) -> bool {
        self.tables.get(&kind).is_some_and(|t| t.contains(row_id))
    }

    /// Returns the number of rows stored for `kind`.
    pub fn row_count(&self, kind: EntityKind) -> usize {
        self.tables.get(&kind).map_or(0, RowStore::len)
    }

    /// Returns the total row count across all tables.
    pub fn total_row_count(&self) -> usize {
        self.tables.values().map(RowStore::len).sum()
    }

    /// Stores a new row and indexes it. A rejected index entry removes the row again.
    pub fn insert_row(&mut self, kind: EntityKind, row: Row) -> Result<RowId> {
        let (table, store, indexes) = self.parts_mut(kind)?;
        let row_id = store.insert(row)?;
        let stored = store.get(row_id).ok_or_else(|| Error::not_found(kind, row_id))?;
        if let Err(err) = indexes.on_insert(table, &stored) {
            store.delete(row_id)?;
            return Err(err);
        }
        self.ids.advance_past(kind, row_id);
        Ok(row_id)
    }

    /// Replaces a row and moves its index entries, returning the old row.
    pub fn update_row(&mut self, kind: EntityKind, row_id: RowId, new_row: Row) -> Result<Row> {
        let (table, store, indexes) = self.parts_mut(kind)?;
        let old = store.update(row_id, new_row)?;
        let stored = store.get(row_id).ok_or_else(|| Error::not_found(kind, row_id))?;
        if let Err(err) = indexes.on_update(table, &old, &stored) {
            store.update(row_id, (*old).clone())?;
            return Err(err);
        }
        Ok((*old).clone())
    }

    /// Removes a row and its index entries, returning the row.
    pub fn delete_row(&mut self, kind: EntityKind, row_id: RowId) -> Result<Row> {
        let (table, store, indexes) = self.parts_mut(kind)?;
        let row = store.delete(row_id)?;
        indexes.on_delete(table, &row);
        Ok((*row).clone())
    }

    /// Puts a before-image back exactly as it was, whether or not a row with
    /// that id is currently stored.
    pub fn restore_row(&mut self, kind: EntityKind, row: Row) -> Result<()> {
        if self.contains(kind, row.id()) {
            self.update_row(kind, row.id(), row).map(|_| ())
        } else {
            self.insert_row(kind, row).map(|_| ())
        }
    }
}
