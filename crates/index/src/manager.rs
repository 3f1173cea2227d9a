//! Index manager: every secondary index the catalog implies.
//!
//! One non-unique index per foreign key (parent id → dependent ids) and one
//! unique index per uniqueness constraint (key tuple → owning id). The manager
//! is notified synchronously of every row change; a change that would leave a
//! duplicate entry is undone in full before the error is returned.

use crate::hash::HashIndex;
use crate::traits::{Index, IndexError};
use carestore_core::schema::{Catalog, ForeignKey, Table, UniqueConstraint};
use carestore_core::{EntityKind, Error, Result, Row, RowId, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Values of a (possibly composite) unique key, in constraint column order.
pub type KeyTuple = Vec<Value>;

#[derive(Debug, Clone)]
struct ForeignKeyIndex {
    fk: ForeignKey,
    index: HashIndex<RowId>,
}

#[derive(Debug, Clone)]
struct UniqueIndex {
    constraint: UniqueConstraint,
    index: HashIndex<KeyTuple>,
}

/// An index entry applied for one row, kept so it can be undone.
enum Applied {
    Unique(String, KeyTuple),
    Foreign(String, RowId),
}

/// Secondary indexes for every table in a catalog.
#[derive(Debug, Clone)]
pub struct IndexManager {
    foreign: BTreeMap<String, ForeignKeyIndex>,
    unique: BTreeMap<String, UniqueIndex>,
}

/// Renders a key tuple for error messages: `(#1, #4)`.
pub fn render_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

impl IndexManager {
    /// Creates empty indexes for every foreign key and unique constraint.
    pub fn new(catalog: &Catalog) -> Self {
        let mut foreign = BTreeMap::new();
        let mut unique = BTreeMap::new();

        for table in catalog.tables() {
            for fk in table.foreign_keys() {
                foreign.insert(
                    fk.name.clone(),
                    ForeignKeyIndex {
                        fk: fk.clone(),
                        index: HashIndex::new(false),
                    },
                );
            }
            for constraint in table.uniques() {
                unique.insert(
                    constraint.name.clone(),
                    UniqueIndex {
                        constraint: constraint.clone(),
                        index: HashIndex::new(true),
                    },
                );
            }
        }

        Self { foreign, unique }
    }

    fn foreign_index(&self, fk_name: &str) -> Result<&ForeignKeyIndex> {
        self.foreign
            .get(fk_name)
            .ok_or_else(|| Error::invalid_operation(format!("Unknown foreign key: {fk_name}")))
    }

    fn unique_index(&self, constraint: &str) -> Result<&UniqueIndex> {
        self.unique
            .get(constraint)
            .ok_or_else(|| Error::invalid_operation(format!("Unknown unique constraint: {constraint}")))
    }

    /// Ids of `entity` rows whose foreign key `fk_name` references `parent_id`.
    pub fn lookup_dependents(
        &self,
        entity: EntityKind,
        fk_name: &str,
        parent_id: RowId,
    ) -> Result<BTreeSet<RowId>> {
        let entry = self.foreign_index(fk_name)?;
        if entry.fk.child != entity {
            return Err(Error::invalid_operation(format!(
                "Foreign key {fk_name} belongs to {}, not {entity}",
                entry.fk.child
            )));
        }
        Ok(entry.index.get(&parent_id))
    }

    /// Returns true if `key` is not yet used under `constraint`.
    pub fn check_unique(&self, constraint: &str, key: &KeyTuple) -> Result<bool> {
        Ok(!self.unique_index(constraint)?.index.contains_key(key))
    }

    /// The id currently holding `key` under `constraint`.
    pub fn unique_owner(&self, constraint: &str, key: &KeyTuple) -> Result<Option<RowId>> {
        Ok(self.unique_index(constraint)?.index.owner(key))
    }

    /// Number of entries in the named index.
    pub fn entry_count(&self, name: &str) -> Option<usize> {
        self.foreign
            .get(name)
            .map(|f| f.index.len())
            .or_else(|| self.unique.get(name).map(|u| u.index.len()))
    }

    /// True if the foreign-key index `fk_name` maps `parent_id` to `child_id`.
    pub fn has_dependent(&self, fk_name: &str, parent_id: RowId, child_id: RowId) -> bool {
        self.foreign
            .get(fk_name)
            .is_some_and(|f| f.index.contains(&parent_id, child_id))
    }

    /// Unique key of `row` under `constraint`, or None if any component is null
    /// (nulls never collide).
    fn unique_key(table: &Table, constraint: &UniqueConstraint, row: &Row) -> Option<KeyTuple> {
        let key = table.key_values(&constraint.columns, row);
        if key.iter().any(Value::is_null) {
            None
        } else {
            Some(key)
        }
    }

    /// Adds every index entry for a newly stored row.
    pub fn on_insert(&mut self, table: &Table, row: &Row) -> Result<()> {
        let mut applied = Vec::new();
        match self.add_entries(table, row, &mut applied) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.undo(applied, row.id());
                Err(err)
            }
        }
    }

    fn add_entries(&mut self, table: &Table, row: &Row, applied: &mut Vec<Applied>) -> Result<()> {
        for constraint in table.uniques() {
            let Some(key) = Self::unique_key(table, constraint, row) else {
                continue;
            };
            let entry = self.unique.get_mut(&constraint.name).ok_or_else(|| {
                Error::invalid_operation(format!("Unknown unique constraint: {}", constraint.name))
            })?;
            // Re-adding an entry the row already owns is a no-op and must not be undone
            let fresh = !entry.index.contains(&key, row.id());
            match entry.index.add(key.clone(), row.id()) {
                Ok(()) if fresh => applied.push(Applied::Unique(constraint.name.clone(), key)),
                Ok(()) => {}
                Err(IndexError::DuplicateKey) => {
                    return Err(Error::duplicate_key(&constraint.name, render_key(&key)));
                }
            }
        }

        for fk in table.foreign_keys() {
            let Some(parent) = table.reference(fk, row) else {
                continue;
            };
            let entry = self.foreign.get_mut(&fk.name).ok_or_else(|| {
                Error::invalid_operation(format!("Unknown foreign key: {}", fk.name))
            })?;
            let fresh = !entry.index.contains(&parent, row.id());
            entry
                .index
                .add(parent, row.id())
                .map_err(|e| Error::invalid_operation(format!("{}: {e}", fk.name)))?;
            if fresh {
                applied.push(Applied::Foreign(fk.name.clone(), parent));
            }
        }

        Ok(())
    }

    fn undo(&mut self, applied: Vec<Applied>, row_id: RowId) {
        for entry in applied.into_iter().rev() {
            match entry {
                Applied::Unique(name, key) => {
                    if let Some(u) = self.unique.get_mut(&name) {
                        u.index.remove(&key, Some(row_id));
                    }
                }
                Applied::Foreign(name, parent) => {
                    if let Some(f) = self.foreign.get_mut(&name) {
                        f.index.remove(&parent, Some(row_id));
                    }
                }
            }
        }
    }

    /// Removes every index entry for a row leaving the store.
    pub fn on_delete(&mut self, table: &Table, row: &Row) {
        for constraint in table.uniques() {
            if let (Some(key), Some(entry)) = (
                Self::unique_key(table, constraint, row),
                self.unique.get_mut(&constraint.name),
            ) {
                entry.index.remove(&key, Some(row.id()));
            }
        }
        for fk in table.foreign_keys() {
            if let (Some(parent), Some(entry)) =
                (table.reference(fk, row), self.foreign.get_mut(&fk.name))
            {
                entry.index.remove(&parent, Some(row.id()));
            }
        }
    }

    /// Moves a row's index entries from `old` to `new`. On failure the old
    /// entries are back in place.
    pub fn on_update(&mut self, table: &Table, old: &Row, new: &Row) -> Result<()> {
        self.on_delete(table, old);
        if let Err(err) = self.on_insert(table, new) {
            // The old entries were valid a moment ago, so restoring them cannot collide.
            self.on_insert(table, old)?;
            return Err(err);
        }
        Ok(())
    }
}
