//! The constraint catalog: every table definition plus the foreign-key
//! dependency graph derived from them.
//!
//! A `Catalog` is immutable once built. Construction validates that every
//! foreign key targets a table in the catalog and that the graph is acyclic,
//! then fixes a topological order (parents before children). Deletion walks
//! that order backwards so dependents always go before the rows they reference.

use super::constraint::ForeignKey;
use super::table::Table;
use crate::entity::EntityKind;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Clone, Debug)]
pub struct Catalog {
    tables: BTreeMap<EntityKind, Table>,
    /// Parent kind → foreign keys (in any child) that reference it.
    dependents: BTreeMap<EntityKind, Vec<ForeignKey>>,
    /// Parents before children.
    order: Vec<EntityKind>,
    /// Position of each kind in `order`.
    rank: BTreeMap<EntityKind, usize>,
}

impl Catalog {
    /// Validates the tables and builds the dependency graph.
    pub fn new(tables: Vec<Table>) -> Result<Self> {
        let mut by_kind = BTreeMap::new();
        for table in tables {
            let kind = table.kind();
            if by_kind.insert(kind, table).is_some() {
                return Err(Error::invalid_schema(format!("Table defined twice: {kind}")));
            }
        }

        let mut dependents: BTreeMap<EntityKind, Vec<ForeignKey>> = BTreeMap::new();
        let mut names = BTreeSet::new();
        for table in by_kind.values() {
            for fk in table.foreign_keys() {
                if !by_kind.contains_key(&fk.parent) {
                    return Err(Error::invalid_schema(format!(
                        "Foreign key {} references missing table {}",
                        fk.name, fk.parent
                    )));
                }
                if !names.insert(fk.name.clone()) {
                    return Err(Error::invalid_schema(format!(
                        "Constraint name used twice: {}",
                        fk.name
                    )));
                }
                dependents.entry(fk.parent).or_default().push(fk.clone());
            }
            for unique in table.uniques() {
                if !names.insert(unique.name.clone()) {
                    return Err(Error::invalid_schema(format!(
                        "Constraint name used twice: {}",
                        unique.name
                    )));
                }
            }
        }

        let order = Self::topological_order_of(&by_kind)?;
        let rank = order.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        Ok(Self {
            tables: by_kind,
            dependents,
            order,
            rank,
        })
    }

    /// Kahn's algorithm over parent → child edges.
    fn topological_order_of(tables: &BTreeMap<EntityKind, Table>) -> Result<Vec<EntityKind>> {
        let mut in_degree: BTreeMap<EntityKind, usize> = tables.keys().map(|k| (*k, 0)).collect();
        let mut children: BTreeMap<EntityKind, BTreeSet<EntityKind>> = BTreeMap::new();

        for table in tables.values() {
            let parents: BTreeSet<EntityKind> =
                table.foreign_keys().iter().map(|fk| fk.parent).collect();
            for parent in parents {
                children.entry(parent).or_default().insert(table.kind());
                *in_degree.entry(table.kind()).or_default() += 1;
            }
        }

        let mut ready: VecDeque<EntityKind> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| *k)
            .collect();
        let mut order = Vec::with_capacity(tables.len());

        while let Some(kind) = ready.pop_front() {
            order.push(kind);
            for child in children.get(&kind).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(child) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*child);
                    }
                }
            }
        }

        if order.len() != tables.len() {
            let cyclic: Vec<String> = in_degree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(k, _)| k.to_string())
                .collect();
            return Err(Error::invalid_schema(format!(
                "Foreign keys form a cycle through: {}",
                cyclic.join(", ")
            )));
        }

        Ok(order)
    }

    /// Returns the table for `kind`.
    pub fn table(&self, kind: EntityKind) -> Result<&Table> {
        self.tables
            .get(&kind)
            .ok_or_else(|| Error::invalid_operation(format!("Table not in catalog: {kind}")))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.tables.contains_key(&kind)
    }

    /// Foreign keys, across all children, that reference `parent`.
    pub fn dependents_of(&self, parent: EntityKind) -> &[ForeignKey] {
        self.dependents.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All foreign keys in the catalog.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.tables.values().flat_map(|t| t.foreign_keys().iter())
    }

    /// Kinds with parents before children.
    pub fn topological_order(&self) -> &[EntityKind] {
        &self.order
    }

    /// Position in the topological order. Higher ranks are deleted first.
    pub fn rank(&self, kind: EntityKind) -> usize {
        self.rank.get(&kind).copied().unwrap_or(usize::MAX)
    }
}
