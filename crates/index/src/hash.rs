//! Hash index implementation for carestore.
//!
//! This module provides a hash-based index for O(1) point queries. Each key maps
//! to the ordered set of ids stored under it, so a foreign-key index answers
//! "who references parent P" in time proportional to the answer.

use crate::stats::IndexStats;
use crate::traits::{Index, IndexError};
use carestore_core::RowId;
use hashbrown::HashMap;
use std::collections::BTreeSet;

/// A hash-based index for point queries.
///
/// Supports both unique indexes (at most one id per key) and non-unique ones.
#[derive(Debug, Clone)]
pub struct HashIndex<K> {
    /// The underlying map from keys to row IDs.
    map: HashMap<K, BTreeSet<RowId>>,
    /// Whether this is a unique index.
    unique: bool,
    /// Statistics for this index.
    stats: IndexStats,
}

impl<K: Eq + core::hash::Hash + Clone> HashIndex<K> {
    /// Creates a new hash index.
    pub fn new(unique: bool) -> Self {
        Self {
            map: HashMap::new(),
            unique,
            stats: IndexStats::new(),
        }
    }

    /// Returns the single id held under `key`, if any. Meaningful for unique indexes.
    pub fn owner(&self, key: &K) -> Option<RowId> {
        self.map.get(key).and_then(|ids| ids.iter().next().copied())
    }
}

impl<K: Eq + core::hash::Hash + Clone> Index<K> for HashIndex<K> {
    fn add(&mut self, key: K, value: RowId) -> Result<(), IndexError> {
        if self.unique {
            if let Some(ids) = self.map.get(&key) {
                return if ids.contains(&value) {
                    Ok(())
                } else {
                    Err(IndexError::DuplicateKey)
                };
            }
        }

        let ids = self.map.entry(key).or_default();
        if ids.insert(value) {
            self.stats.add_rows(1);
        }
        Ok(())
    }

    fn get(&self, key: &K) -> BTreeSet<RowId> {
        self.map.get(key).cloned().unwrap_or_default()
    }

    fn remove(&mut self, key: &K, value: Option<RowId>) {
        match value {
            Some(v) => {
                if let Some(ids) = self.map.get_mut(key) {
                    if ids.remove(&v) {
                        self.stats.remove_rows(1);
                    }
                    if ids.is_empty() {
                        self.map.remove(key);
                    }
                }
            }
            None => {
                if let Some(ids) = self.map.remove(key) {
                    self.stats.remove_rows(ids.len());
                }
            }
        }
    }

    fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn contains(&self, key: &K, value: RowId) -> bool {
        self.map.get(key).is_some_and(|ids| ids.contains(&value))
    }

    fn len(&self) -> usize {
        self.stats.total_rows()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[RowId]) -> BTreeSet<RowId> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_hash_index_unique() {
        let mut index: HashIndex<i32> = HashIndex::new(true);

        assert!(index.add(1, 100).is_ok());
        assert!(index.add(2, 200).is_ok());
        assert_eq!(index.add(1, 101), Err(IndexError::DuplicateKey));

        assert_eq!(index.get(&1), ids(&[100]));
        assert_eq!(index.get(&2), ids(&[200]));
        assert!(index.get(&3).is_empty());
        assert_eq!(index.owner(&1), Some(100));
    }

    #[test]
    fn test_unique_readd_same_id_is_noop() {
        let mut index: HashIndex<i32> = HashIndex::new(true);
        index.add(1, 100).unwrap();
        index.add(1, 100).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_hash_index_non_unique() {
        let mut index: HashIndex<i32> = HashIndex::new(false);

        assert!(index.add(1, 101).is_ok());
        assert!(index.add(1, 100).is_ok());
        assert!(index.add(2, 200).is_ok());

        assert_eq!(index.get(&1), ids(&[100, 101]));
        assert_eq!(index.get(&2), ids(&[200]));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_hash_index_remove() {
        let mut index: HashIndex<i32> = HashIndex::new(false);

        index.add(1, 100).unwrap();
        index.add(1, 101).unwrap();
        index.add(2, 200).unwrap();

        index.remove(&1, Some(100));
        assert_eq!(index.get(&1), ids(&[101]));

        index.remove(&1, None);
        assert!(index.get(&1).is_empty());
        assert!(!index.contains_key(&1));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_last_id_drops_key() {
        let mut index: HashIndex<i32> = HashIndex::new(false);
        index.add(7, 1).unwrap();
        index.remove(&7, Some(1));
        assert!(!index.contains_key(&7));
        assert!(index.is_empty());
    }

    #[test]
    fn test_hash_index_remove_nonexistent() {
        let mut index: HashIndex<i32> = HashIndex::new(true);

        index.add(1, 100).unwrap();
        let len_before = index.len();

        index.remove(&999, None);
        assert_eq!(index.len(), len_before);

        index.remove(&1, Some(999));
        assert_eq!(index.len(), len_before);
        assert!(index.contains(&1, 100));
        assert!(!index.contains(&1, 999));
    }

    #[test]
    fn test_hash_index_tuple_keys() {
        let mut index: HashIndex<(u64, u64)> = HashIndex::new(true);

        index.add((1, 2), 10).unwrap();
        index.add((2, 1), 11).unwrap();
        assert!(index.add((1, 2), 12).is_err());
        assert!(index.contains_key(&(2, 1)));
    }

    #[test]
    fn test_hash_index_large_scale() {
        let mut index: HashIndex<i32> = HashIndex::new(true);

        for i in 0..1000 {
            index.add(i, i as u64).unwrap();
        }
        assert_eq!(index.len(), 1000);

        for i in (0..1000).step_by(2) {
            index.remove(&i, None);
        }
        assert_eq!(index.len(), 500);
        assert!(!index.contains_key(&0));
        assert!(index.contains_key(&1));
    }
}
