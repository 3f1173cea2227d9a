//! Index statistics for carestore.
//!
//! This module provides statistics tracking for indexes.

/// Statistics for an index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Total number of (key, id) entries in the index.
    total_rows: usize,
}

impl IndexStats {
    /// Creates a new empty stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Increments the entry count by the given amount.
    pub fn add_rows(&mut self, count: usize) {
        self.total_rows += count;
    }

    /// Decrements the entry count by the given amount.
    pub fn remove_rows(&mut self, count: usize) {
        self.total_rows = self.total_rows.saturating_sub(count);
    }
}
