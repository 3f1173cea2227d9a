//! Runtime options for a `Database`.

use serde::{Deserialize, Serialize};

/// Options a host service can load from its own config file.
///
/// Every field has a default, so `{}` deserializes to `DatabaseConfig::default()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// How many times a mutation that hit a concurrency conflict is re-planned
    /// before the conflict is returned to the caller.
    pub max_conflict_retries: u32,
    /// Re-check every invariant after each committed mutation. Slow; for tests.
    pub verify_on_commit: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            verify_on_commit: false,
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_verify_on_commit(mut self, verify: bool) -> Self {
        self.verify_on_commit = verify;
        self
    }
}
