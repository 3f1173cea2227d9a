//! Lock management for carestore.
//!
//! Locks are per record, keyed by `(EntityKind, RowId)`. `LockKey` orders by
//! kind then id; callers that take several locks must take them in that order
//! so two transactions can never wait on each other.
//!
//! An exclusive request that is refused queues on its record. While one is
//! queued, new shared requests from other transactions are refused too, so a
//! steady stream of readers cannot keep a writer out forever.

use carestore_core::{EntityKind, RowId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lock type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockType {
    /// Shared lock (read).
    Shared,
    /// Exclusive lock (write).
    Exclusive,
}

/// The record a lock covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockKey {
    pub kind: EntityKind,
    pub id: RowId,
}

impl LockKey {
    pub fn new(kind: EntityKind, id: RowId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Lock state for a resource.
#[derive(Clone, Debug, Default)]
struct LockState {
    shared_holders: BTreeSet<u64>,
    exclusive_holder: Option<u64>,
    /// Exclusive requests refused so far and not yet granted.
    exclusive_waiters: BTreeSet<u64>,
}

impl LockState {
    fn is_free(&self) -> bool {
        self.shared_holders.is_empty()
            && self.exclusive_holder.is_none()
            && self.exclusive_waiters.is_empty()
    }

    fn holds(&self, tx_id: u64) -> bool {
        self.shared_holders.contains(&tx_id) || self.exclusive_holder == Some(tx_id)
    }

    fn can_grant_shared(&self, tx_id: u64) -> bool {
        if self.holds(tx_id) {
            return true;
        }
        self.exclusive_holder.is_none() && self.exclusive_waiters.iter().all(|w| *w == tx_id)
    }

    fn can_grant_exclusive(&self, tx_id: u64) -> bool {
        match self.exclusive_holder {
            Some(holder) => holder == tx_id,
            // Free, or we are the only shared holder (upgrade)
            None => self.shared_holders.iter().all(|h| *h == tx_id),
        }
    }
}

/// Record lock table. Non-blocking; waiting is the caller's business.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: BTreeMap<LockKey, LockState>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants the lock if compatible with current holders and queued writers.
    /// Returns false otherwise. A refused exclusive request stays queued until
    /// it is granted or `release_all` is called for `tx_id`.
    pub fn try_acquire(&mut self, key: LockKey, tx_id: u64, lock_type: LockType) -> bool {
        let state = self.locks.entry(key).or_default();

        let granted = match lock_type {
            LockType::Shared => {
                if state.can_grant_shared(tx_id) {
                    // An exclusive holder asking for shared keeps its exclusive lock
                    if state.exclusive_holder != Some(tx_id) {
                        state.shared_holders.insert(tx_id);
                    }
                    true
                } else {
                    false
                }
            }
            LockType::Exclusive => {
                if state.can_grant_exclusive(tx_id) {
                    // Upgrade from shared if needed
                    state.shared_holders.remove(&tx_id);
                    state.exclusive_waiters.remove(&tx_id);
                    state.exclusive_holder = Some(tx_id);
                    true
                } else {
                    state.exclusive_waiters.insert(tx_id);
                    false
                }
            }
        };

        if !granted && state.is_free() {
            self.locks.remove(&key);
        }
        granted
    }

    /// Releases all locks held by a transaction and withdraws its queued
    /// requests.
    pub fn release_all(&mut self, tx_id: u64) {
        for state in self.locks.values_mut() {
            state.shared_holders.remove(&tx_id);
            state.exclusive_waiters.remove(&tx_id);
            if state.exclusive_holder == Some(tx_id) {
                state.exclusive_holder = None;
            }
        }
        self.locks.retain(|_, state| !state.is_free());
    }

    /// Checks if a transaction holds any lock on a record.
    pub fn holds_lock(&self, key: LockKey, tx_id: u64) -> bool {
        self.locks.get(&key).is_some_and(|state| state.holds(tx_id))
    }

    /// Checks if a transaction holds an exclusive lock on a record.
    pub fn holds_exclusive(&self, key: LockKey, tx_id: u64) -> bool {
        self.locks
            .get(&key)
            .is_some_and(|state| state.exclusive_holder == Some(tx_id))
    }

    /// Number of records with a holder or a queued writer.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
