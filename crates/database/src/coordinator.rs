//! Row lock coordination between concurrent mutations.
//!
//! A mutation asks for all of its locks at once. The coordinator takes them in
//! `LockKey` order (kind, then id), waiting on a condition variable whenever a
//! lock is held elsewhere. Every caller climbs the same order, so no two
//! callers can each hold a lock the other waits for.

use carestore_core::Result;
use carestore_storage::{LockKey, LockManager, LockType, TransactionId};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub struct TransactionCoordinator {
    locks: Mutex<LockManager>,
    released: Condvar,
    max_retries: u32,
}

impl TransactionCoordinator {
    pub fn new(max_retries: u32) -> Self {
        Self {
            locks: Mutex::new(LockManager::new()),
            released: Condvar::new(),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Blocks until `tx_id` holds every requested lock.
    ///
    /// A key requested twice is taken once, exclusive if either request was.
    pub fn acquire<I>(&self, tx_id: TransactionId, requests: I) -> LockGuard<'_>
    where
        I: IntoIterator<Item = (LockKey, LockType)>,
    {
        let mut wanted: BTreeMap<LockKey, LockType> = BTreeMap::new();
        for (key, lock_type) in requests {
            let entry = wanted.entry(key).or_insert(lock_type);
            *entry = (*entry).max(lock_type);
        }

        let mut locks = self.locks.lock();
        for (key, lock_type) in &wanted {
            while !locks.try_acquire(*key, tx_id, *lock_type) {
                debug!(tx = tx_id, key = %key, "waiting for row lock");
                self.released.wait(&mut locks);
            }
        }
        drop(locks);

        LockGuard {
            coordinator: self,
            tx_id,
            held: wanted.len(),
        }
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// has hit `max_retries` conflicts in a row.
    pub fn retry<T, F>(&self, op: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(err) if err.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    warn!(op, retries, error = %err, "retrying after conflict");
                }
                outcome => return outcome,
            }
        }
    }

    /// Number of rows currently locked by anyone.
    pub fn locked_rows(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn holds_lock(&self, key: LockKey, tx_id: TransactionId) -> bool {
        self.locks.lock().holds_lock(key, tx_id)
    }

    fn release(&self, tx_id: TransactionId) {
        self.locks.lock().release_all(tx_id);
        self.released.notify_all();
    }
}

/// Locks held by one transaction. Dropping the guard releases them all and
/// wakes every waiter.
#[must_use = "locks are released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    coordinator: &'a TransactionCoordinator,
    tx_id: TransactionId,
    held: usize,
}

impl LockGuard<'_> {
    pub fn tx_id(&self) -> TransactionId {
        self.tx_id
    }

    /// Number of distinct rows locked.
    pub fn len(&self) -> usize {
        self.held
    }

    pub fn is_empty(&self) -> bool {
        self.held == 0
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.release(self.tx_id);
    }
}
