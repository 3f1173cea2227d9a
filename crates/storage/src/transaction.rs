//! Transaction management for carestore.
//!
//! A `Transaction` applies changes to the `TableCache` immediately and keeps
//! a journal of before-images, so the whole unit can be undone.

use crate::cache::TableCache;
use crate::journal::{Journal, JournalEntry};
use carestore_core::{EntityKind, Error, Result, Row, RowId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A unit of change against a `TableCache`.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    journal: Journal,
    state: TransactionState,
}

impl Transaction {
    /// Creates a new transaction with a fresh id.
    pub fn begin() -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
            journal: Journal::new(),
            state: TransactionState::Active,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::invalid_operation("Transaction is not active"));
        }
        Ok(())
    }

    /// Inserts a row within this transaction.
    pub fn insert(&mut self, cache: &mut TableCache, kind: EntityKind, row: Row) -> Result<RowId> {
        self.check_active()?;
        let row_id = cache.insert_row(kind, row.clone())?;
        self.journal.record_insert(kind, row);
        Ok(row_id)
    }

    /// Replaces a row within this transaction, returning the old one.
    pub fn update(
        &mut self,
        cache: &mut TableCache,
        kind: EntityKind,
        row_id: RowId,
        new_row: Row,
    ) -> Result<Row> {
        self.check_active()?;
        let old = cache.update_row(kind, row_id, new_row.clone())?;
        self.journal.record_update(kind, old.clone(), new_row);
        Ok(old)
    }

    /// Deletes a row within this transaction, returning it.
    pub fn delete(&mut self, cache: &mut TableCache, kind: EntityKind, row_id: RowId) -> Result<Row> {
        self.check_active()?;
        let row = cache.delete_row(kind, row_id)?;
        self.journal.record_delete(kind, row.clone());
        Ok(row)
    }

    /// Commits the transaction, returning the applied changes in order.
    pub fn commit(mut self) -> Result<Vec<JournalEntry>> {
        self.check_active()?;
        self.state = TransactionState::Committed;
        Ok(self.journal.commit())
    }

    /// Rolls back the transaction.
    pub fn rollback(mut self, cache: &mut TableCache) -> Result<()> {
        self.check_active()?;
        self.state = TransactionState::RolledBack;
        self.journal.rollback(cache)
    }
}
