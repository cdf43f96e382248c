//! Transaction coordinator.
//!
//! One coordinator per logical session. Rows join on their first
//! successful mutation; commit flushes every joined row and then runs
//! the per-row after-commit (unlock, clear); abort skips the flush. A
//! failed flush returns with the joined set and every dirty set intact,
//! so the caller chooses between retry and abort. Lock timeouts during
//! a multi-row transaction leave earlier locks held until abort.

use crate::row::RowCore;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};
use trellis_core::Result;

/// Shared handle to a session's transaction coordinator.
pub type TransactionHandle = Arc<Transaction>;

/// Coordinator over the rows dirtied in the current transaction.
#[derive(Default)]
pub struct Transaction {
    rows: Mutex<Vec<Arc<Mutex<RowCore>>>>,
}

impl Transaction {
    /// Fresh coordinator with no joined rows.
    pub fn new() -> TransactionHandle {
        Arc::new(Transaction::default())
    }

    pub(crate) fn join(&self, row: Arc<Mutex<RowCore>>) {
        let mut rows = self.rows.lock();
        if !rows.iter().any(|r| Arc::ptr_eq(r, &row)) {
            rows.push(row);
            debug!(target: "trellis::txn", joined = rows.len(), "row joined transaction");
        }
    }

    /// Number of rows currently joined.
    pub fn in_flight(&self) -> usize {
        self.rows.lock().len()
    }

    /// Flush every joined row, then unlock and clear each. On failure
    /// the joined set survives for retry or abort.
    pub fn commit(&self) -> Result<()> {
        let rows = self.rows.lock().clone();
        for row in &rows {
            row.lock().flush()?;
        }
        for row in &rows {
            row.lock().after_commit();
        }
        self.rows.lock().clear();
        if !rows.is_empty() {
            info!(target: "trellis::txn", rows = rows.len(), "transaction committed");
        }
        Ok(())
    }

    /// Unlock and clear every joined row without flushing anything.
    pub fn abort(&self) {
        let rows = std::mem::take(&mut *self.rows.lock());
        for row in &rows {
            row.lock().after_abort();
        }
        if !rows.is_empty() {
            info!(target: "trellis::txn", rows = rows.len(), "transaction aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_commit_and_abort_are_noops() {
        let txn = Transaction::new();
        assert_eq!(txn.in_flight(), 0);
        txn.commit().unwrap();
        txn.abort();
        assert_eq!(txn.in_flight(), 0);
    }
}
