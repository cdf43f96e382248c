//! Single-record transaction engine.
//!
//! A [`DbsRow`] maps to one record. Field values load lazily on first
//! read; writes go through the store's native validation before anything
//! changes locally. The first successful mutation acquires an exclusive
//! lock on the row's storage path and joins the active transaction; the
//! lock is held until the transaction resolves, and is released on every
//! exit path (drop included).
//!
//! State machine per row: Clean → Dirty(locked) → Committed → Clean,
//! with abort short-circuiting Dirty straight back to Clean.

use crate::transaction::TransactionHandle;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use trellis_core::{Error, FieldId, Path, Result, RowId, Store, Validation};
use trellis_dict::DataDictionary;

/// Lifecycle state of a row within its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowState {
    /// No uncommitted changes.
    Clean,
    /// Holds staged changes (and, for an existing row, the lock).
    Dirty,
    /// Staged changes flushed, awaiting after-commit.
    Committed,
}

pub(crate) struct RowCore {
    dd: Arc<DataDictionary>,
    store: Arc<dyn Store>,
    rowid: Option<RowId>,
    /// Snapshot retrieved from the store, plus auto-materialized blanks.
    loaded: Option<BTreeMap<FieldId, String>>,
    /// Validated values staged for the next flush.
    pending: BTreeMap<FieldId, String>,
    /// Field ids changed since the last commit, each recorded once, in
    /// mutation order.
    dirty: Vec<FieldId>,
    locked: bool,
    state: RowState,
    lock_timeout: Duration,
    internal: bool,
}

impl RowCore {
    fn lock_path(&self) -> Option<Path> {
        self.rowid
            .as_ref()
            .map(|rid| self.dd.global_root().child(rid.as_str()))
    }

    fn field_internal_input(&self, id: &FieldId, value: &str) -> Result<String> {
        let field = self.dd.field(id).ok_or_else(|| Error::UnknownField {
            file: self.dd.name().to_string(),
            name: id.to_string(),
        })?;
        Ok(if self.internal {
            value.to_string()
        } else {
            field.internal(value)
        })
    }

    pub(crate) fn retrieve(&mut self) -> Result<()> {
        let Some(rowid) = self.rowid.clone() else {
            self.loaded.get_or_insert_with(BTreeMap::new);
            return Ok(());
        };
        match self.store.retrieve_record(self.dd.fileid(), &rowid)? {
            Some(record) => {
                self.loaded = Some(record);
                Ok(())
            }
            None => Err(Error::not_found(format!(
                "row [{}] in file [{}]",
                rowid,
                self.dd.name()
            ))),
        }
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded.is_none() {
            self.retrieve()?;
        }
        Ok(())
    }

    pub(crate) fn get_value(&mut self, id: &FieldId) -> Result<String> {
        if self.dd.field(id).is_none() {
            return Err(Error::UnknownField {
                file: self.dd.name().to_string(),
                name: id.to_string(),
            });
        }
        if let Some(value) = self.pending.get(id) {
            return Ok(value.clone());
        }
        self.ensure_loaded()?;
        let loaded = self.loaded.get_or_insert_with(BTreeMap::new);
        match loaded.get(id) {
            Some(value) => Ok(value.clone()),
            None => {
                // declared but absent: materialize empty, tracked for a
                // subsequent insert built up incrementally
                loaded.insert(id.clone(), String::new());
                Ok(String::new())
            }
        }
    }

    /// Validated-mutation path. Returns whether this was the row's first
    /// successful mutation (caller joins the transaction exactly then).
    pub(crate) fn set_value(&mut self, id: &FieldId, value: &str) -> Result<bool> {
        let internal_input = self.field_internal_input(id, value)?;
        match self
            .store
            .validate_field(self.dd.fileid(), id, &internal_input)?
        {
            Validation::Invalid {
                code,
                message,
                help,
            } => Err(Error::Validation {
                file: self.dd.name().to_string(),
                row: self.rowid.as_ref().map(|r| r.to_string()),
                field: id.to_string(),
                value: value.to_string(),
                code,
                message,
                help,
            }),
            Validation::Ok(canonical) => {
                let first = self.dirty.is_empty();
                if first {
                    self.acquire_lock()?;
                    self.state = RowState::Dirty;
                }
                if !self.dirty.contains(id) {
                    self.dirty.push(id.clone());
                }
                self.pending.insert(id.clone(), canonical);
                Ok(first)
            }
        }
    }

    fn acquire_lock(&mut self) -> Result<()> {
        if self.locked {
            return Ok(());
        }
        let Some(path) = self.lock_path() else {
            return Ok(()); // pending insert: nothing to lock yet
        };
        if self.store.lock(&path, self.lock_timeout)? {
            self.locked = true;
            debug!(target: "trellis::txn", row = %path, "row lock acquired");
            Ok(())
        } else {
            Err(Error::LockTimeout {
                row: self
                    .rowid
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
                timeout_ms: self.lock_timeout.as_millis() as u64,
            })
        }
    }

    fn release_lock(&mut self) {
        if !self.locked {
            return;
        }
        if let Some(path) = self.lock_path() {
            if let Err(e) = self.store.unlock(&path) {
                warn!(target: "trellis::txn", row = %path, error = %e, "unlock failed");
            }
        }
        self.locked = false;
    }

    /// Flush staged values through the record procedures. The dirty set
    /// survives a failed flush so the caller can retry or abort.
    pub(crate) fn flush(&mut self) -> Result<()> {
        // a row already flushed in a failed multi-row commit is not
        // flushed again on retry
        if self.dirty.is_empty() || self.state == RowState::Committed {
            return Ok(());
        }
        let staged: Vec<(FieldId, String)> = self
            .dirty
            .iter()
            .map(|id| (id.clone(), self.pending.get(id).cloned().unwrap_or_default()))
            .collect();
        match self.rowid.clone() {
            Some(rowid) => {
                self.store
                    .update_record(self.dd.fileid(), &rowid, &staged)?;
            }
            None => {
                let rowid = self.store.create_record(self.dd.fileid(), &staged)?;
                debug!(
                    target: "trellis::txn",
                    file = %self.dd.name(),
                    rowid = %rowid,
                    "record created"
                );
                self.rowid = Some(rowid);
            }
        }
        self.state = RowState::Committed;
        Ok(())
    }

    pub(crate) fn after_commit(&mut self) {
        self.release_lock();
        self.pending.clear();
        self.dirty.clear();
        self.loaded = None;
        self.state = RowState::Clean;
    }

    pub(crate) fn after_abort(&mut self) {
        self.release_lock();
        self.pending.clear();
        self.dirty.clear();
        // staged state was never flushed; force a reload on next access
        self.loaded = None;
        self.state = RowState::Clean;
    }

    pub(crate) fn rowid(&self) -> Option<&RowId> {
        self.rowid.as_ref()
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn dirty_len(&self) -> usize {
        self.dirty.len()
    }
}

impl Drop for RowCore {
    fn drop(&mut self) {
        if self.locked {
            debug!(target: "trellis::txn", file = %self.dd.name(), "releasing row lock on drop");
            self.release_lock();
        }
    }
}

/// Handle to one record of a file, with validated mutation and
/// transaction-scoped commit.
pub struct DbsRow {
    core: Arc<Mutex<RowCore>>,
    txn: TransactionHandle,
    dd: Arc<DataDictionary>,
    projection: Vec<FieldId>,
    internal: bool,
}

impl DbsRow {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        dd: Arc<DataDictionary>,
        store: Arc<dyn Store>,
        rowid: Option<RowId>,
        txn: TransactionHandle,
        lock_timeout: Duration,
        internal: bool,
        projection: Vec<FieldId>,
    ) -> DbsRow {
        let core = RowCore {
            dd: dd.clone(),
            store,
            rowid,
            loaded: None,
            pending: BTreeMap::new(),
            dirty: Vec::new(),
            locked: false,
            state: RowState::Clean,
            lock_timeout,
            internal,
        };
        DbsRow {
            core: Arc::new(Mutex::new(core)),
            txn,
            dd,
            projection,
            internal,
        }
    }

    /// Row identifier; `None` until a pending insert commits.
    pub fn rowid(&self) -> Option<RowId> {
        self.core.lock().rowid().cloned()
    }

    /// Force retrieval, failing with `NotFound` if the row is absent.
    pub fn retrieve(&self) -> Result<()> {
        self.core.lock().retrieve()
    }

    /// Read a field by id, in the handle's configured representation.
    pub fn get(&self, id: &FieldId) -> Result<String> {
        let value = self.core.lock().get_value(id)?;
        Ok(self.present(id, value))
    }

    /// Read a field by dictionary-registered name.
    pub fn get_by_name(&self, name: &str) -> Result<String> {
        let id = self.dd.field_id(name)?;
        self.get(&id)
    }

    /// Write a field by id through the validated-mutation path.
    pub fn set(&self, id: &FieldId, value: &str) -> Result<()> {
        let first = self.core.lock().set_value(id, value)?;
        if first {
            self.txn.join(self.core.clone());
        }
        Ok(())
    }

    /// Write a field by dictionary-registered name.
    pub fn set_by_name(&self, name: &str, value: &str) -> Result<()> {
        let id = self.dd.field_id(name)?;
        self.set(&id, value)
    }

    /// Projected values in projection order.
    pub fn values(&self) -> Result<Vec<String>> {
        let mut core = self.core.lock();
        self.projection
            .iter()
            .map(|id| core.get_value(id).map(|v| self.present(id, v)))
            .collect()
    }

    /// Projected values keyed by field name.
    pub fn as_map(&self) -> Result<BTreeMap<String, String>> {
        let mut core = self.core.lock();
        let mut map = BTreeMap::new();
        for id in &self.projection {
            let value = core.get_value(id)?;
            let name = self
                .dd
                .field(id)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| id.to_string());
            map.insert(name, self.present(id, value));
        }
        Ok(map)
    }

    /// Any staged, uncommitted changes?
    pub fn is_dirty(&self) -> bool {
        self.core.lock().dirty_len() > 0
    }

    /// Is the row's storage path currently locked by this handle?
    pub fn holds_lock(&self) -> bool {
        self.core.lock().is_locked()
    }

    fn present(&self, id: &FieldId, value: String) -> String {
        if self.internal {
            value
        } else {
            self.dd
                .field(id)
                .map(|f| f.external(&value))
                .unwrap_or(value)
        }
    }
}

impl std::fmt::Debug for DbsRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.lock();
        f.debug_struct("DbsRow")
            .field("file", &self.dd.name())
            .field("rowid", &core.rowid())
            .field("dirty", &core.dirty_len())
            .field("locked", &core.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use std::sync::mpsc;
    use std::thread;
    use trellis_core::MemoryStore;

    fn seeded() -> (Arc<MemoryStore>, Arc<DataDictionary>) {
        let store = MemoryStore::new();
        store.define_file("EMPLOYEE", "9999900", "DIZ").unwrap();
        store
            .define_field("9999900", ".01", "NAME", "RF", "", "0;1")
            .unwrap();
        store
            .define_field("9999900", "1", "AGE", "N", "", "0;2")
            .unwrap();
        store.set_field_valid("9999900", "1", "0:130").unwrap();
        store.set_field_help("9999900", "1", "age in years, 0 to 130").unwrap();
        store.define_index("9999900", "B", ".01").unwrap();
        store
            .seed_row("9999900", "1", &[(".01", "ALICE"), ("1", "29")])
            .unwrap();
        let store = Arc::new(store);
        let dd = Arc::new(DataDictionary::load("EMPLOYEE", store.as_ref() as &dyn Store).unwrap());
        (store, dd)
    }

    fn row(
        store: &Arc<MemoryStore>,
        dd: &Arc<DataDictionary>,
        rowid: Option<&str>,
        txn: &TransactionHandle,
    ) -> DbsRow {
        let projection: Vec<FieldId> = dd.fields().iter().map(|f| f.id.clone()).collect();
        DbsRow::new(
            dd.clone(),
            store.clone() as Arc<dyn Store>,
            rowid.map(RowId::from),
            txn.clone(),
            Duration::from_millis(50),
            true,
            projection,
        )
    }

    #[test]
    fn test_lazy_read_serves_from_cache() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        assert_eq!(r.get_by_name("name").unwrap(), "ALICE");
        assert_eq!(r.get_by_name("age").unwrap(), "29");
        assert!(!r.is_dirty());
    }

    #[test]
    fn test_missing_row_is_not_found() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("42"), &txn);
        assert!(r.retrieve().unwrap_err().is_not_found());
    }

    #[test]
    fn test_unknown_field_name_rejected() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        let err = r.get_by_name("salary").unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
        let err = r.set_by_name("salary", "1").unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }

    #[test]
    fn test_declared_field_materializes_empty() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, None, &txn);
        assert_eq!(r.get_by_name("age").unwrap(), "");
        assert!(!r.is_dirty());
    }

    #[test]
    fn test_first_mutation_locks_and_joins() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        assert_eq!(txn.in_flight(), 0);
        r.set_by_name("age", "30").unwrap();
        assert!(r.holds_lock());
        assert!(r.is_dirty());
        assert_eq!(txn.in_flight(), 1);
        // second mutation neither re-locks nor re-joins
        r.set_by_name("name", "ALICIA").unwrap();
        assert_eq!(txn.in_flight(), 1);
    }

    #[test]
    fn test_validation_failure_short_circuits() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        let err = r.set_by_name("age", "abc").unwrap_err();
        match &err {
            Error::Validation {
                field,
                value,
                code,
                help,
                ..
            } => {
                assert_eq!(field, "1");
                assert_eq!(value, "abc");
                assert_eq!(code, "701");
                assert_eq!(help.as_deref(), Some("age in years, 0 to 130"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        // nothing changed: no dirty entry, no lock, no transaction join
        assert!(!r.is_dirty());
        assert!(!r.holds_lock());
        assert_eq!(txn.in_flight(), 0);
    }

    #[test]
    fn test_validation_failure_leaves_prior_staging_intact() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        r.set_by_name("age", "30").unwrap();
        let before = (r.is_dirty(), r.holds_lock());
        assert!(r.set_by_name("age", "999").is_err());
        assert_eq!((r.is_dirty(), r.holds_lock()), before);
        assert_eq!(r.get_by_name("age").unwrap(), "30"); // staged value intact
    }

    #[test]
    fn test_commit_updates_and_releases_lock() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        r.set_by_name("age", "30").unwrap();
        txn.commit().unwrap();
        assert!(!r.holds_lock());
        assert!(!r.is_dirty());
        let fresh = row(&store, &dd, Some("1"), &txn);
        assert_eq!(fresh.get_by_name("age").unwrap(), "30");
    }

    #[test]
    fn test_insert_round_trip_assigns_rowid_on_commit() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, None, &txn);
        r.set_by_name("name", "BOB").unwrap();
        r.set_by_name("age", "35").unwrap();
        assert!(r.rowid().is_none());
        txn.commit().unwrap();
        let rowid = r.rowid().expect("rowid assigned at commit");
        let fresh = row(&store, &dd, Some(rowid.as_str()), &txn);
        assert_eq!(fresh.get_by_name("name").unwrap(), "BOB");
        assert_eq!(fresh.get_by_name("age").unwrap(), "35");
    }

    #[test]
    fn test_abort_flushes_nothing_and_unlocks() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        r.set_by_name("age", "30").unwrap();
        txn.abort();
        assert!(!r.holds_lock());
        assert!(!r.is_dirty());
        let fresh = row(&store, &dd, Some("1"), &txn);
        assert_eq!(fresh.get_by_name("age").unwrap(), "29");
    }

    #[test]
    fn test_failed_flush_keeps_dirty_set_for_retry() {
        let (store, dd) = seeded();
        let txn = Transaction::new();
        let r = row(&store, &dd, None, &txn);
        // age only: the mandatory name field is missing
        r.set_by_name("age", "35").unwrap();
        let err = txn.commit().unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
        assert!(r.is_dirty());
        assert_eq!(txn.in_flight(), 1);
        // repair and retry
        r.set_by_name("name", "CAROL").unwrap();
        txn.commit().unwrap();
        assert!(r.rowid().is_some());
    }

    #[test]
    fn test_lock_contention_raises_timeout() {
        let (store, dd) = seeded();
        let path = dd.global_root().child("1");

        // hold the row lock from another session (thread)
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder_store = store.clone();
        let holder_path = path.clone();
        let holder = thread::spawn(move || {
            assert!(holder_store
                .lock(&holder_path, Duration::from_millis(10))
                .unwrap());
            locked_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            holder_store.unlock(&holder_path).unwrap();
        });
        locked_rx.recv().unwrap();

        let txn = Transaction::new();
        let r = row(&store, &dd, Some("1"), &txn);
        let err = r.set_by_name("age", "30").unwrap_err();
        match err {
            Error::LockTimeout { row, timeout_ms } => {
                assert_eq!(row, "1");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected lock timeout, got {:?}", other),
        }
        // the aborted mutation left nothing behind
        assert!(!r.is_dirty());
        assert_eq!(txn.in_flight(), 0);

        release_tx.send(()).unwrap();
        holder.join().unwrap();
    }

    #[test]
    fn test_drop_releases_lock() {
        let (store, dd) = seeded();
        {
            // abandoning row and coordinator without commit or abort
            let txn = Transaction::new();
            let r = row(&store, &dd, Some("1"), &txn);
            r.set_by_name("age", "31").unwrap();
            assert!(r.holds_lock());
        }
        // the path is lockable again from another session
        let path = dd.global_root().child("1");
        let s = store.clone();
        let taken = thread::spawn(move || s.lock(&path, Duration::from_millis(20)).unwrap())
            .join()
            .unwrap();
        assert!(taken);
    }
}
