//! Top-level access handle for one logical session.
//!
//! A [`Dbs`] owns the session's store handle, dictionary registry,
//! transaction coordinator and user context. File handles opened from it
//! share all four.

use crate::config::{EngineConfig, FileConfig, UserContext};
use crate::file::DbsFile;
use crate::transaction::{Transaction, TransactionHandle};
use std::sync::Arc;
use tracing::debug;
use trellis_core::collation::is_canonic_number;
use trellis_core::{Direction, FileId, Path, Result, Store};
use trellis_dict::{DataDictionary, DictionaryRegistry};

const FILE_DIRECTORY: &str = "DIC";

fn piece(s: &str, n: usize) -> &str {
    s.split('^').nth(n - 1).unwrap_or("")
}

/// Session-scoped database access handle.
pub struct Dbs {
    store: Arc<dyn Store>,
    registry: Arc<DictionaryRegistry>,
    config: EngineConfig,
    user: UserContext,
    txn: TransactionHandle,
}

impl Dbs {
    /// New session over a store handle.
    pub fn new(store: Arc<dyn Store>, config: EngineConfig, user: UserContext) -> Dbs {
        let registry = Arc::new(DictionaryRegistry::new(store.clone()));
        debug!(target: "trellis::session", user = %user.user_id, "session opened");
        Dbs {
            store,
            registry,
            config,
            user,
            txn: Transaction::new(),
        }
    }

    /// The session's user context.
    pub fn user(&self) -> &UserContext {
        &self.user
    }

    /// The session's dictionary registry.
    pub fn registry(&self) -> &Arc<DictionaryRegistry> {
        &self.registry
    }

    /// The session's transaction coordinator.
    pub fn transaction(&self) -> &TransactionHandle {
        &self.txn
    }

    /// Commit the active transaction.
    pub fn commit(&self) -> Result<()> {
        self.txn.commit()
    }

    /// Abort the active transaction.
    pub fn abort(&self) {
        self.txn.abort()
    }

    /// The dictionary for a file name.
    pub fn dd(&self, name: &str) -> Result<Arc<DataDictionary>> {
        self.registry.get(name)
    }

    /// Open a file handle.
    pub fn file(&self, name: &str, config: FileConfig) -> Result<DbsFile> {
        DbsFile::open(&self.registry, name, config, &self.config, self.txn.clone())
    }

    /// Enumerate registered files as `(name, fileid)` pairs.
    ///
    /// Files without a data root are internal bookkeeping and are listed
    /// only in programmer mode.
    pub fn list_files(&self) -> Result<Vec<(String, FileId)>> {
        let mut files = Vec::new();
        let mut cursor = "0".to_string();
        loop {
            let at = Path::with_subs(FILE_DIRECTORY, [cursor.as_str()]);
            let next = match self.store.order(&at, Direction::Ascending)? {
                Some(next) if is_canonic_number(&next) => next,
                _ => break,
            };
            let entry = self
                .store
                .get(&Path::with_subs(FILE_DIRECTORY, [next.as_str(), "0"]))?;
            let has_root = self
                .store
                .exists(&Path::with_subs(FILE_DIRECTORY, [next.as_str(), "0", "GL"]))?;
            if let Some(entry) = entry {
                let name = piece(&entry, 1);
                if !name.is_empty() && (has_root || self.user.programmer) {
                    files.push((name.to_string(), FileId(next.clone())));
                }
            }
            cursor = next;
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::MemoryStore;

    fn seeded() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.define_file("EMPLOYEE", "9999900", "DIZ").unwrap();
        store
            .define_field("9999900", ".01", "NAME", "RF", "", "0;1")
            .unwrap();
        store.define_file("DEPARTMENT", "9999901", "DIZD").unwrap();
        store
            .define_field("9999901", ".01", "NAME", "RF", "", "0;1")
            .unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_list_files_in_identifier_order() {
        let dbs = Dbs::new(seeded(), EngineConfig::default(), UserContext::default());
        let files = dbs.list_files().unwrap();
        assert_eq!(
            files,
            vec![
                ("EMPLOYEE".to_string(), FileId::from("9999900")),
                ("DEPARTMENT".to_string(), FileId::from("9999901")),
            ]
        );
    }

    #[test]
    fn test_rootless_files_need_programmer_mode() {
        let store = seeded();
        // a registered file with no data root
        store
            .set(
                &Path::with_subs(FILE_DIRECTORY, ["50", "0"]),
                "AUDIT INTERNAL^50",
            )
            .unwrap();
        let dbs = Dbs::new(store.clone(), EngineConfig::default(), UserContext::default());
        assert_eq!(dbs.list_files().unwrap().len(), 2);
        let programmer = UserContext {
            programmer: true,
            ..UserContext::default()
        };
        let dbs = Dbs::new(store, EngineConfig::default(), programmer);
        assert_eq!(dbs.list_files().unwrap().len(), 3);
    }

    #[test]
    fn test_file_open_shares_registry_and_transaction() {
        let dbs = Dbs::new(seeded(), EngineConfig::default(), UserContext::default());
        let a = dbs.file("EMPLOYEE", FileConfig::default()).unwrap();
        let b = dbs.file("EMPLOYEE", FileConfig::default()).unwrap();
        assert!(Arc::ptr_eq(a.dd(), b.dd()));
        assert!(dbs.dd("NOPE").unwrap_err().is_not_found());
    }
}
