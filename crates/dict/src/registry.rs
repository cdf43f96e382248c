//! Process-wide dictionary cache.
//!
//! Dictionaries are expensive to load and immutable afterwards, so one
//! registry caches them by file name for the life of the process. Loads
//! are lazy with single-writer-wins: the load happens under the write
//! lock, so concurrent first references to one name cannot publish two
//! instances, and readers never observe a half-built dictionary.

use crate::dd::DataDictionary;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use trellis_core::{Result, Store};

/// Lazy-load-once cache of [`DataDictionary`] instances, keyed by file
/// name.
pub struct DictionaryRegistry {
    store: Arc<dyn Store>,
    cache: RwLock<HashMap<String, Arc<DataDictionary>>>,
}

impl DictionaryRegistry {
    /// Registry reading schemas through the given store handle.
    pub fn new(store: Arc<dyn Store>) -> DictionaryRegistry {
        DictionaryRegistry {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The store handle this registry loads through.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Dictionary for a file name, loading it on first reference.
    pub fn get(&self, name: &str) -> Result<Arc<DataDictionary>> {
        if let Some(dd) = self.cache.read().get(name) {
            return Ok(dd.clone());
        }
        let mut cache = self.cache.write();
        // lost the race: someone loaded it while we waited
        if let Some(dd) = cache.get(name) {
            return Ok(dd.clone());
        }
        let dd = Arc::new(DataDictionary::load(name, self.store.as_ref())?);
        cache.insert(name.to_string(), dd.clone());
        Ok(dd)
    }

    /// Number of cached dictionaries.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Is the cache empty?
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
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
        Arc::new(store)
    }

    #[test]
    fn test_repeated_gets_share_one_instance() {
        let registry = DictionaryRegistry::new(seeded());
        let a = registry.get("EMPLOYEE").unwrap();
        let b = registry.get("EMPLOYEE").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let store = seeded();
        let registry = DictionaryRegistry::new(store.clone());
        assert!(registry.get("MISSING").is_err());
        assert!(registry.is_empty());
        // a later definition becomes visible
        store.define_file("MISSING", "123", "MZ").unwrap();
        store
            .define_field("123", ".01", "NAME", "F", "", "0;1")
            .unwrap();
        assert!(registry.get("MISSING").is_ok());
    }
}
