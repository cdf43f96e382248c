//! The store boundary.
//!
//! [`Store`] captures exactly the native capabilities of the underlying
//! hierarchical engine: ordered key traversal, per-path values, advisory
//! path locks, and a handful of record-level validated procedures. The
//! access layer orchestrates these primitives and never reaches around
//! them.
//!
//! The store is single-threaded and non-reentrant at heart; one session
//! drives one handle strictly sequentially. `Send + Sync` is required so
//! a dictionary registry and its store handle can be shared with a
//! dispatch loop, not to invite concurrent calls.

use crate::error::Result;
use crate::types::{Direction, FieldId, FileId, Path, RowId};
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of the store's native field-level validation procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The value is acceptable; carries the internal form to store.
    Ok(String),
    /// The value was rejected.
    Invalid {
        /// Store-reported error code.
        code: String,
        /// Human-readable message.
        message: String,
        /// Optional field help text.
        help: Option<String>,
    },
}

impl Validation {
    /// True when the value passed validation.
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok(_))
    }
}

/// Native capabilities of the underlying hierarchical store.
///
/// Implementations communicate record-procedure failure through typed
/// errors rather than the store's conventional scratch error structure;
/// translating between the two is the implementation's business.
pub trait Store: Send + Sync {
    /// Ordered-successor lookup: the next existing subscript at the level
    /// of `at`'s last subscript, or `None` when the level is exhausted.
    ///
    /// An empty last subscript is the start sentinel: ascending from it
    /// yields the first subscript at the level, descending yields the
    /// last.
    fn order(&self, at: &Path, dir: Direction) -> Result<Option<String>>;

    /// Read the value at a path, `None` if no value is stored there.
    fn get(&self, path: &Path) -> Result<Option<String>>;

    /// Write a value at a path.
    fn set(&self, path: &Path, value: &str) -> Result<()>;

    /// Remove the value at a path and everything below it.
    fn kill(&self, path: &Path) -> Result<()>;

    /// Does the path hold a value or have descendants?
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Acquire an advisory lock on a path. Returns `false` when the lock
    /// was not obtained within `timeout`. Locks are owned per session and
    /// nest: a session may re-acquire its own lock, and must unlock once
    /// per acquisition.
    fn lock(&self, path: &Path, timeout: Duration) -> Result<bool>;

    /// Release one acquisition of an advisory lock.
    fn unlock(&self, path: &Path) -> Result<()>;

    /// Validate a single field value against the file's native rules.
    /// Returns the internal form on success.
    fn validate_field(&self, file: &FileId, field: &FieldId, value: &str) -> Result<Validation>;

    /// Read a whole record into a field-id keyed map of internal values.
    /// `None` when the row does not exist.
    fn retrieve_record(
        &self,
        file: &FileId,
        rowid: &RowId,
    ) -> Result<Option<BTreeMap<FieldId, String>>>;

    /// Create a record from staged internal values, returning the newly
    /// assigned row identifier.
    fn create_record(&self, file: &FileId, staged: &[(FieldId, String)]) -> Result<RowId>;

    /// Update an existing record from staged internal values.
    fn update_record(
        &self,
        file: &FileId,
        rowid: &RowId,
        staged: &[(FieldId, String)],
    ) -> Result<()>;

    /// Delete a record and its index entries.
    fn delete_record(&self, file: &FileId, rowid: &RowId) -> Result<()>;

    /// Does this numeric identifier name a file? Used to tell subfile
    /// flags apart from word-processing flags.
    fn is_file(&self, fileid: &str) -> Result<bool>;
}
