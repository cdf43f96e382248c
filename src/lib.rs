//! TrellisDB - relational access layer over a hierarchical ordered-key
//! store
//!
//! Trellis puts a schema-aware, index-planned, transactional surface on
//! top of a legacy store that natively offers only ordered key
//! traversal, per-path advisory locks, and a handful of validated
//! record procedures.
//!
//! # Quick start
//!
//! ```ignore
//! use trellisdb::{Command, Output, Session};
//!
//! let mut session = Session::new(store, EngineConfig::default());
//! let out = session.execute(Command::OpenFile {
//!     name: "EMPLOYEE".into(),
//!     internal: true,
//!     fieldnames: None,
//!     fieldids: None,
//! })?;
//! ```
//!
//! # Architecture
//!
//! Remote callers go through the [`Session`] command API; embedded
//! callers can use [`Dbs`] directly for file handles, cursors and
//! transactions. The store itself stays behind the [`Store`] trait.

// Re-export the public API from trellis-executor
pub use trellis_executor::*;

// Embedded-use surface
pub use trellis_core::{
    Direction, Error as EngineError, FieldId, FileId, MemoryStore, Path, Result as EngineResult,
    RowId, Store,
};
pub use trellis_dict::{DataDictionary, DictionaryRegistry, Field, FieldType};
pub use trellis_engine::{
    Dbs, DbsFile, DbsRow, FileConfig, Plan, Projection, TraverseItem, TraverseSpec, UserContext,
};
