//! Core types and traits for Trellis
//!
//! This crate defines the foundational pieces used throughout the system:
//! - FileId / FieldId / RowId: string identifiers under store collation
//! - Path: fully qualified hierarchical store path
//! - collation: the store's numeric-before-string key ordering
//! - Error: error type hierarchy
//! - Store: the boundary trait over the underlying hierarchical engine
//! - MemoryStore: in-memory reference implementation for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collation;
pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export commonly used types and traits
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use traits::{Store, Validation};
pub use types::{Direction, FieldId, FileId, Path, RowId};
