//! Data dictionary layer for Trellis
//!
//! Loads per-file schemas from the store's dictionary globals and keeps
//! them cached for the life of the process:
//! - FieldType: the ten field kinds and flag classification
//! - Field: immutable per-column metadata with typed value conversion
//! - DataDictionary: one file's fields, indexes and data root
//! - DictionaryRegistry: lazy-load-once cache keyed by file name

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dd;
pub mod field;
pub mod fieldtype;
pub mod registry;

pub use dd::DataDictionary;
pub use field::{normalize_name, Field};
pub use fieldtype::{classify, FieldType};
pub use registry::DictionaryRegistry;
