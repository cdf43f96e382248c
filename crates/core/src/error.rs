//! Error types for the access layer.
//!
//! One enum covers every failure the engine can surface. We use
//! `thiserror` for automatic `Display` and `Error` trait implementations.
//! Validation and lock failures carry everything the store reported so
//! the session boundary can serialize them without loss.

use thiserror::Error;

/// Result type alias for access-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the access layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A file or row does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing entity.
        what: String,
    },

    /// The data dictionary holds an unrecognized or missing field-type
    /// flag for a field.
    #[error("schema error in file {file}: {reason}")]
    SchemaError {
        /// File whose dictionary is malformed.
        file: String,
        /// What was wrong with the entry.
        reason: String,
    },

    /// A field name is not registered in the file's dictionary.
    #[error("unknown field \"{name}\" in file {file}")]
    UnknownField {
        /// File that was asked.
        file: String,
        /// The unregistered name.
        name: String,
    },

    /// The store's native field-level validation rejected a value.
    #[error("validation failed: file {file}, field {field}, value \"{value}\": {message}")]
    Validation {
        /// File being written.
        file: String,
        /// Row being written, if it exists yet.
        row: Option<String>,
        /// Field id the value was destined for.
        field: String,
        /// The offending value.
        value: String,
        /// Store-reported error code.
        code: String,
        /// Human-readable message.
        message: String,
        /// Optional field help text.
        help: Option<String>,
    },

    /// An advisory lock was not acquired within the configured window.
    #[error("lock timeout: row {row} not acquired within {timeout_ms}ms")]
    LockTimeout {
        /// Row whose storage path was contended.
        row: String,
        /// The configured window, in milliseconds.
        timeout_ms: u64,
    },

    /// A record create/update procedure reported failure for reasons
    /// other than validation (e.g. missing required identifiers).
    #[error("store write failed: file {file}: {message}")]
    StoreWrite {
        /// File being written.
        file: String,
        /// Row being written, if known.
        row: Option<String>,
        /// Store-reported message.
        message: String,
    },

    /// Invariant violation or unclassified local failure.
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Error {
        Error::NotFound { what: what.into() }
    }

    /// Shorthand for [`Error::Internal`].
    pub fn internal(message: impl Into<String>) -> Error {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::SchemaError`].
    pub fn schema(file: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::SchemaError {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for [`Error::Validation`].
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}
