//! Error types for command execution.
//!
//! Every engine error kind crosses the session boundary as a typed,
//! serializable variant so the far side can reconstruct and re-raise it.
//! Unclassified local failures become [`Error::Engine`] rather than
//! being dropped.

use serde::{Deserialize, Serialize};

/// Command execution errors.
///
/// Mirrors the engine's error hierarchy one-to-one, with typed fields so
/// no diagnostic is lost in serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// File, row or index does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing entity.
        what: String,
    },

    /// Malformed dictionary entry.
    #[error("schema error in file {file}: {reason}")]
    Schema {
        /// File whose dictionary is malformed.
        file: String,
        /// What was wrong.
        reason: String,
    },

    /// Field name not registered in the dictionary.
    #[error("unknown field \"{name}\" in file {file}")]
    UnknownField {
        /// File that was asked.
        file: String,
        /// The unregistered name.
        name: String,
    },

    /// Native field validation rejected a value.
    #[error("validation failed: file {file}, field {field}, value \"{value}\": {message}")]
    Validation {
        /// File being written.
        file: String,
        /// Row being written, if it exists yet.
        row: Option<String>,
        /// Field id.
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

    /// Advisory lock not acquired in time.
    #[error("lock timeout: row {row} after {timeout_ms}ms")]
    LockTimeout {
        /// Contended row.
        row: String,
        /// Configured window in milliseconds.
        timeout_ms: u64,
    },

    /// Record procedure failed outside validation.
    #[error("store write failed: file {file}: {message}")]
    StoreWrite {
        /// File being written.
        file: String,
        /// Row, if known.
        row: Option<String>,
        /// Store-reported message.
        message: String,
    },

    /// The session handle does not reference an open file.
    #[error("invalid handle: {handle}")]
    InvalidHandle {
        /// The offending handle.
        handle: u64,
    },

    /// Unclassified engine failure.
    #[error("engine error: {message}")]
    Engine {
        /// What went wrong.
        message: String,
    },
}

impl From<trellis_core::Error> for Error {
    fn from(e: trellis_core::Error) -> Self {
        use trellis_core::Error as E;
        match e {
            E::NotFound { what } => Error::NotFound { what },
            E::SchemaError { file, reason } => Error::Schema { file, reason },
            E::UnknownField { file, name } => Error::UnknownField { file, name },
            E::Validation {
                file,
                row,
                field,
                value,
                code,
                message,
                help,
            } => Error::Validation {
                file,
                row,
                field,
                value,
                code,
                message,
                help,
            },
            E::LockTimeout { row, timeout_ms } => Error::LockTimeout { row, timeout_ms },
            E::StoreWrite { file, row, message } => Error::StoreWrite { file, row, message },
            E::Internal { message } => Error::Engine { message },
        }
    }
}

/// Re-raise a wire error as the engine error it was serialized from.
impl From<Error> for trellis_core::Error {
    fn from(e: Error) -> Self {
        use trellis_core::Error as E;
        match e {
            Error::NotFound { what } => E::NotFound { what },
            Error::Schema { file, reason } => E::SchemaError { file, reason },
            Error::UnknownField { file, name } => E::UnknownField { file, name },
            Error::Validation {
                file,
                row,
                field,
                value,
                code,
                message,
                help,
            } => E::Validation {
                file,
                row,
                field,
                value,
                code,
                message,
                help,
            },
            Error::LockTimeout { row, timeout_ms } => E::LockTimeout { row, timeout_ms },
            Error::StoreWrite { file, row, message } => E::StoreWrite { file, row, message },
            Error::InvalidHandle { handle } => E::Internal {
                message: format!("invalid handle: {}", handle),
            },
            Error::Engine { message } => E::Internal { message },
        }
    }
}
