//! Command execution layer for Trellis
//!
//! The session boundary: a serializable [`Command`] instruction set, a
//! deterministic [`Output`] per command, a lossless wire [`Error`], the
//! length-prefixed frame codec, and the stateful [`Session`] holding
//! per-connection file handles.
//!
//! # Example
//!
//! ```ignore
//! use trellis_executor::{Command, Output, Session};
//!
//! let mut session = Session::new(store, EngineConfig::default());
//! let handle = match session.execute(Command::OpenFile {
//!     name: "EMPLOYEE".into(),
//!     internal: true,
//!     fieldnames: None,
//!     fieldids: None,
//! })? {
//!     Output::Handle(h) => h,
//!     _ => unreachable!("OpenFile always returns Handle"),
//! };
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod output;
pub mod session;
pub mod wire;

pub use command::{Command, ConnectUser};
pub use error::Error;
pub use output::{Output, TraverseRow};
pub use session::{ExecResult, Session};
pub use wire::{
    read_command, read_response, serve_connection, write_command, write_response, Response,
    MAX_FRAME_LEN,
};

// Re-export the engine types that appear in commands and outputs
pub use trellis_engine::{CmpOp, ColumnInfo, EngineConfig, Filter, Operand, Rule};
