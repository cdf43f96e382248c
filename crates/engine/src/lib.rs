//! Query, traversal and transaction engine for Trellis
//!
//! The engine composes the dictionary layer with the store's native
//! primitives:
//! - Rule / Bounds: boundary comparator semantics for cursors
//! - Filter / planner: predicates and index-selection planning
//! - Cursor: lazy index- and table-ordered traversal
//! - DbsFile: the per-file access facade
//! - DbsRow / Transaction: validated mutation with lock discipline
//! - Dbs: the session entry point tying it all together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cursor;
pub mod dbs;
pub mod file;
pub mod filter;
pub mod planner;
pub mod row;
pub mod rule;
pub mod transaction;

pub use config::{EngineConfig, FileConfig, Projection, UserContext};
pub use cursor::{Cursor, TraverseItem};
pub use dbs::Dbs;
pub use file::{ColumnInfo, DbsFile, TraverseSpec};
pub use filter::{CmpOp, Filter, Operand, ROWID_FIELD};
pub use planner::{plan, Plan, Range};
pub use row::DbsRow;
pub use rule::{resolve_bounds, Bounds, Rule};
pub use transaction::{Transaction, TransactionHandle};
