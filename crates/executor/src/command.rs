//! Command enum defining the session instruction set.
//!
//! Commands are self-contained, serializable and typed: everything a
//! request needs travels in the variant. File-scoped commands carry the
//! opaque `handle` returned by [`Command::OpenFile`]; handles are
//! per-connection and never valid across connections.

use serde::{Deserialize, Serialize};
use trellis_engine::{Filter, Rule};

fn default_true() -> bool {
    true
}

/// Session identity supplied at connect time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectUser {
    /// Store-side user identifier.
    pub user_id: String,
    /// Programmer mode widens file listing.
    #[serde(default)]
    pub programmer: bool,
    /// Session date override, ISO `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_date: Option<String>,
}

/// One session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum Command {
    // ==================== Session ====================
    /// Establish session identity. Resets open handles.
    /// Returns: `Output::Unit`
    Connect {
        /// Identity; defaults apply when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<ConnectUser>,
    },

    /// Liveness probe.
    /// Returns: `Output::Unit`
    Ping,

    /// Enumerate registered files.
    /// Returns: `Output::Files`
    ListFiles,

    // ==================== File handles ====================
    /// Open a file and return an opaque handle.
    /// Returns: `Output::Handle`
    OpenFile {
        /// File name.
        name: String,
        /// Serve internal values (`true`) or external display form.
        #[serde(default = "default_true")]
        internal: bool,
        /// Project these field names, in order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fieldnames: Option<Vec<String>>,
        /// Project these field ids, in order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fieldids: Option<Vec<String>>,
    },

    /// Drop an open handle.
    /// Returns: `Output::Unit`
    CloseFile {
        /// Handle from `OpenFile`.
        handle: u64,
    },

    /// Describe the handle's projected columns.
    /// Returns: `Output::Description`
    FileDescription {
        /// Handle from `OpenFile`.
        handle: u64,
    },

    /// The file's resolved numeric identifier.
    /// Returns: `Output::FileIdent`
    FileIdOf {
        /// Handle from `OpenFile`.
        handle: u64,
    },

    // ==================== Rows ====================
    /// Retrieve one row.
    /// Returns: `Output::Row`, or `Output::RowMap` when `as_map`
    Get {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Row identifier.
        rowid: String,
        /// Return a field-name keyed mapping instead of a sequence.
        #[serde(default)]
        as_map: bool,
    },

    /// Insert a record. Commits immediately unless a transaction is
    /// open.
    /// Returns: `Output::RowId` (autocommit) or `Output::Unit`
    Insert {
        /// Handle from `OpenFile`.
        handle: u64,
        /// `(field name, value)` pairs.
        values: Vec<(String, String)>,
    },

    /// Update a record. Commits immediately unless a transaction is
    /// open.
    /// Returns: `Output::Unit`
    Update {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Row identifier.
        rowid: String,
        /// `(field name, value)` pairs.
        values: Vec<(String, String)>,
    },

    /// Delete a record.
    /// Returns: `Output::Unit`
    Delete {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Row identifier.
        rowid: String,
    },

    /// Explicit advisory lock on a row.
    /// Returns: `Output::Unit`
    Lock {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Row identifier.
        rowid: String,
        /// Acquisition window; engine default when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Release one acquisition of an explicit lock.
    /// Returns: `Output::Unit`
    Unlock {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Row identifier.
        rowid: String,
    },

    // ==================== Traversal ====================
    /// Cursor traversal over an index or the raw table.
    /// Returns: `Output::Rows`
    Traverse {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Index to walk; planner-assisted when omitted and filters are
        /// present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        /// From-bound value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        /// To-bound value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        /// From-bound rule; defaulted per direction.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_rule: Option<Rule>,
        /// To-bound rule; defaulted per direction.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_rule: Option<Rule>,
        /// Walk backwards.
        #[serde(default)]
        descending: bool,
        /// Row filter predicates.
        #[serde(default)]
        filters: Vec<Filter>,
        /// Planner index preference; leading `-` flips direction.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_by: Option<String>,
        /// Hard cap on returned rows.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
        /// Matches discarded before `limit` counts.
        #[serde(default)]
        offset: u64,
        /// Resume after this rowid (table traversal).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_at: Option<String>,
        /// Positions only, no row materialization.
        #[serde(default)]
        raw: bool,
    },

    /// Planner-assisted query.
    /// Returns: `Output::Rows`
    Query {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Row filter predicates.
        #[serde(default)]
        filters: Vec<Filter>,
        /// Order hint; leading `-` walks descending.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_by: Option<String>,
        /// Hard cap on returned rows.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
        /// Matches discarded before `limit` counts.
        #[serde(default)]
        offset: u64,
    },

    /// Header row count, no scan.
    /// Returns: `Output::Count`
    Count {
        /// Handle from `OpenFile`.
        handle: u64,
        /// Cap the reported count.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
    },

    // ==================== Transactions ====================
    /// Suspend autocommit; subsequent inserts/updates stage until
    /// `TxnCommit`.
    /// Returns: `Output::Unit`
    TxnBegin,

    /// Flush the staged transaction.
    /// Returns: `Output::Count` (rows flushed)
    TxnCommit,

    /// Discard the staged transaction.
    /// Returns: `Output::Unit`
    TxnAbort,

    /// Is a client-managed transaction open?
    /// Returns: `Output::Bool`
    TxnActive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_engine::CmpOp;

    #[test]
    fn test_open_file_defaults() {
        let cmd: Command = serde_json::from_str(r#"{"OpenFile":{"name":"EMPLOYEE"}}"#).unwrap();
        match cmd {
            Command::OpenFile {
                name,
                internal,
                fieldnames,
                fieldids,
            } => {
                assert_eq!(name, "EMPLOYEE");
                assert!(internal);
                assert!(fieldnames.is_none());
                assert!(fieldids.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_traverse_round_trip_with_filters() {
        let cmd = Command::Traverse {
            handle: 3,
            index: Some("B".into()),
            from: Some("A".into()),
            to: Some("M".into()),
            from_rule: Some(Rule::Ge),
            to_rule: None,
            descending: false,
            filters: vec![Filter::new("age", CmpOp::Ge, "18")],
            order_by: None,
            limit: Some(10),
            offset: 2,
            start_at: None,
            raw: false,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let bad = r#"{"Get":{"handle":1,"rowid":"2","surprise":true}}"#;
        assert!(serde_json::from_str::<Command>(bad).is_err());
    }
}
