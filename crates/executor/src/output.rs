//! Output enum for command execution results.
//!
//! Every command maps to exactly one output variant; the mapping is
//! documented on each [`Command`](crate::Command) variant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trellis_engine::ColumnInfo;

/// One traversal result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraverseRow {
    /// Row identifier.
    pub rowid: String,
    /// Index key the row was found under, for index traversal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Projected values; absent for raw traversal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// Successful command execution results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Output {
    /// No return value.
    Unit,
    /// Boolean result.
    Bool(bool),
    /// Opaque per-session file handle.
    Handle(u64),
    /// Resolved numeric file identifier.
    FileIdent(String),
    /// Row identifier assigned by an insert.
    RowId(String),
    /// Count result.
    Count(u64),
    /// One row as an ordered value sequence.
    Row(Vec<String>),
    /// One row as a field-name keyed mapping.
    RowMap(BTreeMap<String, String>),
    /// Registered files as `(name, fileid)` pairs.
    Files(Vec<(String, String)>),
    /// Traversal result set with the projection's field names.
    Rows {
        /// Projected field names, in order.
        fieldnames: Vec<String>,
        /// Matched rows, in traversal order.
        rows: Vec<TraverseRow>,
    },
    /// Result-set description.
    Description(Vec<ColumnInfo>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_round_trip() {
        let out = Output::Rows {
            fieldnames: vec!["name".into(), "age".into()],
            rows: vec![TraverseRow {
                rowid: "1".into(),
                key: Some("ALICE".into()),
                values: Some(vec!["ALICE".into(), "29".into()]),
            }],
        };
        let json = serde_json::to_string(&out).unwrap();
        let back: Output = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn test_raw_row_omits_values() {
        let row = TraverseRow {
            rowid: "5".into(),
            key: None,
            values: None,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"rowid":"5"}"#);
    }
}
