//! Field type classification.
//!
//! A field's dictionary entry carries a flag string (`RF`, `N`, `S`,
//! `9999901`, …). Classification strips one leading mandatory flag `R`
//! and matches the remainder against the ten field kinds in a fixed
//! priority order. Two kinds are flag-ambiguous: a leading numeric
//! prefix names either a subfile (the prefix is a registered file) or a
//! word-processing field (it is not), so those two consult the store.

use std::fmt;
use trellis_core::{Result, Store};

/// The ten field kinds a dictionary entry can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Date or date/time value.
    DateTime,
    /// Numeric value, optionally range-constrained.
    Numeric,
    /// Free text.
    Text,
    /// One code out of an enumerated code→label set.
    Set,
    /// Multi-line word-processing content.
    WordProcessing,
    /// Value computed by the store, never written.
    Computed,
    /// Pointer to a row of another file.
    Pointer,
    /// Pointer whose target file varies per row.
    VariablePointer,
    /// Embedded store code.
    EmbeddedCode,
    /// Nested subfile (multiple).
    Subfile,
}

impl FieldType {
    /// Stable numeric code for the kind, used in result-set descriptions.
    pub fn code(self) -> u8 {
        match self {
            FieldType::DateTime => 1,
            FieldType::Numeric => 2,
            FieldType::Set => 3,
            FieldType::Text => 4,
            FieldType::WordProcessing => 5,
            FieldType::Computed => 6,
            FieldType::Pointer => 7,
            FieldType::VariablePointer => 8,
            FieldType::EmbeddedCode => 9,
            FieldType::Subfile => 10,
        }
    }

    /// Short label for diagnostics and descriptions.
    pub fn label(self) -> &'static str {
        match self {
            FieldType::DateTime => "DATETIME",
            FieldType::Numeric => "NUMERIC",
            FieldType::Text => "TEXT",
            FieldType::Set => "SET",
            FieldType::WordProcessing => "WORDPROCESSING",
            FieldType::Computed => "COMPUTED",
            FieldType::Pointer => "POINTER",
            FieldType::VariablePointer => "VPOINTER",
            FieldType::EmbeddedCode => "CODE",
            FieldType::Subfile => "SUBFILE",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Leading run of `[0-9.]` in a flag string.
pub(crate) fn numeric_prefix(flags: &str) -> &str {
    let end = flags
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(flags.len());
    &flags[..end]
}

/// Classify a flag string (mandatory prefix already allowed for).
///
/// Returns `Ok(None)` when no kind matches; the caller owns the context
/// needed for a useful schema error. The only side effect is the
/// file-existence probe for the two flag-ambiguous kinds.
pub fn classify(flags: &str, store: &dyn Store) -> Result<Option<FieldType>> {
    let flags = flags.strip_prefix('R').unwrap_or(flags);
    let ty = match flags.chars().next() {
        Some('F') => Some(FieldType::Text),
        Some('D') => Some(FieldType::DateTime),
        Some('N') => Some(FieldType::Numeric),
        Some('S') => Some(FieldType::Set),
        Some('P') => Some(FieldType::Pointer),
        Some('V') => Some(FieldType::VariablePointer),
        Some('K') => Some(FieldType::EmbeddedCode),
        Some('C') => Some(FieldType::Computed),
        _ => {
            let prefix = numeric_prefix(flags);
            if prefix.is_empty() {
                None
            } else if store.is_file(prefix)? {
                Some(FieldType::Subfile)
            } else {
                Some(FieldType::WordProcessing)
            }
        }
    };
    Ok(ty)
}

/// Does the flag string carry the leading mandatory marker?
pub fn is_mandatory(flags: &str) -> bool {
    flags.starts_with('R')
}
