//! Identifier and path types shared across the access layer.
//!
//! The underlying store addresses everything through hierarchical paths:
//! a global name plus an ordered list of string subscripts. Logical files,
//! fields and rows are all identified by strings whose ordering follows
//! the store's collation, not lexicographic order.

use crate::collation;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Numeric-string identifier of a logical file (table).
///
/// Files are never renumbered at runtime, so a `FileId` resolved once is
/// valid for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub String);

/// Dotted-decimal identifier of a field within a file.
///
/// The field id defines the native sort order of fields within a record
/// (store collation: `.01` sorts before `1`, `2` before `10`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub String);

/// Primary key of a record within a file.
///
/// Row identifiers are numeric-looking strings but are not necessarily
/// contiguous integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// View the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(FileId);
string_id!(FieldId);
string_id!(RowId);

/// Traversal direction for ordered-successor lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Walk keys in ascending store-collation order.
    Ascending,
    /// Walk keys in descending store-collation order.
    Descending,
}

impl Direction {
    /// Flip the direction.
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// A fully qualified hierarchical store path: global name plus subscripts.
///
/// `Display` renders the conventional closed form, e.g.
/// `^DIZ(9999900,"B","apple")`. Numeric subscripts are rendered bare,
/// everything else quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    /// Global name without the leading caret.
    pub global: String,
    /// Ordered subscripts below the global.
    pub subs: SmallVec<[String; 4]>,
}

impl Path {
    /// Path addressing a bare global with no subscripts.
    pub fn root(global: impl Into<String>) -> Path {
        Path {
            global: global.into(),
            subs: SmallVec::new(),
        }
    }

    /// Path with the given subscripts already applied.
    pub fn with_subs<I, S>(global: impl Into<String>, subs: I) -> Path
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path {
            global: global.into(),
            subs: subs.into_iter().map(Into::into).collect(),
        }
    }

    /// New path with one more subscript appended.
    pub fn child(&self, sub: impl Into<String>) -> Path {
        let mut p = self.clone();
        p.subs.push(sub.into());
        p
    }

    /// Append a subscript in place.
    pub fn push(&mut self, sub: impl Into<String>) {
        self.subs.push(sub.into());
    }

    /// The last subscript, if any.
    pub fn last(&self) -> Option<&str> {
        self.subs.last().map(String::as_str)
    }

    /// Parse the conventional open form stored in a file's location node,
    /// e.g. `^DIZ(9999900,` or `^ABC(`.
    ///
    /// The open form is a closed form missing its final subscript and
    /// closing parenthesis; it is how the store records where a file's
    /// data lives.
    pub fn parse_open_form(s: &str) -> Option<Path> {
        let s = s.strip_prefix('^')?;
        match s.find('(') {
            None => {
                if s.is_empty() {
                    None
                } else {
                    Some(Path::root(s))
                }
            }
            Some(idx) => {
                let global = &s[..idx];
                if global.is_empty() {
                    return None;
                }
                let mut path = Path::root(global);
                let inner = &s[idx + 1..];
                for part in inner.split(',') {
                    if part.is_empty() {
                        continue;
                    }
                    let part = part.trim_matches('"');
                    path.push(part);
                }
                Some(path)
            }
        }
    }

    /// Render the open form used to extend this path with more
    /// subscripts: `^DIZ(9999900,`.
    pub fn open_form(&self) -> String {
        let mut out = format!("^{}(", self.global);
        for sub in &self.subs {
            push_subscript(&mut out, sub);
            out.push(',');
        }
        out
    }
}

fn push_subscript(out: &mut String, sub: &str) {
    if collation::is_canonic_number(sub) {
        out.push_str(sub);
    } else {
        out.push('"');
        out.push_str(sub);
        out.push('"');
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}", self.global)?;
        if self.subs.is_empty() {
            return Ok(());
        }
        let mut out = String::new();
        for (i, sub) in self.subs.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            push_subscript(&mut out, sub);
        }
        write!(f, "({})", out)
    }
}
