//! Row filter predicates.
//!
//! Filters arrive as `(field, comparator, operand)` triples. The
//! planner lifts the sargable ones into index bounds; whatever remains
//! is applied row-by-row by the cursor, comparing values in store
//! collation so numeric fields filter numerically.

use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use trellis_core::collation::collate;

/// Pseudo-field addressing the row identifier itself.
pub const ROWID_FIELD: &str = "_rowid";

/// Filter comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// `=`
    #[serde(rename = "=")]
    Eq,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// Membership in a value list.
    #[serde(rename = "in")]
    In,
    /// Substring containment; never drives an index.
    #[serde(rename = "contains")]
    Contains,
}

/// Right-hand side of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Single comparison value.
    One(String),
    /// Value list for membership tests.
    Many(Vec<String>),
}

impl Operand {
    /// The single value, when there is exactly one.
    pub fn single(&self) -> Option<&str> {
        match self {
            Operand::One(v) => Some(v),
            Operand::Many(vs) if vs.len() == 1 => Some(&vs[0]),
            Operand::Many(_) => None,
        }
    }
}

/// One `(field, comparator, operand)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field name, or [`ROWID_FIELD`] for the row identifier.
    pub field: String,
    /// Comparator.
    pub op: CmpOp,
    /// Right-hand side.
    pub operand: Operand,
}

impl Filter {
    /// Convenience constructor for a single-valued predicate.
    pub fn new(field: impl Into<String>, op: CmpOp, value: impl Into<String>) -> Filter {
        Filter {
            field: field.into(),
            op,
            operand: Operand::One(value.into()),
        }
    }

    /// Membership predicate over a value list.
    pub fn within<I, S>(field: impl Into<String>, values: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter {
            field: field.into(),
            op: CmpOp::In,
            operand: Operand::Many(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Does this predicate target the row identifier?
    pub fn on_rowid(&self) -> bool {
        self.field == ROWID_FIELD
    }

    /// Can this predicate bound an ordered scan?
    ///
    /// Range and equality comparators qualify; membership qualifies only
    /// when the list is a singleton.
    pub fn sargable(&self) -> bool {
        match self.op {
            CmpOp::Eq | CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => true,
            CmpOp::In => self.operand.single().is_some(),
            CmpOp::Contains => false,
        }
    }

    /// The bound rule this predicate contributes, when sargable.
    pub fn as_rule(&self) -> Option<Rule> {
        match self.op {
            CmpOp::Eq => Some(Rule::Eq),
            CmpOp::Gt => Some(Rule::Gt),
            CmpOp::Ge => Some(Rule::Ge),
            CmpOp::Lt => Some(Rule::Lt),
            CmpOp::Le => Some(Rule::Le),
            CmpOp::In if self.operand.single().is_some() => Some(Rule::Eq),
            _ => None,
        }
    }

    /// Evaluate the predicate against a field value (internal form).
    pub fn matches(&self, value: &str) -> bool {
        match (&self.op, &self.operand) {
            (CmpOp::Eq, Operand::One(v)) => collate(value, v) == Ordering::Equal,
            (CmpOp::Gt, Operand::One(v)) => collate(value, v) == Ordering::Greater,
            (CmpOp::Ge, Operand::One(v)) => collate(value, v) != Ordering::Less,
            (CmpOp::Lt, Operand::One(v)) => collate(value, v) == Ordering::Less,
            (CmpOp::Le, Operand::One(v)) => collate(value, v) != Ordering::Greater,
            (CmpOp::Contains, Operand::One(v)) => value.contains(v.as_str()),
            (CmpOp::In, Operand::One(v)) => collate(value, v) == Ordering::Equal,
            (CmpOp::In, Operand::Many(vs)) => {
                vs.iter().any(|v| collate(value, v) == Ordering::Equal)
            }
            // range comparators against a list never match
            (_, Operand::Many(_)) => false,
        }
    }
}
