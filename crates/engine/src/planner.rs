//! Index-selection query planner.
//!
//! Given an unordered list of filter predicates, decide whether an index
//! can bound the scan. There is no cost model: when several single-column
//! indexes qualify, the first in enumeration order wins. This tie-break
//! is stable and deliberate; callers depend on the observable plan.
//!
//! "No usable index" is not an error; the caller falls back to a table
//! scan with every predicate applied as a residual row filter.

use crate::filter::{Filter, ROWID_FIELD};
use crate::rule::Rule;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;
use trellis_core::collation::collate;
use trellis_dict::DataDictionary;

/// A folded scan range: tightest bounds over one column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Range {
    /// Lower bound value.
    pub from: Option<String>,
    /// Rule on the lower bound; `None` means the traversal default.
    pub from_rule: Option<Rule>,
    /// Upper bound value.
    pub to: Option<String>,
    /// Rule on the upper bound; `None` means the traversal default.
    pub to_rule: Option<Rule>,
}

/// Outcome of planning a filter set.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Scan the named index between the folded bounds.
    Index {
        /// Selected index name.
        index: String,
        /// Folded bounds over the indexed column.
        range: Range,
        /// Predicates the index does not satisfy.
        residual: Vec<Filter>,
    },
    /// The row identifier itself is the only sargable reference: bound
    /// the table scan directly, no index needed.
    RowidRange {
        /// Folded bounds over the rowid.
        range: Range,
        /// Predicates still applied per row.
        residual: Vec<Filter>,
    },
    /// Nothing usable: full table scan with every predicate residual.
    FullScan {
        /// All predicates, applied per row.
        residual: Vec<Filter>,
    },
}

impl Plan {
    /// The residual predicates of any plan variant.
    pub fn residual(&self) -> &[Filter] {
        match self {
            Plan::Index { residual, .. }
            | Plan::RowidRange { residual, .. }
            | Plan::FullScan { residual } => residual,
        }
    }
}

/// Fields for which every predicate is sargable.
fn sargable_fields(filters: &[Filter]) -> Vec<String> {
    let mut all_sargable: BTreeMap<&str, bool> = BTreeMap::new();
    for f in filters {
        let entry = all_sargable.entry(f.field.as_str()).or_insert(true);
        *entry = *entry && f.sargable();
    }
    all_sargable
        .into_iter()
        .filter(|(_, ok)| *ok)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Fold every predicate on one column into the tightest single range.
///
/// Largest lower bound wins, strict beating inclusive on ties; smallest
/// upper bound symmetric; equality (or singleton membership) pins both
/// bounds at once.
fn fold_range<'a>(preds: impl Iterator<Item = &'a Filter>) -> Range {
    let mut range = Range::default();
    for pred in preds {
        let Some(rule) = pred.as_rule() else { continue };
        let Some(value) = pred.operand.single() else { continue };
        match rule {
            Rule::Eq => {
                tighten_lower(&mut range, value, Rule::Eq);
                tighten_upper(&mut range, value, Rule::Eq);
            }
            Rule::Gt | Rule::Ge => tighten_lower(&mut range, value, rule),
            Rule::Lt | Rule::Le => tighten_upper(&mut range, value, rule),
        }
    }
    range
}

fn strictness(rule: Rule) -> u8 {
    // on a tied bound value the stricter rule wins
    match rule {
        Rule::Gt | Rule::Lt => 2,
        Rule::Eq => 1,
        Rule::Ge | Rule::Le => 0,
    }
}

fn tighten_lower(range: &mut Range, value: &str, rule: Rule) {
    let replace = match (&range.from, range.from_rule) {
        (None, _) => true,
        (Some(cur), cur_rule) => match collate(value, cur) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                strictness(rule) > cur_rule.map(strictness).unwrap_or(0)
            }
        },
    };
    if replace {
        range.from = Some(value.to_string());
        range.from_rule = Some(rule);
    }
}

fn tighten_upper(range: &mut Range, value: &str, rule: Rule) {
    let replace = match (&range.to, range.to_rule) {
        (None, _) => true,
        (Some(cur), cur_rule) => match collate(value, cur) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                strictness(rule) > cur_rule.map(strictness).unwrap_or(0)
            }
        },
    };
    if replace {
        range.to = Some(value.to_string());
        range.to_rule = Some(rule);
    }
}

/// Plan a filter set against a file's dictionary.
///
/// `order_by` (a field name) nudges the choice toward an index over that
/// column when several qualify; it never overrides sargability.
pub fn plan(filters: &[Filter], order_by: Option<&str>, dd: &DataDictionary) -> Plan {
    let sargable = sargable_fields(filters);

    // single-column indexes whose column is sargable, in enumeration order
    let mut candidates: Vec<(&String, String)> = Vec::new();
    for (name, key) in dd.indexes() {
        if key.len() != 1 {
            continue;
        }
        let Some(field) = dd.field(&key[0]) else { continue };
        if sargable.iter().any(|s| *s == field.name) {
            candidates.push((name, field.name.clone()));
        }
    }

    if candidates.is_empty() {
        if sargable.iter().any(|s| s == ROWID_FIELD) {
            let range = fold_range(filters.iter().filter(|f| f.on_rowid()));
            let residual: Vec<Filter> = filters
                .iter()
                .filter(|f| !f.on_rowid())
                .cloned()
                .collect();
            debug!(target: "trellis::plan", "direct rowid range plan");
            return Plan::RowidRange { range, residual };
        }
        debug!(target: "trellis::plan", "no usable index; full scan");
        return Plan::FullScan {
            residual: filters.to_vec(),
        };
    }

    let chosen = order_by
        .and_then(|ob| candidates.iter().find(|(_, col)| col == ob))
        .unwrap_or(&candidates[0]);
    let (index, column) = (chosen.0.clone(), chosen.1.clone());

    let range = fold_range(filters.iter().filter(|f| f.field == column));
    let residual: Vec<Filter> = filters
        .iter()
        .filter(|f| f.field != column)
        .cloned()
        .collect();
    debug!(
        target: "trellis::plan",
        index = %index,
        column = %column,
        residual = residual.len(),
        "index plan selected"
    );
    Plan::Index {
        index,
        range,
        residual,
    }
}
