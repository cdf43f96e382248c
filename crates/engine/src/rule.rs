//! Boundary comparator rules for cursor traversal.
//!
//! A traversal carries an independent rule for its from-bound and its
//! to-bound. Ascending defaults are `>=` / `<` (half-open), collapsing
//! to `=` / `=` when the bounds are equal; descending defaults are
//! `<=` / `>`. All key comparison is done in store collation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use trellis_core::collation::collate;
use trellis_core::{Direction, Error, Result};

/// Comparator token applied to one bound of a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
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
    /// `=`
    #[serde(rename = "=")]
    Eq,
}

/// What a candidate key does to the traversal at a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundCheck {
    /// Candidate is inside the bound.
    Pass,
    /// Candidate is outside the from-bound; skip and keep scanning.
    Skip,
    /// Candidate is outside the to-bound (or past an exact match);
    /// the scan is monotonic, so the sequence ends here.
    Stop,
}

impl Rule {
    /// The comparator token, e.g. `">="`.
    pub fn token(self) -> &'static str {
        match self {
            Rule::Gt => ">",
            Rule::Ge => ">=",
            Rule::Lt => "<",
            Rule::Le => "<=",
            Rule::Eq => "=",
        }
    }

    /// Parse a comparator token.
    pub fn parse(s: &str) -> Option<Rule> {
        match s {
            ">" => Some(Rule::Gt),
            ">=" => Some(Rule::Ge),
            "<" => Some(Rule::Lt),
            "<=" => Some(Rule::Le),
            "=" => Some(Rule::Eq),
            _ => None,
        }
    }

    /// Is this rule usable on the from side of a traversal in the given
    /// direction?
    pub fn valid_from(self, dir: Direction) -> bool {
        match dir {
            Direction::Ascending => matches!(self, Rule::Gt | Rule::Ge | Rule::Eq),
            Direction::Descending => matches!(self, Rule::Lt | Rule::Le | Rule::Eq),
        }
    }

    /// Is this rule usable on the to side of a traversal in the given
    /// direction?
    pub fn valid_to(self, dir: Direction) -> bool {
        match dir {
            Direction::Ascending => matches!(self, Rule::Lt | Rule::Le | Rule::Eq),
            Direction::Descending => matches!(self, Rule::Gt | Rule::Ge | Rule::Eq),
        }
    }

    /// Does the rule treat a key equal to the bound as inside it?
    pub fn inclusive(self) -> bool {
        matches!(self, Rule::Ge | Rule::Le | Rule::Eq)
    }

    /// Check a candidate key against the from-bound.
    pub fn check_from(self, key: &str, bound: &str) -> BoundCheck {
        let ord = collate(key, bound);
        match self {
            Rule::Gt => {
                if ord == Ordering::Greater {
                    BoundCheck::Pass
                } else {
                    BoundCheck::Skip
                }
            }
            Rule::Ge => {
                if ord != Ordering::Less {
                    BoundCheck::Pass
                } else {
                    BoundCheck::Skip
                }
            }
            Rule::Lt => {
                if ord == Ordering::Less {
                    BoundCheck::Pass
                } else {
                    BoundCheck::Skip
                }
            }
            Rule::Le => {
                if ord != Ordering::Greater {
                    BoundCheck::Pass
                } else {
                    BoundCheck::Skip
                }
            }
            // an exact-match scan ends the moment the key moves off the bound
            Rule::Eq => {
                if ord == Ordering::Equal {
                    BoundCheck::Pass
                } else {
                    BoundCheck::Stop
                }
            }
        }
    }

    /// Check a candidate key against the to-bound.
    pub fn check_to(self, key: &str, bound: &str) -> BoundCheck {
        let ord = collate(key, bound);
        let inside = match self {
            Rule::Lt => ord == Ordering::Less,
            Rule::Le => ord != Ordering::Greater,
            Rule::Gt => ord == Ordering::Greater,
            Rule::Ge => ord != Ordering::Less,
            Rule::Eq => ord == Ordering::Equal,
        };
        if inside {
            BoundCheck::Pass
        } else {
            BoundCheck::Stop
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Resolved from/to rules for one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Rule applied to the from-bound.
    pub from_rule: Rule,
    /// Rule applied to the to-bound.
    pub to_rule: Rule,
}

/// Apply the defaulting and validity rules to caller-supplied bounds.
///
/// Ascending defaults to the half-open `>=` / `<` pair, collapsing both
/// rules to `=` when from equals to; descending defaults to `<=` / `>`.
pub fn resolve_bounds(
    dir: Direction,
    from: Option<&str>,
    to: Option<&str>,
    from_rule: Option<Rule>,
    to_rule: Option<Rule>,
) -> Result<Bounds> {
    let exact = match (from, to) {
        (Some(f), Some(t)) => f == t,
        _ => false,
    };
    let from_rule = from_rule.unwrap_or(match dir {
        Direction::Ascending if exact => Rule::Eq,
        Direction::Ascending => Rule::Ge,
        Direction::Descending => Rule::Le,
    });
    let to_rule = to_rule.unwrap_or(match dir {
        Direction::Ascending if exact => Rule::Eq,
        Direction::Ascending => Rule::Lt,
        Direction::Descending => Rule::Gt,
    });
    if !from_rule.valid_from(dir) {
        return Err(Error::internal(format!(
            "from rule {} is not valid for {:?} traversal",
            from_rule, dir
        )));
    }
    if !to_rule.valid_to(dir) {
        return Err(Error::internal(format!(
            "to rule {} is not valid for {:?} traversal",
            to_rule, dir
        )));
    }
    Ok(Bounds { from_rule, to_rule })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for rule in [Rule::Gt, Rule::Ge, Rule::Lt, Rule::Le, Rule::Eq] {
            assert_eq!(Rule::parse(rule.token()), Some(rule));
        }
        assert_eq!(Rule::parse("!="), None);
    }

    #[test]
    fn test_ascending_defaults_are_half_open() {
        let b = resolve_bounds(Direction::Ascending, Some("a"), Some("m"), None, None).unwrap();
        assert_eq!(b.from_rule, Rule::Ge);
        assert_eq!(b.to_rule, Rule::Lt);
    }

    #[test]
    fn test_equal_bounds_collapse_to_exact_match() {
        let b = resolve_bounds(Direction::Ascending, Some("x"), Some("x"), None, None).unwrap();
        assert_eq!(b.from_rule, Rule::Eq);
        assert_eq!(b.to_rule, Rule::Eq);
    }

    #[test]
    fn test_descending_defaults() {
        let b = resolve_bounds(Direction::Descending, Some("m"), Some("a"), None, None).unwrap();
        assert_eq!(b.from_rule, Rule::Le);
        assert_eq!(b.to_rule, Rule::Gt);
    }

    #[test]
    fn test_direction_mismatched_rule_is_rejected() {
        let err = resolve_bounds(
            Direction::Ascending,
            Some("a"),
            None,
            Some(Rule::Le),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[test]
    fn test_bound_checks_use_store_collation() {
        // "10" is numerically after "9": must pass a >9 bound
        assert_eq!(Rule::Gt.check_from("10", "9"), BoundCheck::Pass);
        // numeric keys are inside any bound below the string region
        assert_eq!(Rule::Lt.check_to("10", "APPLE"), BoundCheck::Pass);
        assert_eq!(Rule::Lt.check_to("BEE", "APPLE"), BoundCheck::Stop);
    }

    #[test]
    fn test_exact_match_stops_on_departure() {
        assert_eq!(Rule::Eq.check_from("x", "x"), BoundCheck::Pass);
        assert_eq!(Rule::Eq.check_from("y", "x"), BoundCheck::Stop);
        assert_eq!(Rule::Eq.check_to("y", "x"), BoundCheck::Stop);
    }

    #[test]
    fn test_serde_tokens() {
        let json = serde_json::to_string(&Rule::Ge).unwrap();
        assert_eq!(json, "\">=\"");
        let back: Rule = serde_json::from_str("\"<\"").unwrap();
        assert_eq!(back, Rule::Lt);
    }
}
