//! Cursor iterators over an index or over the raw table.
//!
//! Both cursor variants walk the store one ordered-successor call at a
//! time and never revisit a key: progress is monotonic in the configured
//! direction and out-of-bound candidates end the sequence instead of
//! being skipped. The index scan walks `(key, rowid)` pairs under
//! `root(index,…)`; the table scan walks rowids at the data root,
//! skipping the header node and, descending, the index region.

use crate::filter::Filter;
use crate::rule::{BoundCheck, Bounds};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use trellis_core::collation::{collate, is_canonic_number};
use trellis_core::{Direction, Error, FieldId, Path, Result, RowId, Store};
use trellis_dict::DataDictionary;

/// One yielded position of a traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct TraverseItem {
    /// Index key the row was found under; `None` for table traversal.
    pub key: Option<String>,
    /// Row identifier.
    pub rowid: RowId,
    /// Projected row values; `None` for raw traversal.
    pub values: Option<Vec<String>>,
}

/// Reject bound pairs that contradict the direction; a monotonic scan
/// between them could never terminate meaningfully.
fn check_bound_order(
    dir: Direction,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    if let (Some(f), Some(t)) = (from, to) {
        let ord = collate(f, t);
        let bad = match dir {
            Direction::Ascending => ord == std::cmp::Ordering::Greater,
            Direction::Descending => ord == std::cmp::Ordering::Less,
        };
        if bad {
            return Err(Error::internal(format!(
                "from bound [{}] sorts past to bound [{}] for {:?} traversal",
                f, t, dir
            )));
        }
    }
    Ok(())
}

// =========================================================================
// Index scan
// =========================================================================

pub(crate) struct IndexScan {
    store: Arc<dyn Store>,
    level: Path,
    from: Option<String>,
    to: Option<String>,
    bounds: Bounds,
    dir: Direction,
    last_key: String,
    /// `Some(r)` while enumerating rowids under `last_key` (after `r`);
    /// `None` while seeking the next key.
    rowid_cursor: Option<String>,
    done: bool,
}

impl std::fmt::Debug for IndexScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexScan")
            .field("level", &self.level)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("bounds", &self.bounds)
            .field("dir", &self.dir)
            .field("last_key", &self.last_key)
            .field("rowid_cursor", &self.rowid_cursor)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl IndexScan {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        root: &Path,
        index: &str,
        from: Option<String>,
        to: Option<String>,
        bounds: Bounds,
        dir: Direction,
    ) -> Result<IndexScan> {
        check_bound_order(dir, from.as_deref(), to.as_deref())?;
        // An inclusive from-bound starts by enumerating the bound key's
        // own rowids; the successor call would otherwise step past it.
        let (last_key, rowid_cursor) = match &from {
            Some(f) if bounds.from_rule.inclusive() => (f.clone(), Some(String::new())),
            Some(f) => (f.clone(), None),
            None => (String::new(), None),
        };
        Ok(IndexScan {
            store,
            level: root.child(index),
            from,
            to,
            bounds,
            dir,
            last_key,
            rowid_cursor,
            done: false,
        })
    }

    pub(crate) fn next(&mut self) -> Result<Option<(String, RowId)>> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.rowid_cursor.clone() {
                None => {
                    let at = self.level.child(self.last_key.clone());
                    let Some(key) = self.store.order(&at, self.dir)? else {
                        self.done = true;
                        return Ok(None);
                    };
                    if let Some(from) = &self.from {
                        match self.bounds.from_rule.check_from(&key, from) {
                            BoundCheck::Pass => {}
                            BoundCheck::Skip => {
                                self.last_key = key;
                                continue;
                            }
                            BoundCheck::Stop => {
                                self.done = true;
                                return Ok(None);
                            }
                        }
                    }
                    if let Some(to) = &self.to {
                        if self.bounds.to_rule.check_to(&key, to) != BoundCheck::Pass {
                            self.done = true;
                            return Ok(None);
                        }
                    }
                    self.last_key = key;
                    self.rowid_cursor = Some(String::new());
                }
                Some(after) => {
                    let at = self.level.child(self.last_key.clone()).child(after);
                    match self.store.order(&at, self.dir)? {
                        None => self.rowid_cursor = None,
                        Some(rid) => {
                            self.rowid_cursor = Some(rid.clone());
                            return Ok(Some((self.last_key.clone(), RowId(rid))));
                        }
                    }
                }
            }
        }
    }
}

// =========================================================================
// Table scan
// =========================================================================

enum Step {
    Yield,
    Skip,
    Stop,
}

pub(crate) struct TableScan {
    store: Arc<dyn Store>,
    root: Path,
    from: Option<String>,
    to: Option<String>,
    bounds: Bounds,
    dir: Direction,
    last: String,
    /// Inclusive from-bound not yet checked for direct membership.
    pending_first: Option<String>,
    /// Caller-supplied resume position, validated on the first step.
    validate_start: Option<String>,
    done: bool,
}

impl TableScan {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        root: Path,
        from: Option<String>,
        to: Option<String>,
        bounds: Bounds,
        dir: Direction,
        start_at: Option<RowId>,
    ) -> Result<TableScan> {
        check_bound_order(dir, from.as_deref(), to.as_deref())?;
        let (last, pending_first, validate_start) = match start_at {
            Some(start) => (start.0.clone(), None, Some(start.0)),
            None => match &from {
                Some(f) if bounds.from_rule.inclusive() => {
                    (f.clone(), Some(f.clone()), None)
                }
                Some(f) => (f.clone(), None, None),
                None => (String::new(), None, None),
            },
        };
        Ok(TableScan {
            store,
            root,
            from,
            to,
            bounds,
            dir,
            last,
            pending_first,
            validate_start,
            done: false,
        })
    }

    pub(crate) fn current(&self) -> &str {
        &self.last
    }

    fn classify(&self, rid: &str) -> Step {
        if rid == "0" {
            return Step::Skip; // file header node
        }
        if !is_canonic_number(rid) {
            // numeric rowids collate before the index subscripts
            return match self.dir {
                Direction::Ascending => Step::Stop,
                Direction::Descending => Step::Skip,
            };
        }
        if let Some(from) = &self.from {
            match self.bounds.from_rule.check_from(rid, from) {
                BoundCheck::Pass => {}
                BoundCheck::Skip => return Step::Skip,
                BoundCheck::Stop => return Step::Stop,
            }
        }
        if let Some(to) = &self.to {
            if self.bounds.to_rule.check_to(rid, to) != BoundCheck::Pass {
                return Step::Stop;
            }
        }
        Step::Yield
    }

    pub(crate) fn next(&mut self) -> Result<Option<RowId>> {
        if self.done {
            return Ok(None);
        }
        if let Some(start) = self.validate_start.take() {
            if !self.store.exists(&self.root.child(start.clone()))? {
                debug!(
                    target: "trellis::cursor",
                    start = %start,
                    "resume row no longer exists; continuing from its position"
                );
            }
        }
        if let Some(first) = self.pending_first.take() {
            if self.store.exists(&self.root.child(first.clone()))? {
                if let Step::Yield = self.classify(&first) {
                    self.last = first.clone();
                    return Ok(Some(RowId(first)));
                }
            }
        }
        loop {
            let at = self.root.child(self.last.clone());
            let Some(rid) = self.store.order(&at, self.dir)? else {
                self.done = true;
                return Ok(None);
            };
            self.last = rid.clone();
            match self.classify(&rid) {
                Step::Yield => return Ok(Some(RowId(rid))),
                Step::Skip => continue,
                Step::Stop => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }
}

// =========================================================================
// Materializing cursor
// =========================================================================

pub(crate) enum ScanKind {
    Index(IndexScan),
    Table(TableScan),
}

/// What a residual filter is evaluated against.
pub(crate) enum FilterTarget {
    Rowid,
    Field(FieldId),
}

pub(crate) struct ResolvedFilter {
    pub(crate) target: FilterTarget,
    pub(crate) filter: Filter,
}

impl ResolvedFilter {
    fn matches(&self, rowid: &RowId, record: Option<&BTreeMap<FieldId, String>>) -> bool {
        match &self.target {
            FilterTarget::Rowid => self.filter.matches(rowid.as_str()),
            FilterTarget::Field(id) => {
                let value = record
                    .and_then(|rec| rec.get(id))
                    .map(String::as_str)
                    .unwrap_or("");
                self.filter.matches(value)
            }
        }
    }
}

/// Lazy traversal over a file, optionally materializing projected rows.
///
/// The residual filters run against each candidate row; `offset`
/// discards matches before `limit` begins counting, and `limit` is
/// checked before every step.
pub struct Cursor {
    scan: ScanKind,
    store: Arc<dyn Store>,
    dd: Arc<DataDictionary>,
    projection: Vec<FieldId>,
    internal: bool,
    residual: Vec<ResolvedFilter>,
    offset_remaining: usize,
    limit: Option<usize>,
    returned: usize,
    raw: bool,
    last_rowid: Option<RowId>,
}

impl Cursor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        scan: ScanKind,
        store: Arc<dyn Store>,
        dd: Arc<DataDictionary>,
        projection: Vec<FieldId>,
        internal: bool,
        residual: Vec<ResolvedFilter>,
        offset: usize,
        limit: Option<usize>,
        raw: bool,
    ) -> Cursor {
        Cursor {
            scan,
            store,
            dd,
            projection,
            internal,
            residual,
            offset_remaining: offset,
            limit,
            returned: 0,
            raw,
            last_rowid: None,
        }
    }

    /// Position of the cursor: the last rowid it stepped onto.
    pub fn current_rowid(&self) -> Option<&RowId> {
        self.last_rowid.as_ref()
    }

    fn project(&self, record: &BTreeMap<FieldId, String>) -> Vec<String> {
        self.projection
            .iter()
            .map(|id| {
                let value = record.get(id).cloned().unwrap_or_default();
                if self.internal {
                    value
                } else {
                    self.dd
                        .field(id)
                        .map(|f| f.external(&value))
                        .unwrap_or(value)
                }
            })
            .collect()
    }

    fn step(&mut self) -> Result<Option<TraverseItem>> {
        loop {
            if let Some(limit) = self.limit {
                if self.returned >= limit {
                    return Ok(None);
                }
            }
            let position = match &mut self.scan {
                ScanKind::Index(scan) => scan.next()?.map(|(key, rowid)| (Some(key), rowid)),
                ScanKind::Table(scan) => scan.next()?.map(|rowid| (None, rowid)),
            };
            let Some((key, rowid)) = position else {
                return Ok(None);
            };
            self.last_rowid = Some(rowid.clone());

            let record = if self.residual.is_empty() && self.raw {
                None
            } else {
                match self.store.retrieve_record(self.dd.fileid(), &rowid)? {
                    Some(record) => Some(record),
                    // index entry outliving its row: pass over it
                    None => continue,
                }
            };

            if !self
                .residual
                .iter()
                .all(|rf| rf.matches(&rowid, record.as_ref()))
            {
                continue;
            }
            if self.offset_remaining > 0 {
                self.offset_remaining -= 1;
                continue;
            }
            self.returned += 1;
            let values = if self.raw {
                None
            } else {
                record.as_ref().map(|rec| self.project(rec))
            };
            return Ok(Some(TraverseItem { key, rowid, values }));
        }
    }
}

impl Iterator for Cursor {
    type Item = Result<TraverseItem>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
