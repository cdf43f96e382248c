//! File access facade.
//!
//! One [`DbsFile`] per open logical file: the single public surface for
//! get / insert / update / delete / lock / unlock / traverse / query /
//! count, composing the dictionary, the planner and the cursors. The
//! facade itself is stateless beyond its configuration; every operation
//! builds a fresh row or cursor, so a handle is safe to share across
//! reads.

use crate::config::{EngineConfig, FileConfig, Projection};
use crate::cursor::{Cursor, FilterTarget, IndexScan, ResolvedFilter, ScanKind, TableScan};
use crate::filter::Filter;
use crate::planner::{self, Plan, Range};
use crate::row::DbsRow;
use crate::rule::{resolve_bounds, Rule};
use crate::transaction::TransactionHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use trellis_core::{Direction, Error, FieldId, FileId, Path, Result, RowId, Store};
use trellis_dict::{DataDictionary, DictionaryRegistry, FieldType};

const FILE_DIRECTORY: &str = "DIC";

fn piece(s: &str, n: usize) -> &str {
    s.split('^').nth(n - 1).unwrap_or("")
}

/// Planner ranges are stated low-to-high; a descending traversal starts
/// at the high end, so the sides swap while the rules travel with their
/// values.
#[allow(clippy::type_complexity)]
fn orient_range(
    range: &Range,
    dir: Direction,
) -> (Option<String>, Option<Rule>, Option<String>, Option<Rule>) {
    match dir {
        Direction::Ascending => (
            range.from.clone(),
            range.from_rule,
            range.to.clone(),
            range.to_rule,
        ),
        Direction::Descending => (
            range.to.clone(),
            range.to_rule,
            range.from.clone(),
            range.from_rule,
        ),
    }
}

/// Shape of one projected column, for result-set descriptions at the
/// session boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Normalized field name.
    pub name: String,
    /// Field id.
    pub fieldid: String,
    /// Stable numeric type code.
    pub type_code: u8,
    /// Type label.
    pub type_label: String,
    /// Display title, when the dictionary carries one.
    pub title: Option<String>,
}

/// Parameters of one traversal.
#[derive(Debug, Clone, Default)]
pub struct TraverseSpec {
    /// Index to walk; `None` lets the planner pick one when filters are
    /// present, or falls back to the raw table.
    pub index: Option<String>,
    /// From-bound value (index key, or rowid for table traversal).
    pub from: Option<String>,
    /// To-bound value.
    pub to: Option<String>,
    /// Explicit from-bound rule; defaulted per direction.
    pub from_rule: Option<Rule>,
    /// Explicit to-bound rule; defaulted per direction.
    pub to_rule: Option<Rule>,
    /// Walk backwards.
    pub descending: bool,
    /// Row filter predicates.
    pub filters: Vec<Filter>,
    /// Field name hint for planner index preference; a leading `-`
    /// flips the direction.
    pub order_by: Option<String>,
    /// Hard cap on returned matches.
    pub limit: Option<usize>,
    /// Matches to discard after filtering, before `limit` counts.
    pub offset: usize,
    /// Resume position: treated as already visited after an existence
    /// check on the first step (table traversal only).
    pub start_at: Option<RowId>,
    /// Yield positions only, skipping row materialization.
    pub raw: bool,
}

/// Handle over one logical file.
pub struct DbsFile {
    dd: Arc<DataDictionary>,
    registry: Arc<DictionaryRegistry>,
    store: Arc<dyn Store>,
    txn: TransactionHandle,
    internal: bool,
    projection: Vec<FieldId>,
    lock_timeout: Duration,
}

impl DbsFile {
    /// Open a file by name, resolving the projection against its
    /// dictionary.
    pub fn open(
        registry: &Arc<DictionaryRegistry>,
        name: &str,
        config: FileConfig,
        engine: &EngineConfig,
        txn: TransactionHandle,
    ) -> Result<DbsFile> {
        let dd = registry.get(name)?;
        let projection = match config.projection {
            Projection::All => dd.fields().iter().map(|f| f.id.clone()).collect(),
            Projection::Ids(ids) => {
                for id in &ids {
                    if dd.field(id).is_none() {
                        return Err(Error::UnknownField {
                            file: dd.name().to_string(),
                            name: id.to_string(),
                        });
                    }
                }
                ids
            }
            Projection::Names(names) => names
                .iter()
                .map(|n| dd.field_id(n))
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(DbsFile {
            dd,
            registry: registry.clone(),
            store: registry.store().clone(),
            txn,
            internal: config.internal,
            projection,
            lock_timeout: engine.lock_timeout,
        })
    }

    /// The file's dictionary.
    pub fn dd(&self) -> &Arc<DataDictionary> {
        &self.dd
    }

    /// Resolved numeric file identifier.
    pub fn fileid(&self) -> &FileId {
        self.dd.fileid()
    }

    /// Names of the projected fields, in projection order.
    pub fn fieldnames(&self) -> Vec<String> {
        self.projection
            .iter()
            .map(|id| {
                self.dd
                    .field(id)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect()
    }

    /// Result-set description for the projection.
    pub fn description(&self) -> Vec<ColumnInfo> {
        self.projection
            .iter()
            .filter_map(|id| self.dd.field(id))
            .map(|f| ColumnInfo {
                name: f.name.clone(),
                fieldid: f.id.to_string(),
                type_code: f.ty.code(),
                type_label: f.ty.label().to_string(),
                title: f.title.clone(),
            })
            .collect()
    }

    /// Fresh row handle bound to this file's transaction.
    pub fn row(&self, rowid: Option<RowId>) -> DbsRow {
        DbsRow::new(
            self.dd.clone(),
            self.store.clone(),
            rowid,
            self.txn.clone(),
            self.lock_timeout,
            self.internal,
            self.projection.clone(),
        )
    }

    /// Retrieve one row as an ordered value sequence; `NotFound` when
    /// the row does not exist.
    pub fn get(&self, rowid: &RowId) -> Result<Vec<String>> {
        let row = self.row(Some(rowid.clone()));
        row.retrieve()?;
        row.values()
    }

    /// Retrieve one row as a field-name keyed mapping.
    pub fn get_map(&self, rowid: &RowId) -> Result<BTreeMap<String, String>> {
        let row = self.row(Some(rowid.clone()));
        row.retrieve()?;
        row.as_map()
    }

    /// Traverse the file per the given spec, planner-assisted when no
    /// index is named but filters are present.
    pub fn traverse(&self, spec: TraverseSpec) -> Result<Cursor> {
        let dir = if spec.descending {
            Direction::Descending
        } else {
            Direction::Ascending
        };
        for f in &spec.filters {
            if !f.on_rowid() {
                self.dd.field_id(&f.field)?;
            }
        }

        let (scan, residual) = if let Some(index) = &spec.index {
            if !self.dd.indexes().contains_key(index) {
                return Err(Error::not_found(format!(
                    "index [{}] on file [{}]",
                    index,
                    self.dd.name()
                )));
            }
            let bounds = resolve_bounds(
                dir,
                spec.from.as_deref(),
                spec.to.as_deref(),
                spec.from_rule,
                spec.to_rule,
            )?;
            let scan = IndexScan::new(
                self.store.clone(),
                self.dd.global_root(),
                index,
                spec.from.clone(),
                spec.to.clone(),
                bounds,
                dir,
            )?;
            (ScanKind::Index(scan), spec.filters.clone())
        } else if !spec.filters.is_empty() {
            match planner::plan(&spec.filters, spec.order_by.as_deref(), &self.dd) {
                Plan::Index {
                    index,
                    range,
                    residual,
                } => {
                    let scan = self.index_scan_for_range(&index, &range, dir)?;
                    (ScanKind::Index(scan), residual)
                }
                Plan::RowidRange { range, residual } => {
                    let (from, from_rule, to, to_rule) = orient_range(&range, dir);
                    let bounds =
                        resolve_bounds(dir, from.as_deref(), to.as_deref(), from_rule, to_rule)?;
                    let scan = TableScan::new(
                        self.store.clone(),
                        self.dd.global_root().clone(),
                        from,
                        to,
                        bounds,
                        dir,
                        spec.start_at.clone(),
                    )?;
                    (ScanKind::Table(scan), residual)
                }
                Plan::FullScan { residual } => {
                    let scan = self.table_scan_for_spec(&spec, dir)?;
                    (ScanKind::Table(scan), residual)
                }
            }
        } else {
            let scan = self.table_scan_for_spec(&spec, dir)?;
            (ScanKind::Table(scan), Vec::new())
        };

        let residual = self.resolve_filters(residual)?;
        Ok(Cursor::new(
            scan,
            self.store.clone(),
            self.dd.clone(),
            self.projection.clone(),
            self.internal,
            residual,
            spec.offset,
            spec.limit,
            spec.raw,
        ))
    }

    /// Planner-assisted traversal: filters plus an optional `order_by`
    /// (leading `-` walks descending).
    pub fn query(
        &self,
        filters: Vec<Filter>,
        order_by: Option<&str>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Cursor> {
        let (order_by, descending) = match order_by {
            Some(ob) => match ob.strip_prefix('-') {
                Some(bare) => (Some(bare.to_string()), true),
                None => (Some(ob.to_string()), false),
            },
            None => (None, false),
        };
        self.traverse(TraverseSpec {
            filters,
            order_by,
            descending,
            limit,
            offset,
            ..TraverseSpec::default()
        })
    }

    /// Stage an insert: every value runs through the validated-mutation
    /// path; the rowid is assigned when the transaction commits.
    pub fn insert<'a, I>(&self, values: I) -> Result<DbsRow>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let row = self.row(None);
        let mut values: Vec<(&str, &str)> = values.into_iter().collect();
        values.sort_by_key(|(name, _)| *name);
        for (name, value) in values {
            row.set_by_name(name, value)?;
        }
        Ok(row)
    }

    /// Stage an update of an existing row.
    pub fn update<'a, I>(&self, rowid: &RowId, values: I) -> Result<DbsRow>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let row = self.row(Some(rowid.clone()));
        let mut values: Vec<(&str, &str)> = values.into_iter().collect();
        values.sort_by_key(|(name, _)| *name);
        for (name, value) in values {
            row.set_by_name(name, value)?;
        }
        Ok(row)
    }

    /// Delete a row through the store's native delete procedure.
    pub fn delete(&self, rowid: &RowId) -> Result<()> {
        self.store.delete_record(self.dd.fileid(), rowid)
    }

    /// Explicit advisory lock on a row, independent of mutation.
    pub fn lock(&self, rowid: &RowId, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.unwrap_or(self.lock_timeout);
        let path = self.dd.global_root().child(rowid.as_str());
        if self.store.lock(&path, timeout)? {
            Ok(())
        } else {
            Err(Error::LockTimeout {
                row: rowid.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    /// Release one acquisition of an explicit advisory lock.
    pub fn unlock(&self, rowid: &RowId) -> Result<()> {
        self.store
            .unlock(&self.dd.global_root().child(rowid.as_str()))
    }

    /// Row count from the file's maintained header; no scan. Accuracy
    /// follows the store's aggregate.
    pub fn count(&self, limit: Option<u64>) -> Result<u64> {
        let header = self
            .store
            .get(&self.dd.global_root().child("0"))?
            .unwrap_or_default();
        let count: u64 = piece(&header, 4).parse().unwrap_or(0);
        Ok(match limit {
            Some(limit) => count.min(limit),
            None => count,
        })
    }

    /// Follow a pointer field to the row it references in the target
    /// file, returned as a field-name keyed mapping.
    pub fn follow_pointer(
        &self,
        field_name: &str,
        value: &str,
    ) -> Result<BTreeMap<String, String>> {
        let field = self
            .dd
            .field_by_name(field_name)
            .ok_or_else(|| Error::UnknownField {
                file: self.dd.name().to_string(),
                name: field_name.to_string(),
            })?;
        if field.ty != FieldType::Pointer {
            return Err(Error::internal(format!(
                "field [{}] of file [{}] is not a pointer",
                field_name,
                self.dd.name()
            )));
        }
        let target = field.pointer_target.clone().ok_or_else(|| {
            Error::schema(self.dd.name(), format!("pointer field [{}] has no target", field_name))
        })?;
        let entry = self
            .store
            .get(&Path::with_subs(FILE_DIRECTORY, [target.as_str(), "0"]))?
            .ok_or_else(|| Error::not_found(format!("file [{}]", target)))?;
        let target_dd = self.registry.get(piece(&entry, 1))?;
        let record = self
            .store
            .retrieve_record(target_dd.fileid(), &RowId::from(value))?
            .ok_or_else(|| {
                Error::not_found(format!("row [{}] in file [{}]", value, target_dd.name()))
            })?;
        let mut map = BTreeMap::new();
        for (id, raw) in record {
            let Some(f) = target_dd.field(&id) else { continue };
            let value = if self.internal {
                raw
            } else {
                f.external(&raw)
            };
            map.insert(f.name.clone(), value);
        }
        Ok(map)
    }

    fn index_scan_for_range(&self, index: &str, range: &Range, dir: Direction) -> Result<IndexScan> {
        let (from, from_rule, to, to_rule) = orient_range(range, dir);
        let bounds = resolve_bounds(dir, from.as_deref(), to.as_deref(), from_rule, to_rule)?;
        IndexScan::new(
            self.store.clone(),
            self.dd.global_root(),
            index,
            from,
            to,
            bounds,
            dir,
        )
    }

    fn table_scan_for_spec(&self, spec: &TraverseSpec, dir: Direction) -> Result<TableScan> {
        let bounds = resolve_bounds(
            dir,
            spec.from.as_deref(),
            spec.to.as_deref(),
            spec.from_rule,
            spec.to_rule,
        )?;
        TableScan::new(
            self.store.clone(),
            self.dd.global_root().clone(),
            spec.from.clone(),
            spec.to.clone(),
            bounds,
            dir,
            spec.start_at.clone(),
        )
    }

    fn resolve_filters(&self, filters: Vec<Filter>) -> Result<Vec<ResolvedFilter>> {
        filters
            .into_iter()
            .map(|filter| {
                let target = if filter.on_rowid() {
                    FilterTarget::Rowid
                } else {
                    FilterTarget::Field(self.dd.field_id(&filter.field)?)
                };
                Ok(ResolvedFilter { target, filter })
            })
            .collect()
    }
}
