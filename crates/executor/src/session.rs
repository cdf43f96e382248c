//! Stateful session: dispatch loop over the command instruction set.
//!
//! A session owns one store handle, one engine entry point, and a table
//! of opaque file handles. Dispatch is strictly sequential; the store
//! underneath is single-threaded and non-reentrant, so there is never
//! more than one in-flight call into it.
//!
//! Inserts and updates autocommit unless the client opened a
//! transaction with `TxnBegin`; a failed autocommit aborts so the
//! session never leaks a stale lock between requests.

use crate::command::{Command, ConnectUser};
use crate::error::Error;
use crate::output::{Output, TraverseRow};
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use trellis_core::{RowId, Store};
use trellis_engine::{
    Cursor, Dbs, DbsFile, EngineConfig, FileConfig, Projection, TraverseSpec, UserContext,
};

/// Result of executing one command.
pub type ExecResult = Result<Output, Error>;

/// One connection's worth of state: engine entry point plus open file
/// handles.
pub struct Session {
    store: Arc<dyn Store>,
    config: EngineConfig,
    dbs: Dbs,
    handles: FxHashMap<u64, DbsFile>,
    next_handle: u64,
    in_txn: bool,
}

impl Session {
    /// New session with a default user context.
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Session {
        let dbs = Dbs::new(store.clone(), config.clone(), UserContext::default());
        Session {
            store,
            config,
            dbs,
            handles: FxHashMap::default(),
            next_handle: 1,
            in_txn: false,
        }
    }

    /// Is a client-managed transaction open?
    pub fn in_transaction(&self) -> bool {
        self.in_txn
    }

    /// Execute one command.
    pub fn execute(&mut self, cmd: Command) -> ExecResult {
        match cmd {
            Command::Connect { user } => self.connect(user),
            Command::Ping => Ok(Output::Unit),
            Command::ListFiles => {
                let files = self
                    .dbs
                    .list_files()?
                    .into_iter()
                    .map(|(name, id)| (name, id.0))
                    .collect();
                Ok(Output::Files(files))
            }
            Command::OpenFile {
                name,
                internal,
                fieldnames,
                fieldids,
            } => self.open_file(&name, internal, fieldnames, fieldids),
            Command::CloseFile { handle } => {
                if self.handles.remove(&handle).is_none() {
                    return Err(Error::InvalidHandle { handle });
                }
                Ok(Output::Unit)
            }
            Command::FileDescription { handle } => {
                Ok(Output::Description(self.file(handle)?.description()))
            }
            Command::FileIdOf { handle } => {
                Ok(Output::FileIdent(self.file(handle)?.fileid().to_string()))
            }
            Command::Get {
                handle,
                rowid,
                as_map,
            } => {
                let file = self.file(handle)?;
                let rowid = RowId(rowid);
                if as_map {
                    Ok(Output::RowMap(file.get_map(&rowid)?))
                } else {
                    Ok(Output::Row(file.get(&rowid)?))
                }
            }
            Command::Insert { handle, values } => self.insert(handle, values),
            Command::Update {
                handle,
                rowid,
                values,
            } => self.update(handle, rowid, values),
            Command::Delete { handle, rowid } => {
                self.file(handle)?.delete(&RowId(rowid))?;
                Ok(Output::Unit)
            }
            Command::Lock {
                handle,
                rowid,
                timeout_ms,
            } => {
                self.file(handle)?
                    .lock(&RowId(rowid), timeout_ms.map(Duration::from_millis))?;
                Ok(Output::Unit)
            }
            Command::Unlock { handle, rowid } => {
                self.file(handle)?.unlock(&RowId(rowid))?;
                Ok(Output::Unit)
            }
            Command::Traverse {
                handle,
                index,
                from,
                to,
                from_rule,
                to_rule,
                descending,
                filters,
                order_by,
                limit,
                offset,
                start_at,
                raw,
            } => {
                let file = self.file(handle)?;
                let cursor = file.traverse(TraverseSpec {
                    index,
                    from,
                    to,
                    from_rule,
                    to_rule,
                    descending,
                    filters,
                    order_by,
                    limit: limit.map(|l| l as usize),
                    offset: offset as usize,
                    start_at: start_at.map(RowId),
                    raw,
                })?;
                rows_output(file, cursor)
            }
            Command::Query {
                handle,
                filters,
                order_by,
                limit,
                offset,
            } => {
                let file = self.file(handle)?;
                let cursor = file.query(
                    filters,
                    order_by.as_deref(),
                    limit.map(|l| l as usize),
                    offset as usize,
                )?;
                rows_output(file, cursor)
            }
            Command::Count { handle, limit } => {
                Ok(Output::Count(self.file(handle)?.count(limit)?))
            }
            Command::TxnBegin => {
                if self.in_txn {
                    return Err(Error::Engine {
                        message: "transaction already active".into(),
                    });
                }
                self.in_txn = true;
                Ok(Output::Unit)
            }
            Command::TxnCommit => {
                let staged = self.dbs.transaction().in_flight() as u64;
                self.dbs.commit()?;
                self.in_txn = false;
                Ok(Output::Count(staged))
            }
            Command::TxnAbort => {
                self.dbs.abort();
                self.in_txn = false;
                Ok(Output::Unit)
            }
            Command::TxnActive => Ok(Output::Bool(self.in_txn)),
        }
    }

    fn file(&self, handle: u64) -> Result<&DbsFile, Error> {
        self.handles
            .get(&handle)
            .ok_or(Error::InvalidHandle { handle })
    }

    fn connect(&mut self, user: Option<ConnectUser>) -> ExecResult {
        let ctx = match user {
            None => UserContext::default(),
            Some(user) => {
                let session_date = match &user.session_date {
                    None => None,
                    Some(date) => Some(
                        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
                            Error::Engine {
                                message: format!("bad session date [{}]: {}", date, e),
                            }
                        })?,
                    ),
                };
                UserContext {
                    user_id: user.user_id,
                    session_date,
                    programmer: user.programmer,
                }
            }
        };
        debug!(target: "trellis::session", user = %ctx.user_id, "connect");
        self.dbs = Dbs::new(self.store.clone(), self.config.clone(), ctx);
        self.handles.clear();
        self.in_txn = false;
        Ok(Output::Unit)
    }

    fn open_file(
        &mut self,
        name: &str,
        internal: bool,
        fieldnames: Option<Vec<String>>,
        fieldids: Option<Vec<String>>,
    ) -> ExecResult {
        let projection = match (fieldnames, fieldids) {
            (Some(names), _) => Projection::Names(names),
            (None, Some(ids)) => Projection::Ids(ids.into_iter().map(Into::into).collect()),
            (None, None) => Projection::All,
        };
        let file = self.dbs.file(name, FileConfig { internal, projection })?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(handle, file);
        debug!(target: "trellis::session", file = %name, handle, "file opened");
        Ok(Output::Handle(handle))
    }

    fn insert(&mut self, handle: u64, values: Vec<(String, String)>) -> ExecResult {
        let autocommit = !self.in_txn;
        let file = self.file(handle)?;
        let pairs = values.iter().map(|(n, v)| (n.as_str(), v.as_str()));
        let row = match file.insert(pairs) {
            Ok(row) => row,
            Err(e) => {
                if autocommit {
                    self.dbs.abort();
                }
                return Err(e.into());
            }
        };
        if !autocommit {
            return Ok(Output::Unit);
        }
        if let Err(e) = self.dbs.commit() {
            self.dbs.abort();
            return Err(e.into());
        }
        match row.rowid() {
            Some(rowid) => Ok(Output::RowId(rowid.0)),
            None => Err(Error::Engine {
                message: "insert committed without a row identifier".into(),
            }),
        }
    }

    fn update(&mut self, handle: u64, rowid: String, values: Vec<(String, String)>) -> ExecResult {
        let autocommit = !self.in_txn;
        let file = self.file(handle)?;
        let pairs = values.iter().map(|(n, v)| (n.as_str(), v.as_str()));
        if let Err(e) = file.update(&RowId(rowid), pairs) {
            if autocommit {
                self.dbs.abort();
            }
            return Err(e.into());
        }
        if autocommit {
            if let Err(e) = self.dbs.commit() {
                self.dbs.abort();
                return Err(e.into());
            }
        }
        Ok(Output::Unit)
    }
}

fn rows_output(file: &DbsFile, cursor: Cursor) -> ExecResult {
    let mut rows = Vec::new();
    for item in cursor {
        let item = item?;
        rows.push(TraverseRow {
            rowid: item.rowid.0,
            key: item.key,
            values: item.values,
        });
    }
    Ok(Output::Rows {
        fieldnames: file.fieldnames(),
        rows,
    })
}
