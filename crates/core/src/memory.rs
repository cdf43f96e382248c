//! In-memory reference implementation of the [`Store`] boundary.
//!
//! This is the test collaborator for the engine: a global space ordered
//! by store collation, an advisory lock table with session-scoped
//! nesting, and schema-driven record procedures that honor the same
//! dictionary conventions the real store maintains:
//!
//! - `^DIC("B",name,fileid)`: file-name index
//! - `^DIC(fileid,0)`: file entry, `^DIC(fileid,0,"GL")`: data root
//! - `^DD(fileid,fieldid,0)`: field entry `NAME^FLAGS^DETAILS^STORAGE^VALID`
//!   with title and help on the `.1` and `3` nodes
//! - `^DD(fileid,0,"IX",name,fileid,fieldid)`: index definitions
//! - `root(rowid,fieldid)`: record values, `root(index,value,rowid)`:
//!   index entries, `root(0)`: the `NAME^FILEID^last^count` header
//!
//! It is deliberately not a storage engine: no durability, no
//! concurrency beyond what the lock table needs, linear scans where the
//! real store has trees.

use crate::collation::{collate, collate_subs, is_canonic_number};
use crate::error::{Error, Result};
use crate::traits::{Store, Validation};
use crate::types::{Direction, FieldId, FileId, Path, RowId};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

const FILE_DIRECTORY: &str = "DIC";
const DICTIONARY: &str = "DD";

/// Map key ordered the way the store orders subscripts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GlobalKey {
    global: String,
    subs: Vec<String>,
}

impl GlobalKey {
    fn of(path: &Path) -> GlobalKey {
        GlobalKey {
            global: path.global.clone(),
            subs: path.subs.to_vec(),
        }
    }

    fn is_under(&self, global: &str, prefix: &[String]) -> bool {
        self.global == global
            && self.subs.len() >= prefix.len()
            && self.subs[..prefix.len()] == prefix[..]
    }
}

impl Ord for GlobalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.global
            .cmp(&other.global)
            .then_with(|| collate_subs(&self.subs, &other.subs))
    }
}

impl PartialOrd for GlobalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct LockEntry {
    owner: ThreadId,
    count: u32,
}

/// In-memory store honoring native collation, advisory locks, and the
/// record-level procedures.
#[derive(Default)]
pub struct MemoryStore {
    globals: Mutex<BTreeMap<GlobalKey, String>>,
    locks: Mutex<HashMap<String, LockEntry>>,
    lock_cv: Condvar,
}

/// Parsed `^DD(file,field,0)` entry.
struct FieldSpec {
    flags: String,
    details: String,
    valid: String,
}

fn piece(s: &str, n: usize) -> &str {
    s.split('^').nth(n - 1).unwrap_or("")
}

fn invalid(code: &str, message: &str, help: Option<String>) -> Validation {
    Validation::Invalid {
        code: code.to_string(),
        message: message.to_string(),
        help,
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    // =====================================================================
    // Seeding helpers (schema and data fixtures)
    // =====================================================================

    /// Register a file: name index entry, directory entry, data root.
    pub fn define_file(&self, name: &str, fileid: &str, global: &str) -> Result<()> {
        self.set(
            &Path::with_subs(FILE_DIRECTORY, ["B", name, fileid]),
            "",
        )?;
        self.set(
            &Path::with_subs(FILE_DIRECTORY, [fileid, "0"]),
            &format!("{}^{}", name, fileid),
        )?;
        self.set(
            &Path::with_subs(FILE_DIRECTORY, [fileid, "0", "GL"]),
            &format!("^{}({},", global, fileid),
        )?;
        self.set(
            &Path::with_subs(global, [fileid, "0"]),
            &format!("{}^{}^0^0", name, fileid),
        )?;
        Ok(())
    }

    /// Register a field entry for a file.
    pub fn define_field(
        &self,
        fileid: &str,
        fieldid: &str,
        name: &str,
        flags: &str,
        details: &str,
        storage: &str,
    ) -> Result<()> {
        self.set(
            &Path::with_subs(DICTIONARY, [fileid, fieldid, "0"]),
            &format!("{}^{}^{}^{}", name, flags, details, storage),
        )
    }

    /// Attach a validation hint (`min:max` for numeric fields) to a field.
    pub fn set_field_valid(&self, fileid: &str, fieldid: &str, valid: &str) -> Result<()> {
        let node = Path::with_subs(DICTIONARY, [fileid, fieldid, "0"]);
        let entry = self.get(&node)?.unwrap_or_default();
        let mut parts: Vec<&str> = entry.split('^').collect();
        while parts.len() < 5 {
            parts.push("");
        }
        parts[4] = valid;
        self.set(&node, &parts.join("^"))
    }

    /// Attach a display title to a field.
    pub fn set_field_title(&self, fileid: &str, fieldid: &str, title: &str) -> Result<()> {
        self.set(&Path::with_subs(DICTIONARY, [fileid, fieldid, ".1"]), title)
    }

    /// Attach help text to a field.
    pub fn set_field_help(&self, fileid: &str, fieldid: &str, help: &str) -> Result<()> {
        self.set(&Path::with_subs(DICTIONARY, [fileid, fieldid, "3"]), help)
    }

    /// Register a single-column index over a field.
    pub fn define_index(&self, fileid: &str, name: &str, fieldid: &str) -> Result<()> {
        self.set(
            &Path::with_subs(DICTIONARY, [fileid, "0", "IX", name, fileid, fieldid]),
            "",
        )
    }

    /// Seed a data row directly, maintaining indexes and the file header.
    pub fn seed_row(&self, fileid: &str, rowid: &str, values: &[(&str, &str)]) -> Result<()> {
        let file = FileId::from(fileid);
        let root = self.file_root(&file)?;
        for (fid, value) in values {
            self.set(&root.child(rowid).child(*fid), value)?;
        }
        for (ixname, ixfield) in self.file_indexes(&file)? {
            if let Some((_, value)) = values.iter().find(|(f, _)| *f == ixfield.as_str()) {
                if !value.is_empty() {
                    self.set(&root.child(ixname).child(*value).child(rowid), "")?;
                }
            }
        }
        let (name, id, last, count) = self.read_header(&root)?;
        let new_last = if is_canonic_number(rowid) {
            let r: f64 = rowid.parse().unwrap_or(0.0);
            if r > last as f64 {
                r as u64
            } else {
                last
            }
        } else {
            last
        };
        self.write_header(&root, &name, &id, new_last, count + 1)?;
        Ok(())
    }

    // =====================================================================
    // Schema access
    // =====================================================================

    fn field_spec(&self, file: &FileId, field: &FieldId) -> Result<Option<FieldSpec>> {
        let node = Path::with_subs(DICTIONARY, [file.as_str(), field.as_str(), "0"]);
        Ok(self.get(&node)?.map(|entry| FieldSpec {
            flags: piece(&entry, 2).to_string(),
            details: piece(&entry, 3).to_string(),
            valid: piece(&entry, 5).to_string(),
        }))
    }

    fn file_root(&self, file: &FileId) -> Result<Path> {
        let gl = self
            .get(&Path::with_subs(FILE_DIRECTORY, [file.as_str(), "0", "GL"]))?
            .ok_or_else(|| Error::not_found(format!("file [{}] has no data root", file)))?;
        Path::parse_open_form(&gl)
            .ok_or_else(|| Error::internal(format!("bad data root [{}] for file {}", gl, file)))
    }

    fn file_fields(&self, file: &FileId) -> Result<Vec<FieldId>> {
        let mut fields = Vec::new();
        let mut cursor = "0".to_string();
        loop {
            let at = Path::with_subs(DICTIONARY, [file.as_str(), cursor.as_str()]);
            match self.order(&at, Direction::Ascending)? {
                Some(next) if is_canonic_number(&next) => {
                    fields.push(FieldId(next.clone()));
                    cursor = next;
                }
                _ => break,
            }
        }
        Ok(fields)
    }

    fn file_indexes(&self, file: &FileId) -> Result<Vec<(String, FieldId)>> {
        let mut indexes = Vec::new();
        let mut name = String::new();
        loop {
            let at = Path::with_subs(DICTIONARY, [file.as_str(), "0", "IX", name.as_str()]);
            match self.order(&at, Direction::Ascending)? {
                Some(next) => {
                    let fields = Path::with_subs(
                        DICTIONARY,
                        [file.as_str(), "0", "IX", next.as_str(), file.as_str(), ""],
                    );
                    if let Some(field) = self.order(&fields, Direction::Ascending)? {
                        indexes.push((next.clone(), FieldId(field)));
                    }
                    name = next;
                }
                None => break,
            }
        }
        Ok(indexes)
    }

    fn read_header(&self, root: &Path) -> Result<(String, String, u64, u64)> {
        let header = self.get(&root.child("0"))?.unwrap_or_default();
        Ok((
            piece(&header, 1).to_string(),
            piece(&header, 2).to_string(),
            piece(&header, 3).parse().unwrap_or(0),
            piece(&header, 4).parse().unwrap_or(0),
        ))
    }

    fn write_header(&self, root: &Path, name: &str, id: &str, last: u64, count: u64) -> Result<()> {
        self.set(&root.child("0"), &format!("{}^{}^{}^{}", name, id, last, count))
    }

    fn maintain_index(
        &self,
        root: &Path,
        rowid: &RowId,
        ixname: &str,
        old: Option<&str>,
        new: &str,
    ) -> Result<()> {
        if let Some(old) = old {
            if !old.is_empty() {
                self.kill(&root.child(ixname).child(old).child(rowid.as_str()))?;
            }
        }
        if !new.is_empty() {
            self.set(&root.child(ixname).child(new).child(rowid.as_str()), "")?;
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn order(&self, at: &Path, dir: Direction) -> Result<Option<String>> {
        let n = at.subs.len();
        if n == 0 {
            return Err(Error::internal("ordered lookup needs at least one subscript"));
        }
        let prefix: Vec<String> = at.subs[..n - 1].to_vec();
        let from = at.subs[n - 1].clone();
        let globals = self.globals.lock();
        let start = GlobalKey {
            global: at.global.clone(),
            subs: prefix.clone(),
        };
        let mut best: Option<String> = None;
        for (key, _) in globals.range(start..) {
            if !key.is_under(&at.global, &prefix) {
                break;
            }
            if key.subs.len() == prefix.len() {
                continue; // the prefix node itself
            }
            let cand = &key.subs[prefix.len()];
            if best.as_deref() == Some(cand.as_str()) {
                continue; // deeper node under the current best
            }
            match dir {
                Direction::Ascending => {
                    if from.is_empty() || collate(cand, &from) == Ordering::Greater {
                        return Ok(Some(cand.clone()));
                    }
                }
                Direction::Descending => {
                    if from.is_empty() || collate(cand, &from) == Ordering::Less {
                        best = Some(cand.clone());
                    } else {
                        break; // candidates ascend; nothing later qualifies
                    }
                }
            }
        }
        Ok(best)
    }

    fn get(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.globals.lock().get(&GlobalKey::of(path)).cloned())
    }

    fn set(&self, path: &Path, value: &str) -> Result<()> {
        self.globals
            .lock()
            .insert(GlobalKey::of(path), value.to_string());
        Ok(())
    }

    fn kill(&self, path: &Path) -> Result<()> {
        let mut globals = self.globals.lock();
        let start = GlobalKey::of(path);
        let prefix: Vec<String> = path.subs.to_vec();
        let doomed: Vec<GlobalKey> = globals
            .range(start..)
            .take_while(|(k, _)| k.is_under(&path.global, &prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            globals.remove(&key);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        let globals = self.globals.lock();
        let start = GlobalKey::of(path);
        let prefix: Vec<String> = path.subs.to_vec();
        Ok(globals
            .range(start..)
            .next()
            .map(|(k, _)| k.is_under(&path.global, &prefix))
            .unwrap_or(false))
    }

    fn lock(&self, path: &Path, timeout: Duration) -> Result<bool> {
        let key = path.to_string();
        let me = thread::current().id();
        let deadline = Instant::now() + timeout;
        let mut held = self.locks.lock();
        loop {
            let free = match held.get(&key) {
                None => true,
                Some(entry) => entry.owner == me,
            };
            if free {
                let entry = held
                    .entry(key.clone())
                    .or_insert(LockEntry { owner: me, count: 0 });
                entry.owner = me;
                entry.count += 1;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            let _ = self.lock_cv.wait_until(&mut held, deadline);
        }
    }

    fn unlock(&self, path: &Path) -> Result<()> {
        let key = path.to_string();
        let me = thread::current().id();
        let mut held = self.locks.lock();
        if let Some(entry) = held.get_mut(&key) {
            if entry.owner == me {
                entry.count -= 1;
                if entry.count == 0 {
                    held.remove(&key);
                    self.lock_cv.notify_all();
                }
            }
        }
        Ok(())
    }

    fn validate_field(&self, file: &FileId, field: &FieldId, value: &str) -> Result<Validation> {
        let spec = self.field_spec(file, field)?.ok_or_else(|| Error::UnknownField {
            file: file.to_string(),
            name: field.to_string(),
        })?;
        let mut flags = spec.flags.as_str();
        let mandatory = flags.starts_with('R');
        if mandatory {
            flags = &flags[1..];
        }
        let help = self.get(&Path::with_subs(
            DICTIONARY,
            [file.as_str(), field.as_str(), "3"],
        ))?;

        if value.is_empty() {
            if mandatory {
                return Ok(invalid("301", "a value is required", help));
            }
            return Ok(Validation::Ok(String::new()));
        }

        match flags.chars().next() {
            Some('D') => {
                if is_internal_datetime(value) {
                    Ok(Validation::Ok(value.to_string()))
                } else {
                    Ok(invalid("740", "value is not a valid date/time", help))
                }
            }
            Some('N') => {
                let parsed: std::result::Result<f64, _> = value.parse();
                match parsed {
                    Err(_) => Ok(invalid("701", "value is not numeric", help)),
                    Ok(n) => {
                        if let Some((lo, hi)) = parse_range(&spec.valid) {
                            if n < lo || n > hi {
                                return Ok(invalid("702", "value is out of range", help));
                            }
                        }
                        Ok(Validation::Ok(value.to_string()))
                    }
                }
            }
            Some('S') => {
                for part in spec.details.split(';') {
                    if part.is_empty() {
                        continue;
                    }
                    let (code, label) = part.split_once(':').unwrap_or((part, ""));
                    if value == code || value.eq_ignore_ascii_case(label) {
                        return Ok(Validation::Ok(code.to_string()));
                    }
                }
                Ok(invalid("703", "value is not a member of the set", help))
            }
            Some('F') => {
                if value.len() <= 245 {
                    Ok(Validation::Ok(value.to_string()))
                } else {
                    Ok(invalid("704", "value is too long", help))
                }
            }
            Some('P') => {
                if is_canonic_number(value) {
                    Ok(Validation::Ok(value.to_string()))
                } else {
                    Ok(invalid("705", "pointer value must be a row identifier", help))
                }
            }
            _ => Ok(Validation::Ok(value.to_string())),
        }
    }

    fn retrieve_record(
        &self,
        file: &FileId,
        rowid: &RowId,
    ) -> Result<Option<BTreeMap<FieldId, String>>> {
        let root = self.file_root(file)?;
        let row_path = root.child(rowid.as_str());
        if !self.exists(&row_path)? {
            return Ok(None);
        }
        let mut values = BTreeMap::new();
        for field in self.file_fields(file)? {
            if let Some(value) = self.get(&row_path.child(field.as_str()))? {
                values.insert(field, value);
            }
        }
        Ok(Some(values))
    }

    fn create_record(&self, file: &FileId, staged: &[(FieldId, String)]) -> Result<RowId> {
        for field in self.file_fields(file)? {
            let spec = self.field_spec(file, &field)?;
            let mandatory = spec.map(|s| s.flags.starts_with('R')).unwrap_or(false);
            if mandatory {
                let present = staged
                    .iter()
                    .any(|(f, v)| *f == field && !v.is_empty());
                if !present {
                    return Err(Error::StoreWrite {
                        file: file.to_string(),
                        row: None,
                        message: "the new record lacks some required identifiers".into(),
                    });
                }
            }
        }
        let root = self.file_root(file)?;
        let (name, id, last, count) = self.read_header(&root)?;
        let rowid = RowId((last + 1).to_string());
        for (field, value) in staged {
            if !value.is_empty() {
                self.set(&root.child(rowid.as_str()).child(field.as_str()), value)?;
            }
        }
        for (ixname, ixfield) in self.file_indexes(file)? {
            if let Some((_, value)) = staged.iter().find(|(f, _)| *f == ixfield) {
                self.maintain_index(&root, &rowid, &ixname, None, value)?;
            }
        }
        self.write_header(&root, &name, &id, last + 1, count + 1)?;
        Ok(rowid)
    }

    fn update_record(
        &self,
        file: &FileId,
        rowid: &RowId,
        staged: &[(FieldId, String)],
    ) -> Result<()> {
        let root = self.file_root(file)?;
        if !self.exists(&root.child(rowid.as_str()))? {
            return Err(Error::not_found(format!(
                "row [{}] in file [{}]",
                rowid, file
            )));
        }
        let indexes = self.file_indexes(file)?;
        for (field, value) in staged {
            let node = root.child(rowid.as_str()).child(field.as_str());
            let old = self.get(&node)?;
            for (ixname, ixfield) in &indexes {
                if ixfield == field {
                    self.maintain_index(&root, rowid, ixname, old.as_deref(), value)?;
                }
            }
            if value.is_empty() {
                self.kill(&node)?;
            } else {
                self.set(&node, value)?;
            }
        }
        Ok(())
    }

    fn delete_record(&self, file: &FileId, rowid: &RowId) -> Result<()> {
        let root = self.file_root(file)?;
        let row_path = root.child(rowid.as_str());
        if !self.exists(&row_path)? {
            return Err(Error::not_found(format!(
                "row [{}] in file [{}]",
                rowid, file
            )));
        }
        for (ixname, ixfield) in self.file_indexes(file)? {
            if let Some(value) = self.get(&row_path.child(ixfield.as_str()))? {
                if !value.is_empty() {
                    self.kill(&root.child(ixname).child(value).child(rowid.as_str()))?;
                }
            }
        }
        self.kill(&row_path)?;
        let (name, id, last, count) = self.read_header(&root)?;
        self.write_header(&root, &name, &id, last, count.saturating_sub(1))?;
        Ok(())
    }

    fn is_file(&self, fileid: &str) -> Result<bool> {
        self.exists(&Path::with_subs(FILE_DIRECTORY, [fileid, "0"]))
    }
}

/// Internal datetime form: `YYYMMDD` with an optional `.HHMMSS` tail,
/// years counted from 1700.
fn is_internal_datetime(value: &str) -> bool {
    let (date, time) = match value.split_once('.') {
        Some((d, t)) => (d, Some(t)),
        None => (value, None),
    };
    if date.len() != 7 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let month: u32 = date[3..5].parse().unwrap_or(0);
    let day: u32 = date[5..7].parse().unwrap_or(0);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return false;
    }
    match time {
        None => true,
        Some(t) => !t.is_empty() && t.len() <= 6 && t.bytes().all(|b| b.is_ascii_digit()),
    }
}

fn parse_range(valid: &str) -> Option<(f64, f64)> {
    let (lo, hi) = valid.split_once(':')?;
    Some((lo.parse().ok()?, hi.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn employee_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.define_file("EMPLOYEE", "9999900", "DIZ").unwrap();
        store
            .define_field("9999900", ".01", "NAME", "RF", "", "0;1")
            .unwrap();
        store
            .define_field("9999900", "1", "AGE", "N", "", "0;2")
            .unwrap();
        store.set_field_valid("9999900", "1", "0:130").unwrap();
        store
            .define_field("9999900", "2", "GRADE", "S", "j:JUNIOR;s:SENIOR;", "0;3")
            .unwrap();
        store.define_index("9999900", "B", ".01").unwrap();
        store.define_index("9999900", "C", "1").unwrap();
        store
    }

    #[test]
    fn test_order_ascending_numbers_before_strings() {
        let store = MemoryStore::new();
        for sub in ["B", "10", "2", "ZZ"] {
            store.set(&Path::with_subs("G", ["1", sub]), "x").unwrap();
        }
        let mut seen = Vec::new();
        let mut cursor = String::new();
        loop {
            let at = Path::with_subs("G", ["1", cursor.as_str()]);
            match store.order(&at, Direction::Ascending).unwrap() {
                Some(next) => {
                    seen.push(next.clone());
                    cursor = next;
                }
                None => break,
            }
        }
        assert_eq!(seen, vec!["2", "10", "B", "ZZ"]);
    }

    #[test]
    fn test_order_descending_walks_in_reverse() {
        let store = MemoryStore::new();
        for sub in ["1", "5", "APPLE"] {
            store.set(&Path::with_subs("G", ["x", sub]), "").unwrap();
        }
        let mut seen = Vec::new();
        let mut cursor = String::new();
        loop {
            let at = Path::with_subs("G", ["x", cursor.as_str()]);
            match store.order(&at, Direction::Descending).unwrap() {
                Some(prev) => {
                    seen.push(prev.clone());
                    cursor = prev;
                }
                None => break,
            }
        }
        assert_eq!(seen, vec!["APPLE", "5", "1"]);
    }

    #[test]
    fn test_order_skips_deeper_levels() {
        let store = MemoryStore::new();
        store.set(&Path::with_subs("G", ["1", "A", "deep"]), "x").unwrap();
        store.set(&Path::with_subs("G", ["1", "B"]), "y").unwrap();
        let next = store
            .order(&Path::with_subs("G", ["1", "A"]), Direction::Ascending)
            .unwrap();
        assert_eq!(next.as_deref(), Some("B"));
    }

    #[test]
    fn test_kill_removes_subtree() {
        let store = MemoryStore::new();
        store.set(&Path::with_subs("G", ["1"]), "a").unwrap();
        store.set(&Path::with_subs("G", ["1", "2"]), "b").unwrap();
        store.set(&Path::with_subs("G", ["2"]), "c").unwrap();
        store.kill(&Path::with_subs("G", ["1"])).unwrap();
        assert!(!store.exists(&Path::with_subs("G", ["1"])).unwrap());
        assert!(store.exists(&Path::with_subs("G", ["2"])).unwrap());
    }

    #[test]
    fn test_lock_nests_for_same_session() {
        let store = MemoryStore::new();
        let path = Path::with_subs("DIZ", ["1", "7"]);
        assert!(store.lock(&path, Duration::from_millis(10)).unwrap());
        assert!(store.lock(&path, Duration::from_millis(10)).unwrap());
        store.unlock(&path).unwrap();
        store.unlock(&path).unwrap();
        // fully released: another thread can take it immediately
        let store = Arc::new(store);
        let s = store.clone();
        let p = path.clone();
        let taken = thread::spawn(move || s.lock(&p, Duration::from_millis(10)).unwrap())
            .join()
            .unwrap();
        assert!(taken);
    }

    #[test]
    fn test_lock_contention_times_out() {
        let store = Arc::new(MemoryStore::new());
        let path = Path::with_subs("DIZ", ["1", "7"]);
        assert!(store.lock(&path, Duration::from_millis(10)).unwrap());
        let s = store.clone();
        let p = path.clone();
        let got = thread::spawn(move || s.lock(&p, Duration::from_millis(50)).unwrap())
            .join()
            .unwrap();
        assert!(!got);
    }

    #[test]
    fn test_lock_released_wakes_waiter() {
        let store = Arc::new(MemoryStore::new());
        let path = Path::with_subs("DIZ", ["1", "9"]);
        assert!(store.lock(&path, Duration::from_millis(10)).unwrap());
        let s = store.clone();
        let p = path.clone();
        let waiter = thread::spawn(move || s.lock(&p, Duration::from_secs(5)).unwrap());
        thread::sleep(Duration::from_millis(30));
        store.unlock(&path).unwrap();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_validate_numeric_rejects_text() {
        let store = employee_store();
        let v = store
            .validate_field(&"9999900".into(), &"1".into(), "abc")
            .unwrap();
        match v {
            Validation::Invalid { code, .. } => assert_eq!(code, "701"),
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_validate_numeric_range() {
        let store = employee_store();
        let v = store
            .validate_field(&"9999900".into(), &"1".into(), "200")
            .unwrap();
        assert!(!v.is_ok());
        let v = store
            .validate_field(&"9999900".into(), &"1".into(), "42")
            .unwrap();
        assert_eq!(v, Validation::Ok("42".into()));
    }

    #[test]
    fn test_validate_set_maps_label_to_code() {
        let store = employee_store();
        let v = store
            .validate_field(&"9999900".into(), &"2".into(), "JUNIOR")
            .unwrap();
        assert_eq!(v, Validation::Ok("j".into()));
        let v = store
            .validate_field(&"9999900".into(), &"2".into(), "s")
            .unwrap();
        assert_eq!(v, Validation::Ok("s".into()));
        let v = store
            .validate_field(&"9999900".into(), &"2".into(), "x")
            .unwrap();
        assert!(!v.is_ok());
    }

    #[test]
    fn test_validate_mandatory_rejects_empty() {
        let store = employee_store();
        let v = store
            .validate_field(&"9999900".into(), &".01".into(), "")
            .unwrap();
        assert!(!v.is_ok());
        // optional field may be cleared
        let v = store
            .validate_field(&"9999900".into(), &"1".into(), "")
            .unwrap();
        assert!(v.is_ok());
    }

    #[test]
    fn test_create_assigns_sequential_rowids_and_indexes() {
        let store = employee_store();
        let file = FileId::from("9999900");
        let r1 = store
            .create_record(&file, &[(FieldId::from(".01"), "ALICE".into())])
            .unwrap();
        let r2 = store
            .create_record(&file, &[(FieldId::from(".01"), "BOB".into())])
            .unwrap();
        assert_eq!(r1.as_str(), "1");
        assert_eq!(r2.as_str(), "2");
        assert!(store
            .exists(&Path::with_subs("DIZ", ["9999900", "B", "ALICE", "1"]))
            .unwrap());
        let (_, _, last, count) = store
            .read_header(&store.file_root(&file).unwrap())
            .unwrap();
        assert_eq!((last, count), (2, 2));
    }

    #[test]
    fn test_create_without_required_identifier_fails() {
        let store = employee_store();
        let err = store
            .create_record(&"9999900".into(), &[(FieldId::from("1"), "30".into())])
            .unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
    }

    #[test]
    fn test_update_moves_index_entry() {
        let store = employee_store();
        let file = FileId::from("9999900");
        let rowid = store
            .create_record(&file, &[(FieldId::from(".01"), "ALICE".into())])
            .unwrap();
        store
            .update_record(&file, &rowid, &[(FieldId::from(".01"), "ALICIA".into())])
            .unwrap();
        assert!(!store
            .exists(&Path::with_subs("DIZ", ["9999900", "B", "ALICE", "1"]))
            .unwrap());
        assert!(store
            .exists(&Path::with_subs("DIZ", ["9999900", "B", "ALICIA", "1"]))
            .unwrap());
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let store = employee_store();
        let err = store
            .update_record(
                &"9999900".into(),
                &"99".into(),
                &[(FieldId::from(".01"), "X".into())],
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_removes_row_and_indexes() {
        let store = employee_store();
        let file = FileId::from("9999900");
        let rowid = store
            .create_record(
                &file,
                &[
                    (FieldId::from(".01"), "ALICE".into()),
                    (FieldId::from("1"), "30".into()),
                ],
            )
            .unwrap();
        store.delete_record(&file, &rowid).unwrap();
        assert!(store.retrieve_record(&file, &rowid).unwrap().is_none());
        assert!(!store
            .exists(&Path::with_subs("DIZ", ["9999900", "B", "ALICE", "1"]))
            .unwrap());
        assert!(!store
            .exists(&Path::with_subs("DIZ", ["9999900", "C", "30", "1"]))
            .unwrap());
        let (_, _, _, count) = store
            .read_header(&store.file_root(&file).unwrap())
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_retrieve_returns_stored_fields_only() {
        let store = employee_store();
        let file = FileId::from("9999900");
        let rowid = store
            .create_record(&file, &[(FieldId::from(".01"), "ALICE".into())])
            .unwrap();
        let row = store.retrieve_record(&file, &rowid).unwrap().unwrap();
        assert_eq!(row.get(&FieldId::from(".01")).unwrap(), "ALICE");
        assert!(!row.contains_key(&FieldId::from("1")));
    }

    #[test]
    fn test_internal_datetime_forms() {
        assert!(is_internal_datetime("3240101"));
        assert!(is_internal_datetime("3240101.120000"));
        assert!(!is_internal_datetime("2024-01-01"));
        assert!(!is_internal_datetime("3241301"));
        assert!(!is_internal_datetime("324010"));
    }

    #[test]
    fn test_is_file_probe() {
        let store = employee_store();
        assert!(store.is_file("9999900").unwrap());
        assert!(!store.is_file("123").unwrap());
    }
}
