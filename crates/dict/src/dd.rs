//! Data dictionary: per-file schema loaded from the store.
//!
//! The dictionary conventions:
//! - `^DIC("B",name,fileid)` resolves a file name to its identifier;
//! - `^DIC(fileid,0,"GL")` holds the open form of the file's data root;
//! - `^DD(fileid,fieldid,0)` holds `NAME^FLAGS^DETAILS^STORAGE^VALID`
//!   per field, with title and help on the `.1` and `3` nodes;
//! - `^DD(fileid,0,"IX",name,fileid,fieldid)` enumerates index keys.
//!
//! A dictionary is loaded once and never mutated afterwards; files are
//! not renumbered at runtime, so everything here is cacheable for the
//! life of the process.

use crate::field::{normalize_name, Field};
use crate::fieldtype::{self, FieldType};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use trellis_core::collation::is_canonic_number;
use trellis_core::{Direction, Error, FieldId, FileId, Path, Result, Store};

const FILE_DIRECTORY: &str = "DIC";
const DICTIONARY: &str = "DD";

fn piece(s: &str, n: usize) -> &str {
    s.split('^').nth(n - 1).unwrap_or("")
}

/// Immutable schema of one logical file.
#[derive(Debug)]
pub struct DataDictionary {
    name: String,
    fileid: FileId,
    global_root: Path,
    fields: Vec<Field>,
    by_id: HashMap<FieldId, usize>,
    by_name: HashMap<String, usize>,
    indexes: BTreeMap<String, Vec<FieldId>>,
}

impl DataDictionary {
    /// Load the dictionary for a file name. `NotFound` when the name is
    /// not registered; `SchemaError` when a field entry is missing or
    /// carries an unrecognized type flag.
    pub fn load(name: &str, store: &dyn Store) -> Result<DataDictionary> {
        let fileid = resolve_fileid(name, store)?;
        let global_root = resolve_root(&fileid, store)?;
        let fields = load_fields(&fileid, store)?;
        let indexes = load_indexes(&fileid, store)?;

        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            by_id.insert(field.id.clone(), i);
            by_name.insert(field.name.clone(), i);
        }

        debug!(
            target: "trellis::dict",
            file = %name,
            fileid = %fileid,
            fields = fields.len(),
            indexes = indexes.len(),
            "dictionary loaded"
        );

        Ok(DataDictionary {
            name: name.to_string(),
            fileid,
            global_root,
            fields,
            by_id,
            by_name,
            indexes,
        })
    }

    /// File name this dictionary was loaded for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved numeric file identifier.
    pub fn fileid(&self) -> &FileId {
        &self.fileid
    }

    /// Root path of the file's data global.
    pub fn global_root(&self) -> &Path {
        &self.global_root
    }

    /// All fields in native (field-id) order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by id.
    pub fn field(&self, id: &FieldId) -> Option<&Field> {
        self.by_id.get(id).map(|&i| &self.fields[i])
    }

    /// Look up a field by normalized name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Resolve a name to its field id, or `UnknownField`.
    pub fn field_id(&self, name: &str) -> Result<FieldId> {
        self.field_by_name(name)
            .map(|f| f.id.clone())
            .ok_or_else(|| Error::UnknownField {
                file: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Index definitions: name → ordered key field ids.
    pub fn indexes(&self) -> &BTreeMap<String, Vec<FieldId>> {
        &self.indexes
    }

    /// First single-column index over the given field, in enumeration
    /// order.
    pub fn index_on(&self, field: &FieldId) -> Option<&str> {
        self.indexes
            .iter()
            .find(|(_, key)| key.len() == 1 && key[0] == *field)
            .map(|(name, _)| name.as_str())
    }
}

fn resolve_fileid(name: &str, store: &dyn Store) -> Result<FileId> {
    let at = Path::with_subs(FILE_DIRECTORY, ["B", name, ""]);
    match store.order(&at, Direction::Ascending)? {
        Some(id) => Ok(FileId(id)),
        None => Err(Error::not_found(format!("file [{}]", name))),
    }
}

fn resolve_root(fileid: &FileId, store: &dyn Store) -> Result<Path> {
    let node = Path::with_subs(FILE_DIRECTORY, [fileid.as_str(), "0", "GL"]);
    let open_form = store
        .get(&node)?
        .ok_or_else(|| Error::schema(fileid.as_str(), "file has no data root"))?;
    Path::parse_open_form(&open_form).ok_or_else(|| {
        Error::schema(
            fileid.as_str(),
            format!("unparseable data root [{}]", open_form),
        )
    })
}

fn load_fields(fileid: &FileId, store: &dyn Store) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    let mut cursor = "0".to_string();
    loop {
        let at = Path::with_subs(DICTIONARY, [fileid.as_str(), cursor.as_str()]);
        let next = match store.order(&at, Direction::Ascending)? {
            Some(next) if is_canonic_number(&next) => next,
            _ => break,
        };
        let id = FieldId(next.clone());
        let entry = store
            .get(&Path::with_subs(
                DICTIONARY,
                [fileid.as_str(), id.as_str(), "0"],
            ))?
            .ok_or_else(|| {
                Error::schema(
                    fileid.as_str(),
                    format!("field {} has no definition entry", id),
                )
            })?;
        fields.push(build_field(fileid, id, &entry, store)?);
        cursor = next;
    }
    Ok(fields)
}

fn build_field(fileid: &FileId, id: FieldId, entry: &str, store: &dyn Store) -> Result<Field> {
    let raw_name = piece(entry, 1);
    let flags = piece(entry, 2);
    if flags.is_empty() {
        return Err(Error::schema(
            fileid.as_str(),
            format!("field {} [{}] has no type flag", id, raw_name),
        ));
    }
    let ty = fieldtype::classify(flags, store)?.ok_or_else(|| {
        Error::schema(
            fileid.as_str(),
            format!("field {} [{}]: unrecognized type flag [{}]", id, raw_name, flags),
        )
    })?;
    let details = piece(entry, 3).to_string();
    let storage = match piece(entry, 4) {
        "" => None,
        s => Some(s.to_string()),
    };
    let codes = if ty == FieldType::Set {
        Field::parse_codes(&details)
    } else {
        Vec::new()
    };
    let pointer_target = if ty == FieldType::Pointer {
        let bare = flags.strip_prefix('R').unwrap_or(flags);
        let target = fieldtype::numeric_prefix(bare.strip_prefix('P').unwrap_or(bare));
        if target.is_empty() {
            None
        } else {
            Some(target.to_string())
        }
    } else {
        None
    };
    let title = store.get(&Path::with_subs(
        DICTIONARY,
        [fileid.as_str(), id.as_str(), ".1"],
    ))?;
    let help = store.get(&Path::with_subs(
        DICTIONARY,
        [fileid.as_str(), id.as_str(), "3"],
    ))?;
    Ok(Field {
        id,
        name: normalize_name(raw_name),
        ty,
        mandatory: fieldtype::is_mandatory(flags),
        storage,
        details,
        codes,
        pointer_target,
        title,
        help,
    })
}

fn load_indexes(fileid: &FileId, store: &dyn Store) -> Result<BTreeMap<String, Vec<FieldId>>> {
    let mut indexes = BTreeMap::new();
    let mut name = String::new();
    loop {
        let at = Path::with_subs(DICTIONARY, [fileid.as_str(), "0", "IX", name.as_str()]);
        let next = match store.order(&at, Direction::Ascending)? {
            Some(next) => next,
            None => break,
        };
        let mut key = Vec::new();
        let mut field = String::new();
        loop {
            let at = Path::with_subs(
                DICTIONARY,
                [
                    fileid.as_str(),
                    "0",
                    "IX",
                    next.as_str(),
                    fileid.as_str(),
                    field.as_str(),
                ],
            );
            match store.order(&at, Direction::Ascending)? {
                Some(f) => {
                    key.push(FieldId(f.clone()));
                    field = f;
                }
                None => break,
            }
        }
        if !key.is_empty() {
            indexes.insert(next.clone(), key);
        }
        name = next;
    }
    Ok(indexes)
}
