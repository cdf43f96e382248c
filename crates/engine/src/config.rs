//! Engine and per-file configuration.

use chrono::NaiveDate;
use std::time::Duration;
use trellis_core::FieldId;

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default window for row lock acquisition.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Which fields a file handle projects into results.
#[derive(Debug, Clone, Default)]
pub enum Projection {
    /// Every field the dictionary declares, in native order.
    #[default]
    All,
    /// Explicit field ids, in the given order.
    Ids(Vec<FieldId>),
    /// Field names, resolved through the dictionary at open time.
    Names(Vec<String>),
}

/// Per-file-handle configuration.
#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Serve values in the store's internal form (`true`) or decoded to
    /// their external display form (`false`).
    pub internal: bool,
    /// Field projection for row results.
    pub projection: Projection,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            internal: true,
            projection: Projection::All,
        }
    }
}

/// Identity of the session driving the engine.
#[derive(Debug, Clone)]
pub struct UserContext {
    /// Store-side user identifier.
    pub user_id: String,
    /// Session date override, if any.
    pub session_date: Option<NaiveDate>,
    /// Programmer mode widens file listing to unmanaged files.
    pub programmer: bool,
}

impl Default for UserContext {
    fn default() -> Self {
        UserContext {
            user_id: "0".into(),
            session_date: None,
            programmer: false,
        }
    }
}
