// crates/preservation-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Preservation Store
// Description: Durable IssueStore and ObjectStateStore backed by SQLite.
// Purpose: Persist fixity issues and stored-object records with a versioned schema.
// Dependencies: preservation-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! One `SQLite` database holds two tables: `issues`, an append-only log of
//! fixity issues ordered by insertion, and `stored_objects`, one row per
//! package and object kind. Rows are decoded strictly: an unknown issue code
//! or object state is reported as invalid data rather than skipped.
//!
//! Invariants:
//! - A batch of issues is saved in one transaction.
//! - Object records are never deleted by this store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use preservation_core::FormatRef;
use preservation_core::Issue;
use preservation_core::IssueKind;
use preservation_core::IssueStore;
use preservation_core::IssueStoreError;
use preservation_core::ObjectKind;
use preservation_core::ObjectState;
use preservation_core::ObjectStateStore;
use preservation_core::ObjectStoreError;
use preservation_core::PackageId;
use preservation_core::StoredObject;
use preservation_core::ToolRef;
use preservation_core::WorkflowId;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Object kind label stored for packages.
const KIND_SIP: &str = "sip";
/// Object kind label stored for metadata versions.
const KIND_XML: &str = "xml";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` preservation store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for IssueStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            other => Self::Io(other.to_string()),
        }
    }
}

impl From<SqliteStoreError> for ObjectStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            other => Self::Io(other.to_string()),
        }
    }
}

/// Maps an engine error into a store error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed issue and object record store.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqlitePreservationStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqlitePreservationStore {
    /// Opens or creates the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe, the database
    /// cannot be opened, or its schema version is unsupported.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        debug!(path = %config.path.display(), "sqlite preservation store opened");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns every record of a package, packages first, then metadata by version.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when loading or decoding fails.
    pub fn list_objects(&self, id: &PackageId) -> Result<Vec<StoredObject>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT package_id, kind, xml_version, state, confirmed FROM stored_objects WHERE \
                 package_id = ?1 ORDER BY kind = 'xml', xml_version",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![id.as_str()], map_object_row)
            .map_err(|err| db_error(&err))?;
        let mut objects = Vec::new();
        for row in rows {
            objects.push(decode_object(row.map_err(|err| db_error(&err))?)?);
        }
        Ok(objects)
    }

    /// Acquires the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))
    }

    /// Appends a batch of issues in one transaction.
    fn insert_issues(&self, issues: &[Issue]) -> Result<(), SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let created_at = unix_millis();
        for issue in issues {
            tx.execute(
                "INSERT INTO issues (workflow_id, tool_name, tool_version, issue_code, \
                 related_format, description, resolved_by_config, created_at) VALUES (?1, ?2, \
                 ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    issue.workflow.as_str(),
                    issue.tool.name,
                    issue.tool.version,
                    issue.kind.code(),
                    issue.related_format.as_ref().map(|format| format.puid.as_str()),
                    issue.description,
                    issue.resolved_by_config,
                    created_at,
                ],
            )
            .map_err(|err| db_error(&err))?;
        }
        tx.commit().map_err(|err| db_error(&err))?;
        debug!(count = issues.len(), "issues persisted");
        Ok(())
    }

    /// Loads the issues of one workflow run in insertion order.
    fn select_issues(&self, workflow: &WorkflowId) -> Result<Vec<Issue>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT tool_name, tool_version, issue_code, related_format, description, \
                 resolved_by_config FROM issues WHERE workflow_id = ?1 ORDER BY seq",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![workflow.as_str()], |row| {
                Ok(IssueRow {
                    tool_name: row.get(0)?,
                    tool_version: row.get(1)?,
                    issue_code: row.get(2)?,
                    related_format: row.get(3)?,
                    description: row.get(4)?,
                    resolved_by_config: row.get(5)?,
                })
            })
            .map_err(|err| db_error(&err))?;
        let mut issues = Vec::new();
        for row in rows {
            let row = row.map_err(|err| db_error(&err))?;
            let kind = IssueKind::from_str(&row.issue_code)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            issues.push(Issue {
                workflow: workflow.clone(),
                tool: ToolRef::new(row.tool_name, row.tool_version),
                kind,
                related_format: row.related_format.map(FormatRef::new),
                description: row.description,
                resolved_by_config: row.resolved_by_config,
            });
        }
        Ok(issues)
    }

    /// Inserts or replaces one object record.
    fn upsert_object(&self, object: &StoredObject) -> Result<(), SqliteStoreError> {
        let (kind, version) = kind_columns(object.kind);
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO stored_objects (package_id, kind, xml_version, state, confirmed, \
                 updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT (package_id, kind, \
                 xml_version) DO UPDATE SET state = excluded.state, confirmed = \
                 excluded.confirmed, updated_at = excluded.updated_at",
                params![
                    object.id.as_str(),
                    kind,
                    version,
                    object.state.as_str(),
                    object.confirmed,
                    unix_millis(),
                ],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    /// Loads one object record.
    fn select_object(
        &self,
        id: &PackageId,
        kind: ObjectKind,
    ) -> Result<Option<StoredObject>, SqliteStoreError> {
        let (kind, version) = kind_columns(kind);
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT package_id, kind, xml_version, state, confirmed FROM stored_objects WHERE \
                 package_id = ?1 AND kind = ?2 AND xml_version = ?3",
                params![id.as_str(), kind, version],
                map_object_row,
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        row.map(decode_object).transpose()
    }
}

impl IssueStore for SqlitePreservationStore {
    fn save(&self, issues: &[Issue]) -> Result<(), IssueStoreError> {
        self.insert_issues(issues).map_err(IssueStoreError::from)
    }

    fn find_by_workflow(&self, workflow: &WorkflowId) -> Result<Vec<Issue>, IssueStoreError> {
        self.select_issues(workflow).map_err(IssueStoreError::from)
    }
}

impl ObjectStateStore for SqlitePreservationStore {
    fn save_object(&self, object: &StoredObject) -> Result<(), ObjectStoreError> {
        self.upsert_object(object).map_err(ObjectStoreError::from)
    }

    fn find_object(
        &self,
        id: &PackageId,
        kind: ObjectKind,
    ) -> Result<Option<StoredObject>, ObjectStoreError> {
        self.select_object(id, kind).map_err(ObjectStoreError::from)
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw issue row.
struct IssueRow {
    /// Tool name.
    tool_name: String,
    /// Tool version.
    tool_version: String,
    /// Stable issue code.
    issue_code: String,
    /// Optional format PUID.
    related_format: Option<String>,
    /// Issue description.
    description: String,
    /// Whether configuration resolved the issue.
    resolved_by_config: bool,
}

/// Raw stored object row.
struct ObjectRow {
    /// Package identifier.
    package_id: String,
    /// Kind label.
    kind: String,
    /// Metadata version, zero for packages.
    xml_version: i64,
    /// State name.
    state: String,
    /// Confirmation flag.
    confirmed: bool,
}

/// Maps a `stored_objects` row.
fn map_object_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectRow> {
    Ok(ObjectRow {
        package_id: row.get(0)?,
        kind: row.get(1)?,
        xml_version: row.get(2)?,
        state: row.get(3)?,
        confirmed: row.get(4)?,
    })
}

/// Decodes a raw object row strictly.
fn decode_object(row: ObjectRow) -> Result<StoredObject, SqliteStoreError> {
    let kind = match row.kind.as_str() {
        KIND_SIP => ObjectKind::Sip,
        KIND_XML => ObjectKind::Xml {
            version: u32::try_from(row.xml_version).map_err(|_| {
                SqliteStoreError::Invalid(format!("xml version out of range: {}", row.xml_version))
            })?,
        },
        other => return Err(SqliteStoreError::Invalid(format!("unknown object kind: {other}"))),
    };
    let state = ObjectState::from_str(&row.state)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    Ok(StoredObject {
        id: PackageId::new(row.package_id),
        kind,
        state,
        confirmed: row.confirmed,
    })
}

/// Returns the kind label and version columns of an object kind.
fn kind_columns(kind: ObjectKind) -> (&'static str, i64) {
    match kind {
        ObjectKind::Sip => (KIND_SIP, 0),
        ObjectKind::Xml {
            version,
        } => (KIND_XML, i64::from(version)),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS issues (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    workflow_id TEXT NOT NULL,
                    tool_name TEXT NOT NULL,
                    tool_version TEXT NOT NULL,
                    issue_code TEXT NOT NULL,
                    related_format TEXT,
                    description TEXT NOT NULL,
                    resolved_by_config INTEGER NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_issues_workflow ON issues (workflow_id, seq);
                CREATE TABLE IF NOT EXISTS stored_objects (
                    package_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    xml_version INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    confirmed INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (package_id, kind, xml_version)
                );",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
