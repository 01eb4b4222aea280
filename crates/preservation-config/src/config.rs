// crates/preservation-config/src/config.rs
// ============================================================================
// Module: Preservation Configuration
// Description: Configuration loading and validation for preservation tooling.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: preservation-fixity, preservation-storage, preservation-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path is taken from the caller, else from `PRESERVATION_CONFIG`, else
//! `preservation.toml` in the working directory. Every section has defaults
//! except `[storage]`, which is optional; commands that talk to archival
//! storage fail when it is absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use preservation_fixity::METS_NAMESPACE;
use preservation_storage::BasicCredentials;
use preservation_storage::DEFAULT_TIMEOUT_MS;
use preservation_storage::StorageClientConfig;
use preservation_store_sqlite::SqliteStoreConfig;
use preservation_store_sqlite::SqliteStoreMode;
use preservation_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "preservation.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PRESERVATION_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default workspace root.
const DEFAULT_WORKSPACE_ROOT: &str = "workspace";
/// Minimum archival storage request timeout in milliseconds.
pub const MIN_STORAGE_TIMEOUT_MS: u64 = 100;
/// Maximum archival storage request timeout in milliseconds.
pub const MAX_STORAGE_TIMEOUT_MS: u64 = 600_000;
/// Default busy timeout for the SQLite store in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Accepted logging levels.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Preservation tooling configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreservationConfig {
    /// Per-run workspace configuration.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Archival storage endpoint and credentials.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    /// Issue and object record store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Fixity verification settings.
    #[serde(default)]
    pub fixity: FixityConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PreservationConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration from raw file contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the contents exceed the size limit, are
    /// not UTF-8, fail to parse, or fail validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.workspace.validate()?;
        if let Some(storage) = &self.storage {
            storage.validate()?;
        }
        self.store.validate()?;
        self.fixity.validate()?;
        self.logging.validate()
    }

    /// Returns the storage section or an error naming the missing section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `[storage]` is absent.
    pub fn require_storage(&self) -> Result<&StorageConfig, ConfigError> {
        self.storage
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("storage section is required".to_string()))
    }
}

/// Per-run workspace configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Directory holding one subdirectory per workflow run.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

impl WorkspaceConfig {
    /// Validates the workspace root.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("workspace.root", &self.root.to_string_lossy())
    }
}

/// Archival storage endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Service base URL; operations live under `{base_url}/storage`.
    pub base_url: String,
    /// Credential for exports and state queries.
    pub read: CredentialsConfig,
    /// Credential for modifying operations.
    pub read_write: CredentialsConfig,
    /// Request timeout in milliseconds.
    #[serde(default = "default_storage_timeout_ms")]
    pub timeout_ms: u64,
}

impl StorageConfig {
    /// Validates the storage endpoint.
    fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_url()?;
        self.read.validate("storage.read")?;
        self.read_write.validate("storage.read_write")?;
        if self.timeout_ms < MIN_STORAGE_TIMEOUT_MS || self.timeout_ms > MAX_STORAGE_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "storage.timeout_ms must be between {MIN_STORAGE_TIMEOUT_MS} and \
                 {MAX_STORAGE_TIMEOUT_MS} milliseconds"
            )));
        }
        Ok(())
    }

    /// Parses the base URL and checks it can address the storage API.
    fn parsed_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|err| ConfigError::Invalid(format!("storage.base_url invalid: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(
                "storage.base_url must use http or https".to_string(),
            ));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ConfigError::Invalid("storage.base_url must include a host".to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(
                "storage.base_url must not carry a query or fragment".to_string(),
            ));
        }
        Ok(url)
    }

    /// Builds the immutable client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the section is invalid.
    pub fn client_config(&self) -> Result<StorageClientConfig, ConfigError> {
        self.validate()?;
        Ok(StorageClientConfig {
            base_url: self.parsed_url()?,
            read: self.read.credentials(),
            read_write: self.read_write.credentials(),
            timeout_ms: self.timeout_ms,
        })
    }
}

/// Basic authentication credential.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl CredentialsConfig {
    /// Validates the credential.
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{field}.username must be non-empty")));
        }
        if self.username.contains(':') {
            return Err(ConfigError::Invalid(format!("{field}.username must not contain ':'")));
        }
        Ok(())
    }

    /// Returns the client credential.
    fn credentials(&self) -> BasicCredentials {
        BasicCredentials::new(self.username.clone(), self.password.clone())
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Issue and object record store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store; records last for one process.
    #[default]
    Memory,
    /// `SQLite`-backed durable store.
    Sqlite,
}

/// Issue and object record store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())
            }
        }
    }

    /// Returns the `SQLite` configuration when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

/// Fixity verification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixityConfig {
    /// Namespace URI matched on METS `file` elements.
    #[serde(default = "default_mets_namespace")]
    pub mets_namespace: String,
}

impl Default for FixityConfig {
    fn default() -> Self {
        Self {
            mets_namespace: default_mets_namespace(),
        }
    }
}

impl FixityConfig {
    /// Validates fixity settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.mets_namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("fixity.mets_namespace must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level when `PRESERVATION_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Validates the logging level.
    fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default workspace root.
fn default_workspace_root() -> PathBuf {
    PathBuf::from(DEFAULT_WORKSPACE_ROOT)
}

/// Default archival storage timeout.
const fn default_storage_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Default METS namespace.
fn default_mets_namespace() -> String {
    METS_NAMESPACE.to_string()
}

/// Default logging level.
fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn validate_path_rejects_long_component() {
        let path = PathBuf::from("a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let err = validate_path(&path).unwrap_err();
        assert!(err.to_string().contains("component too long"));
    }

    #[test]
    fn validate_path_string_rejects_blank() {
        let err = validate_path_string("workspace.root", "   ").unwrap_err();
        assert_eq!(err.to_string(), "invalid config: workspace.root must be non-empty");
    }

    #[test]
    fn explicit_path_wins_resolution() {
        let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("custom.toml"));
    }

    #[test]
    fn storage_url_rejects_query() {
        let storage = StorageConfig {
            base_url: "https://archive.example.org/api?x=1".to_string(),
            read: CredentialsConfig {
                username: "r".to_string(),
                password: String::new(),
            },
            read_write: CredentialsConfig {
                username: "w".to_string(),
                password: String::new(),
            },
            timeout_ms: DEFAULT_TIMEOUT_MS,
        };
        let err = storage.validate().unwrap_err();
        assert!(err.to_string().contains("query or fragment"));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = CredentialsConfig {
            username: "writer".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
